//! Indented s-expression rendering of node trees, used by debug output and
//! the CLI `--format tree` dump.

use std::fmt;

use super::kind::{AwaitStep, BinaryOperator, NodeKind, UnaryOperator};
use super::node::{Node, NodeRef};

fn fmt_indent(f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    for _ in 0..indent {
        write!(f, " ")?;
    }
    Ok(())
}

fn binary_symbol(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Eq => "==",
        BinaryOperator::Ne => "!=",
        BinaryOperator::Lt => "<",
        BinaryOperator::Le => "<=",
        BinaryOperator::Gt => ">",
        BinaryOperator::Ge => ">=",
        BinaryOperator::Add => "+",
        BinaryOperator::Sub => "-",
        BinaryOperator::Mul => "*",
        BinaryOperator::Div => "/",
        BinaryOperator::Mod => "%",
        BinaryOperator::And => "&&",
        BinaryOperator::Or => "||",
    }
}

/// Leaves and small expressions over leaves render on one line.
fn inline(node: &Node) -> Option<String> {
    match &node.kind {
        NodeKind::Variable { variable } => Some(variable.to_string()),
        NodeKind::Constant { value } => Some(value.to_string()),
        NodeKind::Default { ty } => Some(format!("(default {})", ty)),
        NodeKind::Label { target } => Some(format!("(label {})", target)),
        NodeKind::Goto { target } => Some(format!("(goto {})", target)),
        NodeKind::Binary { op, left, right } => {
            Some(format!("({} {} {})", binary_symbol(*op), inline(left)?, inline(right)?))
        }
        NodeKind::Unary { op, operand } => {
            let sym = match op {
                UnaryOperator::Minus => "neg",
                UnaryOperator::Not => "not",
            };
            Some(format!("({} {})", sym, inline(operand)?))
        }
        NodeKind::Assign { target, value } => Some(format!("(assign {} {})", target, inline(value)?)),
        NodeKind::Call { callee, args } => {
            let mut parts = vec![callee.clone()];
            for a in args {
                parts.push(inline(a)?);
            }
            Some(format!("(call {})", parts.join(" ")))
        }
        NodeKind::Awaiter { step, operand } => {
            let name = match step {
                AwaitStep::Acquire => "acquire",
                AwaitStep::IsCompleted => "is-completed",
                AwaitStep::GetResult => "get-result",
            };
            Some(format!("({} {})", name, inline(operand)?))
        }
        NodeKind::Return { value: None } => Some("(return)".to_string()),
        NodeKind::Return { value: Some(v) } => Some(format!("(return {})", inline(v)?)),
        NodeKind::Throw { value: None } => Some("(rethrow)".to_string()),
        NodeKind::Throw { value: Some(v) } => Some(format!("(throw {})", inline(v)?)),
        _ => None,
    }
}

fn write_children(f: &mut fmt::Formatter<'_>, indent: usize, nodes: &[&NodeRef]) -> fmt::Result {
    for n in nodes {
        writeln!(f)?;
        write_node(f, n, indent)?;
    }
    Ok(())
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &Node, indent: usize) -> fmt::Result {
    fmt_indent(f, indent)?;
    if let Some(s) = inline(node) {
        return write!(f, "{}", s);
    }
    let inner = indent + 2;
    match &node.kind {
        NodeKind::Block { variables, statements } => {
            write!(f, "(block")?;
            if !variables.is_empty() {
                let names: Vec<String> = variables.iter().map(|v| v.to_string()).collect();
                write!(f, " [{}]", names.join(" "))?;
            }
            write_children(f, inner, &statements.iter().collect::<Vec<_>>())?;
        }
        NodeKind::Await { operand, acquire, result } => {
            write!(f, "(await {}", result)?;
            if let Some(a) = acquire {
                write!(f, " via {}", a)?;
            }
            write_children(f, inner, &[operand])?;
        }
        NodeKind::Try { body, handlers, finally, fault } => {
            write!(f, "(try")?;
            write_children(f, inner, &[body])?;
            for h in handlers {
                writeln!(f)?;
                fmt_indent(f, inner)?;
                match &h.variable {
                    Some(v) => write!(f, "(catch {}", v)?,
                    None => write!(f, "(catch")?,
                }
                if let Some(filter) = &h.filter {
                    writeln!(f)?;
                    fmt_indent(f, inner + 2)?;
                    write!(f, "(when")?;
                    writeln!(f)?;
                    write_node(f, filter, inner + 4)?;
                    write!(f, ")")?;
                }
                writeln!(f)?;
                write_node(f, &h.body, inner + 2)?;
                write!(f, ")")?;
            }
            if let Some(n) = finally {
                writeln!(f)?;
                fmt_indent(f, inner)?;
                writeln!(f, "(finally")?;
                write_node(f, n, inner + 2)?;
                write!(f, ")")?;
            }
            if let Some(n) = fault {
                writeln!(f)?;
                fmt_indent(f, inner)?;
                writeln!(f, "(fault")?;
                write_node(f, n, inner + 2)?;
                write!(f, ")")?;
            }
        }
        NodeKind::Loop { body, break_label, continue_label } => {
            write!(f, "(loop")?;
            if let Some(b) = break_label {
                write!(f, " break={}", b)?;
            }
            if let Some(c) = continue_label {
                write!(f, " continue={}", c)?;
            }
            write_children(f, inner, &[body])?;
        }
        NodeKind::Switch { value, cases, default } => {
            write!(f, "(switch")?;
            write_children(f, inner, &[value])?;
            for c in cases {
                writeln!(f)?;
                fmt_indent(f, inner)?;
                let tests: Vec<String> = c.tests.iter().map(|t| t.to_string()).collect();
                writeln!(f, "(case {}", tests.join(" "))?;
                write_node(f, &c.body, inner + 2)?;
                write!(f, ")")?;
            }
            if let Some(d) = default {
                writeln!(f)?;
                fmt_indent(f, inner)?;
                writeln!(f, "(default")?;
                write_node(f, d, inner + 2)?;
                write!(f, ")")?;
            }
        }
        NodeKind::Condition { test, then, otherwise } => {
            write!(f, "(if")?;
            match otherwise {
                Some(o) => write_children(f, inner, &[test, then, o])?,
                None => write_children(f, inner, &[test, then])?,
            }
        }
        NodeKind::Lock { guard, body } => {
            write!(f, "(lock")?;
            write_children(f, inner, &[guard, body])?;
        }
        other => {
            // Non-inline forms of expression nodes (an operand is a block).
            write!(f, "({}", other.to_string().to_lowercase())?;
            let mut nodes: Vec<&NodeRef> = Vec::new();
            other.for_each_child(&mut |c| nodes.push(c));
            match other {
                NodeKind::Assign { target, .. } => write!(f, " {}", target)?,
                NodeKind::Call { callee, .. } => write!(f, " {}", callee)?,
                NodeKind::Binary { op, .. } => write!(f, " {}", binary_symbol(*op))?,
                _ => {}
            }
            write_children(f, inner, &nodes)?;
        }
    }
    write!(f, ")")
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, self, 0)
    }
}
