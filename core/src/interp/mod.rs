//! file: core/src/interp/mod.rs
//! description: tree-walking evaluator for lowered bodies.
//!
//! The evaluator runs one invocation of a body against a persisted store
//! owned by the caller. Jumps are resolved structurally: a `Goto` unwinds
//! to the innermost block or loop whose subtree defines the label, which
//! then re-enters the child holding it in "seek" mode. Seeking into a
//! protected region is rejected, so a lowered body only works if resume
//! labels are reached through the dispatch inside each region.
//!
pub mod host;
pub mod labels;
pub mod value;

pub use host::{Host, StdHost};
pub use labels::LabelIndex;
pub use value::{FutureCell, FutureRef, Value};

use std::collections::HashMap;

use crate::ast::{AwaitStep, BinaryOperator, Node, NodeKind, NodeRef, UnaryOperator, Variable};
use crate::error::{Level, RuntimeError, RuntimeErrorKind};
use crate::lower::ON_COMPLETED_HOOK;
use crate::lower::spill::is_stable_operand;

const ISSUER: &str = "resumable.interp";

/// Non-local control flow leaving a node.
#[derive(Debug)]
enum Unwind {
    Goto(usize),
    Return(Value),
    Throw(Value),
    /// Evaluation cannot continue; bypasses every handler.
    Fault(RuntimeError),
}

type Flow = Result<Value, Unwind>;

/// How one invocation of a body ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Control fell off the end of the body.
    Normal(Value),
    Returned(Value),
    Threw(Value),
}

fn fault(kind: RuntimeErrorKind, message: String, node: &Node) -> Unwind {
    Unwind::Fault(RuntimeError::with(Level::Error, kind, message, ISSUER.into(), Some(node.get_id())))
}

pub struct Interpreter<'a, H: Host> {
    labels: &'a LabelIndex,
    persisted: &'a mut HashMap<usize, Value>,
    locals: HashMap<usize, Value>,
    host: &'a mut H,
    handling: Vec<Value>,
    registered: Vec<Value>,
}

impl<'a, H: Host> Interpreter<'a, H> {
    pub fn new(labels: &'a LabelIndex, persisted: &'a mut HashMap<usize, Value>, host: &'a mut H) -> Self {
        Interpreter { labels, persisted, locals: HashMap::new(), host, handling: Vec::new(), registered: Vec::new() }
    }

    pub fn run(&mut self, body: &NodeRef) -> Result<Completion, RuntimeError> {
        match self.eval(body, None) {
            Ok(v) => Ok(Completion::Normal(v)),
            Err(Unwind::Return(v)) => Ok(Completion::Returned(v)),
            Err(Unwind::Throw(v)) => Ok(Completion::Threw(v)),
            Err(Unwind::Goto(label)) => Err(RuntimeError::with(
                Level::Error,
                RuntimeErrorKind::InvalidJump,
                format!("Jump to undefined label #{}", label),
                ISSUER.into(),
                None,
            )),
            Err(Unwind::Fault(e)) => Err(e),
        }
    }

    /// Awaiters handed to the on-incomplete callback during this run.
    pub fn take_registered(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.registered)
    }

    fn has(&self, node: &Node, label: usize) -> bool {
        self.labels.contains(node, label)
    }

    fn load(&self, v: &Variable, node: &Node) -> Flow {
        if let Some(x) = self.locals.get(&v.id) {
            return Ok(x.clone());
        }
        match self.persisted.get(&v.id) {
            Some(x) => Ok(x.clone()),
            None => Err(fault(RuntimeErrorKind::UnboundVariable, format!("Variable {} is not declared", v), node)),
        }
    }

    fn store(&mut self, v: &Variable, value: Value, node: &Node) -> Result<(), Unwind> {
        if let Some(slot) = self.locals.get_mut(&v.id) {
            *slot = value;
            return Ok(());
        }
        match self.persisted.get_mut(&v.id) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(fault(RuntimeErrorKind::UnboundVariable, format!("Variable {} is not declared", v), node)),
        }
    }

    /// Bind a catch variable: persisted storage if it was hoisted there.
    fn bind(&mut self, v: &Variable, value: Value) {
        match self.persisted.get_mut(&v.id) {
            Some(slot) => *slot = value,
            None => {
                self.locals.insert(v.id, value);
            }
        }
    }

    /// Which operand a seek has to enter. Operands before it are
    /// re-evaluated, which is only sound when they are stable.
    fn seek_operand(&self, node: &Node, operands: &[&NodeRef], seek: Option<usize>) -> Result<Option<usize>, Unwind> {
        let Some(label) = seek else {
            return Ok(None);
        };
        let Some(pos) = operands.iter().position(|o| self.has(o, label)) else {
            return Ok(None);
        };
        if operands[..pos].iter().all(|o| is_stable_operand(o)) {
            Ok(Some(pos))
        } else {
            Err(fault(
                RuntimeErrorKind::InvalidJump,
                "Jump into an operand after a partially evaluated one".to_string(),
                node,
            ))
        }
    }

    fn eval(&mut self, node: &Node, seek: Option<usize>) -> Flow {
        match &node.kind {
            NodeKind::Block { variables, statements } => {
                for v in variables {
                    self.locals.insert(v.id, Value::default_of(v.ty));
                }
                let mut seek = seek;
                let mut i = match seek {
                    Some(l) => statements.iter().position(|s| self.has(s, l)).unwrap_or(statements.len()),
                    None => 0,
                };
                let mut last = Value::Unit;
                while i < statements.len() {
                    match self.eval(&statements[i], seek.take()) {
                        Ok(v) => {
                            last = v;
                            i += 1;
                        }
                        Err(Unwind::Goto(l)) => match statements.iter().position(|s| self.has(s, l)) {
                            Some(j) => {
                                log::trace!("jump #{} resolved in block node#{}", l, node.get_id());
                                i = j;
                                seek = Some(l);
                                last = Value::Unit;
                            }
                            None => return Err(Unwind::Goto(l)),
                        },
                        Err(e) => return Err(e),
                    }
                }
                Ok(last)
            }
            NodeKind::Loop { body, break_label, continue_label } => {
                let is_break = |l: usize| break_label.as_ref().is_some_and(|b| b.id == l);
                let is_continue = |l: usize| continue_label.as_ref().is_some_and(|c| c.id == l);
                let mut seek = seek;
                if let Some(l) = seek {
                    if is_break(l) {
                        return Ok(Value::Unit);
                    }
                    if is_continue(l) {
                        seek = None;
                    }
                }
                loop {
                    match self.eval(body, seek.take()) {
                        Ok(_) => {}
                        Err(Unwind::Goto(l)) if is_break(l) => return Ok(Value::Unit),
                        Err(Unwind::Goto(l)) if is_continue(l) => {}
                        Err(Unwind::Goto(l)) if self.has(body, l) => seek = Some(l),
                        Err(e) => return Err(e),
                    }
                }
            }
            NodeKind::Label { .. } => Ok(Value::Unit),
            NodeKind::Goto { target } => Err(Unwind::Goto(target.id)),
            NodeKind::Switch { value, cases, default } => {
                if let Some(l) = seek.filter(|l| !self.has(value, *l)) {
                    if let Some(c) = cases.iter().find(|c| self.has(&c.body, l)) {
                        return self.eval(&c.body, Some(l));
                    }
                    if let Some(d) = default.as_ref().filter(|d| self.has(d, l)) {
                        return self.eval(d, Some(l));
                    }
                }
                let v = self.eval(value, seek)?;
                let Some(n) = v.as_int() else {
                    return Err(fault(
                        RuntimeErrorKind::TypeMismatch,
                        format!("Switch over {}", v.type_name()),
                        node,
                    ));
                };
                match cases.iter().find(|c| c.tests.contains(&n)) {
                    Some(c) => self.eval(&c.body, None),
                    None => match default {
                        Some(d) => self.eval(d, None),
                        None => Ok(Value::Unit),
                    },
                }
            }
            NodeKind::Condition { test, then, otherwise } => {
                if let Some(l) = seek.filter(|l| !self.has(test, *l)) {
                    if self.has(then, l) {
                        return self.eval(then, Some(l));
                    }
                    if let Some(o) = otherwise.as_ref().filter(|o| self.has(o, l)) {
                        return self.eval(o, Some(l));
                    }
                }
                let t = self.eval(test, seek)?;
                let Some(b) = t.as_bool() else {
                    return Err(fault(RuntimeErrorKind::TypeMismatch, format!("Condition on {}", t.type_name()), node));
                };
                if b {
                    self.eval(then, None)
                } else {
                    match otherwise {
                        Some(o) => self.eval(o, None),
                        None => Ok(Value::Unit),
                    }
                }
            }
            NodeKind::Try { body, handlers, finally, fault: fault_body } => {
                if seek.is_some() {
                    return Err(fault(
                        RuntimeErrorKind::InvalidJump,
                        "Jump into a protected region".to_string(),
                        node,
                    ));
                }
                let mut res = self.eval(body, None);

                let thrown = match &res {
                    Err(Unwind::Throw(ex)) => Some(ex.clone()),
                    _ => None,
                };
                if let Some(ex) = thrown {
                    for h in handlers {
                        if let Some(v) = &h.variable {
                            self.bind(v, ex.clone());
                        }
                        if let Some(filter) = &h.filter {
                            match self.eval(filter, None) {
                                Ok(b) if b.as_bool() == Some(true) => {}
                                // A filter that throws is treated as false.
                                Ok(_) | Err(Unwind::Throw(_)) => continue,
                                Err(e) => return Err(e),
                            }
                        }
                        log::trace!("exception {} caught by try node#{}", ex, node.get_id());
                        self.handling.push(ex.clone());
                        res = self.eval(&h.body, None);
                        self.handling.pop();
                        break;
                    }
                }

                if let Some(fb) = fault_body {
                    if matches!(res, Err(Unwind::Throw(_))) {
                        self.eval(fb, None)?;
                    }
                }
                if let Some(fb) = finally {
                    if !matches!(res, Err(Unwind::Fault(_))) {
                        self.eval(fb, None)?;
                    }
                }
                res
            }
            NodeKind::Lock { guard, body } => {
                if seek.is_some() {
                    return Err(fault(RuntimeErrorKind::InvalidJump, "Jump into a lock body".to_string(), node));
                }
                self.eval(guard, None)?;
                self.eval(body, None)
            }
            NodeKind::Return { value } => {
                let v = match value {
                    Some(v) => self.eval(v, seek)?,
                    None => Value::Unit,
                };
                Err(Unwind::Return(v))
            }
            NodeKind::Throw { value } => match value {
                Some(v) => Err(Unwind::Throw(self.eval(v, seek)?)),
                None => match self.handling.last() {
                    Some(ex) => Err(Unwind::Throw(ex.clone())),
                    None => Err(fault(
                        RuntimeErrorKind::Unhandled,
                        "Rethrow with no exception being handled".to_string(),
                        node,
                    )),
                },
            },
            NodeKind::Assign { target, value } => {
                let v = self.eval(value, seek)?;
                self.store(target, v.clone(), node)?;
                Ok(v)
            }
            NodeKind::Binary { op, left, right } => {
                let entry = self.seek_operand(node, &[left, right], seek)?;
                let l = self.eval(left, if entry == Some(0) { seek } else { None })?;
                let r = self.eval(right, if entry == Some(1) { seek } else { None })?;
                binary(*op, &l, &r, node)
            }
            NodeKind::Unary { op, operand } => {
                let v = self.eval(operand, seek)?;
                match (op, &v) {
                    (UnaryOperator::Minus, Value::Int(i)) => Ok(Value::Int(-i)),
                    (UnaryOperator::Not, _) => match v.as_bool() {
                        Some(b) => Ok(Value::Bool(!b)),
                        None => Err(fault(RuntimeErrorKind::TypeMismatch, format!("Cannot negate {}", v.type_name()), node)),
                    },
                    _ => Err(fault(RuntimeErrorKind::TypeMismatch, format!("Cannot negate {}", v.type_name()), node)),
                }
            }
            NodeKind::Call { callee, args } => {
                let operands: Vec<&NodeRef> = args.iter().collect();
                let entry = self.seek_operand(node, &operands, seek)?;
                let mut values = Vec::with_capacity(args.len());
                for (i, a) in args.iter().enumerate() {
                    values.push(self.eval(a, if entry == Some(i) { seek } else { None })?);
                }
                if callee == ON_COMPLETED_HOOK {
                    if let Some(awaiter) = values.into_iter().next() {
                        self.registered.push(awaiter);
                    }
                    return Ok(Value::Unit);
                }
                match self.host.call(callee, &values) {
                    Some(Ok(v)) => Ok(v),
                    Some(Err(ex)) => Err(Unwind::Throw(ex)),
                    None => Err(fault(
                        RuntimeErrorKind::UnknownHostFunction,
                        format!("Unknown host operation {}", callee),
                        node,
                    )),
                }
            }
            NodeKind::Variable { variable } => self.load(variable, node),
            NodeKind::Constant { value } => Ok(Value::from(value)),
            NodeKind::Default { ty } => Ok(Value::default_of(*ty)),
            NodeKind::Await { .. } => Err(fault(
                RuntimeErrorKind::UnloweredAwait,
                "Suspend point reached the evaluator without being lowered".to_string(),
                node,
            )),
            NodeKind::Awaiter { step, operand } => {
                let v = self.eval(operand, seek)?;
                let Value::Future(cell) = &v else {
                    return Err(fault(
                        RuntimeErrorKind::TypeMismatch,
                        format!("{} is not awaitable", v.type_name()),
                        node,
                    ));
                };
                match step {
                    AwaitStep::Acquire => Ok(v.clone()),
                    AwaitStep::IsCompleted => Ok(Value::Bool(cell.borrow().is_completed())),
                    AwaitStep::GetResult => match cell.borrow().outcome() {
                        Some(Ok(x)) => Ok(x),
                        Some(Err(ex)) => Err(Unwind::Throw(ex)),
                        None => Err(fault(
                            RuntimeErrorKind::TypeMismatch,
                            "Result requested from an incomplete awaiter".to_string(),
                            node,
                        )),
                    },
                }
            }
        }
    }
}

fn binary(op: BinaryOperator, l: &Value, r: &Value, node: &Node) -> Flow {
    use BinaryOperator::*;
    let mismatch = || {
        fault(
            RuntimeErrorKind::TypeMismatch,
            format!("Operator {:?} on {} and {}", op, l.type_name(), r.type_name()),
            node,
        )
    };
    match op {
        Eq => return Ok(Value::Bool(l == r)),
        Ne => return Ok(Value::Bool(l != r)),
        And | Or => {
            let (Some(a), Some(b)) = (l.as_bool(), r.as_bool()) else {
                return Err(mismatch());
            };
            return Ok(Value::Bool(if op == And { a && b } else { a || b }));
        }
        _ => {}
    }
    if let (Add, Value::Str(a), Value::Str(b)) = (op, l, r) {
        return Ok(Value::Str(format!("{}{}", a, b)));
    }
    let (Value::Int(a), Value::Int(b)) = (l, r) else {
        return Err(mismatch());
    };
    let (a, b) = (*a, *b);
    let v = match op {
        Lt => Value::Bool(a < b),
        Le => Value::Bool(a <= b),
        Gt => Value::Bool(a > b),
        Ge => Value::Bool(a >= b),
        Add => Value::Int(a.wrapping_add(b)),
        Sub => Value::Int(a.wrapping_sub(b)),
        Mul => Value::Int(a.wrapping_mul(b)),
        Div | Mod if b == 0 => return Err(Unwind::Throw(Value::Error("division by zero".to_string()))),
        Div => Value::Int(a.wrapping_div(b)),
        Mod => Value::Int(a.wrapping_rem(b)),
        Eq | Ne | And | Or => return Err(mismatch()),
    };
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{LabelTarget, Ty};

    fn run(body: &NodeRef) -> Result<Completion, RuntimeError> {
        let labels = LabelIndex::build(body);
        let mut persisted = HashMap::new();
        let mut host = StdHost::new();
        Interpreter::new(&labels, &mut persisted, &mut host).run(body)
    }

    #[test]
    fn goto_forward_skips_statements() {
        let skip = LabelTarget::new("skip");
        let x = Variable::new("x", Ty::Int);
        let body = Node::block(
            vec![x.clone()],
            vec![
                Node::goto(&skip),
                Node::assign(&x, Node::int(1)),
                Node::label(&skip),
                Node::ret(Node::var(&x)),
            ],
        );
        assert_eq!(run(&body).unwrap(), Completion::Returned(Value::Int(0)));
    }

    #[test]
    fn jump_into_try_is_invalid() {
        let inside = LabelTarget::new("inside");
        let body = Node::seq(vec![Node::goto(&inside), Node::try_finally(Node::label(&inside), Node::empty())]);
        let err = run(&body).unwrap_err();
        assert_eq!(err.kind(), &RuntimeErrorKind::InvalidJump);
    }

    #[test]
    fn finally_runs_on_return_and_fault_only_on_throw() {
        let body = Node::seq(vec![Node::try_region(
            Node::ret(Node::int(1)),
            vec![],
            Some(Node::call("trace", vec![Node::str("F")])),
            Some(Node::call("trace", vec![Node::str("X")])),
        )]);
        let labels = LabelIndex::build(&body);
        let mut persisted = HashMap::new();
        let mut host = StdHost::new();
        let done = Interpreter::new(&labels, &mut persisted, &mut host).run(&body).unwrap();
        assert_eq!(done, Completion::Returned(Value::Int(1)));
        assert_eq!(host.trace(), &["F".to_string()]);
    }

    #[test]
    fn division_by_zero_is_catchable() {
        let e = Variable::new("e", Ty::Any);
        let body = Node::try_catch(
            Node::binary(BinaryOperator::Div, Node::int(1), Node::int(0)),
            vec![Node::catch(Some(e), Node::int(-1))],
        );
        assert_eq!(run(&body).unwrap(), Completion::Normal(Value::Int(-1)));
    }
}
