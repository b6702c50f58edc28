//! file: core/src/ast/kind.rs
//! description: node kind definitions and operator enums.
//!
//! Defines `NodeKind` along with `BinaryOperator`, `UnaryOperator` and the
//! awaiter protocol steps. These enums are consumed by every lowering pass
//! and by the evaluator, so matches over them stay exhaustive.
//!
use serde::{Deserialize, Serialize};

use super::node::NodeRef;
use super::symbol::{LabelTarget, Literal, Ty, Variable};

/// Represents binary operators in the AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Eq,  // ==
    Ne,  // !=
    Lt,  // <
    Le,  // <=
    Gt,  // >
    Ge,  // >=
    Add, // +
    Sub, // -
    Mul, // *
    Div, // /
    Mod, // %
    And, // &&, both sides evaluated
    Or,  // ||, both sides evaluated
}

/// Represents unary operators in the AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Minus, // -
    Not,   // !
}

/// One step of the awaiter protocol used to observe an awaitable producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwaitStep {
    /// Acquire an awaiter handle from the producer value.
    Acquire,
    /// Ask the awaiter whether the operation already completed.
    IsCompleted,
    /// Extract the outcome; raises the producer's failure if it failed.
    GetResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchBlock {
    /// Variable bound to the caught exception while the filter and body run.
    pub variable: Option<Variable>,
    pub filter: Option<NodeRef>,
    pub body: NodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub tests: Vec<i64>,
    pub body: NodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeKind {
    Block {
        #[serde(default)]
        variables: Vec<Variable>,
        statements: Vec<NodeRef>,
    },
    /// A suspend point over an awaitable producer expression.
    Await {
        operand: NodeRef,
        /// Host operation replacing the default acquire step.
        #[serde(default)]
        acquire: Option<String>,
        #[serde(default)]
        result: Ty,
    },
    Awaiter {
        step: AwaitStep,
        operand: NodeRef,
    },
    Try {
        body: NodeRef,
        #[serde(default)]
        handlers: Vec<CatchBlock>,
        #[serde(default)]
        finally: Option<NodeRef>,
        #[serde(default)]
        fault: Option<NodeRef>,
    },
    Loop {
        body: NodeRef,
        #[serde(default)]
        break_label: Option<LabelTarget>,
        #[serde(default)]
        continue_label: Option<LabelTarget>,
    },
    Label {
        target: LabelTarget,
    },
    Goto {
        target: LabelTarget,
    },
    Switch {
        value: NodeRef,
        cases: Vec<SwitchCase>,
        #[serde(default)]
        default: Option<NodeRef>,
    },
    Condition {
        test: NodeRef,
        then: NodeRef,
        #[serde(default)]
        otherwise: Option<NodeRef>,
    },
    /// Mutual-exclusion region; the guard is held for the whole body.
    Lock {
        guard: NodeRef,
        body: NodeRef,
    },
    Return {
        #[serde(default)]
        value: Option<NodeRef>,
    },
    /// Raise `value`, or rethrow the exception being handled when `None`.
    Throw {
        #[serde(default)]
        value: Option<NodeRef>,
    },
    Assign {
        target: Variable,
        value: NodeRef,
    },
    Binary {
        op: BinaryOperator,
        left: NodeRef,
        right: NodeRef,
    },
    Unary {
        op: UnaryOperator,
        operand: NodeRef,
    },
    /// Opaque host operation; lowering passes only rebuild its arguments.
    Call {
        callee: String,
        #[serde(default)]
        args: Vec<NodeRef>,
    },
    Variable {
        variable: Variable,
    },
    Constant {
        value: Literal,
    },
    Default {
        ty: Ty,
    },
}

impl NodeKind {
    pub fn is_block(&self) -> bool {
        matches!(self, NodeKind::Block { .. })
    }

    /// Visit the direct children in evaluation order.
    pub fn for_each_child<'a>(&'a self, f: &mut dyn FnMut(&'a NodeRef)) {
        match self {
            NodeKind::Block { statements, .. } => statements.iter().for_each(|s| f(s)),
            NodeKind::Await { operand, .. } | NodeKind::Awaiter { operand, .. } => f(operand),
            NodeKind::Try { body, handlers, finally, fault } => {
                f(body);
                for h in handlers {
                    if let Some(filter) = &h.filter {
                        f(filter);
                    }
                    f(&h.body);
                }
                if let Some(n) = finally {
                    f(n);
                }
                if let Some(n) = fault {
                    f(n);
                }
            }
            NodeKind::Loop { body, .. } => f(body),
            NodeKind::Switch { value, cases, default } => {
                f(value);
                for c in cases {
                    f(&c.body);
                }
                if let Some(d) = default {
                    f(d);
                }
            }
            NodeKind::Condition { test, then, otherwise } => {
                f(test);
                f(then);
                if let Some(o) = otherwise {
                    f(o);
                }
            }
            NodeKind::Lock { guard, body } => {
                f(guard);
                f(body);
            }
            NodeKind::Return { value } | NodeKind::Throw { value } => {
                if let Some(v) = value {
                    f(v);
                }
            }
            NodeKind::Assign { value, .. } => f(value),
            NodeKind::Binary { left, right, .. } => {
                f(left);
                f(right);
            }
            NodeKind::Unary { operand, .. } => f(operand),
            NodeKind::Call { args, .. } => args.iter().for_each(|a| f(a)),
            NodeKind::Label { .. }
            | NodeKind::Goto { .. }
            | NodeKind::Variable { .. }
            | NodeKind::Constant { .. }
            | NodeKind::Default { .. } => {}
        }
    }

    /// Rebuild this kind with every direct child replaced by `f(child)`,
    /// visiting children in the same order as `for_each_child`.
    pub fn try_map_children<E>(
        &self,
        f: &mut dyn FnMut(&NodeRef) -> Result<NodeRef, E>,
    ) -> Result<NodeKind, E> {
        let kind = match self {
            NodeKind::Block { variables, statements } => NodeKind::Block {
                variables: variables.clone(),
                statements: statements.iter().map(|s| f(s)).collect::<Result<_, _>>()?,
            },
            NodeKind::Await { operand, acquire, result } => NodeKind::Await {
                operand: f(operand)?,
                acquire: acquire.clone(),
                result: *result,
            },
            NodeKind::Awaiter { step, operand } => NodeKind::Awaiter { step: *step, operand: f(operand)? },
            NodeKind::Try { body, handlers, finally, fault } => {
                let body = f(body)?;
                let mut new_handlers = Vec::with_capacity(handlers.len());
                for h in handlers {
                    let filter = match &h.filter {
                        Some(filter) => Some(f(filter)?),
                        None => None,
                    };
                    new_handlers.push(CatchBlock { variable: h.variable.clone(), filter, body: f(&h.body)? });
                }
                let finally = match finally {
                    Some(n) => Some(f(n)?),
                    None => None,
                };
                let fault = match fault {
                    Some(n) => Some(f(n)?),
                    None => None,
                };
                NodeKind::Try { body, handlers: new_handlers, finally, fault }
            }
            NodeKind::Loop { body, break_label, continue_label } => NodeKind::Loop {
                body: f(body)?,
                break_label: break_label.clone(),
                continue_label: continue_label.clone(),
            },
            NodeKind::Switch { value, cases, default } => {
                let value = f(value)?;
                let mut new_cases = Vec::with_capacity(cases.len());
                for c in cases {
                    new_cases.push(SwitchCase { tests: c.tests.clone(), body: f(&c.body)? });
                }
                let default = match default {
                    Some(d) => Some(f(d)?),
                    None => None,
                };
                NodeKind::Switch { value, cases: new_cases, default }
            }
            NodeKind::Condition { test, then, otherwise } => {
                let test = f(test)?;
                let then = f(then)?;
                let otherwise = match otherwise {
                    Some(o) => Some(f(o)?),
                    None => None,
                };
                NodeKind::Condition { test, then, otherwise }
            }
            NodeKind::Lock { guard, body } => {
                let guard = f(guard)?;
                NodeKind::Lock { guard, body: f(body)? }
            }
            NodeKind::Return { value } => NodeKind::Return {
                value: match value {
                    Some(v) => Some(f(v)?),
                    None => None,
                },
            },
            NodeKind::Throw { value } => NodeKind::Throw {
                value: match value {
                    Some(v) => Some(f(v)?),
                    None => None,
                },
            },
            NodeKind::Assign { target, value } => NodeKind::Assign { target: target.clone(), value: f(value)? },
            NodeKind::Binary { op, left, right } => {
                let left = f(left)?;
                NodeKind::Binary { op: *op, left, right: f(right)? }
            }
            NodeKind::Unary { op, operand } => NodeKind::Unary { op: *op, operand: f(operand)? },
            NodeKind::Call { callee, args } => NodeKind::Call {
                callee: callee.clone(),
                args: args.iter().map(|a| f(a)).collect::<Result<_, _>>()?,
            },
            NodeKind::Label { .. }
            | NodeKind::Goto { .. }
            | NodeKind::Variable { .. }
            | NodeKind::Constant { .. }
            | NodeKind::Default { .. } => self.clone(),
        };
        Ok(kind)
    }

    /// Infallible variant of `try_map_children`.
    pub fn map_children(&self, f: &mut dyn FnMut(&NodeRef) -> NodeRef) -> NodeKind {
        let mapped: Result<NodeKind, std::convert::Infallible> = self.try_map_children(&mut |c| Ok(f(c)));
        match mapped {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

use std::fmt;

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Block { .. } => write!(f, "Block"),
            NodeKind::Await { .. } => write!(f, "Await"),
            NodeKind::Awaiter { .. } => write!(f, "Awaiter"),
            NodeKind::Try { .. } => write!(f, "Try"),
            NodeKind::Loop { .. } => write!(f, "Loop"),
            NodeKind::Label { .. } => write!(f, "Label"),
            NodeKind::Goto { .. } => write!(f, "Goto"),
            NodeKind::Switch { .. } => write!(f, "Switch"),
            NodeKind::Condition { .. } => write!(f, "Condition"),
            NodeKind::Lock { .. } => write!(f, "Lock"),
            NodeKind::Return { .. } => write!(f, "Return"),
            NodeKind::Throw { .. } => write!(f, "Throw"),
            NodeKind::Assign { .. } => write!(f, "Assign"),
            NodeKind::Binary { .. } => write!(f, "Binary"),
            NodeKind::Unary { .. } => write!(f, "Unary"),
            NodeKind::Call { .. } => write!(f, "Call"),
            NodeKind::Variable { .. } => write!(f, "Variable"),
            NodeKind::Constant { .. } => write!(f, "Constant"),
            NodeKind::Default { .. } => write!(f, "Default"),
        }
    }
}
