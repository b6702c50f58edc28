use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::{Literal, Ty};

pub type FutureRef = Rc<RefCell<FutureCell>>;

/// An awaitable producer driven by the host. It reports incomplete until it
/// has been advanced `pending_polls` times, then yields `outcome`.
#[derive(Debug)]
pub struct FutureCell {
    pending_polls: u32,
    outcome: Result<Value, Value>,
}

impl FutureCell {
    pub fn ready(value: Value) -> FutureRef {
        Self::pending(value, 0)
    }

    pub fn pending(value: Value, polls: u32) -> FutureRef {
        Rc::new(RefCell::new(FutureCell { pending_polls: polls, outcome: Ok(value) }))
    }

    pub fn failed(error: Value, polls: u32) -> FutureRef {
        Rc::new(RefCell::new(FutureCell { pending_polls: polls, outcome: Err(error) }))
    }

    pub fn is_completed(&self) -> bool {
        self.pending_polls == 0
    }

    /// Move one step closer to completion.
    pub fn advance(&mut self) {
        self.pending_polls = self.pending_polls.saturating_sub(1);
    }

    pub fn outcome(&self) -> Option<Result<Value, Value>> {
        if self.is_completed() { Some(self.outcome.clone()) } else { None }
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Unit,
    Null,
    Int(i64),
    Bool(bool),
    Str(String),
    /// An exception payload.
    Error(String),
    Future(FutureRef),
}

impl Value {
    pub fn default_of(ty: Ty) -> Value {
        Value::from(&ty.default_literal())
    }

    pub(crate) fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Null | Value::Unit => Some(false),
            _ => None,
        }
    }

    pub(crate) fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::Error(_) => "error",
            Value::Future(_) => "future",
        }
    }
}

impl From<&Literal> for Value {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Null => Value::Null,
            Literal::Unit => Value::Unit,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) | (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Future(a), Value::Future(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Null => write!(f, "null"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Error(m) => write!(f, "error({})", m),
            Value::Future(c) => {
                let cell = c.borrow();
                if cell.is_completed() { write!(f, "<future completed>") } else { write!(f, "<future pending>") }
            }
        }
    }
}
