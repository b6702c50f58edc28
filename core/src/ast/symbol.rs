//! file: core/src/ast/symbol.rs
//! description: variables, label targets, types and literal constants.
//!
//! Variables and labels are compared by id only; the name is a display hint
//! and two distinct symbols may share it. Ids come from `ids::fresh_symbol_id`.
//!
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use super::ids;

/// Static type of a variable or of a suspend point's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ty {
    #[default]
    Unit,
    Int,
    Bool,
    Str,
    Any,
}

impl Ty {
    /// The value a freshly declared variable of this type starts with.
    pub fn default_literal(&self) -> Literal {
        match self {
            Ty::Unit => Literal::Unit,
            Ty::Int => Literal::Int(0),
            Ty::Bool => Literal::Bool(false),
            Ty::Str => Literal::Str(String::new()),
            Ty::Any => Literal::Null,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Ty::Unit)
    }
}

impl std::fmt::Display for Ty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Ty::Unit => "unit",
            Ty::Int => "int",
            Ty::Bool => "bool",
            Ty::Str => "str",
            Ty::Any => "any",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Null,
    Unit,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Unit => write!(f, "()"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Str(s) => write!(f, "{:?}", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub id: usize,
    pub name: String,
    #[serde(default)]
    pub ty: Ty,
}

impl Variable {
    pub fn new(name: &str, ty: Ty) -> Self {
        Variable { id: ids::fresh_symbol_id(), name: name.to_string(), ty }
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelTarget {
    pub id: usize,
    pub name: String,
}

impl LabelTarget {
    pub fn new(name: &str) -> Self {
        LabelTarget { id: ids::fresh_symbol_id(), name: name.to_string() }
    }
}

impl PartialEq for LabelTarget {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LabelTarget {}

impl Hash for LabelTarget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for LabelTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}
