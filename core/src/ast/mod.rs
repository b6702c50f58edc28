//! file: core/src/ast/mod.rs
//! description: the tagged-variant tree consumed and produced by lowering.
//!
//! Nodes are immutable once built and shared through `NodeRef`. The
//! helpers here load and store trees as JSON so bodies can be authored
//! outside of Rust (see the CLI).
//!
pub mod display;
pub mod ids;
pub mod kind;
pub mod node;
pub mod query;
pub mod symbol;

pub use ids::NodeId;
pub use kind::{AwaitStep, BinaryOperator, CatchBlock, NodeKind, SwitchCase, UnaryOperator};
pub use node::{Node, NodeRef};
pub use symbol::{LabelTarget, Literal, Ty, Variable};

use std::path::Path;
use std::rc::Rc;

use crate::error::{Level, LoweringError, LoweringErrorKind};

/// Parse a JSON body and reserve its symbol ids so variables created by
/// later passes never collide with the loaded ones.
pub fn from_json(text: &str) -> Result<NodeRef, LoweringError> {
    let node: Node = serde_json::from_str(text).map_err(|e| {
        LoweringError::with(
            Level::Error,
            LoweringErrorKind::Malformed,
            format!("Invalid body JSON: {}", e),
            "resumable.ast.from_json".into(),
            None,
        )
    })?;
    ids::reserve_above(query::max_symbol_id(&node));
    Ok(Rc::new(node))
}

pub fn load_json_file(path: &Path) -> Result<NodeRef, LoweringError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        LoweringError::with(
            Level::Error,
            LoweringErrorKind::Malformed,
            format!("Cannot read {}: {}", path.display(), e),
            "resumable.ast.load_json_file".into(),
            None,
        )
    })?;
    from_json(&text)
}

pub fn to_json(node: &Node) -> String {
    // Serializing plain data with string keys cannot fail.
    serde_json::to_string_pretty(node).unwrap_or_default()
}
