//! Process-wide id counters for nodes and symbols.
//!
//! Node ids identify one constructed node; rebuilding a node always takes a
//! new id. Symbol ids are shared by variables and labels so a loaded tree
//! can reserve its whole id range with one call.

use std::sync::atomic::{AtomicUsize, Ordering};

static NODE_COUNTER: AtomicUsize = AtomicUsize::new(1);
static SYMBOL_COUNTER: AtomicUsize = AtomicUsize::new(1);

pub type NodeId = usize;

pub fn fresh_node_id() -> NodeId {
    NODE_COUNTER.fetch_add(1, Ordering::Relaxed)
}

pub fn fresh_symbol_id() -> usize {
    SYMBOL_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Make sure symbols created from now on get ids strictly above `max_id`.
pub fn reserve_above(max_id: usize) {
    SYMBOL_COUNTER.fetch_max(max_id.saturating_add(1), Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_above_skips_loaded_ids() {
        reserve_above(10_000);
        assert!(fresh_symbol_id() > 10_000);
    }
}
