//! Per-node label sets, computed once per lowered body so the evaluator can
//! tell in constant time which child a jump has to descend into.

use std::collections::{HashMap, HashSet};

use crate::ast::{Node, NodeId, NodeKind};

#[derive(Debug, Default)]
pub struct LabelIndex {
    within: HashMap<NodeId, HashSet<usize>>,
}

impl LabelIndex {
    pub fn build(root: &Node) -> Self {
        let mut index = LabelIndex::default();
        index.collect(root);
        index
    }

    fn collect(&mut self, node: &Node) -> HashSet<usize> {
        let mut set = HashSet::new();
        match &node.kind {
            NodeKind::Label { target } => {
                set.insert(target.id);
            }
            NodeKind::Loop { break_label, continue_label, .. } => {
                set.extend(break_label.iter().chain(continue_label.iter()).map(|l| l.id));
            }
            _ => {}
        }
        node.kind.for_each_child(&mut |c| {
            let child = self.collect(c);
            set.extend(child);
        });
        if !set.is_empty() {
            self.within.insert(node.get_id(), set.clone());
        }
        set
    }

    /// Whether `label` is defined at or beneath `node`.
    pub fn contains(&self, node: &Node, label: usize) -> bool {
        self.within.get(&node.get_id()).is_some_and(|s| s.contains(&label))
    }
}
