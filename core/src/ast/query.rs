//! Read-only queries over node trees shared by the lowering passes and the
//! evaluator.

use std::collections::HashSet;

use super::kind::NodeKind;
use super::node::Node;

/// Whether a suspend point occurs anywhere beneath `node` (inclusive).
pub fn contains_await(node: &Node) -> bool {
    if matches!(node.kind, NodeKind::Await { .. }) {
        return true;
    }
    let mut found = false;
    node.kind.for_each_child(&mut |c| {
        if !found && contains_await(c) {
            found = true;
        }
    });
    found
}

/// Ids of every label defined beneath `node`, including the implicit
/// break/continue targets owned by loops.
pub fn labels_within(node: &Node) -> HashSet<usize> {
    let mut out = HashSet::new();
    collect_labels(node, &mut out);
    out
}

fn collect_labels(node: &Node, out: &mut HashSet<usize>) {
    match &node.kind {
        NodeKind::Label { target } => {
            out.insert(target.id);
        }
        NodeKind::Loop { break_label, continue_label, .. } => {
            if let Some(b) = break_label {
                out.insert(b.id);
            }
            if let Some(c) = continue_label {
                out.insert(c.id);
            }
        }
        _ => {}
    }
    node.kind.for_each_child(&mut |c| collect_labels(c, out));
}

/// Largest variable or label id referenced anywhere in the tree.
pub fn max_symbol_id(node: &Node) -> usize {
    let mut max = 0usize;
    walk(node, &mut |n| {
        let local = match &n.kind {
            NodeKind::Block { variables, .. } => variables.iter().map(|v| v.id).max().unwrap_or(0),
            NodeKind::Try { handlers, .. } => handlers
                .iter()
                .filter_map(|h| h.variable.as_ref().map(|v| v.id))
                .max()
                .unwrap_or(0),
            NodeKind::Loop { break_label, continue_label, .. } => {
                let b = break_label.as_ref().map(|l| l.id).unwrap_or(0);
                let c = continue_label.as_ref().map(|l| l.id).unwrap_or(0);
                b.max(c)
            }
            NodeKind::Label { target } | NodeKind::Goto { target } => target.id,
            NodeKind::Assign { target, .. } => target.id,
            NodeKind::Variable { variable } => variable.id,
            _ => 0,
        };
        max = max.max(local);
    });
    max
}

/// Pre-order walk over every node.
pub fn walk(node: &Node, f: &mut dyn FnMut(&Node)) {
    f(node);
    node.kind.for_each_child(&mut |c| walk(c, f));
}

/// Number of nodes in the tree matching `pred`.
pub fn count_nodes(node: &Node, pred: &dyn Fn(&NodeKind) -> bool) -> usize {
    let mut n = 0;
    walk(node, &mut |x| {
        if pred(&x.kind) {
            n += 1;
        }
    });
    n
}
