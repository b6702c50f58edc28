//! Operand spilling.
//!
//! Resuming jumps to a label inside the suspend point's expansion. When
//! that expansion sits in a later operand of a binary operator or call,
//! the operands evaluated before it would be lost. This pass stores each
//! such earlier operand in a temporary declared by a new enclosing block,
//! so the scope tracker hoists it like any other local. Constants and
//! defaults are left in place.

use crate::ast::{Node, NodeKind, NodeRef, Ty, Variable};
use crate::ast::query::contains_await;
use crate::error::LoweringError;

pub fn spill_operands(node: &NodeRef) -> Result<NodeRef, LoweringError> {
    let kind = node.kind.try_map_children(&mut |c| spill_operands(c))?;
    let spilled = match kind {
        NodeKind::Binary { op, left, right } if contains_await(&right) && needs_spill(&left) => {
            let temp = Variable::new("__spill", Ty::Any);
            log::debug!("spilling left operand of node#{} into {}", node.get_id(), temp);
            Node::block(
                vec![temp.clone()],
                vec![Node::assign(&temp, left), Node::binary(op, Node::var(&temp), right)],
            )
        }
        NodeKind::Call { callee, args } => spill_call(&callee, args),
        kind => Node::rebuild(kind),
    };
    Ok(spilled)
}

/// Operands whose evaluation can be repeated on resume. A variable read
/// counts once spilling has run, since every variable left in front of a
/// suspend point is then a spill temporary.
pub fn is_stable_operand(node: &Node) -> bool {
    matches!(node.kind, NodeKind::Constant { .. } | NodeKind::Default { .. } | NodeKind::Variable { .. })
}

fn needs_spill(node: &Node) -> bool {
    !matches!(node.kind, NodeKind::Constant { .. } | NodeKind::Default { .. })
}

fn spill_call(callee: &str, args: Vec<NodeRef>) -> NodeRef {
    let last_await = args.iter().rposition(|a| contains_await(a));
    let Some(last) = last_await else {
        return Node::call(callee, args);
    };

    let mut temps = Vec::new();
    let mut prelude = Vec::new();
    let mut new_args = Vec::with_capacity(args.len());
    for (i, arg) in args.into_iter().enumerate() {
        if i < last && needs_spill(&arg) {
            let temp = Variable::new("__spill", Ty::Any);
            prelude.push(Node::assign(&temp, arg));
            new_args.push(Node::var(&temp));
            temps.push(temp);
        } else {
            new_args.push(arg);
        }
    }

    if temps.is_empty() {
        return Node::call(callee, new_args);
    }
    log::debug!("spilling {} argument(s) of call to {}", temps.len(), callee);
    prelude.push(Node::call(callee, new_args));
    Node::block(temps, prelude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOperator;
    use crate::ast::query::count_nodes;

    fn awaited(v: i64) -> NodeRef {
        Node::await_on(Node::call("ready", vec![Node::int(v)]), Ty::Int)
    }

    #[test]
    fn left_operand_before_await_is_spilled() {
        let expr = Node::binary(BinaryOperator::Add, awaited(1), awaited(2));
        let out = spill_operands(&expr).unwrap();
        match &out.kind {
            NodeKind::Block { variables, statements } => {
                assert_eq!(variables.len(), 1);
                assert_eq!(statements.len(), 2);
            }
            other => panic!("expected a block, got {}", other),
        }
    }

    #[test]
    fn constants_are_not_spilled() {
        let expr = Node::binary(BinaryOperator::Add, Node::int(1), awaited(2));
        let out = spill_operands(&expr).unwrap();
        assert!(matches!(out.kind, NodeKind::Binary { .. }));
    }

    #[test]
    fn only_arguments_before_the_last_await_are_spilled() {
        let call = Node::call(
            "sum",
            vec![Node::call("f", vec![]), awaited(1), Node::call("g", vec![]), awaited(2), Node::call("h", vec![])],
        );
        let out = spill_operands(&call).unwrap();
        let NodeKind::Block { variables, .. } = &out.kind else {
            panic!("expected a block");
        };
        // f, the first await and g precede the last await
        assert_eq!(variables.len(), 3);
        assert_eq!(count_nodes(&out, &|k| matches!(k, NodeKind::Await { .. })), 2);
    }
}
