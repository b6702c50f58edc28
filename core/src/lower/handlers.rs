//! Handler reduction.
//!
//! Suspend points may only be lowered where re-entry can reach them by a
//! plain jump, which excludes catch, finally and fault bodies (the
//! exception being handled would be gone on resume). This pass moves such
//! handler bodies out of the protected region:
//!
//! - a catch body runs after the region, selected by the index of the
//!   clause that caught;
//! - a finally body runs after the region, followed by a rethrow of the
//!   captured exception and a dispatch on the pending branch that left
//!   the region;
//! - a fault body runs after the region only when an exception was caught.
//!
//! Regions whose handlers do not suspend are left untouched.

use std::collections::HashSet;

use crate::ast::query::{contains_await, labels_within};
use crate::ast::{CatchBlock, LabelTarget, Node, NodeKind, NodeRef, Ty, Variable};
use crate::error::LoweringError;

pub fn reduce_handlers(node: &NodeRef) -> Result<NodeRef, LoweringError> {
    let kind = node.kind.try_map_children(&mut |c| reduce_handlers(c))?;
    let (body, handlers, finally, fault) = match kind {
        NodeKind::Try { body, handlers, finally, fault } => (body, handlers, finally, fault),
        other => return Ok(Node::rebuild(other)),
    };

    let catch_suspends = handlers.iter().any(|h| contains_await(&h.body));
    let finally_suspends = finally.as_ref().is_some_and(|f| contains_await(f));
    let fault_suspends = fault.as_ref().is_some_and(|f| contains_await(f));
    if !(catch_suspends || finally_suspends || fault_suspends) {
        return Ok(Node::try_region(body, handlers, finally, fault));
    }
    log::debug!("reducing handlers of try node#{}", node.get_id());

    // try/catch/finally behaves as a try/finally around a try/catch.
    let mut current = body;
    if !handlers.is_empty() {
        current = if catch_suspends { reduce_catch(current, handlers) } else { Node::try_catch(current, handlers) };
    }
    if let Some(f) = finally {
        current = if finally_suspends { reduce_finally(current, f) } else { Node::try_finally(current, f) };
    }
    if let Some(f) = fault {
        current = if fault_suspends { reduce_fault(current, f) } else { Node::try_fault(current, f) };
    }
    Ok(current)
}

/// Variables shared by every reduced region.
struct Captured {
    ex: Variable,
    caught: Variable,
    value: Variable,
}

impl Captured {
    fn new() -> Self {
        Captured {
            ex: Variable::new("__ex", Ty::Any),
            caught: Variable::new("__caught", Ty::Bool),
            value: Variable::new("__tryValue", Ty::Any),
        }
    }

    /// `catch (c) { ex = c; caught = true }`
    fn catch_all(&self) -> CatchBlock {
        let c = Variable::new("__e", Ty::Any);
        Node::catch(
            Some(c.clone()),
            Node::seq(vec![Node::assign(&self.ex, Node::var(&c)), Node::assign(&self.caught, Node::bool(true))]),
        )
    }
}

fn reduce_catch(body: NodeRef, handlers: Vec<CatchBlock>) -> NodeRef {
    let cap = Captured::new();
    let which = Variable::new("__catchIndex", Ty::Int);
    let mut declared = vec![cap.ex.clone(), which.clone(), cap.value.clone()];

    let mut clauses = Vec::with_capacity(handlers.len());
    let mut cases = Vec::with_capacity(handlers.len());
    for (i, h) in handlers.into_iter().enumerate() {
        let index = i as i64;
        let bound = match h.variable {
            Some(v) => v,
            None => Variable::new("__e", Ty::Any),
        };
        declared.push(bound.clone());

        clauses.push(CatchBlock {
            variable: Some(bound.clone()),
            filter: h.filter,
            body: Node::seq(vec![Node::assign(&cap.ex, Node::var(&bound)), Node::assign(&which, Node::int(index))]),
        });
        let moved = rethrow_as(&h.body, &cap.ex);
        cases.push(Node::case(
            vec![index],
            Node::seq(vec![Node::assign(&bound, Node::var(&cap.ex)), Node::assign(&cap.value, moved)]),
        ));
    }

    Node::block(
        declared,
        vec![
            Node::assign(&which, Node::int(-1)),
            Node::try_catch(Node::assign(&cap.value, body), clauses),
            Node::switch(Node::var(&which), cases, None),
            Node::var(&cap.value),
        ],
    )
}

fn reduce_fault(body: NodeRef, fault: NodeRef) -> NodeRef {
    let cap = Captured::new();
    Node::block(
        vec![cap.ex.clone(), cap.caught.clone(), cap.value.clone()],
        vec![
            Node::assign(&cap.caught, Node::bool(false)),
            Node::try_catch(Node::assign(&cap.value, body), vec![cap.catch_all()]),
            Node::if_then(Node::var(&cap.caught), Node::seq(vec![fault, Node::throw(Node::var(&cap.ex))])),
            Node::var(&cap.value),
        ],
    )
}

/// A branch that left the protected body and resumes after the finally.
enum Pending {
    Jump(LabelTarget),
    Return,
}

struct BranchCollector {
    own: HashSet<usize>,
    leave: LabelTarget,
    pending: Variable,
    retval: Variable,
    branches: Vec<Pending>,
}

impl BranchCollector {
    fn index_of_jump(&mut self, target: &LabelTarget) -> i64 {
        let pos = self.branches.iter().position(|b| matches!(b, Pending::Jump(t) if t == target));
        let pos = pos.unwrap_or_else(|| {
            self.branches.push(Pending::Jump(target.clone()));
            self.branches.len() - 1
        });
        pos as i64 + 1
    }

    fn index_of_return(&mut self) -> i64 {
        let pos = self.branches.iter().position(|b| matches!(b, Pending::Return));
        let pos = pos.unwrap_or_else(|| {
            self.branches.push(Pending::Return);
            self.branches.len() - 1
        });
        pos as i64 + 1
    }

    fn rewrite(&mut self, node: &NodeRef) -> NodeRef {
        match &node.kind {
            NodeKind::Goto { target } if !self.own.contains(&target.id) => {
                let k = self.index_of_jump(target);
                Node::seq(vec![Node::assign(&self.pending, Node::int(k)), Node::goto(&self.leave)])
            }
            NodeKind::Return { value } => {
                let value = match value {
                    Some(v) => self.rewrite(v),
                    None => Node::empty(),
                };
                let k = self.index_of_return();
                Node::seq(vec![
                    Node::assign(&self.retval, value),
                    Node::assign(&self.pending, Node::int(k)),
                    Node::goto(&self.leave),
                ])
            }
            kind => Node::rebuild(kind.map_children(&mut |c| self.rewrite(c))),
        }
    }
}

fn reduce_finally(body: NodeRef, finally: NodeRef) -> NodeRef {
    let cap = Captured::new();
    let mut collector = BranchCollector {
        own: labels_within(&body),
        leave: LabelTarget::new("__leave"),
        pending: Variable::new("__pending", Ty::Int),
        retval: Variable::new("__retval", Ty::Any),
        branches: Vec::new(),
    };
    let body = collector.rewrite(&body);

    let protected = if collector.branches.is_empty() {
        Node::assign(&cap.value, body)
    } else {
        Node::seq(vec![Node::assign(&cap.value, body), Node::label(&collector.leave)])
    };

    let mut statements = vec![
        Node::assign(&cap.caught, Node::bool(false)),
        Node::assign(&collector.pending, Node::int(0)),
        Node::try_catch(protected, vec![cap.catch_all()]),
        finally,
        Node::if_then(Node::var(&cap.caught), Node::throw(Node::var(&cap.ex))),
    ];

    if !collector.branches.is_empty() {
        let cases = collector
            .branches
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let resume = match b {
                    Pending::Jump(target) => Node::goto(target),
                    Pending::Return => Node::ret(Node::var(&collector.retval)),
                };
                Node::case(vec![i as i64 + 1], resume)
            })
            .collect();
        log::debug!("finally re-dispatches {} pending branch(es)", collector.branches.len());
        statements.push(Node::switch(Node::var(&collector.pending), cases, None));
    }
    statements.push(Node::var(&cap.value));

    Node::block(
        vec![cap.ex, cap.caught, cap.value, collector.pending, collector.retval],
        statements,
    )
}

/// Replace bare rethrows that refer to the moved handler's exception.
/// Nested catch bodies and filters keep their own rethrow meaning.
fn rethrow_as(node: &NodeRef, ex: &Variable) -> NodeRef {
    match &node.kind {
        NodeKind::Throw { value: None } => Node::throw(Node::var(ex)),
        NodeKind::Try { body, handlers, finally, fault } => Node::try_region(
            rethrow_as(body, ex),
            handlers.clone(),
            finally.as_ref().map(|f| rethrow_as(f, ex)),
            fault.as_ref().map(|f| rethrow_as(f, ex)),
        ),
        kind => Node::rebuild(kind.map_children(&mut |c| rethrow_as(c, ex))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::query::count_nodes;

    fn awaited() -> NodeRef {
        Node::await_on(Node::call("yield", vec![]), Ty::Unit)
    }

    fn await_in_handler(node: &Node) -> bool {
        let mut found = false;
        crate::ast::query::walk(node, &mut |n| {
            if let NodeKind::Try { handlers, finally, fault, .. } = &n.kind {
                found |= handlers.iter().any(|h| contains_await(&h.body));
                found |= finally.as_ref().is_some_and(|f| contains_await(f));
                found |= fault.as_ref().is_some_and(|f| contains_await(f));
            }
        });
        found
    }

    #[test]
    fn untouched_without_suspending_handlers() {
        let body = Node::try_finally(Node::seq(vec![awaited()]), Node::call("trace", vec![Node::str("F")]));
        let out = reduce_handlers(&body).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn suspending_finally_moves_out_of_region() {
        let body = Node::try_finally(Node::int(1), Node::seq(vec![awaited()]));
        let out = reduce_handlers(&body).unwrap();
        assert!(!await_in_handler(&out));
        assert_eq!(count_nodes(&out, &|k| matches!(k, NodeKind::Await { .. })), 1);
    }

    #[test]
    fn escaping_goto_becomes_pending_branch() {
        let target = LabelTarget::new("after");
        let body = Node::seq(vec![
            Node::try_finally(Node::seq(vec![Node::goto(&target)]), Node::seq(vec![awaited()])),
            Node::label(&target),
        ]);
        let out = reduce_handlers(&body).unwrap();
        // the goto now lives only in the dispatch after the finally
        let gotos = count_nodes(&out, &|k| matches!(k, NodeKind::Goto { target: t } if t == &target));
        assert_eq!(gotos, 1);
        assert_eq!(count_nodes(&out, &|k| matches!(k, NodeKind::Switch { .. })), 1);
    }

    #[test]
    fn rethrow_in_moved_catch_throws_captured_exception() {
        let body = Node::try_catch(Node::int(1), vec![Node::catch(None, Node::seq(vec![awaited(), Node::rethrow()]))]);
        let out = reduce_handlers(&body).unwrap();
        assert!(!await_in_handler(&out));
        assert_eq!(count_nodes(&out, &|k| matches!(k, NodeKind::Throw { value: None })), 0);
    }
}
