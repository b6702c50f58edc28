//! Static rejection rules, run once over the untouched input before any
//! rewriting happens.

use crate::ast::{Node, NodeKind};
use crate::error::{Level, LoweringError, LoweringErrorKind};

const ISSUER: &str = "resumable.lower.check";

#[derive(Debug, Default)]
struct Checker {
    filter_depth: usize,
    lock_depth: usize,
    catch_depth: usize,
    cleanup_depth: usize,
    allow_await_in_handlers: bool,
}

/// Reject bodies that cannot be lowered:
/// - a suspend point inside an exception filter,
/// - a suspend point inside a lock guard or lock body,
/// - a rethrow outside of every catch body,
/// - when handler reduction is off, a suspend point in any handler body.
pub fn check_body(body: &Node, allow_await_in_handlers: bool) -> Result<(), LoweringError> {
    let mut checker = Checker { allow_await_in_handlers, ..Checker::default() };
    checker.visit(body)
}

fn reject(kind: LoweringErrorKind, message: &str, node: &Node) -> LoweringError {
    log::warn!("rejecting node#{}: {}", node.get_id(), message);
    LoweringError::with(Level::Error, kind, message.to_string(), ISSUER.into(), Some(node.get_id()))
}

impl Checker {
    fn visit(&mut self, node: &Node) -> Result<(), LoweringError> {
        match &node.kind {
            NodeKind::Await { operand, .. } => {
                if self.filter_depth > 0 {
                    return Err(reject(
                        LoweringErrorKind::AwaitInFilter,
                        "Cannot suspend inside an exception filter",
                        node,
                    ));
                }
                if self.lock_depth > 0 {
                    return Err(reject(
                        LoweringErrorKind::AwaitInLock,
                        "Cannot suspend inside a lock statement",
                        node,
                    ));
                }
                if !self.allow_await_in_handlers && (self.catch_depth > 0 || self.cleanup_depth > 0) {
                    return Err(reject(
                        LoweringErrorKind::AwaitInHandler,
                        "Cannot suspend inside a handler body without handler reduction",
                        node,
                    ));
                }
                self.visit(operand)
            }
            NodeKind::Lock { guard, body } => {
                self.lock_depth += 1;
                let res = self.visit(guard).and_then(|_| self.visit(body));
                self.lock_depth -= 1;
                res
            }
            NodeKind::Try { body, handlers, finally, fault } => {
                self.visit(body)?;
                for h in handlers {
                    if let Some(filter) = &h.filter {
                        self.filter_depth += 1;
                        let res = self.visit(filter);
                        self.filter_depth -= 1;
                        res?;
                    }
                    self.catch_depth += 1;
                    let res = self.visit(&h.body);
                    self.catch_depth -= 1;
                    res?;
                }
                for cleanup in finally.iter().chain(fault.iter()) {
                    self.cleanup_depth += 1;
                    let res = self.visit(cleanup);
                    self.cleanup_depth -= 1;
                    res?;
                }
                Ok(())
            }
            NodeKind::Throw { value: None } if self.catch_depth == 0 => Err(reject(
                LoweringErrorKind::RethrowOutsideHandler,
                "Rethrow is only valid inside a catch body",
                node,
            )),
            kind => {
                let mut res = Ok(());
                kind.for_each_child(&mut |c| {
                    if res.is_ok() {
                        res = self.visit(c);
                    }
                });
                res
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Node, Ty, Variable};

    fn await_one() -> std::rc::Rc<Node> {
        Node::await_on(Node::call("ready", vec![Node::int(1)]), Ty::Int)
    }

    #[test]
    fn await_in_filter_is_rejected() {
        let e = Variable::new("e", Ty::Any);
        let body = Node::try_catch(
            Node::empty(),
            vec![Node::catch_when(Some(e), Node::binary(crate::ast::BinaryOperator::Eq, await_one(), Node::int(1)), Node::empty())],
        );
        let err = check_body(&body, true).unwrap_err();
        assert_eq!(err.kind(), LoweringErrorKind::AwaitInFilter);
    }

    #[test]
    fn await_in_lock_guard_and_body_is_rejected() {
        let in_guard = Node::lock(await_one(), Node::empty());
        let in_body = Node::lock(Node::int(0), Node::seq(vec![await_one()]));
        for body in [in_guard, in_body] {
            assert_eq!(check_body(&body, true).unwrap_err().kind(), LoweringErrorKind::AwaitInLock);
        }
    }

    #[test]
    fn await_in_finally_depends_on_handler_reduction() {
        let body = Node::try_finally(Node::empty(), Node::seq(vec![await_one()]));
        assert!(check_body(&body, true).is_ok());
        assert_eq!(check_body(&body, false).unwrap_err().kind(), LoweringErrorKind::AwaitInHandler);
    }

    #[test]
    fn rethrow_needs_enclosing_catch() {
        assert_eq!(check_body(&Node::rethrow(), true).unwrap_err().kind(), LoweringErrorKind::RethrowOutsideHandler);
        let ok = Node::try_catch(Node::empty(), vec![Node::catch(None, Node::rethrow())]);
        assert!(check_body(&ok, true).is_ok());
    }
}
