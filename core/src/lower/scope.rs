//! Scope tracker: one "contains a suspend point" flag per open block, and
//! the set of block variables promoted to storage that survives re-entry.
//!
//! Hoisting is deliberately coarse. When a block contains a suspend point
//! anywhere beneath it, every variable the block declares is hoisted, even
//! ones whose live range never crosses the suspend point.

use indexmap::IndexSet;

use crate::ast::{NodeId, Variable};
use crate::error::{Level, LoweringError, LoweringErrorKind};

#[derive(Debug, Default)]
pub struct ScopeTracker {
    await_in_block: Vec<bool>,
    hoisted: IndexSet<Variable>,
}

impl ScopeTracker {
    pub fn new() -> Self {
        ScopeTracker::default()
    }

    pub fn enter_block(&mut self) {
        self.await_in_block.push(false);
    }

    /// Record a suspend point in the innermost open block.
    pub fn mark_suspend(&mut self) {
        if let Some(top) = self.await_in_block.last_mut() {
            *top = true;
        }
    }

    /// Close the innermost block. Returns `true` when the block's
    /// declarations were hoisted and must be dropped from the rebuilt block.
    pub fn exit_block(&mut self, declared: &[Variable], block: NodeId) -> Result<bool, LoweringError> {
        let suspends = self.await_in_block.pop().unwrap_or(false);
        if !suspends {
            return Ok(false);
        }

        for v in declared {
            if !self.hoisted.insert(v.clone()) {
                // Shadowing should have been eliminated upstream; a second
                // declaration of the same variable means the input is corrupt.
                log::error!("variable {} declared by more than one suspending block", v);
                return Err(LoweringError::with(
                    Level::Critical,
                    LoweringErrorKind::DuplicateHoist,
                    format!("Variable {} is already hoisted", v),
                    "resumable.lower.scope".into(),
                    Some(block),
                ));
            }
            log::debug!("hoisting {} out of block node#{}", v, block);
        }

        self.mark_suspend();
        Ok(!declared.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.await_in_block.len()
    }

    pub fn hoisted(&self) -> &IndexSet<Variable> {
        &self.hoisted
    }

    pub fn into_hoisted(self) -> IndexSet<Variable> {
        self.hoisted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Ty;

    #[test]
    fn block_without_suspend_keeps_locals() {
        let mut scopes = ScopeTracker::new();
        let x = Variable::new("x", Ty::Int);
        scopes.enter_block();
        assert!(!scopes.exit_block(&[x], 1).unwrap());
        assert!(scopes.hoisted().is_empty());
    }

    #[test]
    fn suspend_propagates_to_parent_block() {
        let mut scopes = ScopeTracker::new();
        let outer = Variable::new("outer", Ty::Int);
        let inner = Variable::new("inner", Ty::Int);
        scopes.enter_block();
        scopes.enter_block();
        scopes.mark_suspend();
        assert!(scopes.exit_block(&[inner.clone()], 2).unwrap());
        assert!(scopes.exit_block(&[outer.clone()], 1).unwrap());
        let hoisted: Vec<&Variable> = scopes.hoisted().iter().collect();
        assert_eq!(hoisted, vec![&inner, &outer]);
        assert_eq!(scopes.depth(), 0);
    }

    #[test]
    fn suspend_without_declarations_still_propagates() {
        let mut scopes = ScopeTracker::new();
        let outer = Variable::new("outer", Ty::Int);
        scopes.enter_block();
        scopes.enter_block();
        scopes.mark_suspend();
        assert!(!scopes.exit_block(&[], 2).unwrap());
        assert!(scopes.exit_block(&[outer], 1).unwrap());
    }

    #[test]
    fn second_hoist_of_same_variable_is_critical() {
        let mut scopes = ScopeTracker::new();
        let x = Variable::new("x", Ty::Int);
        for expect_ok in [true, false] {
            scopes.enter_block();
            scopes.mark_suspend();
            let res = scopes.exit_block(&[x.clone()], 7);
            assert_eq!(res.is_ok(), expect_ok);
            if let Err(e) = res {
                assert_eq!(e.kind(), LoweringErrorKind::DuplicateHoist);
                assert_eq!(crate::error::ResumableErrorExt::level(&e), Level::Critical);
            }
        }
    }
}
