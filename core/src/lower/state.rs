//! State allocator and resumption tables.
//!
//! Each suspend point gets the next state index and a fresh label. The
//! resumption case for it lands in the table of the innermost open
//! exception region; closing a region folds all of its indices into a
//! single case of the parent table that jumps to the region's entry label.

use crate::ast::{LabelTarget, Node, SwitchCase};

use super::contract::{DriverContract, RUNNING_STATE};

#[derive(Debug, Clone)]
pub struct ResumePoint {
    pub index: i64,
    pub label: LabelTarget,
}

#[derive(Debug)]
pub struct StateAllocator {
    next_index: i64,
    tables: Vec<Vec<SwitchCase>>,
}

impl StateAllocator {
    pub fn new() -> Self {
        StateAllocator { next_index: 0, tables: vec![Vec::new()] }
    }

    /// Hand out the next state and register its resumption case:
    /// `index => { local_state = state = -1; goto label }`.
    pub fn allocate(&mut self, contract: &DriverContract) -> ResumePoint {
        let index = self.next_index;
        self.next_index += 1;
        let label = LabelTarget::new(&format!("__state{}", index));

        let jump = Node::seq(vec![contract.update_state(RUNNING_STATE), Node::goto(&label)]);
        self.current_mut().push(Node::case(vec![index], jump));

        ResumePoint { index, label }
    }

    pub fn open_region(&mut self) {
        self.tables.push(Vec::new());
    }

    /// Pop the innermost region's table. The root table is never popped.
    pub fn close_region(&mut self) -> Vec<SwitchCase> {
        if self.tables.len() > 1 {
            self.tables.pop().unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    /// Register one parent case covering every index of a closed region.
    pub fn fold_region(&mut self, closed: &[SwitchCase], enter: &LabelTarget) {
        let tests: Vec<i64> = closed.iter().flat_map(|c| c.tests.iter().copied()).collect();
        if tests.is_empty() {
            return;
        }
        self.current_mut().push(Node::case(tests, Node::goto(enter)));
    }

    pub fn resume_list(&self) -> &[SwitchCase] {
        self.tables.last().map(|t| t.as_slice()).unwrap_or(&[])
    }

    pub fn state_count(&self) -> usize {
        self.next_index as usize
    }

    pub fn region_depth(&self) -> usize {
        self.tables.len() - 1
    }

    /// The outermost table, consulted once by the driver before the body runs.
    pub fn into_resume_list(mut self) -> Vec<SwitchCase> {
        self.tables.truncate(1);
        self.tables.pop().unwrap_or_default()
    }

    fn current_mut(&mut self) -> &mut Vec<SwitchCase> {
        if self.tables.is_empty() {
            self.tables.push(Vec::new());
        }
        let last = self.tables.len() - 1;
        &mut self.tables[last]
    }
}

impl Default for StateAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_monotonic_and_labels_distinct() {
        let contract = DriverContract::new();
        let mut states = StateAllocator::new();
        let a = states.allocate(&contract);
        let b = states.allocate(&contract);
        assert_eq!((a.index, b.index), (0, 1));
        assert_ne!(a.label, b.label);
        assert_eq!(states.resume_list().len(), 2);
    }

    #[test]
    fn closed_region_folds_into_one_parent_case() {
        let contract = DriverContract::new();
        let mut states = StateAllocator::new();
        states.allocate(&contract);
        states.open_region();
        states.allocate(&contract);
        states.allocate(&contract);
        let closed = states.close_region();
        assert_eq!(closed.len(), 2);
        let enter = LabelTarget::new("__enterTry");
        states.fold_region(&closed, &enter);
        let root = states.into_resume_list();
        assert_eq!(root.len(), 2);
        assert_eq!(root[1].tests, vec![1, 2]);
    }

    #[test]
    fn root_table_survives_unbalanced_close() {
        let mut states = StateAllocator::new();
        assert!(states.close_region().is_empty());
        assert_eq!(states.region_depth(), 0);
    }
}
