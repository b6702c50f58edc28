//! The narrow interface agreed with the driver that owns the persisted
//! state and re-invokes the lowered body.

use std::rc::Rc;

use crate::ast::{BinaryOperator, LabelTarget, Node, NodeRef, Ty, Variable};

/// Host operation the default contract calls when a suspend point is
/// pending; the evaluator intercepts it and reports the awaiter.
pub const ON_COMPLETED_HOOK: &str = "await_on_completed";

/// Value of the state slot while the body runs (or before the first run).
pub const RUNNING_STATE: i64 = -1;

pub type OnIncomplete = Rc<dyn Fn(&Variable) -> NodeRef>;

/// Creates the variables a suspend point needs to keep across re-entry.
pub trait VariableFactory {
    fn create(&mut self, ty: Ty, name: &str) -> Variable;
}

/// Default factory: every created variable becomes a state-machine field
/// owned by the driver.
#[derive(Debug, Default)]
pub struct StateFieldFactory {
    fields: Vec<Variable>,
}

impl StateFieldFactory {
    pub fn fields(&self) -> &[Variable] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Variable> {
        self.fields
    }
}

impl VariableFactory for StateFieldFactory {
    fn create(&mut self, ty: Ty, name: &str) -> Variable {
        let v = Variable::new(name, ty);
        self.fields.push(v.clone());
        v
    }
}

#[derive(Clone)]
pub struct DriverContract {
    /// Persisted state slot, owned by the driver.
    pub state: Variable,
    /// Function-local mirror of `state`, written in lockstep with it.
    pub local_state: Variable,
    /// Target of the jump that hands control back to the driver.
    pub exit: LabelTarget,
    on_incomplete: OnIncomplete,
}

impl DriverContract {
    pub fn new() -> Self {
        DriverContract {
            state: Variable::new("__state", Ty::Int),
            local_state: Variable::new("__localState", Ty::Int),
            exit: LabelTarget::new("__exit"),
            on_incomplete: Rc::new(|awaiter: &Variable| Node::call(ON_COMPLETED_HOOK, vec![Node::var(awaiter)])),
        }
    }

    /// Replace the expression built for the on-incomplete callback.
    pub fn with_on_incomplete(mut self, f: OnIncomplete) -> Self {
        self.on_incomplete = f;
        self
    }

    pub fn on_incomplete(&self, awaiter: &Variable) -> NodeRef {
        (self.on_incomplete)(awaiter)
    }

    /// `local_state = state = value`
    pub fn update_state(&self, value: i64) -> NodeRef {
        Node::assign(&self.local_state, Node::assign(&self.state, Node::int(value)))
    }

    /// `local_state < 0`, i.e. not suspended anywhere.
    pub fn not_suspended(&self) -> NodeRef {
        Node::binary(BinaryOperator::Lt, Node::var(&self.local_state), Node::int(0))
    }
}

impl Default for DriverContract {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DriverContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverContract")
            .field("state", &self.state)
            .field("local_state", &self.local_state)
            .field("exit", &self.exit)
            .finish_non_exhaustive()
    }
}
