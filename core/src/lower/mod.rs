//! file: core/src/lower/mod.rs
//! description: lowering pipeline for resumable bodies.
//!
//! `lower_async_body` turns a body containing suspend points into one that
//! a driver can call repeatedly. The pipeline runs, in order:
//!
//! 1. `check`    static rejection rules on the untouched input
//! 2. `spill`    operands evaluated before a suspend point go to temporaries
//! 3. `handlers` catch/finally/fault bodies that suspend move out of their region
//! 4. `rewriter` suspend points become state updates, labels and dispatch
//!
//! and finally wraps the result in the entry dispatch the driver relies on.
//!
pub mod check;
pub mod context;
pub mod contract;
pub mod handlers;
pub mod rewriter;
pub mod scope;
pub mod spill;
pub mod state;

pub use context::LoweringContext;
pub use contract::{DriverContract, StateFieldFactory, VariableFactory, ON_COMPLETED_HOOK, RUNNING_STATE};
pub use rewriter::{AwaitRewriter, RewriteOutput};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::ast::{Node, NodeRef, SwitchCase, Variable};
use crate::error::LoweringError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoweringOptions {
    /// Store operands evaluated before a suspend point in temporaries.
    pub spill_operands: bool,
    /// Move catch, finally and fault bodies that suspend out of their
    /// region. When off, such bodies are rejected.
    pub reduce_handlers: bool,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        LoweringOptions { spill_operands: true, reduce_handlers: true }
    }
}

/// A lowered body plus everything the driver needs to run it.
#[derive(Debug, Clone)]
pub struct LoweredBody {
    pub body: NodeRef,
    pub contract: DriverContract,
    /// Block variables promoted to persisted storage, in hoisting order.
    pub hoisted: IndexSet<Variable>,
    /// Variables created through the factory (awaiter slots).
    pub fields: Vec<Variable>,
    /// The entry dispatch cases, one per top-level resume target.
    pub resume_cases: Vec<SwitchCase>,
    pub state_count: usize,
}

impl LoweredBody {
    /// Every variable whose value must survive between invocations.
    pub fn persisted_variables(&self) -> impl Iterator<Item = &Variable> {
        std::iter::once(&self.contract.state).chain(self.hoisted.iter()).chain(self.fields.iter())
    }
}

pub fn lower_async_body(body: &NodeRef, options: &LoweringOptions) -> Result<LoweredBody, LoweringError> {
    lower_async_body_with(body, options, DriverContract::new())
}

pub fn lower_async_body_with(
    body: &NodeRef,
    options: &LoweringOptions,
    contract: DriverContract,
) -> Result<LoweredBody, LoweringError> {
    check::check_body(body, options.reduce_handlers)?;

    let mut prepared = body.clone();
    if options.spill_operands {
        prepared = spill::spill_operands(&prepared)?;
    }
    if options.reduce_handlers {
        prepared = handlers::reduce_handlers(&prepared)?;
    }

    let mut factory = StateFieldFactory::default();
    let (lowered, output) = {
        let mut ctx = LoweringContext::new(contract.clone(), &mut factory);
        let mut rewriter = AwaitRewriter::new(&mut ctx);
        let lowered = rewriter.rewrite(&prepared)?;
        (lowered, rewriter.finish())
    };

    log::info!(
        "lowered body node#{}: {} state(s), {} hoisted, {} resume case(s)",
        body.get_id(),
        output.state_count,
        output.hoisted.len(),
        output.resume_cases.len()
    );

    let assembled = assemble(&contract, lowered, &output.resume_cases);
    Ok(LoweredBody {
        body: assembled,
        contract,
        hoisted: output.hoisted,
        fields: factory.into_fields(),
        resume_cases: output.resume_cases,
        state_count: output.state_count,
    })
}

/// Wrap a rewritten body in the entry dispatch:
///
/// ```text
/// block [local_state]
///   local_state = state
///   switch local_state { resume cases..., default: () }
///   return <body>
///   exit:
/// ```
///
/// The default arm is the fall-through for the initial `-1` state.
fn assemble(contract: &DriverContract, lowered: NodeRef, resume_cases: &[SwitchCase]) -> NodeRef {
    Node::block(
        vec![contract.local_state.clone()],
        vec![
            Node::assign(&contract.local_state, Node::var(&contract.state)),
            Node::switch(Node::var(&contract.local_state), resume_cases.to_vec(), Some(Node::empty())),
            Node::ret(lowered),
            Node::label(&contract.exit),
        ],
    )
}
