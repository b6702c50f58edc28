//! file: core/src/driver.rs
//! description: state machine driver for lowered bodies.
//!
//! A `StateMachine` owns the persisted storage of one lowered body: the
//! state slot, every hoisted variable and every awaiter field. Each call
//! to `move_next` runs the body once from the top; the entry dispatch
//! routes it to the right resume label. When the body hands back control
//! with a non-negative state, the awaiter it registered is returned so
//! the caller can wait on it.
//!
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ast::{NodeRef, Variable};
use crate::error::{Level, RuntimeError, RuntimeErrorKind};
use crate::interp::{Completion, Host, Interpreter, LabelIndex, Value};
use crate::lower::{LoweredBody, RUNNING_STATE};

const ISSUER: &str = "resumable.driver";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverOptions {
    /// Upper bound on resumptions before `run_to_completion` gives up.
    pub max_resumptions: usize,
}

impl Default for DriverOptions {
    fn default() -> Self {
        DriverOptions { max_resumptions: 10_000 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Completed(Value),
    /// The body is waiting on this awaiter.
    Suspended(Value),
}

pub struct StateMachine {
    body: NodeRef,
    state: Variable,
    labels: LabelIndex,
    persisted: HashMap<usize, Value>,
    callbacks: usize,
    resumptions: usize,
}

impl StateMachine {
    pub fn new(lowered: &LoweredBody) -> Self {
        let mut persisted = HashMap::new();
        for v in lowered.persisted_variables() {
            persisted.insert(v.id, Value::default_of(v.ty));
        }
        persisted.insert(lowered.contract.state.id, Value::Int(RUNNING_STATE));
        StateMachine {
            body: lowered.body.clone(),
            state: lowered.contract.state.clone(),
            labels: LabelIndex::build(&lowered.body),
            persisted,
            callbacks: 0,
            resumptions: 0,
        }
    }

    /// Bind a free variable of the body (a parameter) before the first run.
    pub fn with_argument(mut self, param: &Variable, value: Value) -> Self {
        self.persisted.insert(param.id, value);
        self
    }

    pub fn state(&self) -> i64 {
        match self.persisted.get(&self.state.id) {
            Some(Value::Int(s)) => *s,
            _ => RUNNING_STATE,
        }
    }

    /// Number of times the body invoked the on-incomplete callback.
    pub fn callbacks(&self) -> usize {
        self.callbacks
    }

    pub fn resumptions(&self) -> usize {
        self.resumptions
    }

    /// Current value of a persisted variable.
    pub fn persisted(&self, v: &Variable) -> Option<&Value> {
        self.persisted.get(&v.id)
    }

    pub fn move_next<H: Host>(&mut self, host: &mut H) -> Result<Step, RuntimeError> {
        let (completion, registered) = {
            let mut interp = Interpreter::new(&self.labels, &mut self.persisted, host);
            let completion = interp.run(&self.body)?;
            (completion, interp.take_registered())
        };
        self.callbacks += registered.len();

        match completion {
            Completion::Threw(ex) => Err(RuntimeError::with(
                Level::Error,
                RuntimeErrorKind::Unhandled,
                format!("Unhandled exception {}", ex),
                ISSUER.into(),
                Some(self.body.get_id()),
            )),
            Completion::Returned(v) => Ok(Step::Completed(v)),
            Completion::Normal(v) if self.state() < 0 => Ok(Step::Completed(v)),
            Completion::Normal(_) => match registered.into_iter().last() {
                Some(awaiter) => {
                    log::debug!("suspended in state {}", self.state());
                    Ok(Step::Suspended(awaiter))
                }
                None => Err(RuntimeError::with(
                    Level::Error,
                    RuntimeErrorKind::MissingAwaiter,
                    format!("Suspended in state {} without registering an awaiter", self.state()),
                    ISSUER.into(),
                    Some(self.body.get_id()),
                )),
            },
        }
    }

    /// Drive the body until it completes, advancing each awaiter it waits on.
    pub fn run_to_completion<H: Host>(&mut self, host: &mut H, options: &DriverOptions) -> Result<Value, RuntimeError> {
        loop {
            match self.move_next(host)? {
                Step::Completed(v) => {
                    log::info!("completed after {} resumption(s)", self.resumptions);
                    return Ok(v);
                }
                Step::Suspended(awaiter) => {
                    if self.resumptions >= options.max_resumptions {
                        return Err(RuntimeError::with(
                            Level::Critical,
                            RuntimeErrorKind::ResumeLimit,
                            format!("Gave up after {} resumptions", self.resumptions),
                            ISSUER.into(),
                            None,
                        ));
                    }
                    self.resumptions += 1;
                    if let Value::Future(cell) = &awaiter {
                        let mut cell = cell.borrow_mut();
                        while !cell.is_completed() {
                            cell.advance();
                        }
                    }
                }
            }
        }
    }
}
