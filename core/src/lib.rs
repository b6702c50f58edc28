pub mod ast;
pub mod driver;
pub mod error;
pub mod interp;
pub mod lower;

pub use ast::{from_json, load_json_file, Node, NodeKind, NodeRef};
pub use driver::{DriverOptions, StateMachine, Step};
pub use error::{Level, LoweringError, ResumableErrorExt, RuntimeError};
pub use interp::{Host, StdHost, Value};
pub use lower::{lower_async_body, LoweredBody, LoweringOptions};

pub fn generate_error_report<E: ResumableErrorExt + ?Sized>(error: &E) -> String {
    let node = match error.node() {
        Some(id) => format!("node#{}", id),
        None => "unknown node".to_string(),
    };
    format!("RESUMABLE | {} | {} | {} | {}", error.level(), error.issuer(), node, error.message())
}

/// Lower `body` and drive it to completion against `host`.
pub fn lower_and_run<H: Host>(
    body: &NodeRef,
    host: &mut H,
    lowering: &LoweringOptions,
    driving: &DriverOptions,
) -> Result<Value, Box<dyn ResumableErrorExt>> {
    let lowered = lower_async_body(body, lowering).map_err(|e| Box::new(e) as Box<dyn ResumableErrorExt>)?;
    let mut machine = StateMachine::new(&lowered);
    machine
        .run_to_completion(host, driving)
        .map_err(|e| Box::new(e) as Box<dyn ResumableErrorExt>)
}
