//! file: core/src/interp/host.rs
//! description: host operations reachable through `Call` nodes.
//!
//! The evaluator knows nothing about producers or side effects; every
//! `Call` goes through a `Host`. `StdHost` provides a small set of
//! builtins for tests and the CLI: tracing, completed and pending
//! producers, failures, and a custom awaiter acquisition.
//!
use super::value::{FutureCell, Value};

pub trait Host {
    /// Run host operation `name`. `None` when the operation is unknown,
    /// `Some(Err(e))` when it raised the exception `e`.
    fn call(&mut self, name: &str, args: &[Value]) -> Option<Result<Value, Value>>;
}

#[derive(Debug, Default)]
pub struct StdHost {
    trace: Vec<String>,
}

impl StdHost {
    pub fn new() -> Self {
        StdHost::default()
    }

    /// Everything passed to `trace`, in call order.
    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    pub fn take_trace(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace)
    }
}

fn polls_arg(args: &[Value], index: usize) -> u32 {
    match args.get(index) {
        Some(Value::Int(n)) if *n > 0 => *n as u32,
        Some(Value::Int(_)) => 0,
        _ => 1,
    }
}

fn message_arg(args: &[Value]) -> String {
    args.first().map(|v| v.to_string()).unwrap_or_default()
}

impl Host for StdHost {
    fn call(&mut self, name: &str, args: &[Value]) -> Option<Result<Value, Value>> {
        let res = match name {
            "trace" => {
                let line = args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(" ");
                log::trace!("trace: {}", line);
                self.trace.push(line);
                Ok(Value::Unit)
            }
            // ready(v): a producer that already completed with v
            "ready" => Ok(Value::Future(FutureCell::ready(args.first().cloned().unwrap_or(Value::Unit)))),
            // pending(v, n): completes with v after n advances (default 1)
            "pending" => {
                let value = args.first().cloned().unwrap_or(Value::Unit);
                Ok(Value::Future(FutureCell::pending(value, polls_arg(args, 1))))
            }
            "yield" => Ok(Value::Future(FutureCell::pending(Value::Unit, 1))),
            // fail(msg, n): fails with error(msg) after n advances (default 0)
            "fail" => {
                let polls = if args.len() > 1 { polls_arg(args, 1) } else { 0 };
                Ok(Value::Future(FutureCell::failed(Value::Error(message_arg(args)), polls)))
            }
            "error" => Ok(Value::Error(message_arg(args))),
            "raise" => Err(Value::Error(message_arg(args))),
            // Custom acquisition: accepts any producer and hands it back.
            "awaiter_of" => match args.first() {
                Some(v @ Value::Future(_)) => Ok(v.clone()),
                Some(other) => Err(Value::Error(format!("{} is not awaitable", other.type_name()))),
                None => Err(Value::Error("awaiter_of expects one argument".to_string())),
            },
            _ => return None,
        };
        Some(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_completes_after_advances() {
        let mut host = StdHost::new();
        let Some(Ok(Value::Future(f))) = host.call("pending", &[Value::Int(7), Value::Int(2)]) else {
            panic!("expected a producer");
        };
        assert!(!f.borrow().is_completed());
        f.borrow_mut().advance();
        f.borrow_mut().advance();
        assert_eq!(f.borrow().outcome(), Some(Ok(Value::Int(7))));
    }

    #[test]
    fn unknown_operation_is_none() {
        let mut host = StdHost::new();
        assert!(host.call("nope", &[]).is_none());
    }

    #[test]
    fn trace_joins_arguments() {
        let mut host = StdHost::new();
        host.call("trace", &[Value::Str("T".into()), Value::Int(1)]);
        assert_eq!(host.trace(), &["T 1".to_string()]);
    }
}
