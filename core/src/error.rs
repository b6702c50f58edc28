use std::fmt;

use crate::ast::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level_str = match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        };
        write!(f, "{}", level_str)
    }
}

pub trait ResumableErrorExt {
    fn level(&self) -> Level;
    fn message(&self) -> String;
    fn issuer(&self) -> String;
    /// Id of the node the error was raised for, if any.
    fn node(&self) -> Option<NodeId>;
}

impl fmt::Debug for dyn ResumableErrorExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node_str = match self.node() {
            Some(id) => format!("node#{}", id),
            None => "node:none".to_string(),
        };
        write!(f, "RESUMABLE | {} | {} | {} | {}", self.level(), self.issuer(), node_str, self.message())
    }
}

impl fmt::Display for dyn ResumableErrorExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// What went wrong while lowering a body. Every kind aborts the whole
/// lowering; no partially lowered tree is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoweringErrorKind {
    /// A suspend point inside an exception filter predicate.
    AwaitInFilter,
    /// A suspend point inside a lock guard or lock body.
    AwaitInLock,
    /// A suspend point inside a catch, finally or fault body while handler
    /// reduction is switched off.
    AwaitInHandler,
    /// A block variable was about to be hoisted a second time.
    DuplicateHoist,
    /// A rethrow outside of any catch handler.
    RethrowOutsideHandler,
    /// Input could not be read or decoded.
    Malformed,
}

#[derive(Debug, Clone)]
pub struct LoweringError {
    level: Level,
    kind: LoweringErrorKind,
    message: String,
    issuer: String,
    node: Option<NodeId>,
}

impl LoweringError {
    pub fn with(
        level: Level,
        kind: LoweringErrorKind,
        message: String,
        issuer: String,
        node: Option<NodeId>,
    ) -> Self {
        LoweringError { level, kind, message, issuer, node }
    }

    pub fn kind(&self) -> LoweringErrorKind {
        self.kind
    }
}

impl fmt::Display for LoweringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = self.node {
            write!(f, "{} (at node#{})", self.message, id)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for LoweringError {}

impl ResumableErrorExt for LoweringError {
    fn level(&self) -> Level {
        self.level
    }

    fn message(&self) -> String {
        self.message.clone()
    }

    fn issuer(&self) -> String {
        self.issuer.clone()
    }

    fn node(&self) -> Option<NodeId> {
        self.node
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeErrorKind {
    /// A jump entered a protected region or a partially evaluated operand.
    InvalidJump,
    UnboundVariable,
    UnknownHostFunction,
    TypeMismatch,
    /// A suspend point reached the evaluator without being lowered.
    UnloweredAwait,
    /// An exception escaped the body; the payload is its rendering.
    Unhandled,
    /// The body reported a suspension without handing over an awaiter.
    MissingAwaiter,
    /// The driver gave up after too many resumptions.
    ResumeLimit,
}

#[derive(Debug, Clone)]
pub struct RuntimeError {
    level: Level,
    kind: RuntimeErrorKind,
    message: String,
    issuer: String,
    node: Option<NodeId>,
}

impl RuntimeError {
    pub fn with(
        level: Level,
        kind: RuntimeErrorKind,
        message: String,
        issuer: String,
        node: Option<NodeId>,
    ) -> Self {
        RuntimeError { level, kind, message, issuer, node }
    }

    pub fn kind(&self) -> &RuntimeErrorKind {
        &self.kind
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = self.node {
            write!(f, "{} (at node#{})", self.message, id)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for RuntimeError {}

impl ResumableErrorExt for RuntimeError {
    fn level(&self) -> Level {
        self.level
    }

    fn message(&self) -> String {
        self.message.clone()
    }

    fn issuer(&self) -> String {
        self.issuer.clone()
    }

    fn node(&self) -> Option<NodeId> {
        self.node
    }
}
