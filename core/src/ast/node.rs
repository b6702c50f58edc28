use std::rc::Rc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ids::{self, NodeId};
use super::kind::{AwaitStep, BinaryOperator, CatchBlock, NodeKind, SwitchCase, UnaryOperator};
use super::symbol::{LabelTarget, Literal, Ty, Variable};

/// Shared, read-only handle to a node. Passes never mutate a node in place;
/// they build new nodes that point at unchanged children.
pub type NodeRef = Rc<Node>;

#[derive(Clone)]
pub struct Node {
    id: NodeId,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node { id: ids::fresh_node_id(), kind }
    }

    pub fn get_id(&self) -> NodeId {
        self.id
    }

    pub fn get_kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn from_kind(kind: NodeKind) -> NodeRef {
        Rc::new(Node::new(kind))
    }

    // ------- Constructors -------

    pub fn block(variables: Vec<Variable>, statements: Vec<NodeRef>) -> NodeRef {
        Self::from_kind(NodeKind::Block { variables, statements })
    }

    pub fn seq(statements: Vec<NodeRef>) -> NodeRef {
        Self::block(Vec::new(), statements)
    }

    pub fn await_on(operand: NodeRef, result: Ty) -> NodeRef {
        Self::from_kind(NodeKind::Await { operand, acquire: None, result })
    }

    /// Suspend point whose awaiter is acquired through the host operation `acquire`.
    pub fn await_with(operand: NodeRef, acquire: &str, result: Ty) -> NodeRef {
        Self::from_kind(NodeKind::Await { operand, acquire: Some(acquire.to_string()), result })
    }

    pub fn awaiter(step: AwaitStep, operand: NodeRef) -> NodeRef {
        Self::from_kind(NodeKind::Awaiter { step, operand })
    }

    pub fn try_region(
        body: NodeRef,
        handlers: Vec<CatchBlock>,
        finally: Option<NodeRef>,
        fault: Option<NodeRef>,
    ) -> NodeRef {
        Self::from_kind(NodeKind::Try { body, handlers, finally, fault })
    }

    pub fn try_catch(body: NodeRef, handlers: Vec<CatchBlock>) -> NodeRef {
        Self::try_region(body, handlers, None, None)
    }

    pub fn try_finally(body: NodeRef, finally: NodeRef) -> NodeRef {
        Self::try_region(body, Vec::new(), Some(finally), None)
    }

    pub fn try_fault(body: NodeRef, fault: NodeRef) -> NodeRef {
        Self::try_region(body, Vec::new(), None, Some(fault))
    }

    pub fn catch(variable: Option<Variable>, body: NodeRef) -> CatchBlock {
        CatchBlock { variable, filter: None, body }
    }

    pub fn catch_when(variable: Option<Variable>, filter: NodeRef, body: NodeRef) -> CatchBlock {
        CatchBlock { variable, filter: Some(filter), body }
    }

    pub fn loop_with(body: NodeRef, break_label: Option<LabelTarget>, continue_label: Option<LabelTarget>) -> NodeRef {
        Self::from_kind(NodeKind::Loop { body, break_label, continue_label })
    }

    pub fn label(target: &LabelTarget) -> NodeRef {
        Self::from_kind(NodeKind::Label { target: target.clone() })
    }

    pub fn goto(target: &LabelTarget) -> NodeRef {
        Self::from_kind(NodeKind::Goto { target: target.clone() })
    }

    pub fn switch(value: NodeRef, cases: Vec<SwitchCase>, default: Option<NodeRef>) -> NodeRef {
        Self::from_kind(NodeKind::Switch { value, cases, default })
    }

    pub fn case(tests: Vec<i64>, body: NodeRef) -> SwitchCase {
        SwitchCase { tests, body }
    }

    pub fn if_then(test: NodeRef, then: NodeRef) -> NodeRef {
        Self::from_kind(NodeKind::Condition { test, then, otherwise: None })
    }

    pub fn if_else(test: NodeRef, then: NodeRef, otherwise: NodeRef) -> NodeRef {
        Self::from_kind(NodeKind::Condition { test, then, otherwise: Some(otherwise) })
    }

    pub fn lock(guard: NodeRef, body: NodeRef) -> NodeRef {
        Self::from_kind(NodeKind::Lock { guard, body })
    }

    pub fn ret(value: NodeRef) -> NodeRef {
        Self::from_kind(NodeKind::Return { value: Some(value) })
    }

    pub fn ret_unit() -> NodeRef {
        Self::from_kind(NodeKind::Return { value: None })
    }

    pub fn throw(value: NodeRef) -> NodeRef {
        Self::from_kind(NodeKind::Throw { value: Some(value) })
    }

    pub fn rethrow() -> NodeRef {
        Self::from_kind(NodeKind::Throw { value: None })
    }

    pub fn assign(target: &Variable, value: NodeRef) -> NodeRef {
        Self::from_kind(NodeKind::Assign { target: target.clone(), value })
    }

    pub fn binary(op: BinaryOperator, left: NodeRef, right: NodeRef) -> NodeRef {
        Self::from_kind(NodeKind::Binary { op, left, right })
    }

    pub fn unary(op: UnaryOperator, operand: NodeRef) -> NodeRef {
        Self::from_kind(NodeKind::Unary { op, operand })
    }

    pub fn call(callee: &str, args: Vec<NodeRef>) -> NodeRef {
        Self::from_kind(NodeKind::Call { callee: callee.to_string(), args })
    }

    pub fn var(variable: &Variable) -> NodeRef {
        Self::from_kind(NodeKind::Variable { variable: variable.clone() })
    }

    pub fn constant(value: Literal) -> NodeRef {
        Self::from_kind(NodeKind::Constant { value })
    }

    pub fn int(value: i64) -> NodeRef {
        Self::constant(Literal::Int(value))
    }

    pub fn bool(value: bool) -> NodeRef {
        Self::constant(Literal::Bool(value))
    }

    pub fn str(value: &str) -> NodeRef {
        Self::constant(Literal::Str(value.to_string()))
    }

    pub fn default_of(ty: Ty) -> NodeRef {
        Self::from_kind(NodeKind::Default { ty })
    }

    pub fn empty() -> NodeRef {
        Self::default_of(Ty::Unit)
    }

    /// Rebuild with the same kind payload but a fresh identity.
    pub fn rebuild(kind: NodeKind) -> NodeRef {
        Self::from_kind(kind)
    }
}

/// Structural equality: node identity is not part of the comparison.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.kind.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        NodeKind::deserialize(deserializer).map(Node::new)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Delegate to Display so both "{}" and "{:?}" are readable trees
        write!(f, "{}", self)
    }
}
