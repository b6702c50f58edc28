//! The suspend-point rewriter.
//!
//! Walks a checked, spilled and handler-reduced body once, top-down, and
//! replaces every `Await` with the acquire / test / suspend / resume
//! sequence. Blocks that contain a suspend point lose their declarations
//! to the scope tracker, and every `Try` whose subtree suspends gets an
//! entry label plus an inner dispatch switch so re-entry can reach the
//! resume label without jumping into the protected region directly.

use indexmap::IndexSet;

use crate::ast::{
    AwaitStep, CatchBlock, LabelTarget, Node, NodeKind, NodeRef, SwitchCase, Ty, UnaryOperator, Variable,
};
use crate::error::LoweringError;

use super::context::LoweringContext;
use super::contract::RUNNING_STATE;
use super::scope::ScopeTracker;
use super::state::StateAllocator;

/// What the rewriter hands back besides the rewritten tree.
#[derive(Debug)]
pub struct RewriteOutput {
    pub hoisted: IndexSet<Variable>,
    pub resume_cases: Vec<SwitchCase>,
    pub state_count: usize,
}

pub struct AwaitRewriter<'c, 'f> {
    ctx: &'c mut LoweringContext<'f>,
    scopes: ScopeTracker,
    states: StateAllocator,
}

impl<'c, 'f> AwaitRewriter<'c, 'f> {
    pub fn new(ctx: &'c mut LoweringContext<'f>) -> Self {
        AwaitRewriter { ctx, scopes: ScopeTracker::new(), states: StateAllocator::new() }
    }

    pub fn rewrite(&mut self, node: &NodeRef) -> Result<NodeRef, LoweringError> {
        match &node.kind {
            NodeKind::Block { variables, statements } => self.visit_block(node, variables, statements),
            NodeKind::Await { operand, acquire, result } => self.visit_await(operand, acquire.as_deref(), *result),
            NodeKind::Try { body, handlers, finally, fault } => {
                self.visit_try(body, handlers, finally.as_ref(), fault.as_ref())
            }
            kind => {
                let kind = kind.try_map_children(&mut |c| self.rewrite(c))?;
                Ok(Node::rebuild(kind))
            }
        }
    }

    pub fn finish(self) -> RewriteOutput {
        RewriteOutput {
            state_count: self.states.state_count(),
            hoisted: self.scopes.into_hoisted(),
            resume_cases: self.states.into_resume_list(),
        }
    }

    fn visit_block(
        &mut self,
        node: &NodeRef,
        variables: &[Variable],
        statements: &[NodeRef],
    ) -> Result<NodeRef, LoweringError> {
        self.scopes.enter_block();
        let mut rewritten = Vec::with_capacity(statements.len());
        for s in statements {
            rewritten.push(self.rewrite(s)?);
        }
        let hoisted = self.scopes.exit_block(variables, node.get_id())?;
        let variables = if hoisted { Vec::new() } else { variables.to_vec() };
        Ok(Node::block(variables, rewritten))
    }

    fn visit_await(&mut self, operand: &NodeRef, acquire: Option<&str>, result: Ty) -> Result<NodeRef, LoweringError> {
        self.scopes.mark_suspend();

        // Operands were spilled already, so a nested suspend point here is
        // the whole operand and is lowered before this one.
        let operand = self.rewrite(operand)?;
        let get_awaiter = match acquire {
            Some(name) => Node::call(name, vec![operand]),
            None => Node::awaiter(AwaitStep::Acquire, operand),
        };

        let awaiter = self.ctx.fresh_variable(Ty::Any, "__awaiter");
        let point = self.states.allocate(&self.ctx.contract);
        log::debug!("suspend point {} resumes at {}", point.index, point.label);

        let contract = &self.ctx.contract;
        let suspend = Node::seq(vec![
            contract.update_state(point.index),
            contract.on_incomplete(&awaiter),
            Node::goto(&contract.exit),
        ]);

        let mut exprs = vec![
            Node::assign(&awaiter, get_awaiter),
            Node::if_then(
                Node::unary(UnaryOperator::Not, Node::awaiter(AwaitStep::IsCompleted, Node::var(&awaiter))),
                suspend,
            ),
            Node::label(&point.label),
        ];

        let get_result = Node::awaiter(AwaitStep::GetResult, Node::var(&awaiter));
        let mut locals = Vec::new();
        let captured = if result.is_unit() {
            exprs.push(get_result);
            None
        } else {
            let value = Variable::new("__result", result);
            exprs.push(Node::assign(&value, get_result));
            locals.push(value.clone());
            Some(value)
        };

        exprs.push(Node::assign(&awaiter, Node::default_of(Ty::Any)));
        exprs.push(contract.update_state(RUNNING_STATE));
        exprs.push(match &captured {
            Some(value) => Node::var(value),
            None => Node::empty(),
        });

        Ok(Node::block(locals, exprs))
    }

    fn visit_try(
        &mut self,
        body: &NodeRef,
        handlers: &[CatchBlock],
        finally: Option<&NodeRef>,
        fault: Option<&NodeRef>,
    ) -> Result<NodeRef, LoweringError> {
        self.states.open_region();

        let body = self.rewrite(body)?;
        let mut new_handlers = Vec::with_capacity(handlers.len());
        for h in handlers {
            let filter = match &h.filter {
                Some(f) => Some(self.rewrite(f)?),
                None => None,
            };
            new_handlers.push(CatchBlock { variable: h.variable.clone(), filter, body: self.rewrite(&h.body)? });
        }
        let finally = finally.map(|f| self.rewrite(f)).transpose()?;
        let fault = fault.map(|f| self.rewrite(f)).transpose()?;

        let table = self.states.close_region();
        if table.is_empty() {
            return Ok(Node::try_region(body, new_handlers, finally, fault));
        }

        let contract = &self.ctx.contract;
        let dispatch = Node::switch(Node::var(&contract.local_state), table.clone(), None);
        let body = Node::seq(vec![dispatch, body]);

        // Leaving the region to suspend must not run cleanup.
        let finally = finally.map(|f| Node::if_then(contract.not_suspended(), f));
        let fault = fault.map(|f| Node::if_then(contract.not_suspended(), f));

        let enter = LabelTarget::new("__enterTry");
        log::debug!("region {} re-dispatches {} resume case(s)", enter, table.len());
        self.states.fold_region(&table, &enter);

        Ok(Node::seq(vec![Node::label(&enter), Node::try_region(body, new_handlers, finally, fault)]))
    }
}
