//! file: core/src/lower/context.rs
//! description: shared lowering context used while rewriting suspend points.
//!
//! `LoweringContext` bundles the driver contract with the variable factory
//! so the rewriter can create awaiter storage and emit state updates
//! without knowing who owns them.

use crate::ast::{Ty, Variable};

use super::contract::{DriverContract, VariableFactory};

pub struct LoweringContext<'f> {
    pub contract: DriverContract,
    factory: &'f mut dyn VariableFactory,
    created: usize,
}

impl<'f> LoweringContext<'f> {
    pub fn new(contract: DriverContract, factory: &'f mut dyn VariableFactory) -> Self {
        LoweringContext { contract, factory, created: 0 }
    }

    pub fn fresh_variable(&mut self, ty: Ty, name: &str) -> Variable {
        self.created += 1;
        self.factory.create(ty, name)
    }

    /// Number of variables requested from the factory so far.
    pub fn created_variables(&self) -> usize {
        self.created
    }
}
