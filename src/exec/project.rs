//! # Projection
//!
//! Rewrites each child row through a list of output expressions. The
//! produced tuple evaluates lazily: a cell is computed when read, against
//! the child's current tuple.

use crate::error::{DbError, Result};
use crate::exec::{ExecutionContext, PhysicalOperator};
use crate::expr::{Expr, Tuple, TupleCellSpec};
use crate::types::Value;

pub struct ProjectOperator {
    exprs: Vec<Expr>,
    specs: Vec<TupleCellSpec>,
    child: Box<dyn PhysicalOperator>,
    ctx: Option<ExecutionContext>,
}

impl ProjectOperator {
    pub fn new(exprs: Vec<Expr>, child: Box<dyn PhysicalOperator>) -> ProjectOperator {
        let specs = exprs
            .iter()
            .map(|e| TupleCellSpec::new("", &e.name()))
            .collect();
        ProjectOperator {
            exprs,
            specs,
            child,
            ctx: None,
        }
    }
}

impl PhysicalOperator for ProjectOperator {
    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.ctx = Some(ctx.clone());
        self.child.open(ctx)
    }

    fn next(&mut self) -> Result<bool> {
        self.child.next()
    }

    fn close(&mut self) -> Result<()> {
        self.ctx = None;
        self.child.close()
    }

    fn current_tuple(&self) -> Result<Box<dyn Tuple + '_>> {
        let ctx = self
            .ctx
            .as_ref()
            .ok_or_else(|| DbError::Internal("projection read before open".into()))?;
        Ok(Box::new(ExpressionTuple {
            exprs: &self.exprs,
            specs: &self.specs,
            child: self.child.current_tuple()?,
            ctx,
        }))
    }

    fn children_mut(&mut self) -> &mut [Box<dyn PhysicalOperator>] {
        std::slice::from_mut(&mut self.child)
    }
}

/// A view over the child's row through the projection expressions.
pub struct ExpressionTuple<'a> {
    exprs: &'a [Expr],
    specs: &'a [TupleCellSpec],
    child: Box<dyn Tuple + 'a>,
    ctx: &'a ExecutionContext,
}

impl Tuple for ExpressionTuple<'_> {
    fn cell_count(&self) -> usize {
        self.exprs.len()
    }

    fn cell_at(&self, idx: usize) -> Result<Value<'_>> {
        let expr = self
            .exprs
            .get(idx)
            .ok_or_else(|| DbError::Internal(format!("tuple cell {idx} out of range")))?;
        expr.get_value(&*self.child, self.ctx)
    }

    fn spec_at(&self, idx: usize) -> Result<&TupleCellSpec> {
        self.specs
            .get(idx)
            .ok_or_else(|| DbError::Internal(format!("tuple cell {idx} out of range")))
    }
}
