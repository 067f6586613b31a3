//! # Scalar Aggregation
//!
//! Ungrouped aggregation: drains the child, feeds every row through the
//! accumulators, and emits exactly one result tuple. The result cells are
//! named after the aggregates' display forms (`COUNT(id)`), which is how
//! downstream `AggregateRef` expressions resolve them.
//!
//! COUNT(*) is expressed as COUNT over a constant-1 child expression, so an
//! all-NULL column still counts rows when the caller means rows.

use crate::error::{DbError, Result};
use crate::exec::{ExecutionContext, PhysicalOperator};
use crate::expr::{create_aggregator, AggregateRefExpr, Tuple, TupleCellSpec, ValueListTuple};

pub struct ScalarAggregateOperator {
    child: Box<dyn PhysicalOperator>,
    aggregates: Vec<AggregateRefExpr>,
    result: Option<ValueListTuple>,
    emitted: bool,
}

impl ScalarAggregateOperator {
    pub fn new(
        child: Box<dyn PhysicalOperator>,
        aggregates: Vec<AggregateRefExpr>,
    ) -> ScalarAggregateOperator {
        ScalarAggregateOperator {
            child,
            aggregates,
            result: None,
            emitted: false,
        }
    }
}

impl PhysicalOperator for ScalarAggregateOperator {
    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.result = None;
        self.emitted = false;
        if self.aggregates.is_empty() {
            return Err(DbError::Internal("aggregation without aggregates".into()));
        }
        let mut accumulators: Vec<_> = self
            .aggregates
            .iter()
            .map(|a| create_aggregator(a.kind))
            .collect();
        self.child.open(ctx)?;
        while self.child.next()? {
            let tuple = self.child.current_tuple()?;
            for (aggregate, acc) in self.aggregates.iter().zip(accumulators.iter_mut()) {
                let value = aggregate.child.get_value(&*tuple, ctx)?;
                acc.accumulate(&value)?;
            }
        }
        let mut specs = Vec::with_capacity(self.aggregates.len());
        let mut cells = Vec::with_capacity(self.aggregates.len());
        for (aggregate, acc) in self.aggregates.iter().zip(accumulators.iter()) {
            specs.push(TupleCellSpec::new("", &aggregate.display_name()));
            cells.push(acc.evaluate()?);
        }
        self.result = Some(ValueListTuple::new(specs, cells));
        Ok(())
    }

    fn next(&mut self) -> Result<bool> {
        if self.result.is_some() && !self.emitted {
            self.emitted = true;
            return Ok(true);
        }
        Ok(false)
    }

    fn close(&mut self) -> Result<()> {
        self.result = None;
        self.emitted = false;
        self.child.close()
    }

    fn current_tuple(&self) -> Result<Box<dyn Tuple + '_>> {
        match (&self.result, self.emitted) {
            (Some(result), true) => Ok(Box::new(result as &dyn Tuple)),
            _ => Err(DbError::Internal("aggregation has no current row".into())),
        }
    }

    fn children_mut(&mut self) -> &mut [Box<dyn PhysicalOperator>] {
        std::slice::from_mut(&mut self.child)
    }
}
