//! # Predicate
//!
//! Pass-through filter over an arbitrary child. Unlike the leniency built
//! into scans, evaluation errors here propagate: above the storage boundary
//! a failing expression is a statement bug, not a bad row.

use crate::error::{DbError, Result};
use crate::exec::{ExecutionContext, PhysicalOperator};
use crate::expr::{Expr, Tuple};
use crate::storage::RowId;

pub struct PredicateOperator {
    predicate: Expr,
    child: Box<dyn PhysicalOperator>,
    ctx: Option<ExecutionContext>,
}

impl PredicateOperator {
    pub fn new(predicate: Expr, child: Box<dyn PhysicalOperator>) -> PredicateOperator {
        PredicateOperator {
            predicate,
            child,
            ctx: None,
        }
    }
}

impl PhysicalOperator for PredicateOperator {
    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.ctx = Some(ctx.clone());
        self.child.open(ctx)
    }

    fn next(&mut self) -> Result<bool> {
        let ctx = self
            .ctx
            .clone()
            .ok_or_else(|| DbError::Internal("filter advanced before open".into()))?;
        while self.child.next()? {
            let keep = {
                let tuple = self.child.current_tuple()?;
                self.predicate.get_value(&*tuple, &ctx)?.get_boolean()
            };
            if keep {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn close(&mut self) -> Result<()> {
        self.ctx = None;
        self.child.close()
    }

    fn current_tuple(&self) -> Result<Box<dyn Tuple + '_>> {
        self.child.current_tuple()
    }

    fn current_row_id(&self) -> Option<RowId> {
        self.child.current_row_id()
    }

    fn children_mut(&mut self) -> &mut [Box<dyn PhysicalOperator>] {
        std::slice::from_mut(&mut self.child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::TableScanOperator;
    use crate::expr::CompOp;
    use crate::schema::{FieldDef, TableSchema};
    use crate::storage::Table;
    use crate::txn::TransactionManager;
    use crate::types::{AttrType, Value};
    use std::sync::Arc;

    #[test]
    fn test_filters_and_forwards_row_ids() {
        let schema =
            TableSchema::new(&[FieldDef::new("n", AttrType::Int, 0, false)]).unwrap();
        let table = Arc::new(Table::new("t", schema));
        let mgr = TransactionManager::new();
        let ctx = ExecutionContext::new(mgr.begin());
        for n in 1..=4 {
            let record = table.make_record(&[Value::Int(n)]).unwrap();
            ctx.txn().insert_record(&table, record).unwrap();
        }
        let predicate = Expr::comparison(
            CompOp::Gt,
            Expr::field("t", "n", AttrType::Int),
            Some(Expr::literal(Value::Int(2))),
        );
        let scan = TableScanOperator::new(table, vec![]);
        let mut filter = PredicateOperator::new(predicate, Box::new(scan));
        filter.open(&ctx).unwrap();
        let mut seen = Vec::new();
        while filter.next().unwrap() {
            assert!(filter.current_row_id().is_some());
            seen.push(filter.current_tuple().unwrap().cell_at(0).unwrap().to_owned_static());
        }
        filter.close().unwrap();
        assert_eq!(seen, vec![Value::Int(3), Value::Int(4)]);
    }
}
