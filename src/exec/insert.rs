//! # Insert
//!
//! Leaf operator inserting a batch of rows. All work happens in `open`;
//! `next` reports an immediately empty stream.
//!
//! The batch is atomic at statement level: if any row fails (typically a
//! unique key violation), every row already inserted by this statement is
//! compensated with a delete, in reverse order, and the original error
//! propagates.

use std::sync::Arc;

use tracing::warn;

use crate::error::{DbError, Result};
use crate::exec::{ExecutionContext, PhysicalOperator};
use crate::expr::Tuple;
use crate::storage::{RowId, Table};
use crate::types::Value;

pub struct InsertOperator {
    table: Arc<Table>,
    rows: Vec<Vec<Value<'static>>>,
    inserted: Vec<RowId>,
}

impl InsertOperator {
    pub fn new(table: Arc<Table>, rows: Vec<Vec<Value<'static>>>) -> InsertOperator {
        InsertOperator {
            table,
            rows,
            inserted: Vec::new(),
        }
    }

    /// Row ids created by the last `open`, in insertion order.
    pub fn inserted(&self) -> &[RowId] {
        &self.inserted
    }
}

impl PhysicalOperator for InsertOperator {
    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.inserted.clear();
        let txn = ctx.txn();
        for values in &self.rows {
            let record = match self.table.make_record(values) {
                Ok(r) => r,
                Err(e) => return self.rollback(ctx, e),
            };
            match txn.insert_record(&self.table, record) {
                Ok(rid) => self.inserted.push(rid),
                Err(e) => return self.rollback(ctx, e),
            }
        }
        Ok(())
    }

    fn next(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn current_tuple(&self) -> Result<Box<dyn Tuple + '_>> {
        Err(DbError::Internal("insert produces no tuples".into()))
    }
}

impl InsertOperator {
    fn rollback(&mut self, ctx: &ExecutionContext, cause: DbError) -> Result<()> {
        for &rid in self.inserted.iter().rev() {
            if let Err(e) = ctx.txn().delete_record(&self.table, rid) {
                // The original failure still propagates; the compensation
                // failure is only logged.
                warn!(error = %e, rid, "compensating delete failed during insert rollback");
            }
        }
        self.inserted.clear();
        Err(cause)
    }
}
