//! # Physical Operators
//!
//! Iterator-model execution. Every operator implements the same contract:
//!
//! ```text
//! open(ctx) -> next()* -> close()
//! ```
//!
//! `next` returns `Ok(true)` when positioned on a row and `Ok(false)` at end
//! of stream; `current_tuple` is only meaningful between a true `next` and
//! the following call. `close` is idempotent and safe on a never-opened
//! operator.
//!
//! The [`ExecutionContext`] carries everything evaluation needs from the
//! session: today that is the transaction. It is cloned freely into
//! subquery executions instead of living in thread-local state.

mod aggregate;
mod index_scan;
mod insert;
mod order_by;
mod predicate;
mod project;
mod table_scan;
mod update;

use std::sync::Arc;

use crate::error::Result;
use crate::expr::{Tuple, ValueListTuple};
use crate::storage::RowId;
use crate::txn::Transaction;

pub use aggregate::ScalarAggregateOperator;
pub use index_scan::{IndexScanOperator, RangeBound};
pub use insert::InsertOperator;
pub use order_by::OrderByOperator;
pub use predicate::PredicateOperator;
pub use project::ProjectOperator;
pub use table_scan::TableScanOperator;
pub use update::UpdateOperator;

#[derive(Clone)]
pub struct ExecutionContext {
    txn: Arc<dyn Transaction>,
}

impl ExecutionContext {
    pub fn new(txn: Arc<dyn Transaction>) -> ExecutionContext {
        ExecutionContext { txn }
    }

    pub fn txn(&self) -> &Arc<dyn Transaction> {
        &self.txn
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("txn", &self.txn.id())
            .finish()
    }
}

pub trait PhysicalOperator: Send {
    fn open(&mut self, ctx: &ExecutionContext) -> Result<()>;

    /// Advances to the next row. `Ok(false)` means end of stream.
    fn next(&mut self) -> Result<bool>;

    fn close(&mut self) -> Result<()>;

    fn current_tuple(&self) -> Result<Box<dyn Tuple + '_>>;

    /// Row id of the current row, for operators positioned directly on
    /// storage. Decorators forward it; producers of derived tuples answer
    /// `None`.
    fn current_row_id(&self) -> Option<RowId> {
        None
    }

    fn children_mut(&mut self) -> &mut [Box<dyn PhysicalOperator>] {
        &mut []
    }

    /// Propagates the correlated outer row down to every scan leaf. Called
    /// before `open`; non-leaf operators just recurse.
    fn set_outer_tuple(&mut self, outer: Option<&ValueListTuple>) {
        for child in self.children_mut() {
            child.set_outer_tuple(outer);
        }
    }
}
