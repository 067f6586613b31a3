//! # GraniteDB
//!
//! The query-execution core of an embedded relational database: a typed
//! nullable value system, row- and chunk-mode expression evaluation, and an
//! iterator-model physical operator tree running over in-memory MVCC
//! storage.
//!
//! ## Architecture
//!
//! ```text
//! plan      SelectStatement -> LogicalPlan -> PhysicalOperator tree
//! exec      table/index scans, insert, update, sort, filter, project,
//!           scalar aggregation
//! expr      Expr tree, tuples, aggregators, correlated subqueries
//! types     AttrType, Value, Chunk/Column, date arithmetic
//! schema    fixed-width record layout with null bitmap
//! storage   tables, ordered indexes, LOB arena
//! txn       visibility and mutation hooks (MVCC-lite)
//! ```
//!
//! ## Execution Model
//!
//! Operators follow the open/next/close contract with a separate
//! `current_tuple` accessor. Row visibility is decided by the transaction in
//! the [`exec::ExecutionContext`]; invisible rows are skipped, never
//! errors. Correlated subqueries replan from an immutable expression
//! snapshot on every outer row and receive the outer tuple by deep copy.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use granitedb::exec::{ExecutionContext, PhysicalOperator};
//! use granitedb::expr::Expr;
//! use granitedb::plan::{plan_select, SelectStatement};
//! use granitedb::schema::{FieldDef, TableSchema};
//! use granitedb::storage::Table;
//! use granitedb::txn::TransactionManager;
//! use granitedb::types::{AttrType, Value};
//!
//! # fn main() -> granitedb::Result<()> {
//! let schema = TableSchema::new(&[FieldDef::new("id", AttrType::Int, 0, false)])?;
//! let table = Arc::new(Table::new("t", schema));
//! let manager = TransactionManager::new();
//! let ctx = ExecutionContext::new(manager.begin());
//! let record = table.make_record(&[Value::Int(1)])?;
//! ctx.txn().insert_record(&table, record)?;
//!
//! let stmt = SelectStatement::new(table, vec![Expr::field("t", "id", AttrType::Int)]);
//! let mut op = plan_select(&stmt)?;
//! op.open(&ctx)?;
//! while op.next()? {
//!     let tuple = op.current_tuple()?;
//!     assert_eq!(tuple.cell_at(0)?, Value::Int(1));
//! }
//! op.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod exec;
pub mod expr;
pub mod plan;
pub mod schema;
pub mod storage;
pub mod txn;
pub mod types;

pub use error::{DbError, Result};
