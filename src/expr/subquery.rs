//! # Subquery Expressions
//!
//! A subquery node owns a bound [`SelectStatement`] plus an immutable
//! snapshot of that statement's output expressions. Every invocation builds
//! a fresh logical and physical plan from a clone of the statement with its
//! output restored from the snapshot, so evaluating the subquery N times
//! yields N identical plans no matter what planning did to the previous
//! clone.
//!
//! Correlation works by value, not by reference: the outer tuple is
//! deep-copied into a [`ValueListTuple`] and pushed down to every scan leaf
//! before `open`, so inner predicates can resolve outer fields while the
//! outer scan stays free to advance.

use crate::error::{DbError, Result};
use crate::exec::ExecutionContext;
use crate::expr::expression::Expr;
use crate::expr::tuple::{Tuple, ValueListTuple};
use crate::plan::{logical_plan, physical_plan, SelectStatement};
use crate::types::{AttrType, Value};

#[derive(Debug, Clone)]
pub struct SubqueryExpr {
    statement: SelectStatement,
    /// Retained copy of the statement's output expressions, the source of
    /// truth each (re)planning starts from.
    snapshot: Vec<Expr>,
    expected_columns: usize,
}

impl SubqueryExpr {
    pub fn new(statement: SelectStatement) -> Result<SubqueryExpr> {
        if statement.output.is_empty() {
            return Err(DbError::InvalidArgument(
                "subquery selects no columns".into(),
            ));
        }
        let snapshot = statement.output.clone();
        let expected_columns = snapshot.len();
        Ok(SubqueryExpr {
            statement,
            snapshot,
            expected_columns,
        })
    }

    pub fn value_type(&self) -> AttrType {
        self.snapshot[0].value_type()
    }

    /// Runs the subquery once and collects its first output column.
    pub fn execute(
        &self,
        ctx: &ExecutionContext,
        outer: Option<&dyn Tuple>,
    ) -> Result<Vec<Value<'static>>> {
        let mut stmt = self.statement.clone();
        stmt.output = self.snapshot.clone();
        let logical = logical_plan(&stmt)?;
        let mut operator = physical_plan(&logical)?;

        let outer_snapshot = match outer {
            Some(t) => Some(ValueListTuple::snapshot(t)?),
            None => None,
        };
        operator.set_outer_tuple(outer_snapshot.as_ref());

        operator.open(ctx)?;
        let mut values = Vec::new();
        let result = loop {
            match operator.next() {
                Ok(false) => break Ok(()),
                Ok(true) => {
                    let tuple = match operator.current_tuple() {
                        Ok(t) => t,
                        Err(e) => break Err(e),
                    };
                    if tuple.cell_count() != self.expected_columns {
                        break Err(DbError::InvalidArgument(format!(
                            "subquery produced {} columns, expected {}",
                            tuple.cell_count(),
                            self.expected_columns
                        )));
                    }
                    match tuple.cell_at(0) {
                        Ok(v) => values.push(v.to_owned_static()),
                        Err(e) => break Err(e),
                    }
                }
                Err(e) => break Err(e),
            }
        };
        operator.close()?;
        result?;
        Ok(values)
    }

    /// Scalar form: NULL over an empty result, an error past one row.
    pub fn execute_single(
        &self,
        ctx: &ExecutionContext,
        outer: Option<&dyn Tuple>,
    ) -> Result<Value<'static>> {
        let mut values = self.execute(ctx, outer)?;
        match values.len() {
            0 => Ok(Value::Null),
            1 => Ok(values.pop().unwrap_or(Value::Null)),
            n => Err(DbError::InvalidArgument(format!(
                "scalar subquery produced {n} rows"
            ))),
        }
    }
}
