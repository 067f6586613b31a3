//! # Planning
//!
//! A bound [`SelectStatement`] lowers to a thin [`LogicalPlan`], which in
//! turn builds the physical operator tree. Lowering clones expression
//! subtrees out of the statement instead of moving them, so the same
//! statement can be planned any number of times and always produces the
//! same plan. Subquery re-execution depends on exactly that property.
//!
//! Pipeline shape, bottom up: scan (table or index range), sort,
//! scalar aggregation when the output references aggregates, projection.

use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::exec::{
    IndexScanOperator, OrderByOperator, PhysicalOperator, ProjectOperator, RangeBound,
    ScalarAggregateOperator, TableScanOperator,
};
use crate::expr::{AggregateRefExpr, Expr};
use crate::storage::{Index, Table};

/// Key range over a named index, chosen at binding time.
#[derive(Debug, Clone)]
pub struct IndexRange {
    pub index_name: String,
    pub low: Option<RangeBound>,
    pub high: Option<RangeBound>,
}

/// A fully bound single-table select.
#[derive(Debug, Clone)]
pub struct SelectStatement {
    pub table: Arc<Table>,
    pub output: Vec<Expr>,
    pub predicates: Vec<Expr>,
    /// Sort keys with ascending flags, in significance order.
    pub order_by: Vec<(Expr, bool)>,
    pub index_range: Option<IndexRange>,
}

impl SelectStatement {
    pub fn new(table: Arc<Table>, output: Vec<Expr>) -> SelectStatement {
        SelectStatement {
            table,
            output,
            predicates: Vec::new(),
            order_by: Vec::new(),
            index_range: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum LogicalPlan {
    TableScan {
        table: Arc<Table>,
        predicates: Vec<Expr>,
    },
    IndexScan {
        table: Arc<Table>,
        index: Arc<Index>,
        low: Option<RangeBound>,
        high: Option<RangeBound>,
        predicates: Vec<Expr>,
    },
    Sort {
        input: Box<LogicalPlan>,
        keys: Vec<(Expr, bool)>,
    },
    Aggregate {
        input: Box<LogicalPlan>,
        aggregates: Vec<AggregateRefExpr>,
    },
    Project {
        input: Box<LogicalPlan>,
        exprs: Vec<Expr>,
    },
}

/// Lowers a statement without consuming it.
pub fn logical_plan(stmt: &SelectStatement) -> Result<LogicalPlan> {
    let mut plan = match &stmt.index_range {
        Some(range) => {
            let index = stmt.table.find_index(&range.index_name).ok_or_else(|| {
                DbError::InvalidArgument(format!("no index named {}", range.index_name))
            })?;
            LogicalPlan::IndexScan {
                table: stmt.table.clone(),
                index,
                low: range.low.clone(),
                high: range.high.clone(),
                predicates: stmt.predicates.clone(),
            }
        }
        None => LogicalPlan::TableScan {
            table: stmt.table.clone(),
            predicates: stmt.predicates.clone(),
        },
    };
    if !stmt.order_by.is_empty() {
        plan = LogicalPlan::Sort {
            input: Box::new(plan),
            keys: stmt.order_by.clone(),
        };
    }
    let mut aggregates = Vec::new();
    for expr in &stmt.output {
        collect_aggregates(expr, &mut aggregates);
    }
    if !aggregates.is_empty() {
        plan = LogicalPlan::Aggregate {
            input: Box::new(plan),
            aggregates,
        };
    }
    Ok(LogicalPlan::Project {
        input: Box::new(plan),
        exprs: stmt.output.clone(),
    })
}

pub fn physical_plan(plan: &LogicalPlan) -> Result<Box<dyn PhysicalOperator>> {
    Ok(match plan {
        LogicalPlan::TableScan { table, predicates } => Box::new(TableScanOperator::new(
            table.clone(),
            predicates.clone(),
        )),
        LogicalPlan::IndexScan {
            table,
            index,
            low,
            high,
            predicates,
        } => Box::new(IndexScanOperator::new(
            table.clone(),
            index.clone(),
            low.clone(),
            high.clone(),
            predicates.clone(),
        )),
        LogicalPlan::Sort { input, keys } => Box::new(OrderByOperator::new(
            physical_plan(input)?,
            keys.clone(),
        )),
        LogicalPlan::Aggregate { input, aggregates } => Box::new(ScalarAggregateOperator::new(
            physical_plan(input)?,
            aggregates.clone(),
        )),
        LogicalPlan::Project { input, exprs } => Box::new(ProjectOperator::new(
            exprs.clone(),
            physical_plan(input)?,
        )),
    })
}

/// Plans and builds the operator tree for a statement in one step.
pub fn plan_select(stmt: &SelectStatement) -> Result<Box<dyn PhysicalOperator>> {
    physical_plan(&logical_plan(stmt)?)
}

fn collect_aggregates(expr: &Expr, out: &mut Vec<AggregateRefExpr>) {
    match expr {
        Expr::AggregateRef(a) => {
            if !out.iter().any(|x| x.display_name() == a.display_name()) {
                out.push(a.clone());
            }
        }
        Expr::Cast(c) => collect_aggregates(&c.child, out),
        Expr::Comparison(c) => {
            collect_aggregates(&c.left, out);
            if let Some(right) = &c.right {
                collect_aggregates(right, out);
            }
        }
        Expr::Conjunction(c) => {
            for child in &c.children {
                collect_aggregates(child, out);
            }
        }
        Expr::Arithmetic(a) => {
            collect_aggregates(&a.left, out);
            if let Some(right) = &a.right {
                collect_aggregates(right, out);
            }
        }
        Expr::Field(_) | Expr::Literal(_) | Expr::Subquery(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecutionContext;
    use crate::expr::{AggregateKind, CompOp};
    use crate::schema::{FieldDef, TableSchema};
    use crate::txn::TransactionManager;
    use crate::types::{AttrType, Value};

    fn setup() -> (Arc<Table>, ExecutionContext) {
        let schema = TableSchema::new(&[
            FieldDef::new("id", AttrType::Int, 0, false),
            FieldDef::new("age", AttrType::Int, 0, true),
        ])
        .unwrap();
        let table = Arc::new(Table::new("people", schema));
        let mgr = TransactionManager::new();
        let ctx = ExecutionContext::new(mgr.begin());
        for (id, age) in [(1, 30), (2, 10), (3, 20)] {
            let record = table
                .make_record(&[Value::Int(id), Value::Int(age)])
                .unwrap();
            ctx.txn().insert_record(&table, record).unwrap();
        }
        (table, ctx)
    }

    fn run(stmt: &SelectStatement, ctx: &ExecutionContext) -> Vec<Vec<Value<'static>>> {
        let mut op = plan_select(stmt).unwrap();
        op.open(ctx).unwrap();
        let mut rows = Vec::new();
        while op.next().unwrap() {
            let tuple = op.current_tuple().unwrap();
            let mut row = Vec::new();
            for i in 0..tuple.cell_count() {
                row.push(tuple.cell_at(i).unwrap().to_owned_static());
            }
            rows.push(row);
        }
        op.close().unwrap();
        rows
    }

    #[test]
    fn test_scan_filter_sort_project() {
        let (table, ctx) = setup();
        let mut stmt = SelectStatement::new(
            table,
            vec![Expr::field("people", "id", AttrType::Int)],
        );
        stmt.predicates.push(Expr::comparison(
            CompOp::Gt,
            Expr::field("people", "age", AttrType::Int),
            Some(Expr::literal(Value::Int(15))),
        ));
        stmt.order_by
            .push((Expr::field("people", "age", AttrType::Int), true));
        let rows = run(&stmt, &ctx);
        assert_eq!(rows, vec![vec![Value::Int(3)], vec![Value::Int(1)]]);
    }

    #[test]
    fn test_aggregate_pipeline() {
        let (table, ctx) = setup();
        let stmt = SelectStatement::new(
            table,
            vec![
                Expr::AggregateRef(AggregateRefExpr {
                    kind: AggregateKind::Sum,
                    child: Box::new(Expr::field("people", "age", AttrType::Int)),
                }),
                Expr::AggregateRef(AggregateRefExpr {
                    kind: AggregateKind::Count,
                    child: Box::new(Expr::literal(Value::Int(1))),
                }),
            ],
        );
        let rows = run(&stmt, &ctx);
        assert_eq!(rows, vec![vec![Value::Int(60), Value::Int(3)]]);
    }

    #[test]
    fn test_planning_is_repeatable() {
        let (table, ctx) = setup();
        let stmt = SelectStatement::new(
            table,
            vec![Expr::field("people", "id", AttrType::Int)],
        );
        let first = run(&stmt, &ctx);
        // The statement is untouched by planning; replanning gives the same
        // result.
        let second = run(&stmt, &ctx);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_missing_index_is_error() {
        let (table, _) = setup();
        let mut stmt = SelectStatement::new(
            table,
            vec![Expr::field("people", "id", AttrType::Int)],
        );
        stmt.index_range = Some(IndexRange {
            index_name: "nope".into(),
            low: None,
            high: None,
        });
        assert!(logical_plan(&stmt).is_err());
    }
}
