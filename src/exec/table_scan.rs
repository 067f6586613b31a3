//! # Table Scan
//!
//! Full scan over a table snapshot in row id order. Rows invisible to the
//! transaction are skipped silently. Predicate evaluation failures other
//! than structural ones (broken invariants, unknown fields) downgrade to
//! "row filtered out" with a warning, so one malformed row cannot abort a
//! statement.
//!
//! When a correlated outer row has been pushed down, each candidate row is
//! snapshotted and composed behind the outer values before predicates run,
//! and the composite is what `current_tuple` serves. Outer cells occupy the
//! leading positions.

use std::sync::Arc;

use tracing::warn;

use crate::error::{DbError, Result};
use crate::exec::{ExecutionContext, PhysicalOperator};
use crate::expr::{CompositeTuple, Expr, RowTuple, Tuple, ValueListTuple};
use crate::storage::{RowId, StoredRecord, Table};
use crate::txn::Visibility;

enum Current {
    /// Index into the row snapshot; `current_tuple` decodes in place.
    Plain(usize),
    /// Owned composite of the row snapshot and the outer row.
    Composite(CompositeTuple, RowId),
}

pub struct TableScanOperator {
    table: Arc<Table>,
    predicates: Vec<Expr>,
    outer: Option<ValueListTuple>,
    ctx: Option<ExecutionContext>,
    rows: Vec<(RowId, StoredRecord)>,
    pos: usize,
    current: Option<Current>,
}

impl TableScanOperator {
    pub fn new(table: Arc<Table>, predicates: Vec<Expr>) -> TableScanOperator {
        TableScanOperator {
            table,
            predicates,
            outer: None,
            ctx: None,
            rows: Vec::new(),
            pos: 0,
            current: None,
        }
    }

    fn passes(&self, tuple: &dyn Tuple, ctx: &ExecutionContext) -> Result<bool> {
        for predicate in &self.predicates {
            match predicate.get_value(tuple, ctx) {
                Ok(v) => {
                    if !v.get_boolean() {
                        return Ok(false);
                    }
                }
                Err(e) if e.is_structural() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "predicate evaluation failed, row filtered out");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

impl PhysicalOperator for TableScanOperator {
    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.ctx = Some(ctx.clone());
        self.rows = self.table.record_scanner();
        self.pos = 0;
        self.current = None;
        Ok(())
    }

    fn next(&mut self) -> Result<bool> {
        let ctx = self
            .ctx
            .clone()
            .ok_or_else(|| DbError::Internal("scan advanced before open".into()))?;
        self.current = None;
        while self.pos < self.rows.len() {
            let idx = self.pos;
            self.pos += 1;
            let (rid, record) = &self.rows[idx];
            let rid = *rid;
            if ctx.txn().visit_record(&self.table, rid)? == Visibility::Invisible {
                continue;
            }
            if let Some(outer) = &self.outer {
                let snapshot = {
                    let row = RowTuple::new(&self.table, &record.data);
                    ValueListTuple::snapshot(&row)?
                };
                let mut composite = CompositeTuple::new();
                composite.add_tuple(Box::new(outer.clone()));
                composite.add_tuple(Box::new(snapshot));
                if self.passes(&composite, &ctx)? {
                    self.current = Some(Current::Composite(composite, rid));
                    return Ok(true);
                }
            } else {
                let keep = {
                    let row = RowTuple::new(&self.table, &record.data);
                    self.passes(&row, &ctx)?
                };
                if keep {
                    self.current = Some(Current::Plain(idx));
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn close(&mut self) -> Result<()> {
        self.rows.clear();
        self.pos = 0;
        self.current = None;
        self.ctx = None;
        Ok(())
    }

    fn current_tuple(&self) -> Result<Box<dyn Tuple + '_>> {
        match &self.current {
            Some(Current::Plain(idx)) => {
                let (_, record) = &self.rows[*idx];
                Ok(Box::new(RowTuple::new(&self.table, &record.data)))
            }
            Some(Current::Composite(composite, _)) => Ok(Box::new(composite as &dyn Tuple)),
            None => Err(DbError::Internal("scan has no current row".into())),
        }
    }

    fn current_row_id(&self) -> Option<RowId> {
        match &self.current {
            Some(Current::Plain(idx)) => Some(self.rows[*idx].0),
            Some(Current::Composite(_, rid)) => Some(*rid),
            None => None,
        }
    }

    fn set_outer_tuple(&mut self, outer: Option<&ValueListTuple>) {
        self.outer = outer.cloned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{CompOp, TupleCellSpec};
    use crate::schema::{FieldDef, TableSchema};
    use crate::txn::TransactionManager;
    use crate::types::{AttrType, Value};

    fn setup() -> (Arc<Table>, TransactionManager) {
        let schema = TableSchema::new(&[
            FieldDef::new("id", AttrType::Int, 0, false),
            FieldDef::new("age", AttrType::Int, 0, true),
        ])
        .unwrap();
        (Arc::new(Table::new("people", schema)), TransactionManager::new())
    }

    fn insert(table: &Table, txn: &dyn crate::txn::Transaction, id: i32, age: Value<'static>) {
        let record = table.make_record(&[Value::Int(id), age]).unwrap();
        txn.insert_record(table, record).unwrap();
    }

    #[test]
    fn test_scan_visits_each_visible_row_once() {
        let (table, mgr) = setup();
        let txn = mgr.begin();
        for id in 1..=3 {
            insert(&table, &*txn, id, Value::Int(id * 10));
        }
        let ctx = ExecutionContext::new(txn);
        let mut scan = TableScanOperator::new(table, vec![]);
        scan.open(&ctx).unwrap();
        let mut seen = Vec::new();
        while scan.next().unwrap() {
            let tuple = scan.current_tuple().unwrap();
            seen.push(match tuple.cell_at(0).unwrap() {
                Value::Int(v) => v,
                other => panic!("unexpected {other:?}"),
            });
        }
        scan.close().unwrap();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_predicate_filters_rows() {
        let (table, mgr) = setup();
        let txn = mgr.begin();
        for id in 1..=5 {
            insert(&table, &*txn, id, Value::Int(id * 10));
        }
        let predicate = Expr::comparison(
            CompOp::Gt,
            Expr::field("people", "age", AttrType::Int),
            Some(Expr::literal(Value::Int(25))),
        );
        let ctx = ExecutionContext::new(txn);
        let mut scan = TableScanOperator::new(table, vec![predicate]);
        scan.open(&ctx).unwrap();
        let mut count = 0;
        while scan.next().unwrap() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_null_rows_fail_comparisons() {
        let (table, mgr) = setup();
        let txn = mgr.begin();
        insert(&table, &*txn, 1, Value::Null);
        insert(&table, &*txn, 2, Value::Int(50));
        let predicate = Expr::comparison(
            CompOp::Lt,
            Expr::field("people", "age", AttrType::Int),
            Some(Expr::literal(Value::Int(100))),
        );
        let ctx = ExecutionContext::new(txn);
        let mut scan = TableScanOperator::new(table, vec![predicate]);
        scan.open(&ctx).unwrap();
        assert!(scan.next().unwrap());
        assert_eq!(scan.current_tuple().unwrap().cell_at(0).unwrap(), Value::Int(2));
        assert!(!scan.next().unwrap());
    }

    #[test]
    fn test_invisible_rows_skipped() {
        let (table, mgr) = setup();
        let early = mgr.begin();
        let late = mgr.begin();
        insert(&table, &*late, 1, Value::Int(10));
        let ctx = ExecutionContext::new(early);
        let mut scan = TableScanOperator::new(table.clone(), vec![]);
        scan.open(&ctx).unwrap();
        assert!(!scan.next().unwrap());
        scan.close().unwrap();

        let ctx = ExecutionContext::new(late);
        let mut scan = TableScanOperator::new(table, vec![]);
        scan.open(&ctx).unwrap();
        assert!(scan.next().unwrap());
    }

    #[test]
    fn test_outer_tuple_composes_with_rows() {
        let (table, mgr) = setup();
        let txn = mgr.begin();
        insert(&table, &*txn, 1, Value::Int(30));
        insert(&table, &*txn, 2, Value::Int(40));
        let outer = ValueListTuple::new(
            vec![TupleCellSpec::new("outer", "limit")],
            vec![Value::Int(35)],
        );
        // age > outer.limit, a correlated predicate shape.
        let predicate = Expr::comparison(
            CompOp::Gt,
            Expr::field("people", "age", AttrType::Int),
            Some(Expr::field("outer", "limit", AttrType::Int)),
        );
        let ctx = ExecutionContext::new(txn);
        let mut scan = TableScanOperator::new(table, vec![predicate]);
        scan.set_outer_tuple(Some(&outer));
        scan.open(&ctx).unwrap();
        assert!(scan.next().unwrap());
        {
            let tuple = scan.current_tuple().unwrap();
            // Outer cells lead, scan cells follow.
            assert_eq!(tuple.cell_count(), 3);
            assert_eq!(tuple.cell_at(0).unwrap(), Value::Int(35));
            assert_eq!(tuple.cell_at(1).unwrap(), Value::Int(2));
            assert_eq!(tuple.cell_at(2).unwrap(), Value::Int(40));
        }
        assert!(!scan.next().unwrap());
    }

    #[test]
    fn test_close_without_open_is_ok() {
        let (table, _) = setup();
        let mut scan = TableScanOperator::new(table, vec![]);
        assert!(scan.close().is_ok());
    }

    #[test]
    fn test_missing_field_is_structural_error() {
        let (table, mgr) = setup();
        let txn = mgr.begin();
        insert(&table, &*txn, 1, Value::Int(10));
        let predicate = Expr::comparison(
            CompOp::Eq,
            Expr::field("people", "no_such_field", AttrType::Int),
            Some(Expr::literal(Value::Int(1))),
        );
        let ctx = ExecutionContext::new(txn);
        let mut scan = TableScanOperator::new(table, vec![predicate]);
        scan.open(&ctx).unwrap();
        assert!(matches!(
            scan.next().unwrap_err(),
            DbError::SchemaFieldMissing(_)
        ));
    }
}
