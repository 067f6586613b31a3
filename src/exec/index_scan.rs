//! # Index Scan
//!
//! Range scan driven by an index. Bounds arrive as typed values, are encoded
//! into key bytes through the index's own key encoding, and the matching
//! row ids are fetched from the table, visibility-checked and filtered
//! exactly like a table scan.

use std::sync::Arc;

use tracing::warn;

use crate::error::{DbError, Result};
use crate::exec::{ExecutionContext, PhysicalOperator};
use crate::expr::{CompositeTuple, Expr, RowTuple, Tuple, ValueListTuple};
use crate::storage::{Index, IndexScanner, RowId, Table};
use crate::txn::Visibility;
use crate::types::Value;

/// One side of the key range.
#[derive(Debug, Clone)]
pub struct RangeBound {
    pub values: Vec<Value<'static>>,
    pub inclusive: bool,
}

enum Current {
    Plain { rid: RowId, data: Vec<u8> },
    Composite(CompositeTuple, RowId),
}

pub struct IndexScanOperator {
    table: Arc<Table>,
    index: Arc<Index>,
    low: Option<RangeBound>,
    high: Option<RangeBound>,
    predicates: Vec<Expr>,
    outer: Option<ValueListTuple>,
    ctx: Option<ExecutionContext>,
    scanner: Option<IndexScanner>,
    current: Option<Current>,
}

impl IndexScanOperator {
    pub fn new(
        table: Arc<Table>,
        index: Arc<Index>,
        low: Option<RangeBound>,
        high: Option<RangeBound>,
        predicates: Vec<Expr>,
    ) -> IndexScanOperator {
        IndexScanOperator {
            table,
            index,
            low,
            high,
            predicates,
            outer: None,
            ctx: None,
            scanner: None,
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

impl PhysicalOperator for IndexScanOperator {
    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.ctx = Some(ctx.clone());
        let schema = self.table.schema();
        let low_key = match &self.low {
            Some(b) => Some((self.index.key_from_values(schema, &b.values)?, b.inclusive)),
            None => None,
        };
        let high_key = match &self.high {
            Some(b) => Some((self.index.key_from_values(schema, &b.values)?, b.inclusive)),
            None => None,
        };
        self.scanner = Some(self.index.create_scanner(
            low_key.as_ref().map(|(k, _)| k.as_slice()),
            low_key.as_ref().map(|(_, i)| *i).unwrap_or(false),
            high_key.as_ref().map(|(k, _)| k.as_slice()),
            high_key.as_ref().map(|(_, i)| *i).unwrap_or(false),
        ));
        self.current = None;
        Ok(())
    }

    fn next(&mut self) -> Result<bool> {
        let ctx = self
            .ctx
            .clone()
            .ok_or_else(|| DbError::Internal("scan advanced before open".into()))?;
        self.current = None;
        loop {
            let rid = match self.scanner.as_mut().and_then(IndexScanner::next) {
                Some(rid) => rid,
                None => return Ok(false),
            };
            if ctx.txn().visit_record(&self.table, rid)? == Visibility::Invisible {
                continue;
            }
            let record = self.table.get_record(rid)?;
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
                    self.current = Some(Current::Plain {
                        rid,
                        data: record.data,
                    });
                    return Ok(true);
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.scanner = None;
        self.current = None;
        self.ctx = None;
        Ok(())
    }

    fn current_tuple(&self) -> Result<Box<dyn Tuple + '_>> {
        match &self.current {
            Some(Current::Plain { data, .. }) => {
                Ok(Box::new(RowTuple::new(&self.table, data)))
            }
            Some(Current::Composite(composite, _)) => Ok(Box::new(composite as &dyn Tuple)),
            None => Err(DbError::Internal("scan has no current row".into())),
        }
    }

    fn current_row_id(&self) -> Option<RowId> {
        match &self.current {
            Some(Current::Plain { rid, .. }) => Some(*rid),
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
    use crate::schema::{FieldDef, TableSchema};
    use crate::storage::IndexMeta;
    use crate::txn::{Transaction, TransactionManager};
    use crate::types::AttrType;

    fn setup() -> (Arc<Table>, Arc<Index>, TransactionManager) {
        let schema = TableSchema::new(&[
            FieldDef::new("id", AttrType::Int, 0, false),
            FieldDef::new("name", AttrType::Char, 8, false),
        ])
        .unwrap();
        let table = Arc::new(Table::new("users", schema));
        let index = table
            .create_index(IndexMeta {
                name: "by_name".into(),
                fields: vec!["name".into()],
                unique: false,
            })
            .unwrap();
        (table, index, TransactionManager::new())
    }

    fn run(scan: &mut IndexScanOperator, ctx: &ExecutionContext) -> Vec<i32> {
        scan.open(ctx).unwrap();
        let mut out = Vec::new();
        while scan.next().unwrap() {
            match scan.current_tuple().unwrap().cell_at(0).unwrap() {
                Value::Int(v) => out.push(v),
                other => panic!("unexpected {other:?}"),
            }
        }
        scan.close().unwrap();
        out
    }

    #[test]
    fn test_range_scan_in_key_order() {
        let (table, index, mgr) = setup();
        let txn = mgr.begin();
        for (id, name) in [(1, "carol"), (2, "alice"), (3, "bob"), (4, "dave")] {
            let record = table
                .make_record(&[Value::Int(id), Value::char_from_str(name)])
                .unwrap();
            txn.insert_record(&table, record).unwrap();
        }
        let ctx = ExecutionContext::new(txn);
        let mut scan = IndexScanOperator::new(
            table,
            index,
            Some(RangeBound {
                values: vec![Value::char_from_str("alice")],
                inclusive: true,
            }),
            Some(RangeBound {
                values: vec![Value::char_from_str("carol")],
                inclusive: true,
            }),
            vec![],
        );
        // Key order, not insertion order.
        assert_eq!(run(&mut scan, &ctx), vec![2, 3, 1]);
    }

    #[test]
    fn test_exclusive_bounds() {
        let (table, index, mgr) = setup();
        let txn = mgr.begin();
        for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
            let record = table
                .make_record(&[Value::Int(id), Value::char_from_str(name)])
                .unwrap();
            txn.insert_record(&table, record).unwrap();
        }
        let ctx = ExecutionContext::new(txn);
        let mut scan = IndexScanOperator::new(
            table,
            index,
            Some(RangeBound {
                values: vec![Value::char_from_str("a")],
                inclusive: false,
            }),
            Some(RangeBound {
                values: vec![Value::char_from_str("c")],
                inclusive: false,
            }),
            vec![],
        );
        assert_eq!(run(&mut scan, &ctx), vec![2]);
    }

    #[test]
    fn test_numeric_bounds_cover_multi_byte_values() {
        let schema = TableSchema::new(&[
            FieldDef::new("id", AttrType::Int, 0, false),
            FieldDef::new("name", AttrType::Char, 8, false),
        ])
        .unwrap();
        let table = Arc::new(Table::new("users", schema));
        let index = table
            .create_index(IndexMeta {
                name: "by_id".into(),
                fields: vec!["id".into()],
                unique: false,
            })
            .unwrap();
        let mgr = TransactionManager::new();
        let txn = mgr.begin();
        for (id, name) in [(256, "a"), (1, "b"), (2, "c"), (-7, "d")] {
            let record = table
                .make_record(&[Value::Int(id), Value::char_from_str(name)])
                .unwrap();
            txn.insert_record(&table, record).unwrap();
        }
        let ctx = ExecutionContext::new(txn);
        let mut scan = IndexScanOperator::new(
            table,
            index,
            Some(RangeBound {
                values: vec![Value::Int(1)],
                inclusive: true,
            }),
            Some(RangeBound {
                values: vec![Value::Int(300)],
                inclusive: true,
            }),
            vec![],
        );
        // 256 falls inside the range and after 2; -7 falls outside.
        assert_eq!(run(&mut scan, &ctx), vec![1, 2, 256]);
    }

    #[test]
    fn test_invisible_rows_skipped() {
        let (table, index, mgr) = setup();
        let early = mgr.begin();
        let late = mgr.begin();
        let record = table
            .make_record(&[Value::Int(1), Value::char_from_str("zed")])
            .unwrap();
        late.insert_record(&table, record).unwrap();
        let ctx = ExecutionContext::new(early);
        let mut scan = IndexScanOperator::new(table, index, None, None, vec![]);
        assert_eq!(run(&mut scan, &ctx), Vec::<i32>::new());
    }

    #[test]
    fn test_residual_predicate_applies() {
        let (table, index, mgr) = setup();
        let txn = mgr.begin();
        for (id, name) in [(1, "a"), (20, "b"), (3, "c")] {
            let record = table
                .make_record(&[Value::Int(id), Value::char_from_str(name)])
                .unwrap();
            txn.insert_record(&table, record).unwrap();
        }
        let predicate = Expr::comparison(
            crate::expr::CompOp::Lt,
            Expr::field("users", "id", AttrType::Int),
            Some(Expr::literal(Value::Int(10))),
        );
        let ctx = ExecutionContext::new(txn);
        let mut scan = IndexScanOperator::new(table, index, None, None, vec![predicate]);
        assert_eq!(run(&mut scan, &ctx), vec![1, 3]);
    }
}
