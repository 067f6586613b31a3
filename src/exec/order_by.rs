//! # Order By
//!
//! Blocking sort. `open` drains the child into owned tuples, computes every
//! sort key up front, and performs one stable multi-key sort; `next` then
//! replays the buffer. Keys are pre-computed so the comparator is pure and
//! infallible.
//!
//! NULL sorts before every non-NULL value under an ascending key, after
//! them under a descending one.

use std::cmp::Ordering;

use crate::error::{DbError, Result};
use crate::exec::{ExecutionContext, PhysicalOperator};
use crate::expr::{Expr, Tuple, ValueListTuple};
use crate::types::Value;

pub struct OrderByOperator {
    child: Box<dyn PhysicalOperator>,
    /// Key expression plus ascending flag, in significance order.
    keys: Vec<(Expr, bool)>,
    buffer: Vec<(Vec<Value<'static>>, ValueListTuple)>,
    pos: Option<usize>,
}

impl OrderByOperator {
    pub fn new(child: Box<dyn PhysicalOperator>, keys: Vec<(Expr, bool)>) -> OrderByOperator {
        OrderByOperator {
            child,
            keys,
            buffer: Vec::new(),
            pos: None,
        }
    }
}

impl PhysicalOperator for OrderByOperator {
    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.buffer.clear();
        self.pos = None;
        self.child.open(ctx)?;
        while self.child.next()? {
            let snapshot = {
                let tuple = self.child.current_tuple()?;
                ValueListTuple::snapshot(&*tuple)?
            };
            let mut key_values = Vec::with_capacity(self.keys.len());
            for (expr, _) in &self.keys {
                key_values.push(expr.get_value(&snapshot, ctx)?);
            }
            self.buffer.push((key_values, snapshot));
        }
        let keys = &self.keys;
        self.buffer.sort_by(|(a, _), (b, _)| {
            for ((_, ascending), (ka, kb)) in keys.iter().zip(a.iter().zip(b.iter())) {
                let mut ord = ka.compare_for_sort(kb);
                if !ascending {
                    ord = ord.reverse();
                }
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Ok(())
    }

    fn next(&mut self) -> Result<bool> {
        let next = self.pos.map_or(0, |p| p + 1);
        self.pos = Some(next);
        Ok(next < self.buffer.len())
    }

    fn close(&mut self) -> Result<()> {
        self.buffer.clear();
        self.pos = None;
        self.child.close()
    }

    fn current_tuple(&self) -> Result<Box<dyn Tuple + '_>> {
        let pos = self
            .pos
            .filter(|&p| p < self.buffer.len())
            .ok_or_else(|| DbError::Internal("sort has no current row".into()))?;
        Ok(Box::new(&self.buffer[pos].1 as &dyn Tuple))
    }

    fn children_mut(&mut self) -> &mut [Box<dyn PhysicalOperator>] {
        std::slice::from_mut(&mut self.child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::TableScanOperator;
    use crate::schema::{FieldDef, TableSchema};
    use crate::storage::Table;
    use crate::txn::TransactionManager;
    use crate::types::AttrType;
    use std::sync::Arc;

    fn setup_sorted(
        rows: Vec<(Value<'static>, &str)>,
        keys: Vec<(Expr, bool)>,
    ) -> Vec<(Value<'static>, Value<'static>)> {
        let schema = TableSchema::new(&[
            FieldDef::new("age", AttrType::Int, 0, true),
            FieldDef::new("name", AttrType::Char, 8, false),
        ])
        .unwrap();
        let table = Arc::new(Table::new("people", schema));
        let mgr = TransactionManager::new();
        let ctx = ExecutionContext::new(mgr.begin());
        for (age, name) in rows {
            let record = table
                .make_record(&[age, Value::char_from_str(name)])
                .unwrap();
            ctx.txn().insert_record(&table, record).unwrap();
        }
        let scan = TableScanOperator::new(table, vec![]);
        let mut sort = OrderByOperator::new(Box::new(scan), keys);
        sort.open(&ctx).unwrap();
        let mut out = Vec::new();
        while sort.next().unwrap() {
            let tuple = sort.current_tuple().unwrap();
            out.push((
                tuple.cell_at(0).unwrap().to_owned_static(),
                tuple.cell_at(1).unwrap().to_owned_static(),
            ));
        }
        sort.close().unwrap();
        out
    }

    fn age_key(ascending: bool) -> (Expr, bool) {
        (Expr::field("people", "age", AttrType::Int), ascending)
    }

    fn name_key(ascending: bool) -> (Expr, bool) {
        (Expr::field("people", "name", AttrType::Char), ascending)
    }

    #[test]
    fn test_single_key_ascending() {
        let out = setup_sorted(
            vec![
                (Value::Int(30), "c"),
                (Value::Int(10), "a"),
                (Value::Int(20), "b"),
            ],
            vec![age_key(true)],
        );
        let ages: Vec<_> = out.iter().map(|(a, _)| a.clone()).collect();
        assert_eq!(ages, vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
    }

    #[test]
    fn test_multi_key_mixed_directions() {
        let out = setup_sorted(
            vec![
                (Value::Int(20), "ann"),
                (Value::Int(10), "bob"),
                (Value::Int(20), "zoe"),
                (Value::Int(10), "ann"),
            ],
            vec![age_key(true), name_key(false)],
        );
        let expect = vec![
            (Value::Int(10), Value::char_from_str("bob")),
            (Value::Int(10), Value::char_from_str("ann")),
            (Value::Int(20), Value::char_from_str("zoe")),
            (Value::Int(20), Value::char_from_str("ann")),
        ];
        assert_eq!(out, expect);
    }

    #[test]
    fn test_null_sorts_first_ascending() {
        let out = setup_sorted(
            vec![
                (Value::Int(5), "a"),
                (Value::Null, "b"),
                (Value::Int(-3), "c"),
            ],
            vec![age_key(true)],
        );
        let ages: Vec<_> = out.iter().map(|(a, _)| a.clone()).collect();
        assert_eq!(ages, vec![Value::Null, Value::Int(-3), Value::Int(5)]);
    }

    #[test]
    fn test_null_sorts_last_descending() {
        let out = setup_sorted(
            vec![(Value::Int(5), "a"), (Value::Null, "b")],
            vec![age_key(false)],
        );
        let ages: Vec<_> = out.iter().map(|(a, _)| a.clone()).collect();
        assert_eq!(ages, vec![Value::Int(5), Value::Null]);
    }

    #[test]
    fn test_empty_input() {
        let out = setup_sorted(vec![], vec![age_key(true)]);
        assert!(out.is_empty());
    }
}
