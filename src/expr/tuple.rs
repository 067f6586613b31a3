//! # Tuples
//!
//! The row abstraction expression evaluation works against. Three shapes:
//!
//! - [`RowTuple`] borrows a record's bytes and decodes cells on demand; it
//!   is only alive while the scan is positioned on that row.
//! - [`ValueListTuple`] owns its cells. Snapshots of scan rows become value
//!   lists before they outlive the row (sort buffers, subquery outer rows).
//! - [`CompositeTuple`] concatenates sub-tuples positionally for correlated
//!   evaluation. It only accepts owned (`'static`) sub-tuples: composing a
//!   live scan row is a use-after-advance bug, and the type rules it out.
//!
//! Cells are addressed by position or by [`TupleCellSpec`]. Spec matching is
//! deliberately loose on the table side: an unqualified field name matches
//! any table, which is how single-table statements resolve columns.

use crate::error::{DbError, Result};
use crate::storage::Table;
use crate::types::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleCellSpec {
    pub table: String,
    pub field: String,
}

impl TupleCellSpec {
    pub fn new(table: &str, field: &str) -> TupleCellSpec {
        TupleCellSpec {
            table: table.to_string(),
            field: field.to_string(),
        }
    }

    /// Field names must agree; table names only when both sides carry one.
    pub fn matches(&self, other: &TupleCellSpec) -> bool {
        if self.field != other.field {
            return false;
        }
        self.table.is_empty() || other.table.is_empty() || self.table == other.table
    }
}

pub trait Tuple {
    fn cell_count(&self) -> usize;

    fn cell_at(&self, idx: usize) -> Result<Value<'_>>;

    fn spec_at(&self, idx: usize) -> Result<&TupleCellSpec>;

    /// Positional lookup by spec. The first matching cell wins, which gives
    /// the earliest added sub-tuple priority inside composite tuples.
    fn find_cell(&self, spec: &TupleCellSpec) -> Result<Value<'_>> {
        for idx in 0..self.cell_count() {
            if self.spec_at(idx)?.matches(spec) {
                return self.cell_at(idx);
            }
        }
        Err(DbError::SchemaFieldMissing(format!(
            "{}.{}",
            spec.table, spec.field
        )))
    }
}

impl<T: Tuple + ?Sized> Tuple for &T {
    fn cell_count(&self) -> usize {
        (**self).cell_count()
    }

    fn cell_at(&self, idx: usize) -> Result<Value<'_>> {
        (**self).cell_at(idx)
    }

    fn spec_at(&self, idx: usize) -> Result<&TupleCellSpec> {
        (**self).spec_at(idx)
    }
}

/// A record positioned under a scan. Cells decode lazily from the record
/// bytes; CHAR cells borrow the slot, TEXT cells materialize from the LOB
/// store.
pub struct RowTuple<'a> {
    table: &'a Table,
    record: &'a [u8],
    specs: Vec<TupleCellSpec>,
}

impl<'a> RowTuple<'a> {
    pub fn new(table: &'a Table, record: &'a [u8]) -> RowTuple<'a> {
        let specs = table
            .schema()
            .fields()
            .iter()
            .map(|f| TupleCellSpec::new(table.name(), &f.name))
            .collect();
        RowTuple {
            table,
            record,
            specs,
        }
    }

    pub fn record(&self) -> &'a [u8] {
        self.record
    }
}

impl Tuple for RowTuple<'_> {
    fn cell_count(&self) -> usize {
        self.specs.len()
    }

    fn cell_at(&self, idx: usize) -> Result<Value<'_>> {
        if idx >= self.specs.len() {
            return Err(DbError::Internal(format!("tuple cell {idx} out of range")));
        }
        self.table.value_at(self.record, idx)
    }

    fn spec_at(&self, idx: usize) -> Result<&TupleCellSpec> {
        self.specs
            .get(idx)
            .ok_or_else(|| DbError::Internal(format!("tuple cell {idx} out of range")))
    }
}

/// Fully materialized tuple. The only tuple shape safe to keep across scan
/// advancement.
#[derive(Debug, Clone, Default)]
pub struct ValueListTuple {
    specs: Vec<TupleCellSpec>,
    cells: Vec<Value<'static>>,
}

impl ValueListTuple {
    pub fn new(specs: Vec<TupleCellSpec>, cells: Vec<Value<'static>>) -> ValueListTuple {
        debug_assert_eq!(specs.len(), cells.len());
        ValueListTuple { specs, cells }
    }

    /// Deep-copies every cell of `src`, flattening whatever shape it has
    /// into one positional value list.
    pub fn snapshot(src: &dyn Tuple) -> Result<ValueListTuple> {
        let mut specs = Vec::with_capacity(src.cell_count());
        let mut cells = Vec::with_capacity(src.cell_count());
        for idx in 0..src.cell_count() {
            specs.push(src.spec_at(idx)?.clone());
            cells.push(src.cell_at(idx)?.to_owned_static());
        }
        Ok(ValueListTuple { specs, cells })
    }

    pub fn cells(&self) -> &[Value<'static>] {
        &self.cells
    }
}

impl Tuple for ValueListTuple {
    fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn cell_at(&self, idx: usize) -> Result<Value<'_>> {
        self.cells
            .get(idx)
            .map(Value::borrow_ref)
            .ok_or_else(|| DbError::Internal(format!("tuple cell {idx} out of range")))
    }

    fn spec_at(&self, idx: usize) -> Result<&TupleCellSpec> {
        self.specs
            .get(idx)
            .ok_or_else(|| DbError::Internal(format!("tuple cell {idx} out of range")))
    }
}

/// Positional concatenation of owned sub-tuples. Cell indices run through
/// the first tuple's cells, then the second's, and so on.
#[derive(Default)]
pub struct CompositeTuple {
    tuples: Vec<Box<dyn Tuple + Send + 'static>>,
}

impl CompositeTuple {
    pub fn new() -> CompositeTuple {
        CompositeTuple::default()
    }

    pub fn add_tuple(&mut self, tuple: Box<dyn Tuple + Send + 'static>) {
        self.tuples.push(tuple);
    }
}

impl Tuple for CompositeTuple {
    fn cell_count(&self) -> usize {
        self.tuples.iter().map(|t| t.cell_count()).sum()
    }

    fn cell_at(&self, idx: usize) -> Result<Value<'_>> {
        let mut rest = idx;
        for tuple in &self.tuples {
            if rest < tuple.cell_count() {
                return tuple.cell_at(rest);
            }
            rest -= tuple.cell_count();
        }
        Err(DbError::Internal(format!("tuple cell {idx} out of range")))
    }

    fn spec_at(&self, idx: usize) -> Result<&TupleCellSpec> {
        let mut rest = idx;
        for tuple in &self.tuples {
            if rest < tuple.cell_count() {
                return tuple.spec_at(rest);
            }
            rest -= tuple.cell_count();
        }
        Err(DbError::Internal(format!("tuple cell {idx} out of range")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, TableSchema};
    use crate::types::AttrType;

    fn table() -> Table {
        let schema = TableSchema::new(&[
            FieldDef::new("id", AttrType::Int, 0, false),
            FieldDef::new("name", AttrType::Char, 8, true),
        ])
        .unwrap();
        Table::new("users", schema)
    }

    #[test]
    fn test_spec_matching() {
        let qualified = TupleCellSpec::new("users", "id");
        let bare = TupleCellSpec::new("", "id");
        let other_table = TupleCellSpec::new("orders", "id");
        assert!(qualified.matches(&bare));
        assert!(bare.matches(&other_table));
        assert!(!qualified.matches(&other_table));
        assert!(!qualified.matches(&TupleCellSpec::new("users", "name")));
    }

    #[test]
    fn test_row_tuple_decodes_cells() {
        let t = table();
        let record = t
            .make_record(&[Value::Int(3), Value::char_from_str("eve")])
            .unwrap();
        let row = RowTuple::new(&t, &record);
        assert_eq!(row.cell_count(), 2);
        assert_eq!(row.cell_at(0).unwrap(), Value::Int(3));
        assert_eq!(
            row.find_cell(&TupleCellSpec::new("", "name")).unwrap(),
            Value::char_from_str("eve")
        );
        assert!(row.find_cell(&TupleCellSpec::new("", "missing")).is_err());
    }

    #[test]
    fn test_snapshot_outlives_record() {
        let t = table();
        let snap = {
            let record = t
                .make_record(&[Value::Int(3), Value::char_from_str("eve")])
                .unwrap();
            let row = RowTuple::new(&t, &record);
            ValueListTuple::snapshot(&row).unwrap()
        };
        assert_eq!(snap.cell_at(1).unwrap(), Value::char_from_str("eve"));
    }

    #[test]
    fn test_composite_positional_order() {
        let inner = ValueListTuple::new(
            vec![TupleCellSpec::new("a", "x"), TupleCellSpec::new("a", "y")],
            vec![Value::Int(1), Value::Int(2)],
        );
        let outer = ValueListTuple::new(
            vec![TupleCellSpec::new("b", "z")],
            vec![Value::Int(3)],
        );
        let mut composite = CompositeTuple::new();
        composite.add_tuple(Box::new(inner));
        composite.add_tuple(Box::new(outer));

        assert_eq!(composite.cell_count(), 3);
        assert_eq!(composite.cell_at(0).unwrap(), Value::Int(1));
        assert_eq!(composite.cell_at(2).unwrap(), Value::Int(3));
        assert_eq!(composite.spec_at(2).unwrap(), &TupleCellSpec::new("b", "z"));
        assert!(composite.cell_at(3).is_err());
    }

    #[test]
    fn test_nested_composite_flattens_in_snapshot() {
        let mut inner = CompositeTuple::new();
        inner.add_tuple(Box::new(ValueListTuple::new(
            vec![TupleCellSpec::new("a", "x")],
            vec![Value::Int(1)],
        )));
        let mut outer = CompositeTuple::new();
        outer.add_tuple(Box::new(inner));
        outer.add_tuple(Box::new(ValueListTuple::new(
            vec![TupleCellSpec::new("b", "y")],
            vec![Value::Int(2)],
        )));

        let snap = ValueListTuple::snapshot(&outer).unwrap();
        assert_eq!(snap.cell_count(), 2);
        assert_eq!(snap.cells(), &[Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_composite_first_match_wins() {
        let mut composite = CompositeTuple::new();
        composite.add_tuple(Box::new(ValueListTuple::new(
            vec![TupleCellSpec::new("inner", "id")],
            vec![Value::Int(10)],
        )));
        composite.add_tuple(Box::new(ValueListTuple::new(
            vec![TupleCellSpec::new("outer", "id")],
            vec![Value::Int(20)],
        )));
        // Unqualified lookup resolves to the first sub-tuple added.
        assert_eq!(
            composite.find_cell(&TupleCellSpec::new("", "id")).unwrap(),
            Value::Int(10)
        );
        assert_eq!(
            composite
                .find_cell(&TupleCellSpec::new("outer", "id"))
                .unwrap(),
            Value::Int(20)
        );
    }
}
