//! # Columnar Chunks
//!
//! Batch-mode data layout for vectorized expression evaluation. A `Chunk` is
//! a set of equal-length `Column`s; a `Column` is a typed vector plus a
//! constant flag. Constant columns hold exactly one physical element and
//! stand for that value repeated across every row of the chunk, which lets
//! literal operands participate in vectorized kernels without materializing
//! them per row.
//!
//! DATE shares INT's physical storage (both are `i32` day counts or
//! integers); the column's `attr_type` keeps them apart at the value level.
//!
//! The columnar path carries no NULL bitmap. Chunk-mode evaluation is only
//! planned over non-nullable inputs; nullable data takes the row path.

use crate::error::{DbError, Result};
use crate::types::{AttrType, Value};

#[derive(Debug, Clone)]
pub enum ColumnData {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Bool(Vec<bool>),
    Bytes(Vec<Vec<u8>>),
}

impl ColumnData {
    fn for_type(attr_type: AttrType, capacity: usize) -> Result<ColumnData> {
        Ok(match attr_type {
            AttrType::Int | AttrType::Date => ColumnData::Int(Vec::with_capacity(capacity)),
            AttrType::Float => ColumnData::Float(Vec::with_capacity(capacity)),
            AttrType::Bool => ColumnData::Bool(Vec::with_capacity(capacity)),
            AttrType::Char | AttrType::Text => ColumnData::Bytes(Vec::with_capacity(capacity)),
            AttrType::Undefined => {
                return Err(DbError::Internal("column of undefined type".into()))
            }
        })
    }

    fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Bytes(v) => v.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    attr_type: AttrType,
    data: ColumnData,
    constant: bool,
}

impl Column {
    pub fn new(attr_type: AttrType, capacity: usize) -> Result<Column> {
        Ok(Column {
            attr_type,
            data: ColumnData::for_type(attr_type, capacity)?,
            constant: false,
        })
    }

    /// A single-element column standing for `value` in every row.
    pub fn new_constant(value: &Value<'_>) -> Result<Column> {
        let attr_type = value.attr_type();
        let mut column = Column {
            attr_type,
            data: ColumnData::for_type(attr_type, 1)?,
            constant: true,
        };
        column.append_value(value)?;
        Ok(column)
    }

    pub fn attr_type(&self) -> AttrType {
        self.attr_type
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    /// Physical element count: 1 for constant columns.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    pub fn append_value(&mut self, value: &Value<'_>) -> Result<()> {
        match (&mut self.data, value) {
            (ColumnData::Int(v), Value::Int(x)) => v.push(*x),
            (ColumnData::Int(v), Value::Date(x)) => v.push(*x),
            (ColumnData::Float(v), Value::Float(x)) => v.push(*x),
            (ColumnData::Bool(v), Value::Bool(x)) => v.push(*x),
            (ColumnData::Bytes(v), Value::Char(b) | Value::Text(b)) => v.push(b.to_vec()),
            _ => {
                return Err(DbError::SchemaFieldTypeMismatch(format!(
                    "cannot append {} value to {} column",
                    value.attr_type(),
                    self.attr_type
                )))
            }
        }
        Ok(())
    }

    /// Reads the value at `row`, answering the constant value for any row of
    /// a constant column.
    pub fn get_value(&self, row: usize) -> Result<Value<'static>> {
        let idx = if self.constant { 0 } else { row };
        let oob = || DbError::Internal(format!("column row {idx} out of range"));
        Ok(match &self.data {
            ColumnData::Int(v) => {
                let x = *v.get(idx).ok_or_else(oob)?;
                if self.attr_type == AttrType::Date {
                    Value::Date(x)
                } else {
                    Value::Int(x)
                }
            }
            ColumnData::Float(v) => Value::Float(*v.get(idx).ok_or_else(oob)?),
            ColumnData::Bool(v) => Value::Bool(*v.get(idx).ok_or_else(oob)?),
            ColumnData::Bytes(v) => {
                let b = v.get(idx).ok_or_else(oob)?.clone();
                if self.attr_type == AttrType::Text {
                    Value::Text(b.into())
                } else {
                    Value::Char(b.into())
                }
            }
        })
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.data {
            ColumnData::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            ColumnData::Float(v) => Some(v),
            _ => None,
        }
    }

}

/// Named columns of equal logical length.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Chunk {
    pub fn new() -> Chunk {
        Chunk::default()
    }

    pub fn add_column(&mut self, name: impl Into<String>, column: Column) {
        self.names.push(name.into());
        self.columns.push(column);
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, idx: usize) -> Result<&Column> {
        self.columns
            .get(idx)
            .ok_or_else(|| DbError::Internal(format!("chunk column {idx} out of range")))
    }

    pub fn column_by_name(&self, name: &str) -> Option<(usize, &Column)> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| (i, &self.columns[i]))
    }

    /// Logical row count: the length of any non-constant column, or 1 when
    /// every column is constant.
    pub fn rows(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| !c.is_constant())
            .map(Column::len)
            .max()
            .unwrap_or(if self.columns.is_empty() { 0 } else { 1 })
    }
}
