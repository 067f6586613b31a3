//! # Record Schema
//!
//! Fixed-width record layout: a null bitmap followed by one slot per field
//! in declaration order.
//!
//! ```text
//! +-------------+--------+--------+-----+--------+
//! | null bitmap | slot 0 | slot 1 | ... | slot n |
//! +-------------+--------+--------+-----+--------+
//! ```
//!
//! The bitmap is `(field_count + 7) / 8` bytes; bit `i` set means field `i`
//! is NULL (its slot bytes are then zero and carry no meaning). Slot widths:
//! INT/FLOAT/DATE 4 bytes little-endian, BOOLEAN 1 byte, CHAR the declared
//! length NUL-padded on the right, TEXT a fixed 16-byte LOB reference.
//!
//! CHAR values read back with trailing NULs trimmed, so the padding never
//! leaks into comparisons. Writers must zero-fill the slot remainder for the
//! same reason.

use hashbrown::HashMap;

use crate::error::{DbError, Result};
use crate::types::{AttrType, Value};

#[derive(Debug, Clone)]
pub struct FieldMeta {
    pub name: String,
    pub attr_type: AttrType,
    /// Byte offset of the slot from the start of the record.
    pub offset: usize,
    /// Slot width in bytes.
    pub len: usize,
    /// Position in declaration order; also the null bitmap bit index.
    pub field_id: usize,
    pub nullable: bool,
}

/// Input to schema construction.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub attr_type: AttrType,
    /// Declared length for CHAR; ignored for fixed-size types.
    pub len: usize,
    pub nullable: bool,
}

impl FieldDef {
    pub fn new(name: &str, attr_type: AttrType, len: usize, nullable: bool) -> FieldDef {
        FieldDef {
            name: name.to_string(),
            attr_type,
            len,
            nullable,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    fields: Vec<FieldMeta>,
    by_name: HashMap<String, usize>,
    bitmap_len: usize,
    record_len: usize,
}

impl TableSchema {
    pub fn new(defs: &[FieldDef]) -> Result<TableSchema> {
        if defs.is_empty() {
            return Err(DbError::InvalidArgument("schema with no fields".into()));
        }
        let bitmap_len = (defs.len() + 7) / 8;
        let mut offset = bitmap_len;
        let mut fields = Vec::with_capacity(defs.len());
        let mut by_name = HashMap::with_capacity(defs.len());
        for (field_id, def) in defs.iter().enumerate() {
            let len = match def.attr_type.fixed_size() {
                Some(n) => n,
                None if def.attr_type == AttrType::Char => {
                    if def.len == 0 {
                        return Err(DbError::InvalidArgument(format!(
                            "CHAR field {} needs a length",
                            def.name
                        )));
                    }
                    def.len
                }
                None => {
                    return Err(DbError::InvalidArgument(format!(
                        "field {} has no storable type",
                        def.name
                    )))
                }
            };
            if by_name.insert(def.name.clone(), field_id).is_some() {
                return Err(DbError::InvalidArgument(format!(
                    "duplicate field name {}",
                    def.name
                )));
            }
            fields.push(FieldMeta {
                name: def.name.clone(),
                attr_type: def.attr_type,
                offset,
                len,
                field_id,
                nullable: def.nullable,
            });
            offset += len;
        }
        Ok(TableSchema {
            fields,
            by_name,
            bitmap_len,
            record_len: offset,
        })
    }

    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    pub fn field(&self, field_id: usize) -> Result<&FieldMeta> {
        self.fields
            .get(field_id)
            .ok_or_else(|| DbError::SchemaFieldMissing(format!("field id {field_id}")))
    }

    pub fn field_by_name(&self, name: &str) -> Result<&FieldMeta> {
        self.by_name
            .get(name)
            .map(|&i| &self.fields[i])
            .ok_or_else(|| DbError::SchemaFieldMissing(name.to_string()))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn record_len(&self) -> usize {
        self.record_len
    }

    pub fn is_null(&self, record: &[u8], field_id: usize) -> bool {
        record[field_id / 8] & (1 << (field_id % 8)) != 0
    }

    pub fn set_null(&self, record: &mut [u8], field_id: usize, null: bool) {
        if null {
            record[field_id / 8] |= 1 << (field_id % 8);
        } else {
            record[field_id / 8] &= !(1 << (field_id % 8));
        }
    }

    /// Raw slot bytes of a field, padding included. Index keys are built
    /// from these slices directly.
    pub fn slot<'r>(&self, record: &'r [u8], field: &FieldMeta) -> Result<&'r [u8]> {
        record
            .get(field.offset..field.offset + field.len)
            .ok_or_else(|| {
                DbError::Internal(format!(
                    "record too short for field {} ({} bytes)",
                    field.name,
                    record.len()
                ))
            })
    }

    pub fn slot_mut<'r>(&self, record: &'r mut [u8], field: &FieldMeta) -> Result<&'r mut [u8]> {
        let short = record.len() < field.offset + field.len;
        if short {
            return Err(DbError::Internal(format!(
                "record too short for field {}",
                field.name
            )));
        }
        Ok(&mut record[field.offset..field.offset + field.len])
    }

    /// Decodes a fixed-representation field from its slot. TEXT is not
    /// decodable here: its slot holds a LOB reference the storage layer must
    /// resolve.
    pub fn decode_fixed<'r>(&self, record: &'r [u8], field: &FieldMeta) -> Result<Value<'r>> {
        if self.is_null(record, field.field_id) {
            return Ok(Value::Null);
        }
        let slot = self.slot(record, field)?;
        Ok(match field.attr_type {
            AttrType::Int => Value::Int(i32::from_le_bytes(slot4(slot)?)),
            AttrType::Date => Value::Date(i32::from_le_bytes(slot4(slot)?)),
            AttrType::Float => Value::Float(f32::from_le_bytes(slot4(slot)?)),
            AttrType::Bool => Value::Bool(slot[0] != 0),
            AttrType::Char => {
                let end = slot.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                Value::Char(std::borrow::Cow::Borrowed(&slot[..end]))
            }
            AttrType::Text | AttrType::Undefined => {
                return Err(DbError::Internal(format!(
                    "field {} has no fixed decoding",
                    field.name
                )))
            }
        })
    }

    /// Encodes a fixed-representation value into its slot and clears the
    /// null bit. The value must already have the field's type. CHAR input
    /// longer than the declared length is rejected; shorter input NUL-pads.
    pub fn encode_fixed(&self, record: &mut [u8], field: &FieldMeta, value: &Value<'_>) -> Result<()> {
        if value.is_null() {
            if !field.nullable {
                return Err(DbError::InvalidArgument(format!(
                    "field {} is not nullable",
                    field.name
                )));
            }
            self.set_null(record, field.field_id, true);
            let slot = self.slot_mut(record, field)?;
            slot.fill(0);
            return Ok(());
        }
        self.set_null(record, field.field_id, false);
        let field_name = field.name.clone();
        let slot = self.slot_mut(record, field)?;
        match (field.attr_type, value) {
            (AttrType::Int, Value::Int(v)) => slot.copy_from_slice(&v.to_le_bytes()),
            (AttrType::Date, Value::Date(v)) => slot.copy_from_slice(&v.to_le_bytes()),
            (AttrType::Float, Value::Float(v)) => slot.copy_from_slice(&v.to_le_bytes()),
            (AttrType::Bool, Value::Bool(v)) => slot[0] = *v as u8,
            (AttrType::Char, Value::Char(b)) => {
                if b.len() > slot.len() {
                    return Err(DbError::InvalidArgument(format!(
                        "value too long for CHAR({}) field {}",
                        slot.len(),
                        field_name
                    )));
                }
                slot[..b.len()].copy_from_slice(b);
                slot[b.len()..].fill(0);
            }
            _ => {
                return Err(DbError::SchemaFieldTypeMismatch(format!(
                    "cannot store {} value in {} field {}",
                    value.attr_type(),
                    field.attr_type,
                    field_name
                )))
            }
        }
        Ok(())
    }
}

fn slot4(slot: &[u8]) -> Result<[u8; 4]> {
    slot.try_into()
        .map_err(|_| DbError::Internal("4-byte slot expected".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> TableSchema {
        TableSchema::new(&[
            FieldDef::new("id", AttrType::Int, 0, false),
            FieldDef::new("name", AttrType::Char, 8, true),
            FieldDef::new("score", AttrType::Float, 0, true),
        ])
        .unwrap()
    }

    #[test]
    fn test_layout_offsets() {
        let schema = sample_schema();
        // 3 fields -> 1 bitmap byte.
        assert_eq!(schema.field(0).unwrap().offset, 1);
        assert_eq!(schema.field(1).unwrap().offset, 5);
        assert_eq!(schema.field(2).unwrap().offset, 13);
        assert_eq!(schema.record_len(), 17);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let schema = sample_schema();
        let mut record = vec![0u8; schema.record_len()];
        schema
            .encode_fixed(&mut record, schema.field(0).unwrap(), &Value::Int(42))
            .unwrap();
        schema
            .encode_fixed(
                &mut record,
                schema.field(1).unwrap(),
                &Value::char_from_str("bob"),
            )
            .unwrap();
        schema
            .encode_fixed(&mut record, schema.field(2).unwrap(), &Value::Null)
            .unwrap();

        assert_eq!(
            schema
                .decode_fixed(&record, schema.field(0).unwrap())
                .unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            schema
                .decode_fixed(&record, schema.field(1).unwrap())
                .unwrap(),
            Value::char_from_str("bob")
        );
        assert_eq!(
            schema
                .decode_fixed(&record, schema.field(2).unwrap())
                .unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_char_padding_trimmed_on_read() {
        let schema = sample_schema();
        let field = schema.field_by_name("name").unwrap().clone();
        let mut record = vec![0u8; schema.record_len()];
        schema
            .encode_fixed(&mut record, &field, &Value::char_from_str("ab"))
            .unwrap();
        let slot = schema.slot(&record, &field).unwrap();
        assert_eq!(slot, b"ab\0\0\0\0\0\0");
        assert_eq!(
            schema.decode_fixed(&record, &field).unwrap(),
            Value::char_from_str("ab")
        );
    }

    #[test]
    fn test_char_overflow_rejected() {
        let schema = sample_schema();
        let field = schema.field_by_name("name").unwrap().clone();
        let mut record = vec![0u8; schema.record_len()];
        let long = Value::char_from_str("way too long for eight");
        assert!(schema.encode_fixed(&mut record, &field, &long).is_err());
    }

    #[test]
    fn test_not_null_enforced() {
        let schema = sample_schema();
        let field = schema.field_by_name("id").unwrap().clone();
        let mut record = vec![0u8; schema.record_len()];
        assert!(schema.encode_fixed(&mut record, &field, &Value::Null).is_err());
    }

    #[test]
    fn test_rejects_bad_definitions() {
        assert!(TableSchema::new(&[]).is_err());
        assert!(TableSchema::new(&[FieldDef::new("c", AttrType::Char, 0, false)]).is_err());
        assert!(TableSchema::new(&[
            FieldDef::new("a", AttrType::Int, 0, false),
            FieldDef::new("a", AttrType::Int, 0, false),
        ])
        .is_err());
    }
}
