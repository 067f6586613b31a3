//! # Tables
//!
//! In-memory table storage: records keyed by row id, a LOB arena for TEXT
//! payloads, and the table's secondary indexes. Records carry the
//! `txn_min`/`txn_max` pair the transaction layer interprets; the table
//! itself never decides visibility.
//!
//! Deletion is a mark (`txn_max`), but index entries are removed eagerly so
//! a unique key can be reinserted inside the same statement after a
//! compensating delete.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use zerocopy::{FromBytes, IntoBytes};

use crate::error::{DbError, Result};
use crate::schema::TableSchema;
use crate::storage::{Index, IndexMeta, LobRef, LobStore, RowId};
use crate::types::{AttrType, Value};

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub data: Vec<u8>,
    pub txn_min: u64,
    pub txn_max: u64,
}

#[derive(Debug)]
pub struct Table {
    name: String,
    schema: TableSchema,
    rows: RwLock<BTreeMap<RowId, StoredRecord>>,
    next_row_id: AtomicU64,
    indexes: RwLock<Vec<Arc<Index>>>,
    lob: LobStore,
}

impl Table {
    pub fn new(name: &str, schema: TableSchema) -> Table {
        Table {
            name: name.to_string(),
            schema,
            rows: RwLock::new(BTreeMap::new()),
            next_row_id: AtomicU64::new(1),
            indexes: RwLock::new(Vec::new()),
            lob: LobStore::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn lob(&self) -> &LobStore {
        &self.lob
    }

    pub fn create_index(&self, meta: IndexMeta) -> Result<Arc<Index>> {
        let index = Arc::new(Index::new(meta, &self.schema)?);
        {
            let rows = self.rows.read();
            for (&rid, record) in rows.iter() {
                if record.txn_max != 0 {
                    continue;
                }
                let key = index.key_from_record(&self.schema, &record.data)?;
                index.insert_entry(key, rid)?;
            }
        }
        self.indexes.write().push(index.clone());
        Ok(index)
    }

    pub fn indexes(&self) -> Vec<Arc<Index>> {
        self.indexes.read().clone()
    }

    pub fn find_index(&self, name: &str) -> Option<Arc<Index>> {
        self.indexes
            .read()
            .iter()
            .find(|i| i.meta().name == name)
            .cloned()
    }

    /// Encodes one value per field (declaration order) into record bytes.
    /// Values are implicitly cast to the field type; TEXT payloads go to the
    /// LOB store and the slot receives the reference.
    pub fn make_record(&self, values: &[Value<'_>]) -> Result<Vec<u8>> {
        if values.len() != self.schema.field_count() {
            return Err(DbError::InvalidArgument(format!(
                "table {} expects {} values, got {}",
                self.name,
                self.schema.field_count(),
                values.len()
            )));
        }
        let mut record = vec![0u8; self.schema.record_len()];
        for (field_id, value) in values.iter().enumerate() {
            let field = self.schema.field(field_id)?.clone();
            if field.attr_type == AttrType::Text {
                if value.is_null() {
                    self.schema.encode_fixed(&mut record, &field, &Value::Null)?;
                    continue;
                }
                let cast = value.cast_to(AttrType::Text)?;
                let bytes = match &cast {
                    Value::Text(b) => b.as_ref(),
                    _ => return Err(DbError::Internal("TEXT cast produced non-text".into())),
                };
                let lob_ref = self.lob.insert_data(bytes);
                self.schema.set_null(&mut record, field.field_id, false);
                let slot = self.schema.slot_mut(&mut record, &field)?;
                slot.copy_from_slice(lob_ref.as_bytes());
            } else {
                let cast = value.cast_to(field.attr_type)?;
                self.schema.encode_fixed(&mut record, &field, &cast)?;
            }
        }
        Ok(record)
    }

    /// Decodes one field from record bytes. TEXT is materialized from the
    /// LOB store; CHAR borrows the slot.
    pub fn value_at<'r>(&self, record: &'r [u8], field_id: usize) -> Result<Value<'r>> {
        let field = self.schema.field(field_id)?;
        if field.attr_type != AttrType::Text {
            return self.schema.decode_fixed(record, field);
        }
        if self.schema.is_null(record, field_id) {
            return Ok(Value::Null);
        }
        let slot = self.schema.slot(record, field)?;
        let lob_ref = LobRef::read_from_bytes(slot)
            .map_err(|_| DbError::Internal("malformed LOB reference slot".into()))?;
        Ok(Value::Text(self.lob.read(&lob_ref)?.into()))
    }

    /// Inserts a record visible from `txn_min`. Unique violations are
    /// detected across all indexes before any entry or row is written, so a
    /// failed insert leaves no trace.
    pub fn insert_row(&self, data: Vec<u8>, txn_min: u64) -> Result<RowId> {
        let indexes = self.indexes();
        let mut keys = Vec::with_capacity(indexes.len());
        for index in &indexes {
            let key = index.key_from_record(&self.schema, &data)?;
            if index.would_conflict(&key) {
                return Err(DbError::RecordDuplicateKey {
                    index: index.meta().name.clone(),
                });
            }
            keys.push(key);
        }
        let rid = self.next_row_id.fetch_add(1, Ordering::Relaxed);
        for (pos, (index, key)) in indexes.iter().zip(&keys).enumerate() {
            if let Err(err) = index.insert_entry(key.clone(), rid) {
                for (prev_index, prev_key) in indexes.iter().zip(&keys).take(pos) {
                    prev_index.remove_entry(prev_key, rid);
                }
                return Err(err);
            }
        }
        self.rows.write().insert(
            rid,
            StoredRecord {
                data,
                txn_min,
                txn_max: 0,
            },
        );
        Ok(rid)
    }

    pub fn get_record(&self, rid: RowId) -> Result<StoredRecord> {
        self.rows
            .read()
            .get(&rid)
            .cloned()
            .ok_or(DbError::RecordNotExist(rid))
    }

    /// Marks a record deleted as of `txn_max` and drops its index entries.
    pub fn mark_delete(&self, rid: RowId, txn_max: u64) -> Result<()> {
        let mut rows = self.rows.write();
        let record = rows.get_mut(&rid).ok_or(DbError::RecordNotExist(rid))?;
        record.txn_max = txn_max;
        let data = record.data.clone();
        drop(rows);
        for index in self.indexes() {
            let key = index.key_from_record(&self.schema, &data)?;
            index.remove_entry(&key, rid);
        }
        Ok(())
    }

    /// Replaces a record's bytes in place, maintaining index entries. A
    /// unique conflict from the new key aborts before anything changes.
    pub fn apply_update(&self, rid: RowId, new_data: Vec<u8>) -> Result<()> {
        let old_data = self.get_record(rid)?.data;
        let indexes = self.indexes();
        let mut changed = Vec::new();
        for index in &indexes {
            let old_key = index.key_from_record(&self.schema, &old_data)?;
            let new_key = index.key_from_record(&self.schema, &new_data)?;
            if old_key == new_key {
                continue;
            }
            if index.would_conflict(&new_key) {
                return Err(DbError::RecordDuplicateKey {
                    index: index.meta().name.clone(),
                });
            }
            changed.push((index.clone(), old_key, new_key));
        }
        for (index, old_key, new_key) in &changed {
            index.remove_entry(old_key, rid);
            index.insert_entry(new_key.clone(), rid)?;
        }
        let mut rows = self.rows.write();
        let record = rows.get_mut(&rid).ok_or(DbError::RecordNotExist(rid))?;
        record.data = new_data;
        Ok(())
    }

    /// Point-in-time snapshot of all records in row id order. Deleted marks
    /// are included; visibility is the caller's business.
    pub fn record_scanner(&self) -> Vec<(RowId, StoredRecord)> {
        self.rows
            .read()
            .iter()
            .map(|(&rid, rec)| (rid, rec.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;

    fn table() -> Table {
        let schema = TableSchema::new(&[
            FieldDef::new("id", AttrType::Int, 0, false),
            FieldDef::new("name", AttrType::Char, 8, true),
            FieldDef::new("bio", AttrType::Text, 0, true),
        ])
        .unwrap();
        Table::new("users", schema)
    }

    #[test]
    fn test_make_record_round_trip() {
        let t = table();
        let record = t
            .make_record(&[
                Value::Int(1),
                Value::char_from_str("ann"),
                Value::text_from_str("a long biography"),
            ])
            .unwrap();
        assert_eq!(t.value_at(&record, 0).unwrap(), Value::Int(1));
        assert_eq!(t.value_at(&record, 1).unwrap(), Value::char_from_str("ann"));
        assert_eq!(
            t.value_at(&record, 2).unwrap(),
            Value::text_from_str("a long biography")
        );
    }

    #[test]
    fn test_make_record_casts_input() {
        let t = table();
        // CHAR input for a TEXT field goes through the free CHAR->TEXT cast.
        let record = t
            .make_record(&[Value::Int(1), Value::Null, Value::char_from_str("hi")])
            .unwrap();
        assert_eq!(t.value_at(&record, 2).unwrap(), Value::text_from_str("hi"));
    }

    #[test]
    fn test_make_record_arity_check() {
        let t = table();
        assert!(t.make_record(&[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_text_truncated_at_cap() {
        let t = table();
        let long = "x".repeat(crate::config::MAX_TEXT_LENGTH + 50);
        let record = t
            .make_record(&[Value::Int(1), Value::Null, Value::text_from_str(&long)])
            .unwrap();
        match t.value_at(&record, 2).unwrap() {
            Value::Text(b) => assert_eq!(b.len(), crate::config::MAX_TEXT_LENGTH),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_insert_then_get() {
        let t = table();
        let record = t
            .make_record(&[Value::Int(7), Value::char_from_str("bob"), Value::Null])
            .unwrap();
        let rid = t.insert_row(record.clone(), 1).unwrap();
        let stored = t.get_record(rid).unwrap();
        assert_eq!(stored.data, record);
        assert_eq!(stored.txn_min, 1);
        assert_eq!(stored.txn_max, 0);
        assert!(matches!(
            t.get_record(999).unwrap_err(),
            DbError::RecordNotExist(999)
        ));
    }

    #[test]
    fn test_unique_index_blocks_insert_without_side_effects() {
        let t = table();
        t.create_index(IndexMeta {
            name: "uniq_name".into(),
            fields: vec!["name".into()],
            unique: true,
        })
        .unwrap();
        let r1 = t
            .make_record(&[Value::Int(1), Value::char_from_str("ann"), Value::Null])
            .unwrap();
        let r2 = t
            .make_record(&[Value::Int(2), Value::char_from_str("ann"), Value::Null])
            .unwrap();
        t.insert_row(r1, 1).unwrap();
        assert!(matches!(
            t.insert_row(r2, 1).unwrap_err(),
            DbError::RecordDuplicateKey { .. }
        ));
        assert_eq!(t.record_scanner().len(), 1);
    }

    #[test]
    fn test_delete_frees_unique_key() {
        let t = table();
        t.create_index(IndexMeta {
            name: "uniq_name".into(),
            fields: vec!["name".into()],
            unique: true,
        })
        .unwrap();
        let record = t
            .make_record(&[Value::Int(1), Value::char_from_str("ann"), Value::Null])
            .unwrap();
        let rid = t.insert_row(record.clone(), 1).unwrap();
        t.mark_delete(rid, 2).unwrap();
        assert!(t.insert_row(record, 3).is_ok());
    }

    #[test]
    fn test_update_maintains_index() {
        let t = table();
        let idx = t
            .create_index(IndexMeta {
                name: "by_name".into(),
                fields: vec!["name".into()],
                unique: false,
            })
            .unwrap();
        let record = t
            .make_record(&[Value::Int(1), Value::char_from_str("ann"), Value::Null])
            .unwrap();
        let rid = t.insert_row(record, 1).unwrap();
        let updated = t
            .make_record(&[Value::Int(1), Value::char_from_str("zoe"), Value::Null])
            .unwrap();
        t.apply_update(rid, updated).unwrap();

        let old_key = idx
            .key_from_values(t.schema(), &[Value::char_from_str("ann")])
            .unwrap();
        let new_key = idx
            .key_from_values(t.schema(), &[Value::char_from_str("zoe")])
            .unwrap();
        assert!(idx.create_scanner(Some(&old_key), true, Some(&old_key), true).next().is_none());
        assert_eq!(
            idx.create_scanner(Some(&new_key), true, Some(&new_key), true).next(),
            Some(rid)
        );
    }
}
