//! # Indexes
//!
//! Ordered secondary indexes over one or more fields. A key is the
//! concatenation of the indexed fields' slot bytes in index declaration
//! order, each transformed so that plain byte comparison matches the
//! field's value order: INT and DATE slots become sign-flipped big-endian,
//! FLOAT slots go through the IEEE-754 total-order transform, CHAR slots
//! stay raw with their NUL padding participating in the ordering.
//!
//! Unique indexes reject a duplicate key with `RecordDuplicateKey` and leave
//! the index untouched, which is what makes statement-level insert rollback
//! sound.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::error::{DbError, Result};
use crate::schema::TableSchema;
use crate::types::{AttrType, Value};

pub type RowId = u64;

#[derive(Debug, Clone)]
pub struct IndexMeta {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
}

#[derive(Debug)]
pub struct Index {
    meta: IndexMeta,
    field_ids: Vec<usize>,
    entries: RwLock<BTreeMap<Vec<u8>, SmallVec<[RowId; 1]>>>,
}

impl Index {
    pub fn new(meta: IndexMeta, schema: &TableSchema) -> Result<Index> {
        let mut field_ids = Vec::with_capacity(meta.fields.len());
        for name in &meta.fields {
            field_ids.push(schema.field_by_name(name)?.field_id);
        }
        if field_ids.is_empty() {
            return Err(DbError::InvalidArgument(format!(
                "index {} has no fields",
                meta.name
            )));
        }
        Ok(Index {
            meta,
            field_ids,
            entries: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    /// Builds the key for a record: indexed slots transformed and
    /// concatenated in index declaration order.
    pub fn key_from_record(&self, schema: &TableSchema, record: &[u8]) -> Result<Vec<u8>> {
        let mut key = Vec::new();
        for &field_id in &self.field_ids {
            let field = schema.field(field_id)?;
            extend_ordered(&mut key, field.attr_type, schema.slot(record, field)?)?;
        }
        Ok(key)
    }

    /// Builds a key from typed values, one per indexed field in order. Used
    /// by index scans to turn range bounds into comparable keys.
    pub fn key_from_values(&self, schema: &TableSchema, values: &[Value<'_>]) -> Result<Vec<u8>> {
        if values.len() != self.field_ids.len() {
            return Err(DbError::InvalidArgument(format!(
                "index {} expects {} key values, got {}",
                self.meta.name,
                self.field_ids.len(),
                values.len()
            )));
        }
        // Encode through a scratch record so slot encoding rules apply.
        let mut scratch = vec![0u8; schema.record_len()];
        let mut key = Vec::new();
        for (&field_id, value) in self.field_ids.iter().zip(values) {
            let field = schema.field(field_id)?;
            let cast = value.cast_to(field.attr_type)?;
            schema.encode_fixed(&mut scratch, field, &cast)?;
            extend_ordered(&mut key, field.attr_type, schema.slot(&scratch, field)?)?;
        }
        Ok(key)
    }

    /// True when inserting `key` would violate uniqueness.
    pub fn would_conflict(&self, key: &[u8]) -> bool {
        self.meta.unique && self.entries.read().contains_key(key)
    }

    pub fn insert_entry(&self, key: Vec<u8>, rid: RowId) -> Result<()> {
        let mut entries = self.entries.write();
        if self.meta.unique && entries.contains_key(&key) {
            return Err(DbError::RecordDuplicateKey {
                index: self.meta.name.clone(),
            });
        }
        entries.entry(key).or_default().push(rid);
        Ok(())
    }

    pub fn remove_entry(&self, key: &[u8], rid: RowId) {
        let mut entries = self.entries.write();
        if let Some(rids) = entries.get_mut(key) {
            rids.retain(|r| *r != rid);
            if rids.is_empty() {
                entries.remove(key);
            }
        }
    }

    /// Snapshots the row ids whose keys fall inside the given range, in key
    /// order. `None` bounds are unbounded on that side.
    pub fn create_scanner(
        &self,
        low: Option<&[u8]>,
        low_inclusive: bool,
        high: Option<&[u8]>,
        high_inclusive: bool,
    ) -> IndexScanner {
        let lower = match low {
            Some(k) if low_inclusive => Bound::Included(k.to_vec()),
            Some(k) => Bound::Excluded(k.to_vec()),
            None => Bound::Unbounded,
        };
        let upper = match high {
            Some(k) if high_inclusive => Bound::Included(k.to_vec()),
            Some(k) => Bound::Excluded(k.to_vec()),
            None => Bound::Unbounded,
        };
        let entries = self.entries.read();
        let mut rids = Vec::new();
        for (_, bucket) in entries.range((lower, upper)) {
            rids.extend_from_slice(bucket);
        }
        IndexScanner { rids, pos: 0 }
    }
}

/// Appends one slot to a key, rewritten so lexicographic byte order agrees
/// with the field's value order.
fn extend_ordered(key: &mut Vec<u8>, attr_type: AttrType, slot: &[u8]) -> Result<()> {
    match attr_type {
        AttrType::Int | AttrType::Date => {
            let bytes: [u8; 4] = slot
                .try_into()
                .map_err(|_| DbError::Internal("malformed INT index slot".into()))?;
            let flipped = u32::from_le_bytes(bytes) ^ 0x8000_0000;
            key.extend_from_slice(&flipped.to_be_bytes());
        }
        AttrType::Float => {
            let bytes: [u8; 4] = slot
                .try_into()
                .map_err(|_| DbError::Internal("malformed FLOAT index slot".into()))?;
            let bits = u32::from_le_bytes(bytes);
            // Total-order transform: negatives invert entirely, positives
            // get the sign bit set.
            let ordered = if bits & 0x8000_0000 != 0 {
                !bits
            } else {
                bits | 0x8000_0000
            };
            key.extend_from_slice(&ordered.to_be_bytes());
        }
        _ => key.extend_from_slice(slot),
    }
    Ok(())
}

/// Point-in-time cursor over index row ids. Mutations after creation are
/// not reflected.
#[derive(Debug)]
pub struct IndexScanner {
    rids: Vec<RowId>,
    pos: usize,
}

impl IndexScanner {
    pub fn next(&mut self) -> Option<RowId> {
        let rid = self.rids.get(self.pos).copied();
        self.pos += 1;
        rid
    }
}
