//! # Transactions
//!
//! MVCC-lite visibility over the record `txn_min`/`txn_max` pair. A record
//! is visible to a transaction when it was created by that transaction or
//! committed before its start, and has not been deleted by that transaction
//! or before its start.
//!
//! Invisibility is an everyday outcome of scanning shared storage, so it is
//! expressed as the [`Visibility`] enum rather than an error: operators
//! match on it and skip silently.
//!
//! ## Timestamps
//!
//! A single global atomic counter hands out transaction ids, which double
//! as start timestamps. This collapses the usual begin/commit distinction,
//! which is all the execution engine needs: every statement runs under some
//! transaction and sees a stable snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::config::WRITE_SET_INLINE;
use crate::error::Result;
use crate::storage::{RowId, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Invisible,
}

/// Storage-side mutation hooks plus the visibility check. Shared behind
/// `Arc` across an operator tree; mutation tracking uses interior
/// mutability.
pub trait Transaction: Send + Sync {
    fn id(&self) -> u64;

    fn visit_record(&self, table: &Table, rid: RowId) -> Result<Visibility>;

    fn insert_record(&self, table: &Table, data: Vec<u8>) -> Result<RowId>;

    fn delete_record(&self, table: &Table, rid: RowId) -> Result<()>;

    fn update_record(&self, table: &Table, rid: RowId, data: Vec<u8>) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct TransactionManager {
    global_ts: AtomicU64,
}

impl TransactionManager {
    pub fn new() -> TransactionManager {
        TransactionManager {
            // Timestamp 0 is reserved for "never deleted".
            global_ts: AtomicU64::new(1),
        }
    }

    pub fn begin(&self) -> Arc<MemTransaction> {
        let ts = self.global_ts.fetch_add(1, Ordering::SeqCst);
        Arc::new(MemTransaction {
            id: ts,
            write_set: Mutex::new(SmallVec::new()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Insert,
    Delete,
    Update,
}

#[derive(Debug)]
pub struct MemTransaction {
    id: u64,
    write_set: Mutex<SmallVec<[(WriteKind, RowId); WRITE_SET_INLINE]>>,
}

impl MemTransaction {
    pub fn write_count(&self) -> usize {
        self.write_set.lock().len()
    }
}

impl Transaction for MemTransaction {
    fn id(&self) -> u64 {
        self.id
    }

    fn visit_record(&self, table: &Table, rid: RowId) -> Result<Visibility> {
        let record = table.get_record(rid)?;
        let created = record.txn_min <= self.id;
        let deleted = record.txn_max != 0 && record.txn_max <= self.id;
        Ok(if created && !deleted {
            Visibility::Visible
        } else {
            Visibility::Invisible
        })
    }

    fn insert_record(&self, table: &Table, data: Vec<u8>) -> Result<RowId> {
        let rid = table.insert_row(data, self.id)?;
        self.write_set.lock().push((WriteKind::Insert, rid));
        Ok(rid)
    }

    fn delete_record(&self, table: &Table, rid: RowId) -> Result<()> {
        table.mark_delete(rid, self.id)?;
        self.write_set.lock().push((WriteKind::Delete, rid));
        Ok(())
    }

    fn update_record(&self, table: &Table, rid: RowId, data: Vec<u8>) -> Result<()> {
        table.apply_update(rid, data)?;
        self.write_set.lock().push((WriteKind::Update, rid));
        Ok(())
    }
}
