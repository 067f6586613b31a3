//! # LOB Store
//!
//! TEXT payloads live out of line in an append-only byte arena. The record
//! slot holds a fixed 16-byte `LobRef` locating the payload. Inserts longer
//! than [`crate::config::MAX_TEXT_LENGTH`] are silently truncated at that
//! boundary; the stored length always describes the stored bytes.

use parking_lot::Mutex;
use zerocopy::little_endian::{I32, I64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::MAX_TEXT_LENGTH;
use crate::error::{DbError, Result};

/// On-record reference to a LOB payload. Read and written directly from
/// record slot bytes.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct LobRef {
    pub offset: I64,
    pub length: I32,
    pub reserved: I32,
}

impl LobRef {
    pub fn new(offset: i64, length: i32) -> LobRef {
        LobRef {
            offset: I64::new(offset),
            length: I32::new(length),
            reserved: I32::new(0),
        }
    }
}

#[derive(Debug, Default)]
pub struct LobStore {
    arena: Mutex<Vec<u8>>,
}

impl LobStore {
    pub fn new() -> LobStore {
        LobStore::default()
    }

    /// Appends `data` (truncated to the TEXT cap) and returns its reference.
    pub fn insert_data(&self, data: &[u8]) -> LobRef {
        let stored = &data[..data.len().min(MAX_TEXT_LENGTH)];
        let mut arena = self.arena.lock();
        let offset = arena.len() as i64;
        arena.extend_from_slice(stored);
        LobRef::new(offset, stored.len() as i32)
    }

    pub fn read(&self, lob_ref: &LobRef) -> Result<Vec<u8>> {
        let arena = self.arena.lock();
        let offset = lob_ref.offset.get();
        let length = lob_ref.length.get();
        if offset < 0 || length < 0 {
            return Err(DbError::Internal("negative LOB reference".into()));
        }
        let start = offset as usize;
        let end = start + length as usize;
        arena
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| DbError::Internal(format!("LOB reference {start}..{end} out of range")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lob_ref_is_16_bytes() {
        assert_eq!(core::mem::size_of::<LobRef>(), crate::config::LOB_REF_SIZE);
    }

    #[test]
    fn test_insert_and_read_back() {
        let store = LobStore::new();
        let r1 = store.insert_data(b"hello");
        let r2 = store.insert_data(b"world!");
        assert_eq!(store.read(&r1).unwrap(), b"hello");
        assert_eq!(store.read(&r2).unwrap(), b"world!");
    }

    #[test]
    fn test_truncates_at_cap() {
        let store = LobStore::new();
        let big = vec![b'x'; MAX_TEXT_LENGTH + 100];
        let r = store.insert_data(&big);
        assert_eq!(r.length.get() as usize, MAX_TEXT_LENGTH);
        assert_eq!(store.read(&r).unwrap().len(), MAX_TEXT_LENGTH);
    }

    #[test]
    fn test_bad_reference_rejected() {
        let store = LobStore::new();
        store.insert_data(b"abc");
        let bogus = LobRef::new(0, 100);
        assert!(store.read(&bogus).is_err());
    }
}
