//! # Storage
//!
//! In-memory reference storage: tables of fixed-width records, ordered
//! secondary indexes, and the out-of-line LOB arena for TEXT.

mod index;
mod lob;
mod table;

pub use index::{Index, IndexMeta, IndexScanner, RowId};
pub use lob::{LobRef, LobStore};
pub use table::{StoredRecord, Table};
