//! # Error Types
//!
//! Categorical error enum shared across the engine. Variants are matched on
//! by callers: `RecordDuplicateKey` drives insert rollback, the schema
//! variants are the "structural" errors a scan must never swallow, and
//! `Unimplemented` marks operations outside the engine's surface.
//!
//! End-of-stream and row invisibility are deliberately not errors here.
//! Operators signal exhaustion with `Ok(false)` from `next`, and visibility
//! checks return [`crate::txn::Visibility`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// A value could not be converted to the type a field or operation
    /// requires.
    #[error("type mismatch: {0}")]
    SchemaFieldTypeMismatch(String),

    /// A referenced field does not exist in the schema or tuple.
    #[error("field not found: {0}")]
    SchemaFieldMissing(String),

    /// Malformed input to an operation (bad date literal, wrong subquery
    /// shape, non-constant expression where a constant is required).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A unique index rejected a key that is already present.
    #[error("duplicate key in unique index {index}")]
    RecordDuplicateKey { index: String },

    /// A record id that is not (or no longer) present in the table.
    #[error("record not found: rid {0}")]
    RecordNotExist(u64),

    /// Broken internal invariant. Always a bug.
    #[error("internal error: {0}")]
    Internal(String),

    /// Operation the engine recognizes but does not support.
    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),
}

impl DbError {
    /// Structural errors must propagate out of scan predicate evaluation;
    /// everything else downgrades to "row filtered out".
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DbError::Internal(_) | DbError::SchemaFieldMissing(_)
        )
    }
}
