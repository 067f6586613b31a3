//! # Attribute Types
//!
//! Canonical field type enum used across schema definitions, record storage,
//! and expression evaluation.
//!
//! ## Design Principles
//!
//! 1. **Single source of truth**: one enum used everywhere
//! 2. **Storage-efficient**: `#[repr(u8)]` single-byte discriminant
//! 3. **Metadata-free**: CHAR length lives in `FieldMeta`, not the enum
//!
//! ## Implicit Casts
//!
//! `cast_cost` encodes the directed cast graph as a cost. Identity casts are
//! free, lossless widenings are cheap, lossy conversions cost more, and
//! `None` means no implicit conversion exists:
//!
//! | From \ To | Int | Float | Date | Char | Text |
//! |-----------|-----|-------|------|------|------|
//! | Int       | 0   | 1     | -    | 2    | -    |
//! | Float     | 1   | 0     | -    | 2    | -    |
//! | Date      | 1   | 1     | 0    | 2    | -    |
//! | Char      | -   | -     | 1    | 0    | 0    |
//! | Text      | -   | -     | -    | 0    | 0    |

use crate::error::{DbError, Result};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrType {
    Undefined = 0,
    Int = 1,
    Float = 2,
    Bool = 3,
    Date = 4,
    Char = 5,
    Text = 6,
}

impl AttrType {
    /// Returns the fixed byte size a value of this type occupies inside a
    /// record slot, or `None` where the size comes from the field definition
    /// (CHAR declared length).
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            AttrType::Int | AttrType::Float | AttrType::Date => Some(4),
            AttrType::Bool => Some(1),
            AttrType::Text => Some(crate::config::LOB_REF_SIZE),
            AttrType::Char | AttrType::Undefined => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, AttrType::Int | AttrType::Float)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, AttrType::Char | AttrType::Text)
    }

    /// Cost of implicitly casting `self` to `target`. `None` means the cast
    /// does not exist. Lower cost wins when a comparison can cast either
    /// side.
    pub fn cast_cost(&self, target: AttrType) -> Option<u32> {
        if *self == target {
            return Some(0);
        }
        match (*self, target) {
            (AttrType::Int, AttrType::Float) => Some(1),
            (AttrType::Int, AttrType::Char) => Some(2),
            (AttrType::Float, AttrType::Int) => Some(1),
            (AttrType::Float, AttrType::Char) => Some(2),
            (AttrType::Date, AttrType::Int) => Some(1),
            (AttrType::Date, AttrType::Float) => Some(1),
            (AttrType::Date, AttrType::Char) => Some(2),
            (AttrType::Char, AttrType::Date) => Some(1),
            (AttrType::Char, AttrType::Text) => Some(0),
            (AttrType::Text, AttrType::Char) => Some(0),
            _ => None,
        }
    }
}

impl TryFrom<u8> for AttrType {
    type Error = DbError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(AttrType::Undefined),
            1 => Ok(AttrType::Int),
            2 => Ok(AttrType::Float),
            3 => Ok(AttrType::Bool),
            4 => Ok(AttrType::Date),
            5 => Ok(AttrType::Char),
            6 => Ok(AttrType::Text),
            _ => Err(DbError::Internal(format!(
                "invalid AttrType discriminant: {value}"
            ))),
        }
    }
}

impl std::fmt::Display for AttrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AttrType::Undefined => "UNDEFINED",
            AttrType::Int => "INT",
            AttrType::Float => "FLOAT",
            AttrType::Bool => "BOOLEAN",
            AttrType::Date => "DATE",
            AttrType::Char => "CHAR",
            AttrType::Text => "TEXT",
        };
        f.write_str(name)
    }
}
