//! # Type System
//!
//! Field types, runtime values, date arithmetic and the columnar chunk
//! layout.

mod attr_type;
mod chunk;
pub mod date;
mod value;

pub use attr_type::AttrType;
pub use chunk::{Chunk, Column, ColumnData};
pub use value::Value;
