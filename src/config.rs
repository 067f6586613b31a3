//! # Engine Constants
//!
//! Central location for tunable constants. Changing one of these may affect
//! on-record layout, so the dependencies are spelled out next to each value.

/// Maximum number of bytes stored for a TEXT value. Longer inputs are
/// silently truncated at LOB insertion time.
pub const MAX_TEXT_LENGTH: usize = 4096;

/// Size of the fixed reference slot a TEXT field occupies inside a record.
/// Must equal `size_of::<LobRef>()` (offset i64 + length i32 + reserved i32).
pub const LOB_REF_SIZE: usize = 16;

/// DATE values are stored as a day count relative to this year's January 1.
pub const EPOCH_YEAR: i32 = 1970;

/// Inline capacity for per-transaction write sets before they spill to the
/// heap. Most statements touch few rows.
pub const WRITE_SET_INLINE: usize = 16;
