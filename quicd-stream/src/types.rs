//! # Core Stream Types (RFC 9000 Section 2)
//!
//! Identifiers and offsets shared by every stream engine module.

#![forbid(unsafe_code)]

use core::fmt;

/// Maximum value for a QUIC variable-length integer (2^62 - 1)
pub const VARINT_MAX: u64 = (1u64 << 62) - 1;

/// Maximum Stream ID value (2^62 - 1)
pub const MAX_STREAM_ID: i64 = VARINT_MAX as i64;

/// Stream Offset - Byte offset within a stream
pub type StreamOffset = u64;

// ============================================================================
// Stream ID (RFC 9000 Section 2.1)
// ============================================================================

/// Stream ID
///
/// Signed so that drivers can use negative values as "no stream" sentinels;
/// valid identifiers are in `0..=MAX_STREAM_ID`. Direction and initiator
/// bits are interpreted by the connection, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(i64);

impl StreamId {
    /// Create a new StreamId
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw value
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Check that the id fits the 62-bit identifier space
    pub const fn is_valid(&self) -> bool {
        self.0 >= 0 && self.0 <= MAX_STREAM_ID
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for StreamId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
