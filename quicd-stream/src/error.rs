//! Stream Engine Error Types
//!
//! The core stream operations fail in exactly one way: the memory pool
//! refused an allocation. Everything else here is raised by the thin
//! driver-facing layers (stream table, flow-control checks, configuration).
//!
//! Caller contract violations (peeking an empty queue, pushing overlapping
//! ranges) are programming defects and are `debug_assert!`ed, not reported.

#![forbid(unsafe_code)]

use crate::types::StreamId;
use thiserror::Error;

/// Result type for stream engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the stream engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The memory pool refused to hand out `requested` more bytes.
    ///
    /// State touched by the failing call is left exactly as it was.
    #[error("out of memory: pool refused {requested} bytes")]
    OutOfMemory { requested: usize },

    /// Peer sent data ending at `offset`, beyond the announced `limit`.
    #[error("flow control violation: offset {offset} exceeds limit {limit}")]
    FlowControl { offset: u64, limit: u64 },

    /// First-time data was written after the send direction was shut.
    #[error("stream {0} is shut for writing")]
    StreamShutdown(StreamId),

    /// No stream with this id is linked in the table.
    #[error("stream {0} not found")]
    StreamNotFound(StreamId),

    /// A stream with this id is already linked in the table.
    #[error("stream {0} already exists")]
    StreamExists(StreamId),

    /// Stream still has open directions or queued frames.
    #[error("stream {0} is still active")]
    StreamBusy(StreamId),

    /// Configuration failed validation.
    #[error("invalid configuration:\n{}", .0.join("\n"))]
    InvalidConfig(Vec<String>),

    /// Configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),
}

impl Error {
    /// Returns true if this error is an allocation failure.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Error::OutOfMemory { .. })
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::ConfigParse(e.to_string())
    }
}
