//! quicd-stream: Per-Stream Reliability and Flow Control for QUIC
//!
//! This crate holds the state a QUIC connection keeps for each stream
//! (RFC 9000 Sections 2-4): reassembly of out-of-order data, acknowledgment
//! tracking, retransmission queueing with exact-budget packing, and
//! stream-level flow control.
//!
//! # Architecture
//!
//! - **Synchronous and lock-free**: one connection driver owns all of its
//!   streams; nothing here blocks or spawns
//! - **Zero-copy transmit path**: outgoing data is held as `bytes::Bytes`
//!   segments and split by reference count, never copied
//! - **Accounted memory**: every structure charges a pluggable
//!   [`MemoryPool`]; a refused charge fails the operation with
//!   [`Error::OutOfMemory`] and leaves state untouched
//!
//! # Module Organization
//!
//! - `range`: disjoint interval set over stream offsets
//! - `frame_chain`: contiguous run of outgoing data plus FIN
//! - `retransmit`: offset-ordered queue of frame chains with split/merge pop
//! - `flow_control`: send and receive credit
//! - `stream`: the per-stream aggregate, reorder buffer and stream table
//! - `mem`: memory pools and reservations
//! - `config`: TOML-loadable settings
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use quicd_stream::{StreamConfig, StreamFlags, StreamId, StreamTable};
//!
//! let mut table: StreamTable = StreamTable::new(StreamConfig::default())?;
//! let id = StreamId::new(0);
//! let h = table.open(id, StreamFlags::NONE, ())?;
//!
//! let stream = table.get_mut(h).unwrap();
//! stream.write(Bytes::from_static(b"hello"), true)?;
//! table.schedule(h);
//!
//! while let Some(h) = table.pop_ready() {
//!     let stream = table.get_mut(h).unwrap();
//!     while let Some(chain) = stream.pop_frame(1200)? {
//!         assert_eq!(chain.to_bytes(), Bytes::from_static(b"hello"));
//!         assert!(chain.fin());
//!     }
//! }
//! # Ok::<(), quicd_stream::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod flow_control;
pub mod frame_chain;
pub mod mem;
pub mod range;
pub mod retransmit;
pub mod stream;
pub mod types;

// Re-export key types
pub use config::StreamConfig;
pub use error::{Error, Result};
pub use flow_control::{RecvCredit, SendCredit};
pub use frame_chain::{FrameChain, MAX_STREAM_DATACNT};
pub use mem::{BoundedPool, MemoryPool, Reservation, SharedPool, SystemPool};
pub use range::RangeSet;
pub use retransmit::RetransmitQueue;
pub use stream::{
    ReorderBuffer, Stream, StreamFlags, StreamHandle, StreamState, StreamTable,
};
pub use types::{StreamId, StreamOffset};
