//! # Stream Table (Connection-Level)
//!
//! Owns every stream of one connection in a [`Slab`] and keeps two
//! indexes over it:
//!
//! - **By id**: `StreamId → slab index` for frames arriving from the peer
//! - **Send queue**: streams with something to send, ordered by `cycle`
//!
//! Both indexes store slab indices only, so a stream is unlinked from each
//! in O(1) / O(log n) without touching the others.
//!
//! ## Scheduling
//!
//! Every call to [`schedule`](StreamTable::schedule) on an idle stream
//! hands out the next value of a connection-wide counter. Streams are
//! served lowest cycle first, which gives round-robin order when the driver
//! reschedules a stream after sending from it.

#![forbid(unsafe_code)]

use super::{Stream, StreamFlags};
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::mem::SharedPool;
use crate::types::StreamId;
use ahash::AHashMap;
use slab::Slab;
use std::collections::BTreeSet;
use tracing::debug;

/// Slab index of a stream inside its [`StreamTable`].
///
/// Stays valid until the stream is closed. A stale handle may later refer
/// to a different stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamHandle(usize);

/// All streams of one connection.
#[derive(Debug)]
pub struct StreamTable<U = ()> {
    /// Stream storage, indexed by handle
    streams: Slab<Stream<U>>,

    /// Mapping from StreamId to slab index
    index: AHashMap<StreamId, usize>,

    /// Send queue: `(cycle, slab index)`
    ready: BTreeSet<(u64, usize)>,

    next_cycle: u64,

    config: StreamConfig,
    mem: SharedPool,
}

impl<U> StreamTable<U> {
    /// Create a table with the pool described by `config`.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if `config` does not validate.
    pub fn new(config: StreamConfig) -> Result<Self> {
        let mem = config.memory_pool();
        Self::with_pool(config, mem)
    }

    /// Create a table charging `mem`, e.g. a pool shared by every
    /// connection of a worker.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if `config` does not validate.
    pub fn with_pool(config: StreamConfig, mem: SharedPool) -> Result<Self> {
        config.validate().map_err(Error::InvalidConfig)?;
        Ok(Self {
            streams: Slab::new(),
            index: AHashMap::new(),
            ready: BTreeSet::new(),
            next_cycle: 0,
            config,
            mem,
        })
    }

    /// Create and link a stream using the configured initial windows.
    ///
    /// # Errors
    /// - `Error::StreamExists` if `id` is already linked
    /// - `Error::OutOfMemory` if the stream state cannot be charged; the
    ///   table is unchanged
    pub fn open(&mut self, id: StreamId, flags: StreamFlags, user_data: U) -> Result<StreamHandle> {
        debug_assert!(id.is_valid(), "invalid stream id {}", id);
        if self.index.contains_key(&id) {
            return Err(Error::StreamExists(id));
        }

        let stream = Stream::with_max_segments(
            id,
            flags,
            self.config.initial_max_stream_data_local,
            self.config.initial_max_stream_data_remote,
            user_data,
            self.mem.clone(),
            self.config.max_chain_segments,
        )?;

        let slot = self.streams.insert(stream);
        self.index.insert(id, slot);

        debug!(
            stream_id = %id,
            slab_index = slot,
            total_streams = self.streams.len(),
            "linked stream"
        );
        Ok(StreamHandle(slot))
    }

    /// Handle of the stream with `id`.
    pub fn find(&self, id: StreamId) -> Option<StreamHandle> {
        self.index.get(&id).copied().map(StreamHandle)
    }

    pub fn get(&self, handle: StreamHandle) -> Option<&Stream<U>> {
        self.streams.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: StreamHandle) -> Option<&mut Stream<U>> {
        self.streams.get_mut(handle.0)
    }

    /// Put the stream in the send queue behind everything already there.
    ///
    /// A stream that is already queued keeps its place. Returns false for
    /// a stale handle.
    pub fn schedule(&mut self, handle: StreamHandle) -> bool {
        let Some(stream) = self.streams.get_mut(handle.0) else {
            return false;
        };
        if stream.is_tx_queued() {
            return true;
        }

        let cycle = self.next_cycle;
        self.next_cycle += 1;
        stream.set_cycle(cycle);
        stream.set_tx_queued(true);
        self.ready.insert((cycle, handle.0));
        true
    }

    /// Take the stream with the lowest cycle out of the send queue.
    pub fn pop_ready(&mut self) -> Option<StreamHandle> {
        let (_, slot) = self.ready.pop_first()?;
        if let Some(stream) = self.streams.get_mut(slot) {
            stream.set_tx_queued(false);
        }
        Some(StreamHandle(slot))
    }

    /// Stream that [`pop_ready`](Self::pop_ready) would return.
    pub fn peek_ready(&self) -> Option<StreamHandle> {
        self.ready.first().map(|&(_, slot)| StreamHandle(slot))
    }

    /// Remove the stream from the send queue if it is there.
    pub fn unschedule(&mut self, handle: StreamHandle) {
        if let Some(stream) = self.streams.get_mut(handle.0) {
            if stream.is_tx_queued() {
                self.ready.remove(&(stream.cycle(), handle.0));
                stream.set_tx_queued(false);
            }
        }
    }

    /// Whether the stream freed enough receive credit, relative to the
    /// configured `window_update_threshold`, to announce a new limit.
    /// False for a stale handle.
    pub fn needs_window_update(&self, handle: StreamHandle) -> bool {
        self.streams
            .get(handle.0)
            .is_some_and(|s| s.needs_window_update(self.config.window_update_threshold))
    }

    /// Unlink and free the stream with `id`, returning its user data.
    ///
    /// Without `force`, both directions must be shut and nothing may be
    /// left to send. With `force`, queued frames are dropped.
    ///
    /// # Errors
    /// - `Error::StreamNotFound` if `id` is not linked
    /// - `Error::StreamBusy` if the stream is still in use and `force` is
    ///   false; nothing changes
    pub fn close(&mut self, id: StreamId, force: bool) -> Result<U> {
        let slot = *self.index.get(&id).ok_or(Error::StreamNotFound(id))?;
        let stream = self.streams.get(slot).ok_or(Error::StreamNotFound(id))?;

        if !force
            && (!stream.flags().contains(StreamFlags::SHUT_RDWR) || stream.has_queued_frames())
        {
            return Err(Error::StreamBusy(id));
        }

        self.unschedule(StreamHandle(slot));
        self.index.remove(&id);
        let mut stream = self
            .streams
            .try_remove(slot)
            .ok_or(Error::StreamNotFound(id))?;
        if force {
            stream.clear_frames();
        }

        debug!(
            stream_id = %id,
            slab_index = slot,
            forced = force,
            remaining_streams = self.streams.len(),
            "unlinked stream"
        );
        Ok(stream.release())
    }

    /// Linked streams.
    pub fn iter(&self) -> impl Iterator<Item = (StreamHandle, &Stream<U>)> + '_ {
        self.streams.iter().map(|(slot, s)| (StreamHandle(slot), s))
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Streams waiting in the send queue.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Bytes currently charged to the table's pool.
    pub fn memory_in_use(&self) -> usize {
        self.mem.in_use()
    }
}
