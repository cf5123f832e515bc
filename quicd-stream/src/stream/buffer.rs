//! # Stream Data Reassembly Buffer (RFC 9000 Section 2.2)
//!
//! QUIC packets can arrive out of order, be duplicated, or carry STREAM
//! frames whose ranges overlap earlier ones (retransmissions repacked with a
//! different budget). Stream data must still reach the application in order
//! and exactly once.
//!
//! The [`ReorderBuffer`] tracks:
//! 1. **Received coverage**: a [`RangeSet`] of every offset seen so far
//! 2. **Pending segments**: bytes not yet handed off, keyed by offset
//! 3. **Consumed offset**: everything below it was already handed off
//!
//! Only bytes that were never seen before are copied in, so overlapping
//! frames cost nothing and are never counted twice.
//!
//! ## Example
//!
//! ```text
//! push(20, "xyz")     → segments {20: "xyz"}, first_gap() = 0
//! push(0, 20 bytes)   → segments {0: .., 20: "xyz"}, first_gap() = 23
//! read_contiguous()   → 20 bytes at 0, then "xyz" at 20
//! ```

#![forbid(unsafe_code)]

use crate::error::Result;
use crate::mem::{Reservation, SharedPool};
use crate::range::RangeSet;
use crate::types::{StreamOffset, VARINT_MAX};
use bytes::Bytes;
use std::collections::BTreeMap;
use tracing::trace;

/// Bookkeeping charged per buffered segment on top of its payload.
pub(crate) const SEGMENT_OVERHEAD: usize =
    core::mem::size_of::<Bytes>() + core::mem::size_of::<StreamOffset>();

/// Out-of-order receive buffer for one stream.
#[derive(Debug)]
pub struct ReorderBuffer {
    /// Pending bytes, non-overlapping, all at or above `consumed`.
    segments: BTreeMap<StreamOffset, Bytes>,
    received: RangeSet,
    consumed: StreamOffset,
    buffered: usize,
    mem: SharedPool,
}

impl ReorderBuffer {
    pub fn new(mem: SharedPool) -> Self {
        Self {
            segments: BTreeMap::new(),
            received: RangeSet::new(mem.clone()),
            consumed: 0,
            buffered: 0,
            mem,
        }
    }

    /// Buffer `data` received at `offset`.
    ///
    /// Bytes below the consumed offset and bytes already buffered are
    /// ignored. Only the previously unseen parts are copied.
    ///
    /// `offset + data.len()` must not exceed `VARINT_MAX`; frame decoding
    /// rejects anything larger.
    ///
    /// # Errors
    /// Returns `Error::OutOfMemory` if the new parts cannot be charged; the
    /// buffer is unchanged.
    pub fn push(&mut self, offset: StreamOffset, data: &[u8]) -> Result<()> {
        debug_assert!(
            offset
                .checked_add(data.len() as u64)
                .is_some_and(|end| end <= VARINT_MAX),
            "stream data at {} + {} exceeds 2^62 - 1",
            offset,
            data.len()
        );
        let end = offset + data.len() as u64;
        let start = offset.max(self.consumed);
        if start >= end {
            return Ok(());
        }

        let gaps = self.received.gaps_within(start..end);
        if gaps.is_empty() {
            trace!(offset, len = data.len(), "duplicate stream data ignored");
            return Ok(());
        }

        let new_bytes: usize = gaps.iter().map(|g| (g.end - g.start) as usize).sum();
        let charge = new_bytes + gaps.len() * SEGMENT_OVERHEAD;

        let reservation = Reservation::new(&*self.mem, charge)?;
        self.received.insert(start..end)?;
        reservation.commit();

        for gap in gaps {
            let lo = (gap.start - offset) as usize;
            let hi = (gap.end - offset) as usize;
            self.segments
                .insert(gap.start, Bytes::copy_from_slice(&data[lo..hi]));
        }
        self.buffered += new_bytes;

        trace!(offset, len = data.len(), new_bytes, "buffered stream data");
        Ok(())
    }

    /// Hand off the next in-order segment, advancing the consumed offset.
    ///
    /// Returns `None` while the byte at the consumed offset is missing.
    pub fn read_contiguous(&mut self) -> Option<(StreamOffset, Bytes)> {
        let entry = self.segments.first_entry()?;
        if *entry.key() != self.consumed {
            return None;
        }

        let (offset, data) = entry.remove_entry();
        self.consumed += data.len() as u64;
        self.buffered -= data.len();
        self.mem.release(data.len() + SEGMENT_OVERHEAD);
        Some((offset, data))
    }

    /// Lowest offset not yet received.
    pub fn first_gap(&self) -> StreamOffset {
        self.received.first_gap_from(self.consumed)
    }

    /// Offset of the next byte to hand off.
    pub fn consumed_offset(&self) -> StreamOffset {
        self.consumed
    }

    /// Bytes buffered but not yet handed off.
    pub fn buffered_bytes(&self) -> usize {
        self.buffered
    }

    /// Number of buffered segments.
    pub fn pending_segments(&self) -> usize {
        self.segments.len()
    }

    /// Received ranges, including those already handed off.
    pub fn received(&self) -> &RangeSet {
        &self.received
    }

    /// Drop all buffered bytes. Coverage and the consumed offset are kept so
    /// late duplicates are still recognized.
    pub fn discard(&mut self) {
        self.mem
            .release(self.buffered + self.segments.len() * SEGMENT_OVERHEAD);
        self.segments.clear();
        self.buffered = 0;
    }
}

impl Drop for ReorderBuffer {
    fn drop(&mut self) {
        self.discard();
    }
}
