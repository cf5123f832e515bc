//! # Transmit Side (RFC 9000 Section 2.2, 4.1)
//!
//! First-time data is composed into a [`FrameChain`] at the send offset and
//! queued; the packetizer pops from the same queue for retransmissions.
//! Acknowledgments are tracked as byte ranges so the stream knows when
//! every sent byte has been delivered.

use super::{Stream, StreamFlags};
use crate::error::{Error, Result};
use crate::frame_chain::FrameChain;
use crate::types::{StreamOffset, VARINT_MAX};
use bytes::Bytes;
use tracing::{debug, trace};

impl<U> Stream<U> {
    /// Queue `data` as first-time stream data.
    ///
    /// Data beyond the send window is not taken; the return value says how
    /// many bytes were queued. `fin` is honored only when all of `data` fit,
    /// and then shuts the write side.
    ///
    /// # Errors
    /// - `Error::StreamShutdown` once the write side is shut
    /// - `Error::OutOfMemory` if the chain cannot be queued; nothing is
    ///   consumed from the window in that case
    pub fn write(&mut self, data: Bytes, fin: bool) -> Result<usize> {
        if self.flags.contains(StreamFlags::SHUT_WR) {
            return Err(Error::StreamShutdown(self.id));
        }

        let offset = self.tx.credit.offset();
        let len = data.len().min(self.tx.credit.available() as usize);
        let fin = fin && len == data.len();
        if len == 0 && !fin {
            trace!(stream_id = %self.id, offset, "send window exhausted");
            return Ok(0);
        }

        let chain = if len == 0 {
            FrameChain::fin_only(offset)
        } else {
            FrameChain::new(offset, data.slice(..len), fin)
        };
        self.tx.frames.push(chain)?;
        self.tx.credit.consume(len as u64);

        trace!(stream_id = %self.id, offset, len, fin, "queued stream data");
        if fin {
            self.shutdown(StreamFlags::SHUT_WR);
        }
        Ok(len)
    }

    /// Re-queue a chain that was popped earlier (typically declared lost).
    ///
    /// Neither the write-side shutdown nor the send window applies: the
    /// bytes were already paid for.
    ///
    /// # Errors
    /// Returns `Error::OutOfMemory` if the chain header cannot be charged.
    pub fn push_frame(&mut self, chain: FrameChain) -> Result<()> {
        debug_assert!(
            chain.end() <= self.tx.credit.offset(),
            "retransmitted chain beyond send offset"
        );
        self.tx.frames.push(chain)
    }

    /// Pop at most `max_bytes` of queued data as one chain.
    ///
    /// See [`RetransmitQueue::pop`](crate::retransmit::RetransmitQueue::pop).
    pub fn pop_frame(&mut self, max_bytes: usize) -> Result<Option<FrameChain>> {
        self.tx.frames.pop(max_bytes)
    }

    /// Lowest queued chain.
    pub fn peek_frame(&self) -> Option<&FrameChain> {
        self.tx.frames.peek_front()
    }

    pub fn has_queued_frames(&self) -> bool {
        !self.tx.frames.is_empty()
    }

    /// Drop every queued chain, e.g. after RESET_STREAM was sent.
    pub fn clear_frames(&mut self) {
        if !self.tx.frames.is_empty() {
            debug!(
                stream_id = %self.id,
                chains = self.tx.frames.len(),
                "dropping queued stream data"
            );
        }
        self.tx.frames.clear();
    }

    /// Record that the peer acknowledged `[offset, offset + len)`.
    ///
    /// Duplicate and overlapping acknowledgments are harmless. The range
    /// must end at or below `VARINT_MAX`.
    ///
    /// # Errors
    /// Returns `Error::OutOfMemory` only when the range is disjoint from
    /// everything acknowledged so far and the pool refuses a new entry.
    pub fn on_data_acked(&mut self, offset: StreamOffset, len: u64) -> Result<()> {
        debug_assert!(
            offset.checked_add(len).is_some_and(|end| end <= VARINT_MAX),
            "acknowledged range {} + {} exceeds 2^62 - 1",
            offset,
            len
        );
        if len == 0 {
            return Ok(());
        }
        self.tx.acked.insert(offset..offset + len)
    }

    /// Lowest offset the peer has not acknowledged yet.
    pub fn next_unacked_offset(&self) -> StreamOffset {
        self.tx.acked.first_gap_from(0)
    }

    /// True when every byte sent so far has been acknowledged.
    pub fn is_all_tx_data_acked(&self) -> bool {
        self.tx.acked.covers(0..self.tx.credit.offset())
    }

    /// Apply MAX_STREAM_DATA. Returns true if the window grew.
    pub fn update_send_window(&mut self, max_offset: StreamOffset) -> bool {
        let grew = self.tx.credit.update_max_offset(max_offset);
        if grew {
            trace!(stream_id = %self.id, max_offset, "send window raised");
        }
        grew
    }

    /// Next offset for first-time data.
    pub fn send_offset(&self) -> StreamOffset {
        self.tx.credit.offset()
    }

    /// Peer-granted send limit.
    pub fn send_window(&self) -> StreamOffset {
        self.tx.credit.max_offset()
    }

    /// Bytes of first-time data that may still be written.
    pub fn send_credit(&self) -> u64 {
        self.tx.credit.available()
    }
}
