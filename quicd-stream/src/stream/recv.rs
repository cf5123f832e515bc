//! # Receive Side (RFC 9000 Section 2.2, 4.1)
//!
//! STREAM payload goes through the reorder buffer; the application reads
//! contiguous chunks back out and returns the credit it freed with
//! [`Stream::extend_pending_recv_window`]. The new limit is only announced
//! when the connection calls [`Stream::commit_recv_window`].

use super::{Stream, StreamFlags};
use crate::error::Result;
use crate::types::StreamOffset;
use bytes::Bytes;
use tracing::{debug, trace};

impl<U> Stream<U> {
    /// Lowest offset not yet received.
    pub fn rx_offset(&self) -> StreamOffset {
        self.rx.reorder.first_gap()
    }

    /// Buffer STREAM payload received at `offset`.
    ///
    /// Ignored once the read side is shut. Flow control is not checked
    /// here; see [`check_recv_limit`](Self::check_recv_limit).
    ///
    /// # Errors
    /// Returns `Error::OutOfMemory` if the new bytes cannot be buffered; the
    /// stream is unchanged, including the high watermark.
    pub fn recv_reordering(&mut self, data: &[u8], offset: StreamOffset) -> Result<()> {
        if self.flags.contains(StreamFlags::SHUT_RD) {
            trace!(stream_id = %self.id, offset, len = data.len(), "read side shut, dropping data");
            return Ok(());
        }

        self.rx.reorder.push(offset, data)?;
        self.rx.last_offset = self.rx.last_offset.max(offset + data.len() as u64);
        Ok(())
    }

    /// Next in-order chunk and its offset, `None` while a gap blocks it.
    pub fn read_contiguous(&mut self) -> Option<(StreamOffset, Bytes)> {
        self.rx.reorder.read_contiguous()
    }

    /// Check that data ending at `end` stays within the announced window.
    ///
    /// # Errors
    /// Returns `Error::FlowControl` if it does not.
    pub fn check_recv_limit(&self, end: StreamOffset) -> Result<()> {
        self.rx.credit.check(end)
    }

    /// Highest offset seen in any received frame.
    pub fn last_offset(&self) -> StreamOffset {
        self.rx.last_offset
    }

    /// Receive limit the peer knows about.
    pub fn recv_window(&self) -> StreamOffset {
        self.rx.credit.max_offset()
    }

    /// Receive limit to announce next.
    pub fn pending_recv_window(&self) -> StreamOffset {
        self.rx.credit.unsent_max_offset()
    }

    /// Set the pending receive limit; values below the announced limit are
    /// raised to it. Returns the effective value.
    pub fn set_pending_recv_window(&mut self, max_offset: StreamOffset) -> StreamOffset {
        self.rx.credit.set_unsent_max_offset(max_offset)
    }

    /// Return `len` consumed bytes to the peer as pending credit.
    pub fn extend_pending_recv_window(&mut self, len: u64) -> StreamOffset {
        self.rx.credit.extend(len)
    }

    /// True once enough unannounced credit built up to be worth a
    /// MAX_STREAM_DATA frame.
    pub fn needs_window_update(&self, threshold: f64) -> bool {
        !self.flags.contains(StreamFlags::SHUT_RD) && self.rx.credit.should_update(threshold)
    }

    /// Latch the pending limit. Returns the MAX_STREAM_DATA value to send,
    /// if any.
    pub fn commit_recv_window(&mut self) -> Option<StreamOffset> {
        let max_offset = self.rx.credit.commit()?;
        trace!(stream_id = %self.id, max_offset, "receive window committed");
        Some(max_offset)
    }

    /// Bytes received but not yet read.
    pub fn buffered_bytes(&self) -> usize {
        self.rx.reorder.buffered_bytes()
    }

    /// Drop everything buffered but unread, e.g. after STOP_SENDING.
    pub fn discard_recv_buffer(&mut self) {
        let buffered = self.rx.reorder.buffered_bytes();
        if buffered > 0 {
            debug!(stream_id = %self.id, buffered, "discarding received data");
        }
        self.rx.reorder.discard();
    }
}
