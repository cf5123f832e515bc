//! # Stream Flow Control (RFC 9000 Section 4)
//!
//! Per-stream credit tracking for both directions.
//!
//! - [`SendCredit`]: how far we may send (peer's MAX_STREAM_DATA) and how
//!   far we have sent.
//! - [`RecvCredit`]: the limit we announced to the peer and the limit we
//!   have decided on but not announced yet.
//!
//! The receive side keeps two limits so that "grant more credit" and "tell
//! the peer" are separate steps. The connection can then collect pending
//! updates from many streams and send them together in one packet.

#![forbid(unsafe_code)]

use crate::error::{Error, Result};
use crate::types::StreamOffset;
use tracing::warn;

/// Send-direction credit for one stream.
///
/// Invariant: `offset <= max_offset` (first-time data only; retransmitted
/// bytes were paid for when first sent).
#[derive(Debug, Clone)]
pub struct SendCredit {
    /// Next offset for never-sent data.
    offset: StreamOffset,

    /// Peer-granted limit (MAX_STREAM_DATA).
    max_offset: StreamOffset,
}

impl SendCredit {
    pub fn new(max_offset: StreamOffset) -> Self {
        Self {
            offset: 0,
            max_offset,
        }
    }

    pub fn offset(&self) -> StreamOffset {
        self.offset
    }

    pub fn max_offset(&self) -> StreamOffset {
        self.max_offset
    }

    /// Bytes of first-time data that may still be sent.
    pub fn available(&self) -> u64 {
        self.max_offset - self.offset
    }

    /// Account for `len` bytes of first-time data.
    pub(crate) fn consume(&mut self, len: u64) {
        debug_assert!(len <= self.available());
        self.offset += len;
    }

    /// Raise the limit (from MAX_STREAM_DATA). Lower values are stale
    /// frames and are ignored. Returns true if the limit grew.
    pub fn update_max_offset(&mut self, max_offset: StreamOffset) -> bool {
        if max_offset > self.max_offset {
            self.max_offset = max_offset;
            true
        } else {
            false
        }
    }
}

/// Receive-direction credit for one stream.
///
/// Invariant: `unsent_max_offset >= max_offset`.
#[derive(Debug, Clone)]
pub struct RecvCredit {
    /// Limit most recently announced to the peer.
    max_offset: StreamOffset,

    /// Limit decided locally, not yet announced.
    unsent_max_offset: StreamOffset,

    /// Window size the stream was opened with; scales the update threshold.
    initial_window: u64,
}

impl RecvCredit {
    pub fn new(max_offset: StreamOffset) -> Self {
        Self {
            max_offset,
            unsent_max_offset: max_offset,
            initial_window: max_offset,
        }
    }

    /// Limit the peer currently knows about.
    pub fn max_offset(&self) -> StreamOffset {
        self.max_offset
    }

    /// Limit that will be announced with the next window update.
    pub fn unsent_max_offset(&self) -> StreamOffset {
        self.unsent_max_offset
    }

    /// Check that data ending at `end` fits the announced limit.
    ///
    /// # Errors
    /// Returns `Error::FlowControl` if the peer overran its credit.
    pub fn check(&self, end: StreamOffset) -> Result<()> {
        if end > self.max_offset {
            return Err(Error::FlowControl {
                offset: end,
                limit: self.max_offset,
            });
        }
        Ok(())
    }

    /// Set the pending limit. Values below the announced limit would take
    /// back credit the peer already holds, so they are clamped. Returns the
    /// effective pending limit.
    pub fn set_unsent_max_offset(&mut self, max_offset: StreamOffset) -> StreamOffset {
        if max_offset < self.max_offset {
            warn!(
                requested = max_offset,
                announced = self.max_offset,
                "pending receive window below announced window, clamping"
            );
        }
        self.unsent_max_offset = max_offset.max(self.max_offset);
        self.unsent_max_offset
    }

    /// Grant `delta` more bytes of pending credit, typically the amount the
    /// application just consumed.
    pub fn extend(&mut self, delta: u64) -> StreamOffset {
        self.unsent_max_offset = self.unsent_max_offset.saturating_add(delta);
        self.unsent_max_offset
    }

    /// True once the unannounced credit reaches `threshold` of the initial
    /// window.
    pub fn should_update(&self, threshold: f64) -> bool {
        let unannounced = self.unsent_max_offset - self.max_offset;
        unannounced > 0 && unannounced as f64 >= self.initial_window as f64 * threshold
    }

    /// Latch the pending limit as announced. Returns the value to put in a
    /// MAX_STREAM_DATA frame, or `None` if the peer already knows it.
    pub fn commit(&mut self) -> Option<StreamOffset> {
        if self.unsent_max_offset == self.max_offset {
            return None;
        }
        self.max_offset = self.unsent_max_offset;
        Some(self.max_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_credit_only_grows() {
        let mut c = SendCredit::new(100);
        c.consume(60);
        assert_eq!(c.available(), 40);

        assert!(!c.update_max_offset(80));
        assert_eq!(c.max_offset(), 100);
        assert!(c.update_max_offset(200));
        assert_eq!(c.available(), 140);
    }

    #[test]
    fn test_recv_check() {
        let c = RecvCredit::new(100);
        assert!(c.check(100).is_ok());
        assert_eq!(
            c.check(101),
            Err(Error::FlowControl {
                offset: 101,
                limit: 100
            })
        );
    }

    #[test]
    fn test_pending_window_is_clamped() {
        let mut c = RecvCredit::new(100);
        assert_eq!(c.set_unsent_max_offset(50), 100);
        assert_eq!(c.unsent_max_offset(), 100);
        assert!(c.unsent_max_offset() >= c.max_offset());

        assert_eq!(c.set_unsent_max_offset(150), 150);
        assert_eq!(c.max_offset(), 100);
    }

    #[test]
    fn test_commit_latches_pending() {
        let mut c = RecvCredit::new(100);
        assert_eq!(c.commit(), None);

        c.extend(30);
        c.extend(20);
        assert_eq!(c.max_offset(), 100);
        assert_eq!(c.commit(), Some(150));
        assert_eq!(c.max_offset(), 150);
        assert_eq!(c.commit(), None);
    }

    #[test]
    fn test_should_update_threshold() {
        let mut c = RecvCredit::new(100);
        assert!(!c.should_update(0.5));
        c.extend(49);
        assert!(!c.should_update(0.5));
        c.extend(1);
        assert!(c.should_update(0.5));
        c.commit();
        assert!(!c.should_update(0.5));
    }

    #[test]
    fn test_extend_saturates() {
        let mut c = RecvCredit::new(u64::MAX - 1);
        assert_eq!(c.extend(10), u64::MAX);
    }
}
