//! # Stream State Machine (RFC 9000 Section 2, 3)
//!
//! A [`Stream`] owns everything one ordered, flow-controlled byte pipe needs:
//!
//! - **Transmit side** ([`send`]): next offset, peer-granted window, the
//!   retransmission queue, and the acknowledged-range tracker
//! - **Receive side** ([`recv`]): the reorder buffer, the high watermark,
//!   and the announced/pending receive window
//! - **Lifecycle**: shutdown/reset flags, the application error code, and
//!   the scheduling key used by the connection's send queue
//!
//! Streams are created and destroyed by [`StreamTable`](manager::StreamTable),
//! which also indexes them by id and orders them for sending.
//!
//! ## Stream States
//!
//! ```text
//!            shutdown(SHUT_WR)
//!   Open ─────────────────────▶ HalfClosedLocal ──┐
//!    │                                            │ shutdown(SHUT_RD)
//!    │ shutdown(SHUT_RD)                          ▼
//!    └───────────────────────▶ HalfClosedRemote ─▶ Closed
//! ```

#![forbid(unsafe_code)]

pub mod buffer;
pub mod flags;
pub mod manager;
mod recv;
mod send;

pub use buffer::ReorderBuffer;
pub use flags::StreamFlags;
pub use manager::{StreamHandle, StreamTable};

use crate::error::Result;
use crate::flow_control::{RecvCredit, SendCredit};
use crate::mem::{Reservation, SharedPool};
use crate::range::RangeSet;
use crate::retransmit::RetransmitQueue;
use crate::types::{StreamId, StreamOffset};
use tracing::debug;

/// Stream State derived from the shutdown flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Open (can send and receive)
    Open,

    /// Half-closed (local) - write side shut, can still receive
    HalfClosedLocal,

    /// Half-closed (remote) - read side shut, can still send
    HalfClosedRemote,

    /// Closed - both sides shut
    Closed,
}

impl StreamState {
    /// Check if stream can send first-time data
    pub fn can_send(&self) -> bool {
        matches!(self, StreamState::Open | StreamState::HalfClosedRemote)
    }

    /// Check if stream can receive data
    pub fn can_receive(&self) -> bool {
        matches!(self, StreamState::Open | StreamState::HalfClosedLocal)
    }
}

/// Footprint charged for the transmit-side state of a stream.
pub(crate) const SEND_STATE_SIZE: usize = core::mem::size_of::<SendSide>();

/// Footprint charged for the receive-side state of a stream.
pub(crate) const RECV_STATE_SIZE: usize = core::mem::size_of::<RecvSide>();

#[derive(Debug)]
pub(crate) struct SendSide {
    /// Acknowledged outgoing ranges.
    pub(crate) acked: RangeSet,
    /// Composed data waiting to be (re)sent. No flow-control check applies
    /// when popping: credit was spent when the data was first queued.
    pub(crate) frames: RetransmitQueue,
    pub(crate) credit: SendCredit,
}

#[derive(Debug)]
pub(crate) struct RecvSide {
    pub(crate) reorder: ReorderBuffer,
    /// Highest offset seen in any received frame.
    pub(crate) last_offset: StreamOffset,
    pub(crate) credit: RecvCredit,
}

/// Per-stream reliability and flow-control state.
///
/// `U` is opaque application data attached to the stream.
#[derive(Debug)]
pub struct Stream<U = ()> {
    /// Send-queue ordering key; lower is served first.
    cycle: u64,
    tx_queued: bool,

    pub(crate) tx: SendSide,
    pub(crate) rx: RecvSide,

    id: StreamId,
    user_data: U,
    flags: StreamFlags,
    /// Error code we sent in RESET_STREAM or STOP_SENDING.
    app_error_code: u16,

    state_charge: StateCharge,
}

/// Charge for the stream state itself, returned when the stream goes away.
#[derive(Debug)]
struct StateCharge {
    mem: SharedPool,
    bytes: usize,
}

impl Drop for StateCharge {
    fn drop(&mut self) {
        self.mem.release(self.bytes);
    }
}

impl<U> Stream<U> {
    /// Create a stream.
    ///
    /// `max_rx_offset` is the receive window we announce initially;
    /// `max_tx_offset` is the send window the peer granted.
    ///
    /// # Errors
    /// Returns `Error::OutOfMemory` if the pool refuses the stream state.
    /// Nothing stays charged in that case.
    pub fn new(
        id: StreamId,
        flags: StreamFlags,
        max_rx_offset: u64,
        max_tx_offset: u64,
        user_data: U,
        mem: SharedPool,
    ) -> Result<Self> {
        Self::with_max_segments(
            id,
            flags,
            max_rx_offset,
            max_tx_offset,
            user_data,
            mem,
            crate::frame_chain::MAX_STREAM_DATACNT,
        )
    }

    pub(crate) fn with_max_segments(
        id: StreamId,
        flags: StreamFlags,
        max_rx_offset: u64,
        max_tx_offset: u64,
        user_data: U,
        mem: SharedPool,
        max_segments: usize,
    ) -> Result<Self> {
        let rx_state = Reservation::new(&*mem, RECV_STATE_SIZE)?;
        let tx_state = Reservation::new(&*mem, SEND_STATE_SIZE)?;
        let bytes = rx_state.commit() + tx_state.commit();

        let flags = flags.with_implied();
        debug!(stream_id = %id, ?flags, max_rx_offset, max_tx_offset, "stream initialized");

        Ok(Self {
            cycle: 0,
            tx_queued: false,
            tx: SendSide {
                acked: RangeSet::new(mem.clone()),
                frames: RetransmitQueue::with_max_segments(mem.clone(), max_segments),
                credit: SendCredit::new(max_tx_offset),
            },
            rx: RecvSide {
                reorder: ReorderBuffer::new(mem.clone()),
                last_offset: 0,
                credit: RecvCredit::new(max_rx_offset),
            },
            id,
            user_data,
            flags,
            app_error_code: 0,
            state_charge: StateCharge { mem, bytes },
        })
    }

    /// Free everything the stream holds and hand back the user data.
    ///
    /// The stream must already be unlinked from the id index and the send
    /// queue.
    pub fn release(mut self) -> U {
        debug_assert!(!self.tx_queued, "releasing stream {} still in send queue", self.id);
        debug!(
            stream_id = %self.id,
            queued_frames = self.tx.frames.len(),
            buffered = self.rx.reorder.buffered_bytes(),
            "stream released"
        );
        self.tx.frames.clear();
        self.rx.reorder.discard();

        let Stream { user_data, .. } = self;
        user_data
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn flags(&self) -> StreamFlags {
        self.flags
    }

    pub fn state(&self) -> StreamState {
        match (
            self.flags.contains(StreamFlags::SHUT_RD),
            self.flags.contains(StreamFlags::SHUT_WR),
        ) {
            (false, false) => StreamState::Open,
            (false, true) => StreamState::HalfClosedLocal,
            (true, false) => StreamState::HalfClosedRemote,
            (true, true) => StreamState::Closed,
        }
    }

    /// Shut one or both directions. Only `SHUT_RD`/`SHUT_WR` bits are used.
    /// Idempotent; buffered data is kept until explicitly discarded.
    pub fn shutdown(&mut self, how: StreamFlags) {
        let how = how.intersection(StreamFlags::SHUT_RDWR);
        if self.flags.contains(how) {
            return;
        }
        self.flags |= how;
        debug!(stream_id = %self.id, flags = ?self.flags, "stream shutdown");
    }

    /// OR `flags` in, together with the shutdown bits they imply.
    pub fn mark(&mut self, flags: StreamFlags) {
        self.flags |= flags.with_implied();
    }

    /// We sent RESET_STREAM with `app_error_code`.
    pub fn on_reset_sent(&mut self, app_error_code: u16) {
        self.app_error_code = app_error_code;
        self.mark(StreamFlags::SENT_RESET);
        debug!(stream_id = %self.id, app_error_code, "reset sent");
    }

    /// We sent STOP_SENDING with `app_error_code`.
    pub fn on_stop_sending_sent(&mut self, app_error_code: u16) {
        self.app_error_code = app_error_code;
        self.mark(StreamFlags::STOP_SENDING);
        debug!(stream_id = %self.id, app_error_code, "stop sending sent");
    }

    /// The peer reset its sending direction.
    pub fn on_reset_received(&mut self) {
        self.mark(StreamFlags::RECV_RESET);
        debug!(stream_id = %self.id, "reset received");
    }

    /// The peer acknowledged our RESET_STREAM.
    pub fn on_reset_acked(&mut self) {
        self.mark(StreamFlags::RESET_ACKED);
    }

    /// Error code carried in the RESET_STREAM or STOP_SENDING we sent.
    pub fn app_error_code(&self) -> u16 {
        self.app_error_code
    }

    pub fn user_data(&self) -> &U {
        &self.user_data
    }

    pub fn user_data_mut(&mut self) -> &mut U {
        &mut self.user_data
    }

    /// Send-queue ordering key.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub(crate) fn set_cycle(&mut self, cycle: u64) {
        self.cycle = cycle;
    }

    /// Whether the stream currently holds a place in the send queue.
    pub fn is_tx_queued(&self) -> bool {
        self.tx_queued
    }

    /// Record send-queue membership.
    pub(crate) fn set_tx_queued(&mut self, queued: bool) {
        self.tx_queued = queued;
    }
}
