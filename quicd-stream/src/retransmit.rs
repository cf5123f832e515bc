//! # Retransmission Queue
//!
//! Offset-ordered queue of [`FrameChain`]s waiting to be (re)sent on one
//! stream.
//!
//! Chains are stored exactly as pushed; packing happens on [`pop`]: the
//! packetizer asks for "at most `n` bytes" (whatever space is left in the
//! datagram) and the queue answers with a single chain that is either a
//! prefix of the front chain (split) or the front chain followed by as much
//! contiguous data as fits (merge). Flow control is never re-checked here:
//! credit for every queued byte was spent when it was first composed.
//!
//! ## Example
//!
//! ```text
//! push [0..100), push [100..250)
//! pop(60)   → [0..60)          queue: [60..100), [100..250)
//! pop(1000) → [60..250)        queue: empty
//! ```
//!
//! [`pop`]: RetransmitQueue::pop

#![forbid(unsafe_code)]

use crate::error::Result;
use crate::frame_chain::{FrameChain, MAX_STREAM_DATACNT};
use crate::mem::{Reservation, SharedPool};
use crate::types::StreamOffset;
use std::collections::BTreeMap;
use tracing::trace;

/// Footprint charged per queued chain header.
pub(crate) const CHAIN_HEADER_SIZE: usize = core::mem::size_of::<FrameChain>();

/// Offset-ordered queue of pending frame chains.
///
/// Invariant: queued chains never overlap.
#[derive(Debug)]
pub struct RetransmitQueue {
    chains: BTreeMap<StreamOffset, FrameChain>,
    max_segments: usize,
    mem: SharedPool,
}

impl RetransmitQueue {
    pub fn new(mem: SharedPool) -> Self {
        Self::with_max_segments(mem, MAX_STREAM_DATACNT)
    }

    /// Queue whose merged chains reference at most `max_segments` segments.
    pub fn with_max_segments(mem: SharedPool, max_segments: usize) -> Self {
        Self {
            chains: BTreeMap::new(),
            max_segments: max_segments.clamp(1, MAX_STREAM_DATACNT),
            mem,
        }
    }

    /// Queue `chain` at its offset.
    ///
    /// The caller guarantees `chain` does not overlap anything already
    /// queued.
    ///
    /// # Errors
    /// Returns `Error::OutOfMemory` if the pool refuses the chain header; the
    /// queue is unchanged.
    pub fn push(&mut self, chain: FrameChain) -> Result<()> {
        debug_assert!(!self.overlaps(&chain), "overlapping push at {}", chain.offset());

        Reservation::new(&*self.mem, CHAIN_HEADER_SIZE)?.commit();
        self.chains.insert(chain.offset(), chain);
        Ok(())
    }

    /// Pop the lowest-offset data, packed into one chain of at most
    /// `max_bytes` bytes.
    ///
    /// - A front chain longer than `max_bytes` is split; the remainder (with
    ///   the FIN marker) stays queued at `offset + max_bytes`.
    /// - Otherwise following chains that start exactly where the result ends
    ///   are merged in while budget and segment room remain. A chain that
    ///   only partly fits donates its prefix.
    ///
    /// Returns `Ok(None)` when the queue is empty, or when `max_bytes` is 0
    /// and there is anything but a lone zero-length chain to send.
    ///
    /// # Errors
    /// Returns `Error::OutOfMemory` if a split needs a chain header the pool
    /// refuses; the queue is unchanged.
    pub fn pop(&mut self, max_bytes: usize) -> Result<Option<FrameChain>> {
        let queued = self.chains.len();
        let Some(front) = self.chains.first_entry() else {
            return Ok(None);
        };

        let front_len = front.get().len();
        if max_bytes == 0 && (front_len > 0 || queued > 1) {
            return Ok(None);
        }

        if front_len > max_bytes {
            // The remainder needs a header of its own before anything moves.
            let header = Reservation::new(&*self.mem, CHAIN_HEADER_SIZE)?;
            let mut chain = front.remove();
            let rest = chain.split_off(max_bytes);

            trace!(
                offset = chain.offset(),
                len = chain.len(),
                rest_offset = rest.offset(),
                rest_len = rest.len(),
                "split frame chain"
            );

            header.commit();
            self.chains.insert(rest.offset(), rest);
            self.mem.release(CHAIN_HEADER_SIZE);
            return Ok(Some(chain));
        }

        let mut chain = front.remove();
        self.mem.release(CHAIN_HEADER_SIZE);

        let mut left = max_bytes - chain.len();
        while left > 0 && chain.segment_count() < self.max_segments {
            let Some(mut next) = self.chains.first_entry() else {
                break;
            };
            if next.get().offset() != chain.end() {
                debug_assert!(chain.end() < next.get().offset());
                break;
            }

            if next.get().is_empty() {
                // Zero-length FIN chain: carry the marker, drop the header.
                chain.set_fin(chain.fin() || next.get().fin());
                next.remove();
                self.mem.release(CHAIN_HEADER_SIZE);
                break;
            }

            let moved = chain.absorb(next.get_mut(), left, self.max_segments);
            if moved == 0 {
                break;
            }
            left -= moved;

            if next.get().is_empty() {
                let absorbed = next.remove();
                chain.set_fin(absorbed.fin());
                self.mem.release(CHAIN_HEADER_SIZE);
                continue;
            }

            // Partly absorbed: re-key the remainder at its new offset.
            let rest = next.remove();
            self.chains.insert(rest.offset(), rest);
            break;
        }

        trace!(
            offset = chain.offset(),
            len = chain.len(),
            segments = chain.segment_count(),
            fin = chain.fin(),
            "pop frame chain"
        );
        Ok(Some(chain))
    }

    /// Lowest-offset chain without removing it, `None` if the queue is
    /// empty.
    pub fn peek_front(&self) -> Option<&FrameChain> {
        self.chains.values().next()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Number of queued chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Total payload bytes queued.
    pub fn queued_bytes(&self) -> usize {
        self.chains.values().map(FrameChain::len).sum()
    }

    /// Drop every queued chain.
    pub fn clear(&mut self) {
        self.mem.release(self.chains.len() * CHAIN_HEADER_SIZE);
        self.chains.clear();
    }

    fn overlaps(&self, chain: &FrameChain) -> bool {
        if self.chains.contains_key(&chain.offset()) {
            return true;
        }
        let prev = self
            .chains
            .range(..chain.offset())
            .next_back()
            .is_some_and(|(_, c)| c.end() > chain.offset());
        let next = self
            .chains
            .range(chain.offset()..)
            .next()
            .is_some_and(|(&off, _)| off < chain.end());
        prev || next
    }
}

impl Drop for RetransmitQueue {
    fn drop(&mut self) {
        self.clear();
    }
}
