//! # Frame Chains (RFC 9000 Section 19.8)
//!
//! A [`FrameChain`] references one contiguous span `[offset, offset + len)`
//! of outgoing stream data that has already been composed, plus the FIN
//! marker. It is the unit the retransmission queue stores, splits and merges.
//!
//! ## Zero-Copy Design
//!
//! Payload is held as a short list of reference-counted `Bytes` segments.
//! Splitting a chain slices a segment (`Bytes::split_to`) and merging two
//! chains moves segments from one list to the other; neither copies
//! payload. The number of segments is bounded like the data vector of a
//! STREAM frame so the packetizer can always encode one chain as one frame.

#![forbid(unsafe_code)]

use crate::types::StreamOffset;
use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;

/// Maximum number of data segments one chain may reference.
pub const MAX_STREAM_DATACNT: usize = 256;

/// Contiguous span of composed outgoing stream data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameChain {
    offset: StreamOffset,
    /// Never contains empty segments.
    data: VecDeque<Bytes>,
    len: usize,
    fin: bool,
}

impl FrameChain {
    /// Chain covering `data` at `offset`.
    pub fn new(offset: StreamOffset, data: Bytes, fin: bool) -> Self {
        Self::from_segments(offset, [data], fin)
    }

    /// Chain covering the concatenation of `segments` at `offset`.
    ///
    /// Empty segments are dropped.
    pub fn from_segments<I>(offset: StreamOffset, segments: I, fin: bool) -> Self
    where
        I: IntoIterator<Item = Bytes>,
    {
        let data: VecDeque<Bytes> = segments.into_iter().filter(|b| !b.is_empty()).collect();
        let len = data.iter().map(Bytes::len).sum();
        Self {
            offset,
            data,
            len,
            fin,
        }
    }

    /// Zero-length chain carrying only the FIN marker.
    pub fn fin_only(offset: StreamOffset) -> Self {
        Self::from_segments(offset, [], true)
    }

    /// Stream offset of the first byte.
    pub fn offset(&self) -> StreamOffset {
        self.offset
    }

    /// Offset one past the last byte.
    pub fn end(&self) -> StreamOffset {
        self.offset + self.len as u64
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether this chain ends the stream.
    pub fn fin(&self) -> bool {
        self.fin
    }

    /// Number of data segments referenced.
    pub fn segment_count(&self) -> usize {
        self.data.len()
    }

    /// Data segments in stream order.
    pub fn segments(&self) -> impl Iterator<Item = &Bytes> + '_ {
        self.data.iter()
    }

    /// Copy the payload into one contiguous buffer, e.g. for encoding.
    pub fn to_bytes(&self) -> Bytes {
        match self.data.len() {
            0 => Bytes::new(),
            1 => self.data[0].clone(),
            _ => {
                let mut buf = BytesMut::with_capacity(self.len);
                for seg in &self.data {
                    buf.extend_from_slice(seg);
                }
                buf.freeze()
            }
        }
    }

    /// Split at `at` bytes: `self` keeps `[offset, offset + at)` and the
    /// returned chain covers the rest. FIN moves to the returned chain.
    pub(crate) fn split_off(&mut self, at: usize) -> FrameChain {
        debug_assert!(at <= self.len);

        let mut acc = 0usize;
        let mut idx = 0usize;
        while idx < self.data.len() && acc + self.data[idx].len() <= at {
            acc += self.data[idx].len();
            idx += 1;
        }

        let mut rest = self.data.split_off(idx);
        if acc < at {
            // `at` falls inside the first segment of `rest`.
            let head = rest.front_mut().map(|seg| seg.split_to(at - acc));
            if let Some(head) = head {
                self.data.push_back(head);
            }
        }

        let tail = FrameChain {
            offset: self.offset + at as u64,
            data: rest,
            len: self.len - at,
            fin: self.fin,
        };
        self.len = at;
        self.fin = false;
        tail
    }

    /// Move up to `budget` bytes from the front of `next` onto the end of
    /// `self`, never letting `self` reference more than `max_segments`
    /// segments. `next` must start where `self` ends. Returns the number of
    /// bytes moved; `next` is advanced by that much.
    pub(crate) fn absorb(&mut self, next: &mut FrameChain, budget: usize, max_segments: usize) -> usize {
        debug_assert_eq!(self.end(), next.offset);

        let mut moved = 0usize;
        while moved < budget && self.data.len() < max_segments {
            let Some(front) = next.data.front_mut() else {
                break;
            };
            let take = front.len().min(budget - moved);
            let seg = if take == front.len() {
                next.data.pop_front()
            } else {
                Some(front.split_to(take))
            };
            if let Some(seg) = seg {
                self.data.push_back(seg);
            }
            moved += take;
        }

        self.len += moved;
        next.len -= moved;
        next.offset += moved as u64;
        moved
    }

    pub(crate) fn set_fin(&mut self, fin: bool) {
        self.fin = fin;
    }
}
