//! Property tests for reassembly, retransmission packing, acknowledgment
//! tracking and receive-window bookkeeping.

use proptest::collection::vec;
use proptest::prelude::*;
use proptest::sample::Index;
use quicd_stream::{
    FrameChain, MemoryPool, ReorderBuffer, RetransmitQueue, Stream, StreamFlags, StreamId,
    SystemPool,
};
use std::sync::Arc;

/// Byte stored at stream offset `offset` in every generated payload.
fn byte_at(offset: u64) -> u8 {
    (offset % 251) as u8
}

fn bytes_at(offset: u64, len: usize) -> Vec<u8> {
    (offset..offset + len as u64).map(byte_at).collect()
}

#[test]
fn prop_any_arrival_order_reassembles() {
    proptest!(|(len in 1usize..4096,
                sizes in vec(1usize..300, 1..32),
                picks in vec(any::<Index>(), 1..32),
                dups in vec((any::<Index>(), 1usize..400), 0..16))| {
        let mut pieces = Vec::new();
        let mut off = 0usize;
        let mut i = 0usize;
        while off < len {
            let n = sizes[i % sizes.len()].min(len - off);
            pieces.push((off, n));
            off += n;
            i += 1;
        }

        let mut order = Vec::with_capacity(pieces.len());
        let mut k = 0usize;
        while !pieces.is_empty() {
            let idx = picks[k % picks.len()].index(pieces.len());
            order.push(pieces.swap_remove(idx));
            k += 1;
        }

        let mut s = Stream::new(
            StreamId::new(1),
            StreamFlags::NONE,
            len as u64,
            0,
            (),
            SystemPool::shared(),
        )
        .unwrap();

        let mut out = Vec::with_capacity(len);
        for (j, &(o, n)) in order.iter().enumerate() {
            s.recv_reordering(&bytes_at(o as u64, n), o as u64).unwrap();

            if let Some(&(start, dlen)) = dups.get(j) {
                let start = start.index(len);
                let dlen = dlen.min(len - start);
                s.recv_reordering(&bytes_at(start as u64, dlen), start as u64).unwrap();
            }

            while let Some((at, chunk)) = s.read_contiguous() {
                prop_assert_eq!(at as usize, out.len());
                out.extend_from_slice(&chunk);
            }
        }

        prop_assert_eq!(out, bytes_at(0, len));
        prop_assert_eq!(s.rx_offset(), len as u64);
        prop_assert_eq!(s.last_offset(), len as u64);
        prop_assert_eq!(s.buffered_bytes(), 0);
    });
}

#[test]
fn prop_overlap_never_double_counts() {
    proptest!(|(frames in vec((0u64..2000, 0usize..300), 1..40))| {
        let pool = Arc::new(SystemPool::new());
        let mut buf = ReorderBuffer::new(pool.clone());

        for &(offset, len) in &frames {
            buf.push(offset, &bytes_at(offset, len)).unwrap();

            let covered: u64 = buf.received().iter().map(|r| r.end - r.start).sum();
            prop_assert_eq!(buf.buffered_bytes() as u64, covered);
        }

        let mut expected = vec![false; 2300];
        for &(offset, len) in &frames {
            for slot in &mut expected[offset as usize..offset as usize + len] {
                *slot = true;
            }
        }
        let first_gap = expected.iter().position(|&b| !b).unwrap_or(expected.len());
        prop_assert_eq!(buf.first_gap(), first_gap as u64);

        drop(buf);
        prop_assert_eq!(pool.in_use(), 0);
    });
}

#[test]
fn prop_drain_returns_pushed_bytes_in_order() {
    proptest!(|(chains in vec((0u64..50, 0usize..400), 1..24),
                budgets in vec(1usize..600, 1..16),
                fin in any::<bool>())| {
        let pool = Arc::new(SystemPool::new());
        let mut q = RetransmitQueue::new(pool.clone());

        let mut expected = Vec::new();
        let mut off = 0u64;
        let last = chains.len() - 1;
        for (i, &(gap, len)) in chains.iter().enumerate() {
            off += gap;
            let chain_fin = fin && i == last;
            if len == 0 && !chain_fin {
                continue;
            }
            let data = bytes_at(off, len);
            expected.push((off, len));
            q.push(FrameChain::new(off, data.into(), chain_fin)).unwrap();
            off += len as u64;
        }
        let end = off;
        let total: usize = expected.iter().map(|&(_, len)| len).sum();

        let mut popped = 0usize;
        let mut prev_end = 0u64;
        let mut saw_fin = false;
        let mut k = 0usize;
        while let Some(chain) = q.pop(budgets[k % budgets.len()]).unwrap() {
            prop_assert!(chain.len() <= budgets[k % budgets.len()]);
            prop_assert!(chain.offset() >= prev_end);
            prop_assert!(!saw_fin);
            let got = chain.to_bytes();
            let want = bytes_at(chain.offset(), chain.len());
            prop_assert_eq!(&got[..], &want[..]);

            if chain.fin() {
                prop_assert_eq!(chain.end(), end);
                saw_fin = true;
            }
            prev_end = chain.end();
            popped += chain.len();
            k += 1;
        }

        prop_assert!(q.is_empty());
        prop_assert_eq!(popped, total);
        prop_assert_eq!(saw_fin, fin);
        drop(q);
        prop_assert_eq!(pool.in_use(), 0);
    });
}

#[test]
fn prop_all_acked_iff_every_byte_acked() {
    proptest!(|(len in 0usize..1500, acks in vec((0u64..1500, 0u64..400), 0..32))| {
        let mut s = Stream::new(
            StreamId::new(0),
            StreamFlags::NONE,
            0,
            len as u64,
            (),
            SystemPool::shared(),
        )
        .unwrap();
        prop_assert_eq!(s.write(bytes_at(0, len).into(), false).unwrap(), len);

        let mut acked = vec![false; len];
        for &(offset, n) in &acks {
            let end = (offset + n).min(len as u64);
            if offset >= end {
                continue;
            }
            s.on_data_acked(offset, end - offset).unwrap();
            for slot in &mut acked[offset as usize..end as usize] {
                *slot = true;
            }
        }

        let first_unacked = acked.iter().position(|&b| !b).unwrap_or(len);
        prop_assert_eq!(s.next_unacked_offset(), first_unacked as u64);
        prop_assert_eq!(s.is_all_tx_data_acked(), acked.iter().all(|&b| b));
    });
}

#[test]
fn prop_pending_window_never_below_announced() {
    proptest!(|(initial in 0u64..100_000, ops in vec((0u8..3, 0u64..200_000), 1..64))| {
        let mut s = Stream::new(
            StreamId::new(3),
            StreamFlags::NONE,
            initial,
            0,
            (),
            SystemPool::shared(),
        )
        .unwrap();

        for &(op, value) in &ops {
            let announced = s.recv_window();
            match op {
                0 => {
                    s.set_pending_recv_window(value);
                }
                1 => {
                    s.extend_pending_recv_window(value);
                }
                _ => {
                    let pending = s.pending_recv_window();
                    match s.commit_recv_window() {
                        Some(v) => {
                            prop_assert_eq!(v, pending);
                        }
                        None => {
                            prop_assert_eq!(pending, announced);
                        }
                    }
                }
            }
            prop_assert!(s.pending_recv_window() >= s.recv_window());
            prop_assert!(s.recv_window() >= announced);
        }
    });
}
