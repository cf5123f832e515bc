//! Benchmarks for the stream send path.
//!
//! These benchmarks measure the hot path performance of:
//! - Retransmission queue pop with splitting (budget smaller than chains)
//! - Retransmission queue pop with merging (many small writes)
//! - Out-of-order receive into the reorder buffer
//!
//! Run with: cargo bench -p quicd-stream --bench retransmit_queue

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quicd_stream::{FrameChain, RetransmitQueue, Stream, StreamFlags, StreamId, SystemPool};

const DATAGRAM_PAYLOAD: usize = 1200;

/// Fill a queue with `count` contiguous chains of `chunk` bytes.
fn filled_queue(count: usize, chunk: usize) -> RetransmitQueue {
    let data = Bytes::from(vec![0xabu8; chunk]);
    let mut q = RetransmitQueue::new(SystemPool::shared());
    for i in 0..count {
        q.push(FrameChain::new((i * chunk) as u64, data.clone(), false))
            .expect("system pool never refuses");
    }
    q
}

/// Large writes drained one datagram at a time (split path)
fn bench_pop_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("retransmit_pop_split");

    for chunk in [4 * 1024, 64 * 1024] {
        group.throughput(Throughput::Bytes((16 * chunk) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.iter_batched(
                || filled_queue(16, chunk),
                |mut q| {
                    while let Some(chain) = q.pop(DATAGRAM_PAYLOAD).unwrap() {
                        black_box(chain);
                    }
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Many small writes coalesced into full datagrams (merge path)
fn bench_pop_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("retransmit_pop_merge");

    for chunk in [16, 100, 500] {
        let count = 64 * 1024 / chunk;
        group.throughput(Throughput::Bytes((count * chunk) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.iter_batched(
                || filled_queue(count, chunk),
                |mut q| {
                    while let Some(chain) = q.pop(DATAGRAM_PAYLOAD).unwrap() {
                        black_box(chain);
                    }
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Datagrams received in reverse order, then read out
fn bench_recv_reverse_order(c: &mut Criterion) {
    let payload = vec![0x5au8; DATAGRAM_PAYLOAD];
    let packets = 64;

    let mut group = c.benchmark_group("recv_reordering");
    group.throughput(Throughput::Bytes((packets * DATAGRAM_PAYLOAD) as u64));
    group.bench_function("reverse_64", |b| {
        b.iter(|| {
            let mut s = Stream::new(
                StreamId::new(1),
                StreamFlags::NONE,
                u32::MAX as u64,
                0,
                (),
                SystemPool::shared(),
            )
            .unwrap();
            for i in (0..packets).rev() {
                s.recv_reordering(&payload, (i * DATAGRAM_PAYLOAD) as u64)
                    .unwrap();
            }
            while let Some(chunk) = s.read_contiguous() {
                black_box(chunk);
            }
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_pop_split,
    bench_pop_merge,
    bench_recv_reverse_order
);
criterion_main!(benches);
