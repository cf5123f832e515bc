//! # Pluggable Memory Accounting
//!
//! Every structure in this crate that grows (range entries, buffered receive
//! segments, retransmission chain headers, per-stream state) charges its
//! footprint against one [`MemoryPool`] before mutating anything. A refused
//! charge surfaces as [`Error::OutOfMemory`] and the caller's state is left
//! untouched.
//!
//! ## Zero-Contention Design
//!
//! A pool is shared by `Arc` between all streams of a connection (or all
//! connections of a worker). Counters are atomics so the same pool can be
//! handed to several connections living on one worker thread, but nothing
//! here ever blocks.

#![forbid(unsafe_code)]

use crate::error::{Error, Result};
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared handle to the allocation source of a connection.
pub type SharedPool = Arc<dyn MemoryPool>;

/// Allocation source for the stream engine.
pub trait MemoryPool: fmt::Debug + Send + Sync {
    /// Charge `bytes` against the pool.
    ///
    /// # Errors
    /// Returns `Error::OutOfMemory` if the pool cannot satisfy the charge.
    fn try_reserve(&self, bytes: usize) -> Result<()>;

    /// Return `bytes` previously charged with `try_reserve`.
    fn release(&self, bytes: usize);

    /// Bytes currently charged.
    fn in_use(&self) -> usize;
}

/// Pool without a limit; charges are only counted.
#[derive(Debug, Default)]
pub struct SystemPool {
    in_use: AtomicUsize,
}

impl SystemPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedPool {
        Arc::new(Self::new())
    }
}

impl MemoryPool for SystemPool {
    fn try_reserve(&self, bytes: usize) -> Result<()> {
        self.in_use.fetch_add(bytes, Ordering::Relaxed);
        Ok(())
    }

    fn release(&self, bytes: usize) {
        self.in_use.fetch_sub(bytes, Ordering::Relaxed);
    }

    fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }
}

/// Pool with a hard byte limit.
///
/// Used to cap per-connection buffering, and by tests to force allocation
/// failure at a precise point.
#[derive(Debug)]
pub struct BoundedPool {
    limit: AtomicUsize,
    in_use: AtomicUsize,
}

impl BoundedPool {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: AtomicUsize::new(limit),
            in_use: AtomicUsize::new(0),
        }
    }

    pub fn shared(limit: usize) -> Arc<Self> {
        Arc::new(Self::new(limit))
    }

    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::Relaxed)
    }

    /// Change the limit. Charges already held are kept even if they now
    /// exceed it; only new reservations are refused.
    pub fn set_limit(&self, limit: usize) {
        self.limit.store(limit, Ordering::Relaxed);
    }

    /// Bytes still available before the limit is hit.
    pub fn available(&self) -> usize {
        self.limit().saturating_sub(self.in_use())
    }
}

impl MemoryPool for BoundedPool {
    fn try_reserve(&self, bytes: usize) -> Result<()> {
        let limit = self.limit();
        self.in_use
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                used.checked_add(bytes).filter(|&next| next <= limit)
            })
            .map(|_| ())
            .map_err(|_| Error::OutOfMemory { requested: bytes })
    }

    fn release(&self, bytes: usize) {
        self.in_use.fetch_sub(bytes, Ordering::Relaxed);
    }

    fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }
}

/// A charge held against a pool.
///
/// Dropping an uncommitted reservation returns the bytes, so a compound
/// operation can reserve everything it needs up front and bail out with `?`
/// at any later point without leaking accounting.
#[must_use = "an uncommitted reservation is released when dropped"]
pub struct Reservation<'a> {
    pool: &'a dyn MemoryPool,
    bytes: usize,
}

impl<'a> Reservation<'a> {
    pub fn new(pool: &'a dyn MemoryPool, bytes: usize) -> Result<Self> {
        pool.try_reserve(bytes)?;
        Ok(Self { pool, bytes })
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Keep the charge. The caller becomes responsible for releasing it.
    pub fn commit(mut self) -> usize {
        core::mem::take(&mut self.bytes)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.bytes > 0 {
            self.pool.release(self.bytes);
        }
    }
}

impl fmt::Debug for Reservation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation").field("bytes", &self.bytes).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_pool_refuses_over_limit() {
        let pool = BoundedPool::new(100);
        pool.try_reserve(60).unwrap();
        assert_eq!(
            pool.try_reserve(41),
            Err(Error::OutOfMemory { requested: 41 })
        );
        assert_eq!(pool.in_use(), 60);
        pool.try_reserve(40).unwrap();
        assert_eq!(pool.available(), 0);
        pool.release(100);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_reservation_released_on_drop() {
        let pool = BoundedPool::new(10);
        {
            let r = Reservation::new(&pool, 8).unwrap();
            assert_eq!(r.bytes(), 8);
            assert_eq!(pool.in_use(), 8);
        }
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_reservation_commit_keeps_charge() {
        let pool = BoundedPool::new(10);
        let r = Reservation::new(&pool, 8).unwrap();
        assert_eq!(r.commit(), 8);
        assert_eq!(pool.in_use(), 8);
        assert!(Reservation::new(&pool, 3).is_err());
    }

    #[test]
    fn test_system_pool_counts() {
        let pool = SystemPool::new();
        pool.try_reserve(usize::MAX / 2).unwrap();
        pool.release(usize::MAX / 2);
        assert_eq!(pool.in_use(), 0);
    }
}
