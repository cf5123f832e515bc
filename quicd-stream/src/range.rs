//! # Interval Tracking over the Stream Offset Space
//!
//! [`RangeSet`] records disjoint, non-adjacent `[start, end)` ranges. It backs
//! both the acknowledged-send tracker of the transmit side and the
//! received-range coverage of the reorder buffer.
//!
//! ## Example
//!
//! ```text
//! insert(0..10), insert(20..30)   → {0..10, 20..30}
//! insert(10..20)                  → {0..30}
//! first_gap_from(0)               → 30
//! ```

#![forbid(unsafe_code)]

use crate::error::Result;
use crate::mem::{Reservation, SharedPool};
use core::ops::Range;
use std::collections::BTreeMap;

/// Footprint charged per stored range.
pub(crate) const RANGE_ENTRY_SIZE: usize = 2 * core::mem::size_of::<u64>();

/// Disjoint set of half-open `u64` ranges.
///
/// Overlapping and adjacent insertions are coalesced, so every stored range
/// is separated from its neighbours by at least one missing offset.
#[derive(Debug)]
pub struct RangeSet {
    /// start -> end (exclusive)
    ranges: BTreeMap<u64, u64>,
    mem: SharedPool,
}

impl RangeSet {
    pub fn new(mem: SharedPool) -> Self {
        Self {
            ranges: BTreeMap::new(),
            mem,
        }
    }

    /// Insert `range`, merging with any overlapping or adjacent ranges.
    ///
    /// Inserting a range already covered is a no-op.
    ///
    /// # Errors
    /// Returns `Error::OutOfMemory` only when the range touches nothing and a
    /// new entry has to be stored; the set is unchanged in that case.
    pub fn insert(&mut self, range: Range<u64>) -> Result<()> {
        if range.is_empty() {
            return Ok(());
        }

        if !self.touches(&range) {
            Reservation::new(&*self.mem, RANGE_ENTRY_SIZE)?.commit();
            self.ranges.insert(range.start, range.end);
            return Ok(());
        }

        let mut start = range.start;
        let mut end = range.end;
        let mut removed = 0usize;

        while let Some((&s, &e)) = self.ranges.range(..=end).next_back() {
            if e < start {
                break;
            }
            self.ranges.remove(&s);
            removed += 1;
            start = start.min(s);
            end = end.max(e);
        }

        self.ranges.insert(start, end);
        // One entry replaces `removed` entries.
        if removed > 1 {
            self.mem.release((removed - 1) * RANGE_ENTRY_SIZE);
        }
        Ok(())
    }

    /// Lowest offset `>= offset` that is not covered.
    pub fn first_gap_from(&self, offset: u64) -> u64 {
        match self.ranges.range(..=offset).next_back() {
            Some((_, &end)) if end > offset => end,
            _ => offset,
        }
    }

    /// True if every offset of `range` is covered. Empty ranges are covered.
    pub fn covers(&self, range: Range<u64>) -> bool {
        if range.is_empty() {
            return true;
        }
        match self.ranges.range(..=range.start).next_back() {
            Some((_, &end)) => end >= range.end,
            None => false,
        }
    }

    /// Sub-ranges of `range` that are not covered, in ascending order.
    pub fn gaps_within(&self, range: Range<u64>) -> Vec<Range<u64>> {
        let mut gaps = Vec::new();
        let mut pos = range.start;

        while pos < range.end {
            pos = self.first_gap_from(pos);
            if pos >= range.end {
                break;
            }
            let next_start = self
                .ranges
                .range(pos..range.end)
                .next()
                .map_or(range.end, |(&s, _)| s);
            gaps.push(pos..next_start);
            pos = next_start;
        }

        gaps
    }

    /// Number of disjoint ranges stored.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Iterate over the stored ranges in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Range<u64>> + '_ {
        self.ranges.iter().map(|(&s, &e)| s..e)
    }

    /// Remove every range.
    pub fn clear(&mut self) {
        self.mem.release(self.ranges.len() * RANGE_ENTRY_SIZE);
        self.ranges.clear();
    }

    /// True if `range` overlaps or is adjacent to a stored range.
    fn touches(&self, range: &Range<u64>) -> bool {
        self.ranges
            .range(..=range.end)
            .next_back()
            .is_some_and(|(_, &e)| e >= range.start)
    }
}

impl Drop for RangeSet {
    fn drop(&mut self) {
        self.clear();
    }
}
