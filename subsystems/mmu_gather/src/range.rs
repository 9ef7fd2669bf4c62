//! # Address Range Tracker
//!
//! Accumulates the smallest page-granular interval covering every entry
//! removed since the last flush.

use core::ops::{Range, RangeInclusive};

use crate::align_down;

/// Empty-interval sentinel for `start`
const EMPTY_START: u64 = u64::MAX;
/// Empty-interval sentinel for `last`
const EMPTY_LAST: u64 = 0;

/// Minimal interval touched by the current teardown pass
///
/// Stored as `[start, last]` so the top page of the address space is
/// representable. The empty interval is the sentinel `start = u64::MAX,
/// last = 0`, so widening is two comparisons with no separate "valid" flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRangeTracker {
    start: u64,
    last: u64,
}

impl AddressRangeTracker {
    /// Create an empty tracker
    pub const fn new() -> Self {
        Self {
            start: EMPTY_START,
            last: EMPTY_LAST,
        }
    }

    /// Check if nothing has been reported since the last reset
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start > self.last
    }

    /// Widen the interval to cover the page at `address`
    ///
    /// `page_size` must be a power of two.
    pub fn extend(&mut self, address: u64, page_size: u64) {
        let page = align_down(address, page_size);
        let page_last = page + (page_size - 1);

        if self.is_empty() {
            self.start = page;
            self.last = page_last;
        } else {
            self.start = self.start.min(page);
            self.last = self.last.max(page_last);
        }

        assert!(self.start <= self.last, "range tracker inverted: {:#x}..={:#x}", self.start, self.last);
    }

    /// Current interval, if any, with an inclusive end
    pub fn peek_inclusive(&self) -> Option<RangeInclusive<u64>> {
        if self.is_empty() {
            None
        } else {
            Some(self.start..=self.last)
        }
    }

    /// Current interval, if any
    ///
    /// The exclusive end saturates at `u64::MAX` when the top page is
    /// covered. Invalidation is by page start, so the top page is still
    /// included; use [`peek_inclusive`](Self::peek_inclusive) for the exact
    /// bound.
    pub fn peek(&self) -> Option<Range<u64>> {
        self.peek_inclusive()
            .map(|range| *range.start()..range.end().saturating_add(1))
    }

    /// Return the current interval and reset to empty
    pub fn take(&mut self) -> Option<Range<u64>> {
        let range = self.peek();
        *self = Self::new();
        range
    }
}

impl Default for AddressRangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: u64 = 0x1000;

    #[test]
    fn test_empty_tracker() {
        let mut tracker = AddressRangeTracker::new();
        assert!(tracker.is_empty());
        assert_eq!(tracker.take(), None);
    }

    #[test]
    fn test_single_unaligned_address() {
        let mut tracker = AddressRangeTracker::new();
        tracker.extend(0x5123, PAGE);
        assert_eq!(tracker.take(), Some(0x5000..0x6000));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_minimal_cover_out_of_order() {
        let mut tracker = AddressRangeTracker::new();
        for addr in [0x7000, 0x3fff, 0x9010, 0x4000] {
            tracker.extend(addr, PAGE);
        }
        assert_eq!(tracker.take(), Some(0x3000..0xa000));
    }

    #[test]
    fn test_take_resets_between_passes() {
        let mut tracker = AddressRangeTracker::new();
        tracker.extend(0x10_0000, PAGE);
        assert_eq!(tracker.take(), Some(0x10_0000..0x10_1000));

        tracker.extend(0x2000, PAGE);
        assert_eq!(tracker.take(), Some(0x2000..0x3000));
    }

    #[test]
    fn test_last_page_of_address_space() {
        let mut tracker = AddressRangeTracker::new();
        tracker.extend(u64::MAX - 5, PAGE);
        let top = u64::MAX & !(PAGE - 1);
        assert_eq!(tracker.peek_inclusive(), Some(top..=u64::MAX));

        let range = tracker.take().unwrap();
        assert_eq!(range.start, top);
        assert_eq!(range.end, u64::MAX);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_single_byte_pages_at_zero() {
        let mut tracker = AddressRangeTracker::new();
        tracker.extend(0, 1);
        assert!(!tracker.is_empty());
        assert_eq!(tracker.peek_inclusive(), Some(0..=0));
        assert_eq!(tracker.take(), Some(0..1));
    }
}
