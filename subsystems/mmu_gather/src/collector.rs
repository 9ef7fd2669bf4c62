//! # Page Collector
//!
//! Buffers frames whose mappings have been removed but whose translations
//! may still be cached. The collector never releases anything itself;
//! [`GatherSession::flush`](crate::GatherSession::flush) drains it after
//! the invalidation has completed.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::mem::size_of;

use crate::arena::GatherArena;
use crate::types::PhysFrame;
use crate::PAGE_SIZE;

/// Number of inline slots available without an overflow buffer
pub const INLINE_CAPACITY: usize = 8;

/// Handles held by a default overflow buffer (one page's worth)
pub const OVERFLOW_CAPACITY: usize = 512;

static_assertions::const_assert_eq!(OVERFLOW_CAPACITY * size_of::<PhysFrame>(), PAGE_SIZE);
static_assertions::const_assert!(OVERFLOW_CAPACITY > INLINE_CAPACITY);

// =============================================================================
// Overflow Buffer
// =============================================================================

/// Fixed-capacity buffer of frame handles
///
/// Obtained from a [`GatherArena`] and owned by exactly one collector at a
/// time. The length never changes after construction.
#[derive(Debug)]
pub struct GatherBuffer {
    slots: Box<[PhysFrame]>,
}

impl GatherBuffer {
    /// Allocate a buffer of `capacity` handles without aborting on failure
    pub fn try_new(capacity: usize) -> Option<Self> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity).ok()?;
        slots.resize(capacity, PhysFrame::NULL);
        Some(Self {
            slots: slots.into_boxed_slice(),
        })
    }

    /// Number of handles the buffer can hold
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

// =============================================================================
// Collector
// =============================================================================

/// Frames pending release
///
/// Starts on the inline slots. Once an overflow buffer is installed it
/// becomes the active store and stays so until
/// [`take_overflow`](Self::take_overflow).
#[derive(Debug)]
pub struct PageCollector {
    inline: [PhysFrame; INLINE_CAPACITY],
    overflow: Option<GatherBuffer>,
    count: usize,
}

impl PageCollector {
    /// Create an empty inline-only collector
    pub const fn new() -> Self {
        Self {
            inline: [PhysFrame::NULL; INLINE_CAPACITY],
            overflow: None,
            count: 0,
        }
    }

    /// Number of buffered frames
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Maximum number of frames the active store holds
    #[inline]
    pub fn capacity(&self) -> usize {
        match &self.overflow {
            Some(buf) => buf.capacity(),
            None => INLINE_CAPACITY,
        }
    }

    /// Free slots left before a flush is required
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.count
    }

    /// Check if nothing is buffered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Check if the overflow buffer is the active store
    #[inline]
    pub fn has_overflow(&self) -> bool {
        self.overflow.is_some()
    }

    fn slots(&self) -> &[PhysFrame] {
        match &self.overflow {
            Some(buf) => &buf.slots,
            None => &self.inline,
        }
    }

    fn slots_mut(&mut self) -> &mut [PhysFrame] {
        match &mut self.overflow {
            Some(buf) => &mut buf.slots,
            None => &mut self.inline,
        }
    }

    /// Buffer `frame`, returning `false` if the store is already full
    pub fn try_add(&mut self, frame: PhysFrame) -> bool {
        let count = self.count;
        if count == self.capacity() {
            return false;
        }
        self.slots_mut()[count] = frame;
        self.count = count + 1;
        assert!(self.count <= self.capacity());
        true
    }

    /// Hand out every buffered frame and reset the count
    ///
    /// The frames are not released here. The iterator must be run to
    /// completion by the caller or the remaining frames are leaked.
    pub fn drain(&mut self) -> impl Iterator<Item = PhysFrame> + '_ {
        let count = core::mem::replace(&mut self.count, 0);
        self.slots()[..count].iter().copied()
    }

    /// Switch to an overflow buffer from `arena` if still on inline slots
    ///
    /// Only an empty collector is switched. Arena failure leaves the inline
    /// store in place. Returns `true` if a buffer was installed.
    pub fn grow_if_possible<A>(&mut self, arena: &A, capacity: usize) -> bool
    where
        A: GatherArena + ?Sized,
    {
        if self.overflow.is_some() || self.count != 0 || capacity <= INLINE_CAPACITY {
            return false;
        }

        match arena.try_alloc(capacity) {
            Some(buf) if buf.capacity() > INLINE_CAPACITY => {
                self.overflow = Some(buf);
                true
            },
            Some(buf) => {
                arena.free(buf);
                false
            },
            None => false,
        }
    }

    /// Remove the overflow buffer, reverting to inline slots
    ///
    /// # Panics
    ///
    /// Panics if frames are still buffered.
    pub fn take_overflow(&mut self) -> Option<GatherBuffer> {
        assert!(self.count == 0, "overflow buffer taken with {} frames pending", self.count);
        self.overflow.take()
    }
}

impl Default for PageCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{HeapArena, NoOverflow};

    fn frames(n: u64) -> impl Iterator<Item = PhysFrame> {
        (1..=n).map(PhysFrame::from_pfn)
    }

    #[test]
    fn test_inline_fill_and_reject() {
        let mut collector = PageCollector::new();
        for frame in frames(INLINE_CAPACITY as u64) {
            assert!(collector.try_add(frame));
        }
        assert_eq!(collector.remaining(), 0);
        assert!(!collector.try_add(PhysFrame::from_pfn(99)));
        assert_eq!(collector.count(), INLINE_CAPACITY);
    }

    #[test]
    fn test_drain_returns_in_order_and_resets() {
        let mut collector = PageCollector::new();
        for frame in frames(3) {
            collector.try_add(frame);
        }
        let drained: Vec<_> = collector.drain().collect();
        assert_eq!(drained, frames(3).collect::<Vec<_>>());
        assert!(collector.is_empty());
        assert_eq!(collector.drain().count(), 0);
    }

    #[test]
    fn test_grow_switches_to_overflow() {
        let mut collector = PageCollector::new();
        assert!(collector.grow_if_possible(&HeapArena, OVERFLOW_CAPACITY));
        assert!(collector.has_overflow());
        assert_eq!(collector.capacity(), OVERFLOW_CAPACITY);

        // Second attempt is a no-op
        assert!(!collector.grow_if_possible(&HeapArena, OVERFLOW_CAPACITY));
    }

    #[test]
    fn test_grow_failure_keeps_inline() {
        let mut collector = PageCollector::new();
        assert!(!collector.grow_if_possible(&NoOverflow, OVERFLOW_CAPACITY));
        assert_eq!(collector.capacity(), INLINE_CAPACITY);
    }

    #[test]
    fn test_grow_refused_while_frames_pending() {
        let mut collector = PageCollector::new();
        collector.try_add(PhysFrame::from_pfn(1));
        assert!(!collector.grow_if_possible(&HeapArena, OVERFLOW_CAPACITY));
        assert_eq!(collector.capacity(), INLINE_CAPACITY);
    }

    #[test]
    fn test_take_overflow_reverts_to_inline() {
        let mut collector = PageCollector::new();
        collector.grow_if_possible(&HeapArena, 64);
        let buf = collector.take_overflow().unwrap();
        assert_eq!(buf.capacity(), 64);
        assert_eq!(collector.capacity(), INLINE_CAPACITY);
    }

    #[test]
    #[should_panic]
    fn test_take_overflow_with_pending_frames_panics() {
        let mut collector = PageCollector::new();
        collector.grow_if_possible(&HeapArena, 64);
        collector.try_add(PhysFrame::from_pfn(1));
        let _ = collector.take_overflow();
    }
}
