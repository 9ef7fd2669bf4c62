//! # Gather Session
//!
//! Per-teardown context that batches frame release behind TLB
//! invalidation.
//!
//! ## Walker Protocol
//!
//! ```text
//!   open ─▶ begin_region ─▶ report_removed_entry / report_removed_page ─▶ end_region ─┐
//!             ▲                                                                       │
//!             └───────────────────────────────────────────────────────────────────────┘
//!                                                                        close (or drop)
//! ```
//!
//! For a whole address space teardown (`full_teardown`) the region calls
//! are no-ops and every flush invalidates the whole space once.
//!
//! ## State Machine
//!
//! `Created → (Ranging ⇄ Flushing)* → Closed`

use core::ops::Range;

use crate::arena::GatherArena;
use crate::collector::PageCollector;
use crate::config::GatherConfig;
use crate::ops::{AddressSpace, FrameAllocator, TlbMaintenance, VmRegion};
use crate::policy::FlushPolicy;
use crate::range::AddressRangeTracker;
use crate::stats::GatherStats;
use crate::types::{LevelSpan, PhysFrame};

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle state of a [`GatherSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Opened, nothing reported yet
    Created,
    /// Accumulating removed entries and frames
    Ranging,
    /// Inside the invalidate-then-release step
    Flushing,
    /// Final flush done; terminal
    Closed,
}

/// Outcome of reporting a removed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDisposition {
    /// Released on the spot (immediate policy)
    Released,
    /// Buffered; `remaining` slots are still free
    Queued {
        /// Free collector slots after this frame
        remaining: usize,
    },
    /// Buffered and the collector filled up, so a flush already ran and
    /// the frame has been released
    Flushed,
}

// =============================================================================
// Gather Session
// =============================================================================

/// Batched teardown of one address space or region
///
/// Driven by a single context. Dropping the session runs the same final
/// flush as [`close`](Self::close), so early returns from a walker never
/// leave frames unreleased or translations stale.
pub struct GatherSession<'a, T, F, A>
where
    T: TlbMaintenance,
    F: FrameAllocator,
    A: GatherArena,
{
    space: &'a dyn AddressSpace,
    tlb: T,
    frames: F,
    arena: A,
    full_teardown: bool,
    /// Last region begun; kept after `end_region` so later flushes stay
    /// ranged
    region: Option<&'a dyn VmRegion>,
    region_open: bool,
    range: AddressRangeTracker,
    collector: PageCollector,
    policy: FlushPolicy,
    config: GatherConfig,
    state: SessionState,
    stats: GatherStats,
}

impl<'a, T, F, A> GatherSession<'a, T, F, A>
where
    T: TlbMaintenance,
    F: FrameAllocator,
    A: GatherArena,
{
    /// Open a session on `space`
    ///
    /// `full_teardown` is set when the whole address space is being
    /// destroyed; range tracking is then skipped in favour of one
    /// address-space invalidate per flush. An overflow buffer is requested
    /// from `arena` right away; failure only limits the batch size.
    pub fn open(
        space: &'a dyn AddressSpace,
        full_teardown: bool,
        tlb: T,
        frames: F,
        arena: A,
        config: GatherConfig,
    ) -> Self {
        let mut session = Self {
            space,
            tlb,
            frames,
            arena,
            full_teardown,
            region: None,
            region_open: false,
            range: AddressRangeTracker::new(),
            collector: PageCollector::new(),
            policy: config.policy(),
            config,
            state: SessionState::Created,
            stats: GatherStats::new(),
        };
        session.try_grow();

        log::trace!(
            "mmu_gather: open asid={} full={} policy={:?} capacity={}",
            space.asid(),
            full_teardown,
            session.policy,
            session.collector.capacity()
        );

        session
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Policy resolved at open
    #[inline]
    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Whether the whole address space is being torn down
    #[inline]
    pub fn is_full_teardown(&self) -> bool {
        self.full_teardown
    }

    /// Whether a region pass is in progress
    #[inline]
    pub fn in_region(&self) -> bool {
        self.region_open
    }

    /// Frames waiting for the next flush
    #[inline]
    pub fn pending_frames(&self) -> usize {
        self.collector.count()
    }

    /// Current collector capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.collector.capacity()
    }

    /// Interval the next ranged invalidate would cover
    pub fn tracked_range(&self) -> Option<Range<u64>> {
        self.range.peek()
    }

    /// Counters so far
    #[inline]
    pub fn stats(&self) -> &GatherStats {
        &self.stats
    }

    fn assert_open(&self) {
        assert!(self.state != SessionState::Closed, "mmu_gather: session used after close");
    }

    fn page_size(&self) -> u64 {
        self.config.page_size() as u64
    }

    // -------------------------------------------------------------------------
    // Region pass
    // -------------------------------------------------------------------------

    /// Enter a per-region pass
    ///
    /// Flushes virtually indexed caches for the whole region and starts a
    /// fresh range. Entries and frames reported outside any region are
    /// flushed first. No-op during a full teardown.
    pub fn begin_region(&mut self, region: &'a dyn VmRegion) {
        self.assert_open();
        if self.full_teardown {
            return;
        }

        if !self.range.is_empty() || !self.collector.is_empty() {
            self.flush();
        }

        self.tlb.flush_cache_range(region, region.start(), region.end());
        self.region = Some(region);
        self.region_open = true;
        self.state = SessionState::Ranging;
    }

    /// Leave a per-region pass, flushing what it accumulated
    ///
    /// The region stays the flush context, so a later flush with nothing
    /// tracked invalidates nothing. No-op during a full teardown.
    pub fn end_region(&mut self, region: &'a dyn VmRegion) {
        self.assert_open();
        if self.full_teardown {
            return;
        }

        let same = self.region.is_some_and(|current| {
            core::ptr::eq(
                current as *const dyn VmRegion as *const (),
                region as *const dyn VmRegion as *const (),
            )
        });
        debug_assert!(
            self.region_open && same,
            "mmu_gather: end_region for a region that was not begun"
        );

        self.flush();
        self.region_open = false;
    }

    // -------------------------------------------------------------------------
    // Reporting
    // -------------------------------------------------------------------------

    /// Record that the mapping at `address` was removed
    pub fn report_removed_entry(&mut self, address: u64) {
        self.assert_open();
        if !self.full_teardown {
            self.range.extend(address, self.page_size());
        }
        self.state = SessionState::Ranging;
    }

    /// Hand over the frame that backed a removed mapping
    ///
    /// Under the buffered policy the frame is queued, and a full collector
    /// is flushed before returning.
    pub fn report_removed_page(&mut self, frame: PhysFrame) -> PageDisposition {
        self.assert_open();
        self.state = SessionState::Ranging;

        match self.policy {
            FlushPolicy::Immediate => {
                self.frames.release(frame);
                self.stats.frames_released += 1;
                PageDisposition::Released
            },
            FlushPolicy::Buffered => {
                if !self.collector.try_add(frame) {
                    self.flush();
                    let added = self.collector.try_add(frame);
                    assert!(added, "mmu_gather: collector full after flush");
                }

                match self.collector.remaining() {
                    0 => {
                        self.flush();
                        PageDisposition::Flushed
                    },
                    remaining => PageDisposition::Queued { remaining },
                }
            },
        }
    }

    /// Hand over an intermediate page table freed while tearing down
    /// `address`
    ///
    /// Widens the range over the whole `span` the table translated before
    /// queueing its frame, so walk caches holding the table are
    /// invalidated too.
    pub fn report_removed_table(
        &mut self,
        frame: PhysFrame,
        address: u64,
        span: LevelSpan,
    ) -> PageDisposition {
        let base = span.base_of(address);
        self.report_removed_entry(base);
        self.report_removed_entry(base + span.bytes().saturating_sub(self.page_size()));
        self.report_removed_page(frame)
    }

    // -------------------------------------------------------------------------
    // Flush
    // -------------------------------------------------------------------------

    /// Invalidate, then release every buffered frame
    ///
    /// Without a region context (or in a full teardown) the whole address
    /// space is invalidated, even when nothing was reported. Inside one only
    /// the tracked range is. The invalidation has returned, on every
    /// processor, before the first frame is released.
    pub fn flush(&mut self) {
        self.flush_batch(true);
    }

    fn flush_batch(&mut self, regrow: bool) {
        self.assert_open();
        assert!(self.state != SessionState::Flushing, "mmu_gather: re-entrant flush");
        self.state = SessionState::Flushing;

        let range = self.range.take();

        match self.region {
            Some(_) if !self.full_teardown => {
                if let Some(range) = &range {
                    self.tlb.invalidate_range(self.space, range.start, range.end);
                    self.stats.range_invalidates += 1;
                    self.stats.range_bytes += range.end - range.start;
                }
            },
            _ => {
                self.tlb.invalidate_all(self.space);
                self.stats.full_invalidates += 1;
            },
        }

        let released = self.collector.count();
        for frame in self.collector.drain() {
            self.frames.release(frame);
        }
        self.stats.frames_released += released as u64;
        self.stats.flushes += 1;

        log::trace!(
            "mmu_gather: flush asid={} range={:?} released={}",
            self.space.asid(),
            range,
            released
        );

        if regrow {
            self.try_grow();
        }
        self.state = SessionState::Ranging;
    }

    fn try_grow(&mut self) {
        if !self.policy.is_buffered()
            || !self.config.try_overflow()
            || self.collector.has_overflow()
        {
            return;
        }

        if self
            .collector
            .grow_if_possible(&self.arena, self.config.overflow_capacity())
        {
            self.stats.overflow_grants += 1;
            log::debug!("mmu_gather: overflow buffer of {} slots", self.collector.capacity());
        } else {
            self.stats.overflow_denials += 1;
            log::debug!("mmu_gather: no overflow buffer, staying on inline slots");
        }
    }

    // -------------------------------------------------------------------------
    // Close
    // -------------------------------------------------------------------------

    /// Run the final flush and return the session counters
    pub fn close(mut self) -> GatherStats {
        self.finish();
        self.stats
    }

    fn finish(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        self.flush_batch(false);
        self.frames.trim_table_cache();

        if let Some(buffer) = self.collector.take_overflow() {
            self.arena.free(buffer);
        }

        self.state = SessionState::Closed;

        log::debug!(
            "mmu_gather: close asid={} flushes={} invalidates={} released={}",
            self.space.asid(),
            self.stats.flushes,
            self.stats.invalidates(),
            self.stats.frames_released
        );
    }
}

impl<T, F, A> Drop for GatherSession<'_, T, F, A>
where
    T: TlbMaintenance,
    F: FrameAllocator,
    A: GatherArena,
{
    fn drop(&mut self) {
        match self.state {
            SessionState::Closed => {},
            // Unwinding out of a flush; accounting cannot be trusted
            SessionState::Flushing => {},
            _ => {
                log::debug!("mmu_gather: session dropped without close, finishing");
                self.finish();
            },
        }
    }
}

impl<T, F, A> core::fmt::Debug for GatherSession<'_, T, F, A>
where
    T: TlbMaintenance,
    F: FrameAllocator,
    A: GatherArena,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GatherSession")
            .field("asid", &self.space.asid())
            .field("full_teardown", &self.full_teardown)
            .field("in_region", &self.region_open)
            .field("range", &self.range)
            .field("collector", &self.collector)
            .field("policy", &self.policy)
            .field("state", &self.state)
            .finish()
    }
}
