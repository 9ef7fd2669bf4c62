//! # Helix MMU Gather
//!
//! Batched teardown of virtual memory mappings.
//!
//! Removing thousands of page table entries during process exit, `munmap`
//! or page table collapse must not cost one TLB invalidation per entry. A
//! [`GatherSession`] collects the frames that backed the removed mappings
//! together with the address range they covered, and releases the frames
//! in batches, each batch preceded by a single range or address-space
//! invalidation.
//!
//! ## Ordering Contract
//!
//! ```text
//!   report_removed_entry ──▶ AddressRangeTracker ─┐
//!                                                 ├──▶ flush():
//!   report_removed_page  ──▶ PageCollector ───────┘     1. invalidate (blocking broadcast)
//!                                                       2. reset range
//!                                                       3. release frames
//!                                                       4. grow collector
//! ```
//!
//! Step 1 returns before step 3 begins. Releasing a frame while another
//! processor still holds a stale translation to it lets that processor
//! read or corrupt whatever the frame is reused for.
//!
//! ## Components
//!
//! - [`AddressRangeTracker`]: minimal interval touched since the last flush
//! - [`PageCollector`]: eight inline slots plus an optional overflow buffer
//! - [`FlushPolicy`]: buffered batching or immediate release
//! - [`GatherSession`]: the per-teardown context tying them together
//!
//! The platform side (TLB and cache maintenance, the frame allocator, the
//! overflow buffer arena) is reached through the traits in [`ops`] and
//! [`arena`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

// =============================================================================
// EXTERNAL DEPENDENCIES
// =============================================================================

extern crate alloc;

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

pub mod arch;
pub mod arena;
pub mod collector;
pub mod config;
pub mod ops;
pub mod policy;
pub mod range;
pub mod session;
pub mod stats;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports
pub use arena::{GatherArena, GatherBufferPool, HeapArena, NoOverflow};
pub use collector::{GatherBuffer, PageCollector, INLINE_CAPACITY, OVERFLOW_CAPACITY};
pub use config::{ConfigError, ConfigResult, GatherConfig, GatherConfigBuilder};
pub use ops::{AddressSpace, FrameAllocator, TlbMaintenance, VmRegion};
pub use policy::{FlushPolicy, PlatformCaps, PlatformProfile};
pub use range::AddressRangeTracker;
pub use session::{GatherSession, PageDisposition, SessionState};
pub use stats::GatherStats;
pub use types::{Asid, LevelSpan, PhysFrame};

// =============================================================================
// PAGE GEOMETRY
// =============================================================================

/// Page size (4KB default)
pub const PAGE_SIZE: usize = 4096;

/// Page shift (log2 of page size)
pub const PAGE_SHIFT: usize = 12;

/// Align address down to a boundary of `size` bytes
///
/// `size` must be a power of two.
#[inline]
pub const fn align_down(addr: u64, size: u64) -> u64 {
    addr & !(size - 1)
}

/// Check if address is aligned to `size` bytes
#[inline]
pub const fn is_aligned(addr: u64, size: u64) -> bool {
    addr & (size - 1) == 0
}

static_assertions::const_assert!(PAGE_SIZE.is_power_of_two());
static_assertions::const_assert_eq!(1 << PAGE_SHIFT, PAGE_SIZE);
