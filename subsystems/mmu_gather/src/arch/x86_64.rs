//! # x86_64 TLB Backend
//!
//! Local invalidation uses `invlpg` per page, or a CR3 reload once a range
//! passes [`FULL_FLUSH_THRESHOLD`](super::FULL_FLUSH_THRESHOLD) pages.
//! x86 has no broadcast TLB maintenance, so other processors are reached
//! through a [`RemoteShootdown`] that must block until every target has
//! acknowledged.
//!
//! The address space being torn down must be the one loaded in CR3 on the
//! calling processor. Caches are coherent; region entry needs no cache
//! maintenance.

use core::ops::Range;

use super::prefer_full_flush;
use crate::ops::{AddressSpace, TlbMaintenance, VmRegion};
use crate::types::Asid;
use crate::PAGE_SIZE;

// =============================================================================
// Local Invalidation
// =============================================================================

/// Flush a single page from the local TLB
#[inline]
pub fn flush_page(addr: u64) {
    // SAFETY: INVLPG only drops a cached translation
    unsafe {
        core::arch::asm!(
            "invlpg [{}]",
            in(reg) addr,
            options(nostack, preserves_flags),
        );
    }
}

/// Flush every non-global entry from the local TLB by reloading CR3
#[inline]
pub fn flush_all_local() {
    // SAFETY: writing back the current CR3 keeps the same tables loaded
    unsafe {
        core::arch::asm!(
            "mov {tmp}, cr3",
            "mov cr3, {tmp}",
            tmp = out(reg) _,
            options(nostack, preserves_flags),
        );
    }
}

// =============================================================================
// Remote Shootdown
// =============================================================================

/// Cross-processor invalidation
pub trait RemoteShootdown {
    /// Invalidate `range` (or everything, if `None`) for `asid` on every
    /// other processor that may have the address space loaded, returning
    /// only after all of them have acknowledged
    fn shootdown(&self, asid: Asid, range: Option<Range<u64>>);
}

/// No other processors to notify
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOnly;

impl RemoteShootdown for LocalOnly {
    fn shootdown(&self, _asid: Asid, _range: Option<Range<u64>>) {}
}

// =============================================================================
// Backend
// =============================================================================

/// INVLPG/CR3 backend with IPI-based shootdown
#[derive(Debug, Clone, Copy, Default)]
pub struct X86Tlb<S: RemoteShootdown = LocalOnly> {
    remote: S,
}

impl<S: RemoteShootdown> X86Tlb<S> {
    /// Create a backend that reaches other processors through `remote`
    pub const fn new(remote: S) -> Self {
        Self { remote }
    }
}

impl<S: RemoteShootdown> TlbMaintenance for X86Tlb<S> {
    fn invalidate_range(&self, space: &dyn AddressSpace, start: u64, end: u64) {
        // INVLPG drops whatever entry maps the address, so stepping by the
        // smallest page also covers large pages
        let page_size = PAGE_SIZE as u64;

        if prefer_full_flush(start, end, page_size) {
            flush_all_local();
            self.remote.shootdown(space.asid(), None);
            return;
        }

        let mut addr = crate::align_down(start, page_size);
        while addr < end {
            flush_page(addr);
            addr = match addr.checked_add(page_size) {
                Some(next) => next,
                None => break,
            };
        }
        self.remote.shootdown(space.asid(), Some(start..end));
    }

    fn invalidate_all(&self, space: &dyn AddressSpace) {
        flush_all_local();
        self.remote.shootdown(space.asid(), None);
    }

    fn flush_cache_range(&self, _region: &dyn VmRegion, _start: u64, _end: u64) {}
}
