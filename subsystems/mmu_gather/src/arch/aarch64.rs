//! # AArch64 TLB Backend
//!
//! Uses the inner-shareable TLBI variants, which the interconnect
//! broadcasts to every processor. The trailing `dsb ish` waits for all of
//! them to complete, so each call is a blocking shootdown without IPIs.
//!
//! Data caches are PIPT (or non-aliasing VIPT) on ARMv8, so there is no
//! per-region cache maintenance before unmapping.

use core::arch::asm;

use super::prefer_full_flush;
use crate::ops::{AddressSpace, TlbMaintenance, VmRegion};
use crate::types::Asid;
use crate::PAGE_SIZE;

/// ASID field of a TLBI operand
const ASID_SHIFT: u32 = 48;
/// VA\[55:12\] field of a TLBI operand, whatever the granule
const VA_FIELD_MASK: u64 = (1 << 44) - 1;

#[inline]
fn asid_operand(asid: Asid) -> u64 {
    (asid.value() as u64) << ASID_SHIFT
}

#[inline]
fn va_operand(asid: Asid, va: u64) -> u64 {
    asid_operand(asid) | ((va >> 12) & VA_FIELD_MASK)
}

/// Order preceding table stores before the TLBIs that follow
#[inline]
fn publish_tables() {
    // SAFETY: store barrier only
    unsafe { asm!("dsb ishst", options(nostack, preserves_flags)) }
}

/// Wait for broadcast TLBIs to complete everywhere
#[inline]
fn complete_broadcast() {
    // SAFETY: barriers only
    unsafe { asm!("dsb ish", "isb", options(nostack, preserves_flags)) }
}

// =============================================================================
// Backend
// =============================================================================

/// Broadcast TLBI backend for one translation granule
#[derive(Debug, Clone, Copy)]
pub struct Aarch64Tlb {
    granule: u64,
}

impl Aarch64Tlb {
    /// Backend for a 4 KiB, 16 KiB or 64 KiB granule
    ///
    /// Must match the session's configured page size.
    pub const fn new(granule: usize) -> Self {
        assert!(
            granule == 4096 || granule == 16384 || granule == 65536,
            "aarch64: unsupported translation granule"
        );
        Self {
            granule: granule as u64,
        }
    }

    /// Granule the range walk steps by
    pub const fn granule(&self) -> u64 {
        self.granule
    }

    /// Drop every non-global translation of `asid` on every processor
    pub fn flush_asid(&self, asid: Asid) {
        publish_tables();
        // SAFETY: TLBI only drops cached translations
        unsafe {
            asm!(
                "tlbi aside1is, {op}",
                op = in(reg) asid_operand(asid),
                options(nostack, preserves_flags)
            );
        }
        complete_broadcast();
    }

    /// Drop translations of `asid` for every granule in `[start, end)` on
    /// every processor
    pub fn flush_range(&self, asid: Asid, start: u64, end: u64) {
        publish_tables();
        let mut va = crate::align_down(start, self.granule);
        while va < end {
            // SAFETY: TLBI only drops cached translations
            unsafe {
                asm!(
                    "tlbi vae1is, {op}",
                    op = in(reg) va_operand(asid, va),
                    options(nostack, preserves_flags)
                );
            }
            va = match va.checked_add(self.granule) {
                Some(next) => next,
                None => break,
            };
        }
        complete_broadcast();
    }
}

impl Default for Aarch64Tlb {
    fn default() -> Self {
        Self::new(PAGE_SIZE)
    }
}

impl TlbMaintenance for Aarch64Tlb {
    fn invalidate_range(&self, space: &dyn AddressSpace, start: u64, end: u64) {
        if prefer_full_flush(start, end, self.granule) {
            self.flush_asid(space.asid());
        } else {
            self.flush_range(space.asid(), start, end);
        }
    }

    fn invalidate_all(&self, space: &dyn AddressSpace) {
        self.flush_asid(space.asid());
    }

    fn flush_cache_range(&self, _region: &dyn VmRegion, _start: u64, _end: u64) {}
}
