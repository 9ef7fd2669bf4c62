//! # Platform Collaborators
//!
//! Interfaces the gather engine drives but does not implement: the
//! address space and region descriptors being torn down, TLB and cache
//! maintenance, and the frame allocator.

use crate::types::{Asid, PhysFrame};

/// Address space being torn down
pub trait AddressSpace {
    /// Identity used for address-space wide and ranged invalidation
    fn asid(&self) -> Asid;
}

/// Contiguous region of an address space with uniform attributes
pub trait VmRegion {
    /// First address of the region
    fn start(&self) -> u64;

    /// One past the last address of the region
    fn end(&self) -> u64;
}

/// Architecture TLB and cache maintenance
///
/// Only called from [`GatherSession`](crate::GatherSession) flush and
/// region entry. On multiprocessor platforms every invalidation is a
/// blocking broadcast: it returns only after each processor that may
/// cache translations of `space` has dropped them.
pub trait TlbMaintenance {
    /// Invalidate translations of `space` in `[start, end)`
    fn invalidate_range(&self, space: &dyn AddressSpace, start: u64, end: u64);

    /// Invalidate every translation of `space`
    fn invalidate_all(&self, space: &dyn AddressSpace);

    /// Write back and invalidate virtually indexed caches for `[start, end)`
    /// of `region` before its mappings are removed
    fn flush_cache_range(&self, region: &dyn VmRegion, start: u64, end: u64);
}

/// Physical frame allocator
pub trait FrameAllocator {
    /// Return `frame` to the free pool
    ///
    /// Called only after every translation to `frame` has been invalidated,
    /// or under [`FlushPolicy::Immediate`](crate::FlushPolicy::Immediate).
    fn release(&self, frame: PhysFrame);

    /// Trim cached page table frames once a teardown finishes
    fn trim_table_cache(&self) {}
}

impl<T: TlbMaintenance + ?Sized> TlbMaintenance for &T {
    fn invalidate_range(&self, space: &dyn AddressSpace, start: u64, end: u64) {
        (**self).invalidate_range(space, start, end);
    }

    fn invalidate_all(&self, space: &dyn AddressSpace) {
        (**self).invalidate_all(space);
    }

    fn flush_cache_range(&self, region: &dyn VmRegion, start: u64, end: u64) {
        (**self).flush_cache_range(region, start, end);
    }
}

impl<F: FrameAllocator + ?Sized> FrameAllocator for &F {
    fn release(&self, frame: PhysFrame) {
        (**self).release(frame);
    }

    fn trim_table_cache(&self) {
        (**self).trim_table_cache();
    }
}
