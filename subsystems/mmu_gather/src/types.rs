//! # Gather Types
//!
//! Small value types shared by the gather engine and its collaborators.

use core::fmt;

use crate::{PAGE_SHIFT, PAGE_SIZE};

// =============================================================================
// Address Space Identifier
// =============================================================================

/// Address Space Identifier
///
/// Tags the TLB entries of one address space. On AArch64 this is the
/// 16-bit ASID in TTBR0, on x86_64 the 12-bit PCID.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Asid(u16);

impl Asid {
    /// Kernel ASID (reserved)
    pub const KERNEL: Asid = Asid(0);

    /// Create a new ASID
    #[inline]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the ASID value
    #[inline]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for Asid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Asid({})", self.0)
    }
}

impl fmt::Display for Asid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Physical Frame
// =============================================================================

/// Handle to a physical page frame awaiting release
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct PhysFrame(u64);

impl PhysFrame {
    /// Placeholder used to fill unused collector slots
    pub const NULL: PhysFrame = PhysFrame(0);

    /// Create from a page frame number
    #[inline]
    pub const fn from_pfn(pfn: u64) -> Self {
        Self(pfn)
    }

    /// Create from the frame's physical start address
    #[inline]
    pub const fn containing_address(addr: u64) -> Self {
        Self(addr >> PAGE_SHIFT)
    }

    /// Page frame number
    #[inline]
    pub const fn pfn(self) -> u64 {
        self.0
    }

    /// Physical start address
    #[inline]
    pub const fn start_address(self) -> u64 {
        self.0 << PAGE_SHIFT
    }
}

impl fmt::Debug for PhysFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysFrame({:#x})", self.start_address())
    }
}

// =============================================================================
// Page Table Level Span
// =============================================================================

/// Virtual address span covered by one entry of a page table level
///
/// A walker freeing an intermediate table passes the span of the entry
/// that pointed at it, so the gather can invalidate everything that table
/// used to translate (including walk-cache entries for the table itself).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct LevelSpan(u64);

impl LevelSpan {
    /// Leaf page (4KB)
    pub const PAGE: LevelSpan = LevelSpan(PAGE_SIZE as u64);
    /// Span of one last-level table (2MB)
    pub const SIZE_2M: LevelSpan = LevelSpan(2 * 1024 * 1024);
    /// Span of one second-level table (1GB)
    pub const SIZE_1G: LevelSpan = LevelSpan(1024 * 1024 * 1024);
    /// Span of one third-level table (512GB)
    pub const SIZE_512G: LevelSpan = LevelSpan(512 * 1024 * 1024 * 1024);

    /// Create a span, returning `None` unless `bytes` is a power of two of
    /// at least one page
    pub const fn new(bytes: u64) -> Option<Self> {
        if bytes.is_power_of_two() && bytes >= PAGE_SIZE as u64 {
            Some(Self(bytes))
        } else {
            None
        }
    }

    /// Size in bytes
    #[inline]
    pub const fn bytes(self) -> u64 {
        self.0
    }

    /// Base of the span containing `addr`
    #[inline]
    pub const fn base_of(self, addr: u64) -> u64 {
        crate::align_down(addr, self.0)
    }
}

impl fmt::Debug for LevelSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LevelSpan({:#x})", self.0)
    }
}
