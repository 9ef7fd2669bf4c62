//! # Architecture Backends
//!
//! [`TlbMaintenance`](crate::TlbMaintenance) implementations for real
//! hardware. Each backend is built only on its own target and behind its
//! cargo feature.

#[cfg(all(target_arch = "aarch64", feature = "aarch64"))]
pub mod aarch64;

#[cfg(all(target_arch = "x86_64", feature = "x86_64"))]
pub mod x86_64;

/// Ranges longer than this many pages are invalidated by ASID instead
pub const FULL_FLUSH_THRESHOLD: u64 = 32;

/// Number of `page_size` pages in `[start, end)`
#[inline]
pub const fn page_count(start: u64, end: u64, page_size: u64) -> u64 {
    if end <= start {
        0
    } else {
        (end - crate::align_down(start, page_size)).div_ceil(page_size)
    }
}

/// Check if invalidating `[start, end)` page by page costs more than
/// dropping every translation of the address space
#[inline]
pub const fn prefer_full_flush(start: u64, end: u64, page_size: u64) -> bool {
    page_count(start, end, page_size) > FULL_FLUSH_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0x1000, 0x3000, 0x1000), 2);
        assert_eq!(page_count(0x1800, 0x3000, 0x1000), 2);
        assert_eq!(page_count(0x1000, 0x1001, 0x1000), 1);
        assert_eq!(page_count(0x3000, 0x1000, 0x1000), 0);
    }

    #[test]
    fn test_full_flush_threshold() {
        assert!(!prefer_full_flush(0, 32 * 0x1000, 0x1000));
        assert!(prefer_full_flush(0, 33 * 0x1000, 0x1000));
        assert!(prefer_full_flush(0, 0x20_0000, 0x1000));
    }

    #[test]
    fn test_full_flush_threshold_follows_granule() {
        // 33 pages of 4K, but only 3 granules of 64K
        assert!(prefer_full_flush(0, 33 * 0x1000, 0x1000));
        assert!(!prefer_full_flush(0, 33 * 0x1000, 0x1_0000));
    }
}
