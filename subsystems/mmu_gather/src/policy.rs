//! # Flush Policy
//!
//! Decides once per session whether removed frames are batched behind a
//! TLB flush or released on the spot.

use bitflags::bitflags;

bitflags! {
    /// Platform capabilities relevant to TLB teardown
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PlatformCaps: u32 {
        /// More than one processor may cache translations of one address space
        const SMP = 1 << 0;
        /// Translation caches may be refilled speculatively, so entries can
        /// outlive a coarse invalidate issued before the table update
        const SPECULATIVE_TLB = 1 << 1;
        /// TLB maintenance is broadcast to other processors in hardware
        const BROADCAST_TLBI = 1 << 2;
    }
}

/// Concurrency and capability profile of the running platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
    caps: PlatformCaps,
    online_cpus: u32,
}

impl PlatformProfile {
    /// Create a profile from raw capabilities
    ///
    /// A CPU count above one implies [`PlatformCaps::SMP`].
    pub const fn new(caps: PlatformCaps, online_cpus: u32) -> Self {
        let caps = if online_cpus > 1 {
            caps.union(PlatformCaps::SMP)
        } else {
            caps
        };
        Self { caps, online_cpus }
    }

    /// Single processor without speculative translation caching
    pub const fn uniprocessor() -> Self {
        Self::new(PlatformCaps::empty(), 1)
    }

    /// Single processor whose TLB walks speculatively (ARMv7 and later)
    pub const fn uniprocessor_v7() -> Self {
        Self::new(PlatformCaps::SPECULATIVE_TLB, 1)
    }

    /// Multiprocessor with speculative TLB and broadcast maintenance
    pub const fn smp(online_cpus: u32) -> Self {
        Self::new(
            PlatformCaps::SMP
                .union(PlatformCaps::SPECULATIVE_TLB)
                .union(PlatformCaps::BROADCAST_TLBI),
            online_cpus,
        )
    }

    /// Capability flags
    #[inline]
    pub const fn caps(&self) -> PlatformCaps {
        self.caps
    }

    /// Processors online when the profile was taken
    #[inline]
    pub const fn online_cpus(&self) -> u32 {
        self.online_cpus
    }

    /// Check if more than one processor can see an address space
    #[inline]
    pub const fn is_smp(&self) -> bool {
        self.caps.contains(PlatformCaps::SMP)
    }
}

impl Default for PlatformProfile {
    /// The conservative profile: batching is always correct
    fn default() -> Self {
        Self::smp(2)
    }
}

/// How removed frames are handed back to the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Collect frames and release them after a batched invalidate
    Buffered,
    /// Release each frame as soon as it is reported
    ///
    /// The allocator's release path must itself be safe without a
    /// preceding invalidate on this platform.
    Immediate,
}

impl FlushPolicy {
    /// Resolve the policy for `profile`
    pub const fn resolve(profile: &PlatformProfile) -> Self {
        let caps = profile.caps();
        if caps.contains(PlatformCaps::SMP) || caps.contains(PlatformCaps::SPECULATIVE_TLB) {
            FlushPolicy::Buffered
        } else {
            FlushPolicy::Immediate
        }
    }

    /// Check if frames go through the collector
    #[inline]
    pub const fn is_buffered(self) -> bool {
        matches!(self, FlushPolicy::Buffered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_uniprocessor_is_immediate() {
        assert_eq!(FlushPolicy::resolve(&PlatformProfile::uniprocessor()), FlushPolicy::Immediate);
    }

    #[test]
    fn test_speculative_uniprocessor_is_buffered() {
        assert_eq!(FlushPolicy::resolve(&PlatformProfile::uniprocessor_v7()), FlushPolicy::Buffered);
    }

    #[test]
    fn test_every_multiprocessor_profile_is_buffered() {
        for cpus in [2, 4, 64] {
            assert_eq!(FlushPolicy::resolve(&PlatformProfile::smp(cpus)), FlushPolicy::Buffered);
        }
        // CPU count alone forces SMP even without the flag
        let profile = PlatformProfile::new(PlatformCaps::empty(), 2);
        assert!(profile.is_smp());
        assert_eq!(FlushPolicy::resolve(&profile), FlushPolicy::Buffered);
    }

    #[test]
    fn test_default_profile_is_conservative() {
        assert!(FlushPolicy::resolve(&PlatformProfile::default()).is_buffered());
    }
}
