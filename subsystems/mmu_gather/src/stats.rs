//! # Gather Statistics

/// Counters for one gather session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GatherStats {
    /// Number of flushes run (automatic, explicit and final)
    pub flushes: u64,
    /// Number of address-space wide invalidations
    pub full_invalidates: u64,
    /// Number of ranged invalidations
    pub range_invalidates: u64,
    /// Total bytes covered by ranged invalidations
    pub range_bytes: u64,
    /// Frames handed back to the allocator
    pub frames_released: u64,
    /// Overflow buffers obtained from the arena
    pub overflow_grants: u64,
    /// Overflow requests the arena turned down
    pub overflow_denials: u64,
}

impl GatherStats {
    /// Create zeroed stats
    pub const fn new() -> Self {
        Self {
            flushes: 0,
            full_invalidates: 0,
            range_invalidates: 0,
            range_bytes: 0,
            frames_released: 0,
            overflow_grants: 0,
            overflow_denials: 0,
        }
    }

    /// Total invalidations of either kind
    pub const fn invalidates(&self) -> u64 {
        self.full_invalidates + self.range_invalidates
    }

    /// Accumulate another session's counters
    pub fn merge(&mut self, other: &GatherStats) {
        self.flushes += other.flushes;
        self.full_invalidates += other.full_invalidates;
        self.range_invalidates += other.range_invalidates;
        self.range_bytes += other.range_bytes;
        self.frames_released += other.frames_released;
        self.overflow_grants += other.overflow_grants;
        self.overflow_denials += other.overflow_denials;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge() {
        let mut total = GatherStats::new();
        let session = GatherStats {
            flushes: 2,
            full_invalidates: 1,
            range_invalidates: 3,
            range_bytes: 0x3000,
            frames_released: 10,
            overflow_grants: 1,
            overflow_denials: 0,
        };
        total.merge(&session);
        total.merge(&session);
        assert_eq!(total.flushes, 4);
        assert_eq!(total.invalidates(), 8);
        assert_eq!(total.frames_released, 20);
    }
}
