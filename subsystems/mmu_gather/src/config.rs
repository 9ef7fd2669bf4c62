//! # Gather Configuration
//!
//! Per-session parameters, validated once through [`GatherConfigBuilder`].

use core::fmt;

use crate::collector::{INLINE_CAPACITY, OVERFLOW_CAPACITY};
use crate::policy::{FlushPolicy, PlatformProfile};
use crate::PAGE_SIZE;

/// Smallest page size accepted
const MIN_PAGE_SIZE: usize = 1024;

// ============================================================================
// ERRORS
// ============================================================================

/// Invalid gather configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Page size is not a power of two or is below 1KB
    InvalidPageSize(usize),
    /// Overflow capacity does not exceed the inline slot count
    OverflowTooSmall(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPageSize(size) => {
                write!(f, "Invalid page size {:#x}", size)
            },
            ConfigError::OverflowTooSmall(capacity) => {
                write!(
                    f,
                    "Overflow capacity {} must exceed {} inline slots",
                    capacity, INLINE_CAPACITY
                )
            },
        }
    }
}

/// Result type for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;

// ============================================================================
// CONFIG
// ============================================================================

/// Validated gather session parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatherConfig {
    page_size: usize,
    overflow_capacity: usize,
    try_overflow: bool,
    profile: PlatformProfile,
}

impl GatherConfig {
    /// Start building a configuration from the defaults
    pub fn builder() -> GatherConfigBuilder {
        GatherConfigBuilder::new()
    }

    /// Granule used for range tracking
    #[inline]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Capacity requested for the overflow buffer
    #[inline]
    pub const fn overflow_capacity(&self) -> usize {
        self.overflow_capacity
    }

    /// Whether sessions ask their arena for an overflow buffer at all
    #[inline]
    pub const fn try_overflow(&self) -> bool {
        self.try_overflow
    }

    /// Platform profile the policy is resolved from
    #[inline]
    pub const fn profile(&self) -> &PlatformProfile {
        &self.profile
    }

    /// Policy for sessions using this configuration
    #[inline]
    pub const fn policy(&self) -> FlushPolicy {
        FlushPolicy::resolve(&self.profile)
    }
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            overflow_capacity: OVERFLOW_CAPACITY,
            try_overflow: true,
            profile: PlatformProfile::default(),
        }
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builder for [`GatherConfig`]
#[derive(Debug, Clone)]
pub struct GatherConfigBuilder {
    config: GatherConfig,
}

impl GatherConfigBuilder {
    /// Create builder with default values
    pub fn new() -> Self {
        Self {
            config: GatherConfig::default(),
        }
    }

    /// Set page size
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    /// Set overflow buffer capacity
    pub fn overflow_capacity(mut self, capacity: usize) -> Self {
        self.config.overflow_capacity = capacity;
        self
    }

    /// Enable or disable overflow buffer allocation
    pub fn try_overflow(mut self, enabled: bool) -> Self {
        self.config.try_overflow = enabled;
        self
    }

    /// Set platform profile
    pub fn profile(mut self, profile: PlatformProfile) -> Self {
        self.config.profile = profile;
        self
    }

    /// Validate and build
    pub fn build(self) -> ConfigResult<GatherConfig> {
        let config = self.config;

        if !config.page_size.is_power_of_two() || config.page_size < MIN_PAGE_SIZE {
            return Err(ConfigError::InvalidPageSize(config.page_size));
        }

        if config.try_overflow && config.overflow_capacity <= INLINE_CAPACITY {
            return Err(ConfigError::OverflowTooSmall(config.overflow_capacity));
        }

        Ok(config)
    }
}

impl Default for GatherConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builds() {
        let config = GatherConfig::builder().build().unwrap();
        assert_eq!(config, GatherConfig::default());
        assert_eq!(config.page_size(), PAGE_SIZE);
        assert_eq!(config.policy(), FlushPolicy::Buffered);
    }

    #[test]
    fn test_rejects_bad_page_size() {
        let err = GatherConfig::builder().page_size(0x1800).build().unwrap_err();
        assert_eq!(err, ConfigError::InvalidPageSize(0x1800));
        assert!(err.to_string().contains("0x1800"));

        assert!(GatherConfig::builder().page_size(512).build().is_err());
        assert!(GatherConfig::builder().page_size(0x1_0000).build().is_ok());
    }

    #[test]
    fn test_rejects_small_overflow() {
        let err = GatherConfig::builder()
            .overflow_capacity(INLINE_CAPACITY)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::OverflowTooSmall(INLINE_CAPACITY));
    }

    #[test]
    fn test_small_overflow_allowed_when_disabled() {
        let config = GatherConfig::builder()
            .try_overflow(false)
            .overflow_capacity(0)
            .build()
            .unwrap();
        assert!(!config.try_overflow());
    }

    #[test]
    fn test_profile_drives_policy() {
        let config = GatherConfig::builder()
            .profile(PlatformProfile::uniprocessor())
            .build()
            .unwrap();
        assert_eq!(config.policy(), FlushPolicy::Immediate);
    }
}
