//! Cache configuration.
//!
//! Controls the in-memory mask store via the `[cache]` settings section.

use std::{num::NonZeroUsize, time::Duration};

const DEFAULT_CAPACITY: usize = 1024;
const DEFAULT_MAX_ENTRY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Enable the mask cache. When off, every lookup misses and writes are dropped.
    pub enabled: bool,
    /// Maximum number of cached masks.
    pub capacity: usize,
    /// Masks larger than this are never stored.
    pub max_entry_bytes: usize,
    /// Entry lifetime; `None` keeps entries until evicted.
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            ttl: None,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity.get(),
            max_entry_bytes: settings.max_entry_bytes.get(),
            ttl: settings.ttl,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
