//! Mask cache.
//!
//! Cache-aside storage for rendered masks, consulted before rendering and
//! populated afterwards. The service stays correct with the cache disabled
//! or failing.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 1024
//! max_entry_bytes = 1048576
//! ttl_seconds = 0   # 0 keeps entries until evicted
//! ```

mod client;
mod config;
mod store;

pub use client::{DisabledCache, build_mask_cache};
pub use config::CacheConfig;
pub use store::{METRIC_CACHE_ENTRIES, METRIC_CACHE_EVICT_TOTAL, MaskStore};
