use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::application::ports::{CacheError, MaskCache};

use super::{config::CacheConfig, store::MaskStore};

#[async_trait]
impl MaskCache for MaskStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(self.lookup(key))
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), CacheError> {
        if let Some(evicted) = self.insert(key.to_string(), value)? {
            debug!(cache_key = key, evicted = %evicted, "Evicted mask to make room");
        }
        Ok(())
    }
}

/// Stand-in used when caching is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCache;

#[async_trait]
impl MaskCache for DisabledCache {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Bytes) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Select the cache implementation for the given configuration.
pub fn build_mask_cache(config: &CacheConfig) -> Arc<dyn MaskCache> {
    if config.enabled {
        Arc::new(MaskStore::new(config))
    } else {
        Arc::new(DisabledCache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_backs_trait_roundtrip() {
        let cache = build_mask_cache(&CacheConfig::default());
        cache
            .set("shape:1:color=FF0000", Bytes::from_static(b"png"))
            .await
            .unwrap();
        assert_eq!(
            cache.get("shape:1:color=FF0000").await.unwrap(),
            Some(Bytes::from_static(b"png"))
        );
    }

    #[tokio::test]
    async fn oversized_write_surfaces_as_error() {
        let cache = build_mask_cache(&CacheConfig {
            max_entry_bytes: 1,
            ..Default::default()
        });
        assert!(cache.set("k", Bytes::from_static(b"xx")).await.is_err());
    }

    #[tokio::test]
    async fn disabled_cache_never_hits() {
        let cache = build_mask_cache(&CacheConfig {
            enabled: false,
            ..Default::default()
        });
        cache.set("k", Bytes::from_static(b"v")).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
