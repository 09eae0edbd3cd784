//! In-memory mask storage.
//!
//! LRU bounded by entry count, with an optional time-to-live and a per-entry
//! size ceiling.

use std::{
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use bytes::Bytes;
use lru::LruCache;
use metrics::{counter, gauge};
use tracing::warn;

use crate::application::ports::CacheError;

use super::config::CacheConfig;

pub const METRIC_CACHE_EVICT_TOTAL: &str = "shapemask_cache_evict_total";
pub const METRIC_CACHE_ENTRIES: &str = "shapemask_cache_entries";

struct StoredMask {
    value: Bytes,
    stored_at: Instant,
}

pub struct MaskStore {
    // LRU reads reorder entries, so every access needs exclusive access.
    entries: Mutex<LruCache<String, StoredMask>>,
    max_entry_bytes: usize,
    ttl: Option<Duration>,
}

impl MaskStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.capacity_non_zero())),
            max_entry_bytes: config.max_entry_bytes,
            ttl: config.ttl,
        }
    }

    /// Fetch a live entry. Expired entries are dropped and read as a miss.
    pub fn lookup(&self, key: &str) -> Option<Bytes> {
        let len = {
            let mut entries = self.entries("lookup");
            match entries.get(key) {
                Some(entry) if !self.is_expired(entry) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
            entries.pop(key);
            entries.len()
        };
        gauge!(METRIC_CACHE_ENTRIES).set(len as f64);
        None
    }

    /// Store a mask, returning the key evicted to make room, if any.
    pub fn insert(&self, key: String, value: Bytes) -> Result<Option<String>, CacheError> {
        if value.len() > self.max_entry_bytes {
            return Err(CacheError::Rejected(format!(
                "{} bytes exceeds limit of {}",
                value.len(),
                self.max_entry_bytes
            )));
        }

        let stored = StoredMask {
            value,
            stored_at: Instant::now(),
        };
        let (displaced, len) = {
            let mut entries = self.entries("insert");
            let displaced = entries.push(key.clone(), stored);
            (displaced, entries.len())
        };
        gauge!(METRIC_CACHE_ENTRIES).set(len as f64);

        // `push` also hands back the previous value when the key was replaced.
        let evicted = displaced
            .map(|(displaced_key, _)| displaced_key)
            .filter(|displaced_key| *displaced_key != key);
        if evicted.is_some() {
            counter!(METRIC_CACHE_EVICT_TOTAL).increment(1);
        }
        Ok(evicted)
    }

    pub fn len(&self) -> usize {
        self.entries("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A panic while holding the lock leaves at worst a stale mask behind, so
    /// the poisoned guard is taken over instead of failing every request.
    fn entries(&self, op: &'static str) -> MutexGuard<'_, LruCache<String, StoredMask>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!(op, result = "poisoned_recovered", "Recovered from poisoned mask store lock");
            poisoned.into_inner()
        })
    }

    fn is_expired(&self, entry: &StoredMask) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    use super::*;

    fn mask(bytes: &'static [u8]) -> Bytes {
        Bytes::from_static(bytes)
    }

    #[test]
    fn roundtrip_and_replace() {
        let store = MaskStore::new(&CacheConfig::default());
        assert!(store.lookup("shape:1").is_none());

        store.insert("shape:1".into(), mask(b"png")).unwrap();
        assert_eq!(store.lookup("shape:1"), Some(mask(b"png")));

        // Replacing a key is not an eviction.
        assert_eq!(store.insert("shape:1".into(), mask(b"png2")).unwrap(), None);
        assert_eq!(store.lookup("shape:1"), Some(mask(b"png2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn lru_eviction_reports_evicted_key() {
        let config = CacheConfig {
            capacity: 2,
            ..Default::default()
        };
        let store = MaskStore::new(&config);

        assert_eq!(store.insert("a".into(), mask(b"1")).unwrap(), None);
        assert_eq!(store.insert("b".into(), mask(b"2")).unwrap(), None);
        // Touch `a` so `b` becomes least recently used.
        assert!(store.lookup("a").is_some());

        assert_eq!(
            store.insert("c".into(), mask(b"3")).unwrap(),
            Some("b".to_string())
        );
        assert!(store.lookup("b").is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn oversized_entries_are_rejected() {
        let config = CacheConfig {
            max_entry_bytes: 4,
            ..Default::default()
        };
        let store = MaskStore::new(&config);

        let result = store.insert("big".into(), mask(b"12345"));
        assert!(matches!(result, Err(CacheError::Rejected(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn expired_entries_read_as_miss() {
        let config = CacheConfig {
            ttl: Some(Duration::from_millis(10)),
            ..Default::default()
        };
        let store = MaskStore::new(&config);

        store.insert("a".into(), mask(b"1")).unwrap();
        std::thread::sleep(Duration::from_millis(25));

        assert!(store.lookup("a").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn expiry_updates_entries_gauge() {
        let config = CacheConfig {
            ttl: Some(Duration::from_millis(10)),
            ..Default::default()
        };
        let store = MaskStore::new(&config);
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            store.insert("a".into(), mask(b"1")).unwrap();
            store.insert("b".into(), mask(b"2")).unwrap();
            std::thread::sleep(Duration::from_millis(25));
            assert!(store.lookup("a").is_none());
        });

        let gauge = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find(|(key, _, _, _)| key.key().name() == METRIC_CACHE_ENTRIES)
            .map(|(_, _, _, value)| value);
        match gauge {
            Some(DebugValue::Gauge(value)) => assert_eq!(value.0, 1.0),
            other => panic!("unexpected gauge value: {other:?}"),
        }
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let store = MaskStore::new(&CacheConfig::default());

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .entries
                .lock()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store.insert("a".into(), mask(b"1")).unwrap();
        assert!(store.lookup("a").is_some());
    }
}
