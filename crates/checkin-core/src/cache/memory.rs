use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Time-to-live applied by `set_default`.
pub const DEFAULT_TTL: Duration = Duration::from_millis(30_000);

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            cached_at: Instant::now(),
            ttl,
        }
    }

    pub fn age(&self) -> Duration {
        self.cached_at.elapsed()
    }

    /// An entry is gone once its age reaches the ttl, even before eviction.
    pub fn is_expired(&self) -> bool {
        self.age() >= self.ttl
    }
}

/// Key/value cache with per-entry expiry.
///
/// There is no capacity bound and no background sweep: entries leave the map
/// through `delete`, `clear`, `purge_expired`, or a read that finds them
/// expired. The
/// working set is one event's roster, so this stays small.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panic mid-insert cannot leave a half-written entry, so keep going.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
            debug!(key, "Evicted expired cache entry");
        }
        None
    }

    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        self.lock().insert(key.into(), CacheEntry::new(value, ttl));
    }

    pub fn set_default(&self, key: impl Into<String>, value: Value) {
        self.set(key, value, DEFAULT_TTL);
    }

    pub fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Remove every expired entry and return how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    /// Number of entries physically held, expired or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed read. A value that no longer matches `T` is dropped and treated
    /// as a miss.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(key, error = %e, "Discarding cache entry with unexpected shape");
                self.delete(key);
                None
            }
        }
    }

    /// Typed write. Values that fail to serialize are not cached.
    pub fn set_as<T: Serialize>(&self, key: impl Into<String>, value: &T, ttl: Duration) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => self.set(key, value, ttl),
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize value for cache"),
        }
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, key: &str, by: Duration) {
        if let Some(entry) = self.lock().get_mut(key) {
            if let Some(earlier) = entry.cached_at.checked_sub(by) {
                entry.cached_at = earlier;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
