//! In-Memory Key-Value Store
//!
//! String-keyed map with per-entry TTL metadata and lazy expiry.

use futures::Stream;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;

use super::pattern::PatternCache;
use crate::error::{Error, Result};

/// Entry in the store with value and expiration
#[derive(Debug, Clone)]
pub(super) struct Entry {
    pub(super) value: String,
    pub(super) expires_at: Option<Instant>,
}

impl Entry {
    pub(super) fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    /// An entry is expired once the clock reaches its deadline.
    pub(super) fn is_expired(&self) -> bool {
        self.expires_at
            .map(|t| Instant::now() >= t)
            .unwrap_or(false)
    }
}

/// In-memory key-value store with TTL support
///
/// Single-instance substitute for a distributed cache backend: every
/// operation is atomic with respect to other callers, but a sequence of
/// operations is not unless queued through [`Store::multi`].
#[derive(Debug, Clone)]
pub struct Store {
    pub(super) inner: Arc<RwLock<HashMap<String, Entry>>>,
    patterns: Arc<PatternCache>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create a new empty store with its own pattern cache
    pub fn new() -> Self {
        Self::with_pattern_cache(Arc::new(PatternCache::new()))
    }

    /// Create a store sharing a pattern cache with other components
    pub fn with_pattern_cache(patterns: Arc<PatternCache>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            patterns,
        }
    }

    /// Get value by key. An expired entry is removed and treated as absent.
    pub fn get(&self, key: &str) -> Option<String> {
        {
            let map = self.inner.read();
            match map.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }
        self.remove_if_expired(key);
        None
    }

    /// Set key-value pair. A TTL in seconds sets an absolute expiry;
    /// `None` stores the value without expiry, clearing any previous TTL.
    pub fn set(&self, key: &str, value: impl Into<String>, ttl_secs: Option<u64>) {
        let entry = Entry::new(value.into(), ttl_secs.map(Duration::from_secs));
        self.inner.write().insert(key.to_string(), entry);
    }

    /// Set key-value pair with a mandatory TTL in seconds
    pub fn setex(&self, key: &str, ttl_secs: u64, value: impl Into<String>) {
        self.set(key, value, Some(ttl_secs));
    }

    /// Increment the integer value at `key` by 1, treating absence as 0.
    /// Returns the new value. The entry's TTL, if any, is preserved.
    pub fn incr(&self, key: &str) -> Result<i64> {
        self.incr_by(key, 1)
    }

    /// Increment the integer value at `key` by `delta`
    pub fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut map = self.inner.write();
        let current = match map.get(key).cloned() {
            Some(entry) if entry.is_expired() => {
                map.remove(key);
                None
            }
            other => other,
        };

        let (base, expires_at) = match current {
            Some(entry) => {
                let parsed = entry.value.parse::<i64>().map_err(|_| Error::NotAnInteger {
                    key: key.to_string(),
                })?;
                (parsed, entry.expires_at)
            }
            None => (0, None),
        };

        let next = base + delta;
        map.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    /// Set or refresh the expiry of an existing key.
    /// Returns 1 on success, 0 if the key is absent or already expired.
    pub fn expire(&self, key: &str, seconds: u64) -> i64 {
        let mut map = self.inner.write();
        match map.get(key).map(|e| e.is_expired()) {
            Some(true) => {
                map.remove(key);
                0
            }
            Some(false) => {
                if let Some(entry) = map.get_mut(key) {
                    entry.expires_at = Some(Instant::now() + Duration::from_secs(seconds));
                }
                1
            }
            None => 0,
        }
    }

    /// Remaining time-to-live in whole seconds, rounded up.
    /// Returns -2 if the key is absent or expired, -1 if it never expires.
    pub fn ttl(&self, key: &str) -> i64 {
        let mut map = self.inner.write();
        match map.get(key).cloned() {
            Some(entry) if entry.is_expired() => {
                map.remove(key);
                -2
            }
            Some(entry) => match entry.expires_at {
                None => -1,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    remaining.as_millis().div_ceil(1000) as i64
                }
            },
            None => -2,
        }
    }

    /// Delete keys, returning the count that existed
    pub fn del<S: AsRef<str>>(&self, keys: &[S]) -> usize {
        let mut map = self.inner.write();
        keys.iter()
            .filter(|k| map.remove(k.as_ref()).is_some())
            .count()
    }

    /// Count how many of the given keys are present and live
    pub fn exists<S: AsRef<str>>(&self, keys: &[S]) -> usize {
        let mut map = self.inner.write();
        let mut present = 0;
        for key in keys {
            match map.get(key.as_ref()).map(|e| e.is_expired()) {
                Some(true) => {
                    map.remove(key.as_ref());
                }
                Some(false) => present += 1,
                None => {}
            }
        }
        present
    }

    /// Get multiple values at once, aligned to the input keys
    pub fn mget<S: AsRef<str>>(&self, keys: &[S]) -> Vec<Option<String>> {
        keys.iter().map(|k| self.get(k.as_ref())).collect()
    }

    /// Scan live keys matching a glob pattern, in batches of `page_size`.
    ///
    /// The key set is snapshotted when the scan is created; liveness is
    /// re-checked as each batch is yielded. The stream is finite and not
    /// restartable.
    pub fn scan(&self, pattern: &str, page_size: usize) -> KeyScan {
        let candidates = {
            let map = self.inner.read();
            map.keys().cloned().collect::<Vec<_>>()
        };
        KeyScan {
            store: self.clone(),
            matcher: pattern.to_string(),
            candidates: candidates.into_iter(),
            page_size: page_size.max(1),
        }
    }

    /// Remove expired keys eagerly, returning the count removed
    pub fn sweep_expired(&self) -> usize {
        let mut map = self.inner.write();
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired());
        before - map.len()
    }

    /// Number of stored keys, including not-yet-swept expired entries
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored keys (diagnostics)
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    pub(super) fn pattern_cache(&self) -> &PatternCache {
        &self.patterns
    }

    fn is_live(&self, key: &str) -> bool {
        self.inner
            .read()
            .get(key)
            .map(|e| !e.is_expired())
            .unwrap_or(false)
    }

    fn remove_if_expired(&self, key: &str) {
        let mut map = self.inner.write();
        if map.get(key).map(|e| e.is_expired()).unwrap_or(false) {
            map.remove(key);
        }
    }
}

/// Finite stream of key batches produced by [`Store::scan`]
pub struct KeyScan {
    store: Store,
    matcher: String,
    candidates: std::vec::IntoIter<String>,
    page_size: usize,
}

impl Stream for KeyScan {
    type Item = Vec<String>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let regex = this.store.pattern_cache().compile(&this.matcher);
        let mut batch = Vec::with_capacity(this.page_size);
        for key in this.candidates.by_ref() {
            if regex.is_match(&key) && this.store.is_live(&key) {
                batch.push(key);
                if batch.len() == this.page_size {
                    break;
                }
            }
        }
        if batch.is_empty() {
            Poll::Ready(None)
        } else {
            Poll::Ready(Some(batch))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn test_basic_operations() {
        let store = Store::new();

        store.set("key", "value", None);
        assert_eq!(store.get("key"), Some("value".to_string()));
        assert_eq!(store.exists(&["key"]), 1);

        assert_eq!(store.del(&["key"]), 1);
        assert_eq!(store.exists(&["key"]), 0);
        assert_eq!(store.get("key"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_setex_expires() {
        let store = Store::new();

        store.setex("otp:42", 30, "915203");
        assert_eq!(store.get("otp:42"), Some("915203".to_string()));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.get("otp:42"), None);
        assert_eq!(store.exists(&["otp:42"]), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_without_ttl_never_expires() {
        let store = Store::new();

        store.set("tenant:7:plan", "premium", None);
        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;
        assert_eq!(store.get("tenant:7:plan"), Some("premium".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_clears_ttl() {
        let store = Store::new();

        store.setex("k", 10, "a");
        store.set("k", "b", None);
        assert_eq!(store.ttl("k"), -1);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(store.get("k"), Some("b".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_from_absent_and_existing() {
        let store = Store::new();

        assert_eq!(store.incr("rate:ip:1").unwrap(), 1);
        assert_eq!(store.incr("rate:ip:1").unwrap(), 2);
        assert_eq!(store.incr_by("rate:ip:1", 10).unwrap(), 12);
        assert_eq!(store.get("rate:ip:1"), Some("12".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_preserves_ttl() {
        let store = Store::new();

        store.setex("rate:ip:2", 60, "5");
        store.incr("rate:ip:2").unwrap();
        assert_eq!(store.ttl("rate:ip:2"), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_rejects_non_integer() {
        let store = Store::new();

        store.set("name", "alice", None);
        let err = store.incr("name").unwrap_err();
        assert!(matches!(err, Error::NotAnInteger { .. }));
        assert_eq!(store.get("name"), Some("alice".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_and_ttl() {
        let store = Store::new();

        assert_eq!(store.expire("missing", 10), 0);

        store.set("job:1", "queued", None);
        assert_eq!(store.ttl("job:1"), -1);
        assert_eq!(store.expire("job:1", 10), 1);
        assert_eq!(store.ttl("job:1"), 10);

        tokio::time::advance(Duration::from_millis(2500)).await;
        // Remaining 7.5s reports as 8: whole seconds rounded up.
        assert_eq!(store.ttl("job:1"), 8);

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(store.ttl("job:1"), -2);
        assert_eq!(store.expire("job:1", 10), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mget_alignment() {
        let store = Store::new();

        store.set("a", "1", None);
        store.set("c", "3", None);
        assert_eq!(
            store.mget(&["a", "b", "c"]),
            vec![Some("1".to_string()), None, Some("3".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let store = Store::new();

        for i in 0..10 {
            store.setex(&format!("tmp:{i}"), 1, "x");
        }
        store.set("keep", "y", None);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.sweep_expired(), 10);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_filters_and_pages() {
        let store = Store::new();

        for i in 0..5 {
            store.set(&format!("sess:{i}"), "s", None);
        }
        store.set("jobs:1", "j", None);

        let mut scan = store.scan("sess:*", 2);
        let mut seen = Vec::new();
        while let Some(batch) = scan.next().await {
            assert!(batch.len() <= 2);
            seen.extend(batch);
        }
        seen.sort();
        assert_eq!(seen, vec!["sess:0", "sess:1", "sess:2", "sess:3", "sess:4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_skips_expired_keys() {
        let store = Store::new();

        store.set("sess:live", "s", None);
        store.setex("sess:dead", 1, "s");
        tokio::time::advance(Duration::from_secs(2)).await;

        let batches: Vec<_> = store.scan("sess:*", 10).collect().await;
        assert_eq!(batches, vec![vec!["sess:live".to_string()]]);
    }
}
