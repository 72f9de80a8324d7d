//! Time-windowed membership set.
//!
//! DESIGN
//! ======
//! Entries map a key to an absolute expiry timestamp. Expired entries are
//! swept on every access, so there are no timers to cancel and no closures to
//! leak. Callers pass `now_ms` explicitly, which keeps the set deterministic
//! under test.

#[cfg(test)]
#[path = "expiring_test.rs"]
mod expiring_test;

use std::collections::HashMap;
use std::hash::Hash;

/// Set whose members disappear once their time-to-live elapses.
#[derive(Debug, Clone)]
pub struct ExpiringSet<K> {
    ttl_ms: i64,
    entries: HashMap<K, i64>,
}

impl<K: Eq + Hash> ExpiringSet<K> {
    #[must_use]
    pub fn new(ttl_ms: i64) -> Self {
        Self { ttl_ms, entries: HashMap::new() }
    }

    /// Insert or refresh `key`, expiring `ttl_ms` after `now_ms`.
    pub fn insert(&mut self, key: K, now_ms: i64) {
        self.sweep(now_ms);
        self.entries.insert(key, now_ms.saturating_add(self.ttl_ms));
    }

    /// Whether `key` is present and not yet expired.
    pub fn contains(&mut self, key: &K, now_ms: i64) -> bool {
        self.sweep(now_ms);
        self.entries.contains_key(key)
    }

    /// Drop `key` regardless of its expiry.
    pub fn remove(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Number of live entries at `now_ms`.
    pub fn len(&mut self, now_ms: i64) -> usize {
        self.sweep(now_ms);
        self.entries.len()
    }

    pub fn is_empty(&mut self, now_ms: i64) -> bool {
        self.len(now_ms) == 0
    }

    fn sweep(&mut self, now_ms: i64) {
        self.entries.retain(|_, expires_at| *expires_at > now_ms);
    }
}
