//! Throttle gates for high-frequency outbound events.
//!
//! DESIGN
//! ======
//! A gate never sends more than once per interval and never queues: offering a
//! value while one is pending overwrites it (last value wins). The first offer
//! into an idle gate opens a window; the pending value is released when the
//! window closes. Hosts call `poll` from their tick loop, and `flush` when a
//! gesture ends and the final value must go out immediately.
//!
//! `KeyedThrottle` runs one independent window per key so that previews for
//! different shapes in a multi-drag never overwrite each other.

#[cfg(test)]
#[path = "throttle_test.rs"]
mod throttle_test;

use std::collections::HashMap;
use std::hash::Hash;

/// Single-slot, last-value-wins throttle.
#[derive(Debug, Clone)]
pub struct Throttle<T> {
    interval_ms: i64,
    window_opened_at: Option<i64>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    #[must_use]
    pub fn new(interval_ms: i64) -> Self {
        Self { interval_ms, window_opened_at: None, pending: None }
    }

    /// Record `value` as the latest pending value, replacing any earlier one.
    pub fn offer(&mut self, value: T, now_ms: i64) {
        if self.window_opened_at.is_none() {
            self.window_opened_at = Some(now_ms);
        }
        self.pending = Some(value);
    }

    /// Release the pending value if its window has closed.
    pub fn poll(&mut self, now_ms: i64) -> Option<T> {
        let opened = self.window_opened_at?;
        if now_ms.saturating_sub(opened) < self.interval_ms {
            return None;
        }
        self.window_opened_at = None;
        self.pending.take()
    }

    /// Release the pending value now, regardless of the window.
    pub fn flush(&mut self) -> Option<T> {
        self.window_opened_at = None;
        self.pending.take()
    }

    /// Drop the pending value without sending it.
    pub fn cancel(&mut self) {
        self.window_opened_at = None;
        self.pending = None;
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// One [`Throttle`] per key.
#[derive(Debug, Clone)]
pub struct KeyedThrottle<K, T> {
    interval_ms: i64,
    gates: HashMap<K, Throttle<T>>,
}

impl<K: Eq + Hash + Clone, T> KeyedThrottle<K, T> {
    #[must_use]
    pub fn new(interval_ms: i64) -> Self {
        Self { interval_ms, gates: HashMap::new() }
    }

    pub fn offer(&mut self, key: K, value: T, now_ms: i64) {
        let interval_ms = self.interval_ms;
        self.gates
            .entry(key)
            .or_insert_with(|| Throttle::new(interval_ms))
            .offer(value, now_ms);
    }

    /// Release every pending value whose window has closed.
    pub fn poll(&mut self, now_ms: i64) -> Vec<(K, T)> {
        let mut ready = Vec::new();
        for (key, gate) in &mut self.gates {
            if let Some(value) = gate.poll(now_ms) {
                ready.push((key.clone(), value));
            }
        }
        self.gates.retain(|_, gate| gate.has_pending());
        ready
    }

    /// Release the pending value for `key` immediately.
    pub fn flush(&mut self, key: &K) -> Option<T> {
        self.gates.remove(key).and_then(|mut gate| gate.flush())
    }

    /// Drop the pending value for `key`.
    pub fn cancel(&mut self, key: &K) {
        self.gates.remove(key);
    }

    #[must_use]
    pub fn has_pending(&self, key: &K) -> bool {
        self.gates.get(key).is_some_and(Throttle::has_pending)
    }
}
