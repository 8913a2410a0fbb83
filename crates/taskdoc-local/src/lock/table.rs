use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use taskdoc_core::LockStatus;

/// In-memory table of held lock keys and when each was taken.
///
/// Owned by a single lock manager; check-and-set goes through the map's
/// entry API so concurrent callers can never both take the same key.
#[derive(Debug, Default)]
pub struct LockTable {
    entries: DashMap<String, Instant>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holds(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Record `key -> now` if `key` is free. Returns whether it was recorded.
    pub fn acquire(&self, key: &str, now: Instant) -> bool {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    /// Remove `key` unconditionally. Returns whether it was present.
    pub fn release(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// How long `key` has been held as of `now`.
    pub fn age(&self, key: &str, now: Instant) -> Option<Duration> {
        self.entries
            .get(key)
            .map(|acquired_at| now.saturating_duration_since(*acquired_at))
    }

    /// Remove every entry older than `max_age`, returning the removed keys.
    pub fn sweep(&self, now: Instant, max_age: Duration) -> Vec<String> {
        let mut removed = Vec::new();
        self.entries.retain(|key, acquired_at| {
            let expired = now.saturating_duration_since(*acquired_at) > max_age;
            if expired {
                removed.push(key.clone());
            }
            !expired
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> LockStatus {
        let active_keys: std::collections::BTreeSet<String> =
            self.entries.iter().map(|e| e.key().clone()).collect();
        LockStatus {
            count: active_keys.len(),
            active_keys,
        }
    }
}
