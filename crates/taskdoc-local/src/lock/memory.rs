use std::time::{Duration, Instant};

use async_trait::async_trait;
use taskdoc_core::{LockAcquireResult, LockManager, LockStatus, StoreError};
use tokio::sync::Notify;
use tracing::{debug, instrument, warn};

use super::table::LockTable;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_LOCK_MAX_AGE: Duration = Duration::from_millis(5000);

/// In-process lock manager backed by a `LockTable`.
///
/// Waiters park on a `Notify` that is signalled whenever a key is released
/// or swept, and re-check the table at least every `poll_interval` in case a
/// signal raced with their registration. Every woken waiter races for the
/// key; there is no queue and no fairness between them.
#[derive(Debug)]
pub struct MemoryLock {
    table: LockTable,
    released: Notify,
    timeout: Duration,
    poll_interval: Duration,
    max_age: Duration,
}

impl Default for MemoryLock {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_LOCK_MAX_AGE)
    }
}

impl MemoryLock {
    pub fn new(timeout: Duration, poll_interval: Duration, max_age: Duration) -> Self {
        Self {
            table: LockTable::new(),
            released: Notify::new(),
            timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            max_age,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn table(&self) -> &LockTable {
        &self.table
    }
}

#[async_trait]
impl LockManager for MemoryLock {
    fn lock_type(&self) -> &'static str {
        "memory"
    }

    fn try_acquire(&self, key: &str) -> LockAcquireResult {
        if self.table.acquire(key, Instant::now()) {
            LockAcquireResult::acquired()
        } else {
            LockAcquireResult::not_acquired()
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn acquire(&self, key: &str) -> Result<(), StoreError> {
        let started = Instant::now();
        let deadline = started + self.timeout;

        loop {
            // Register interest before checking, so a release between the
            // check and the wait still wakes us.
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let now = Instant::now();
            if self.table.acquire(key, now) {
                debug!(
                    "Acquired lock {} after {:?}",
                    key,
                    now.duration_since(started)
                );
                return Ok(());
            }

            if now >= deadline {
                warn!("Lock timeout for {} after {:?}", key, self.timeout);
                return Err(StoreError::LockTimeout(key.to_string()));
            }

            let wait = (deadline - now).min(self.poll_interval);
            let _ = tokio::time::timeout(wait, notified).await;
        }
    }

    fn release(&self, key: &str) -> bool {
        let held = self.table.release(key);
        if held {
            debug!("Released lock {}", key);
            self.released.notify_waiters();
        } else {
            warn!("Release of lock {} that is not held", key);
        }
        held
    }

    fn sweep_expired(&self) -> usize {
        let removed = self.table.sweep(Instant::now(), self.max_age);
        if !removed.is_empty() {
            warn!(
                "Swept {} expired lock(s) older than {:?}: {:?}",
                removed.len(),
                self.max_age,
                removed
            );
            self.released.notify_waiters();
        }
        removed.len()
    }

    fn status(&self) -> LockStatus {
        self.table.snapshot()
    }
}
