use std::collections::BTreeSet;
use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;

/// Result of a non-blocking lock acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockAcquireResult {
    /// Whether the lock was acquired.
    pub acquired: bool,
}

impl LockAcquireResult {
    /// Create a successful acquisition result.
    pub fn acquired() -> Self {
        Self { acquired: true }
    }

    /// Create a failed acquisition result (lock held by another).
    pub fn not_acquired() -> Self {
        Self { acquired: false }
    }
}

/// Diagnostic snapshot of the currently held lock keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    pub active_keys: BTreeSet<String>,
    pub count: usize,
}

/// Named mutual exclusion for operations inside one process.
///
/// Locks are keyed by an opaque string (an operation class such as
/// `create_user`, or a per-entity key such as `update_task_42`). Locks are
/// not re-entrant: acquiring a key the caller already holds waits like any
/// other contender.
///
/// Provides no exclusion across processes or hosts.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Returns the lock implementation identifier (e.g., "memory").
    fn lock_type(&self) -> &'static str;

    /// Try to take `key` without waiting.
    fn try_acquire(&self, key: &str) -> LockAcquireResult;

    /// Take `key`, suspending while another holder has it.
    ///
    /// Fails with `StoreError::LockTimeout` once the configured timeout
    /// elapses. Waiters are not queued: whichever waiter observes the key
    /// free first wins.
    async fn acquire(&self, key: &str) -> Result<(), StoreError>;

    /// Release `key` unconditionally.
    ///
    /// Releasing a key nobody holds is a no-op; returns whether it was held.
    fn release(&self, key: &str) -> bool;

    /// Drop entries held longer than the configured maximum age.
    ///
    /// Returns the number of entries removed.
    fn sweep_expired(&self) -> usize;

    /// Snapshot of the held keys.
    fn status(&self) -> LockStatus;
}

/// A held lock, released when dropped.
///
/// Dropping covers every exit path of the protected scope, including early
/// returns, panics and cancellation of the enclosing future.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    manager: &'a dyn LockManager,
    key: String,
    released: bool,
}

impl<'a> LockGuard<'a> {
    /// Acquire `key` on `manager` and wrap it in a guard.
    pub async fn acquire(manager: &'a dyn LockManager, key: &str) -> Result<Self, StoreError> {
        manager.acquire(key).await?;
        Ok(Self {
            manager,
            key: key.to_string(),
            released: false,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release now instead of at end of scope.
    pub fn release(mut self) -> bool {
        self.released = true;
        self.manager.release(&self.key)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            debug!("Releasing lock {} on guard drop", self.key);
            self.manager.release(&self.key);
        }
    }
}

impl std::fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("lock_type", &self.manager.lock_type())
            .field("key", &self.key)
            .finish()
    }
}

/// Run `operation` while holding `key`.
///
/// The lock is released on every exit path; the operation's own result or
/// failure is returned after release.
pub async fn with_lock<F, Fut, T>(
    manager: &dyn LockManager,
    key: &str,
    operation: F,
) -> Result<T, StoreError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let guard = LockGuard::acquire(manager, key).await?;
    let result = operation().await;
    guard.release();
    result
}
