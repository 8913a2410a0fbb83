mod memory;
mod table;

pub use memory::{MemoryLock, DEFAULT_LOCK_MAX_AGE, DEFAULT_LOCK_TIMEOUT, DEFAULT_POLL_INTERVAL};
pub use table::LockTable;
pub use taskdoc_core::{with_lock, LockGuard, LockManager, LockStatus};
