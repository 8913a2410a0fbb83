//! Core traits and types for the taskdoc transactional document store.
//!
//! This crate defines the abstractions shared by every store implementation:
//! - `Document`, `User`, `Task`: the persisted aggregate and its records
//! - `DocumentBackend`: whole-document load and durable save
//! - `LockManager`: named in-process mutual exclusion with scoped acquisition
//! - `StoreError`: the error taxonomy surfaced to callers

mod backend;
mod document;
mod error;
mod lock;

pub use backend::DocumentBackend;
pub use document::{
    generate_id, next_timestamp, Document, Task, TaskStatus, TaskUpdate, User,
};
pub use error::{StoreError, StoreResult};
pub use lock::{with_lock, LockAcquireResult, LockGuard, LockManager, LockStatus};
