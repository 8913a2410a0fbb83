//! Local filesystem backend for the taskdoc store.
//!
//! - `lock`: in-process named locks (`LockTable`, `MemoryLock`)
//! - `storage`: crash-safe whole-document persistence (`LocalDocumentStorage`)
//! - `service`: the transactional user/task API (`TaskStore`)
//! - `config`: store options and command line configuration

pub mod config;
pub mod lock;
pub mod service;
pub mod storage;

pub use config::{Command, Config, StoreOptions};
pub use service::TaskStore;
