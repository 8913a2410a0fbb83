use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use taskdoc_core::TaskStatus;

use crate::lock::{DEFAULT_LOCK_MAX_AGE, DEFAULT_LOCK_TIMEOUT, DEFAULT_POLL_INTERVAL};
use crate::storage::DEFAULT_TEMP_SUFFIX;

/// Settings for a `TaskStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Path of the committed document.
    pub data_file: PathBuf,
    /// How long `acquire` waits for a held key before `LockTimeout`.
    pub lock_timeout: Duration,
    /// Upper bound between re-checks of a held key.
    pub poll_interval: Duration,
    /// Age past which a sweep drops a lock entry.
    pub lock_max_age: Duration,
    /// Appended to `data_file` to name the in-flight write.
    pub temp_suffix: String,
}

impl StoreOptions {
    pub fn new(data_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
            ..Default::default()
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("data").join("tasks.json"),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            lock_max_age: DEFAULT_LOCK_MAX_AGE,
            temp_suffix: DEFAULT_TEMP_SUFFIX.to_string(),
        }
    }
}

/// Configuration for the taskdoc command line.
#[derive(Parser, Debug, Clone)]
#[command(name = "taskdoc")]
#[command(about = "Transactional JSON document store for users and tasks")]
pub struct Config {
    /// Path of the JSON document
    #[arg(long, env = "TASKDOC_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Milliseconds to wait for a held lock before giving up
    #[arg(long, default_value = "5000", env = "TASKDOC_LOCK_TIMEOUT_MS")]
    pub lock_timeout_ms: u64,

    /// Milliseconds between re-checks of a held lock
    #[arg(long, default_value = "10", env = "TASKDOC_POLL_INTERVAL_MS")]
    pub poll_interval_ms: u64,

    /// Milliseconds after which a held lock is considered stale by a sweep
    #[arg(long, default_value = "5000", env = "TASKDOC_LOCK_MAX_AGE_MS")]
    pub lock_max_age_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Get the effective data file path.
    pub fn effective_data_file(&self) -> PathBuf {
        self.data_file.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|dir| dir.join("taskdoc").join("tasks.json"))
                .unwrap_or_else(|| PathBuf::from("data").join("tasks.json"))
        })
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            data_file: self.effective_data_file(),
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            lock_max_age: Duration::from_millis(self.lock_max_age_ms),
            temp_suffix: DEFAULT_TEMP_SUFFIX.to_string(),
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a user with a unique name
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Create a pending task assigned to an existing user
    CreateTask {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "general")]
        category: String,
        /// Id of the assigned user
        #[arg(long)]
        user: String,
    },
    /// Change the given fields of a task
    UpdateTask {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Id of the newly assigned user
        #[arg(long)]
        user: Option<String>,
        /// pending or completed
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// Mark a task completed
    CompleteTask {
        #[arg(long)]
        id: String,
    },
    /// Delete a task
    DeleteTask {
        #[arg(long)]
        id: String,
    },
    /// Delete a user and every task assigned to it
    DeleteUser {
        #[arg(long)]
        id: String,
    },
    /// Print the whole document
    Dump,
    /// Replace the whole document with the contents of a JSON file
    Import {
        #[arg(long)]
        file: PathBuf,
    },
    /// Print the currently held lock keys
    LockStatus,
}
