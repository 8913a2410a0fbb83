use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Lock timeout for key: {0}")]
    LockTimeout(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("User with name '{0}' already exists")]
    DuplicateUser(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl StoreError {
    /// Whether retrying the same call later may succeed.
    ///
    /// Only lock timeouts qualify. Storage failures are surfaced as-is and
    /// validation failures will fail again against the same document.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::LockTimeout(_))
    }

    /// Whether the error was produced by in-memory validation inside a
    /// transaction, in which case nothing was written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateUser(_)
                | StoreError::UserNotFound(_)
                | StoreError::TaskNotFound(_)
                | StoreError::InvalidDocument(_)
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
