use std::sync::Arc;

use taskdoc_core::{
    with_lock, Document, DocumentBackend, LockManager, LockStatus, StoreError, StoreResult, Task,
    TaskStatus, TaskUpdate, User,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::config::StoreOptions;
use crate::lock::MemoryLock;
use crate::storage::LocalDocumentStorage;

pub const CREATE_USER_KEY: &str = "create_user";
pub const CREATE_TASK_KEY: &str = "create_task";
pub const IMPORT_DATA_KEY: &str = "import_data";

pub fn update_task_key(task_id: &str) -> String {
    format!("update_task_{}", task_id)
}

pub fn delete_task_key(task_id: &str) -> String {
    format!("delete_task_{}", task_id)
}

pub fn delete_user_key(user_id: &str) -> String {
    format!("delete_user_{}", user_id)
}

/// Transactional access to the user/task document.
///
/// Every mutation runs as one scoped acquisition of its named lock key:
/// load the document fresh, validate and mutate it in memory, write it back
/// through the backend, release. Validation failures return before the write,
/// so a failed call never changes the stored document.
///
/// Transaction bodies also pass through a single commit gate, so two calls
/// holding different keys cannot interleave their load and save of the
/// shared document.
pub struct TaskStore {
    backend: Arc<dyn DocumentBackend>,
    lock_manager: Arc<dyn LockManager>,
    commit_gate: Mutex<()>,
}

impl TaskStore {
    pub fn new(backend: Arc<dyn DocumentBackend>, lock_manager: Arc<dyn LockManager>) -> Self {
        Self {
            backend,
            lock_manager,
            commit_gate: Mutex::new(()),
        }
    }

    /// Local file storage with an in-process lock manager.
    pub fn open(options: &StoreOptions) -> Self {
        let backend = LocalDocumentStorage::with_temp_suffix(&options.data_file, &options.temp_suffix);
        let lock_manager = MemoryLock::new(
            options.lock_timeout,
            options.poll_interval,
            options.lock_max_age,
        );
        Self::new(Arc::new(backend), Arc::new(lock_manager))
    }

    pub fn lock_manager(&self) -> &dyn LockManager {
        self.lock_manager.as_ref()
    }

    /// Run `mutation` against the current document while holding `key`, and
    /// persist the result if it succeeds.
    #[instrument(skip(self, mutation), level = "debug")]
    pub async fn transact<T, F>(&self, key: &str, mutation: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Document) -> StoreResult<T> + Send,
        T: Send,
    {
        let backend = self.backend.as_ref();
        let gate = &self.commit_gate;

        with_lock(self.lock_manager.as_ref(), key, move || async move {
            let _commit = gate.lock().await;
            let mut document = backend.load_document().await?;
            let output = match mutation(&mut document) {
                Ok(output) => output,
                Err(e) => {
                    debug!("Transaction {} rejected: {}", key, e);
                    return Err(e);
                }
            };
            backend.save_document(&document).await?;
            debug!(
                "Transaction {} committed ({} users, {} tasks)",
                key,
                document.users.len(),
                document.tasks.len()
            );
            Ok(output)
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn create_user(&self, name: &str, email: &str) -> StoreResult<User> {
        let user = self
            .transact(CREATE_USER_KEY, |doc| {
                if doc.user_by_name(name).is_some() {
                    return Err(StoreError::DuplicateUser(name.to_string()));
                }
                let user = User::new(name, email);
                doc.users.push(user.clone());
                Ok(user)
            })
            .await?;
        info!("Created user {} ({})", user.id, user.name);
        Ok(user)
    }

    #[instrument(skip(self, description), level = "debug")]
    pub async fn create_task(
        &self,
        title: &str,
        description: &str,
        category: &str,
        assigned_user_id: &str,
    ) -> StoreResult<Task> {
        let task = self
            .transact(CREATE_TASK_KEY, |doc| {
                if !doc.contains_user(assigned_user_id) {
                    return Err(StoreError::UserNotFound(assigned_user_id.to_string()));
                }
                let task = Task::new(title, description, category, assigned_user_id);
                doc.tasks.push(task.clone());
                Ok(task)
            })
            .await?;
        info!("Created task {} for user {}", task.id, task.assigned_user_id);
        Ok(task)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn update_task(&self, task_id: &str, update: TaskUpdate) -> StoreResult<Task> {
        self.transact(&update_task_key(task_id), |doc| {
            if doc.task(task_id).is_none() {
                return Err(StoreError::TaskNotFound(task_id.to_string()));
            }
            if let Some(user_id) = update.assigned_user_id.as_deref() {
                if !doc.contains_user(user_id) {
                    return Err(StoreError::UserNotFound(user_id.to_string()));
                }
            }
            let task = doc
                .task_mut(task_id)
                .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;
            update.apply(task);
            Ok(task.clone())
        })
        .await
    }

    pub async fn mark_task_completed(&self, task_id: &str) -> StoreResult<Task> {
        self.update_task(task_id, TaskUpdate::status(TaskStatus::Completed))
            .await
    }

    pub async fn mark_task_pending(&self, task_id: &str) -> StoreResult<Task> {
        self.update_task(task_id, TaskUpdate::status(TaskStatus::Pending))
            .await
    }

    pub async fn assign_task(&self, task_id: &str, user_id: &str) -> StoreResult<Task> {
        self.update_task(task_id, TaskUpdate::assign(user_id)).await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn delete_task(&self, task_id: &str) -> StoreResult<()> {
        self.transact(&delete_task_key(task_id), |doc| {
            doc.remove_task(task_id)
                .map(|_| ())
                .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))
        })
        .await?;
        info!("Deleted task {}", task_id);
        Ok(())
    }

    /// Delete a user and, in the same write, every task assigned to it.
    ///
    /// Returns the number of tasks removed along with the user.
    #[instrument(skip(self), level = "debug")]
    pub async fn delete_user(&self, user_id: &str) -> StoreResult<usize> {
        let cascaded = self
            .transact(&delete_user_key(user_id), |doc| {
                doc.remove_user_cascade(user_id)
                    .map(|(_, cascaded)| cascaded)
                    .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))
            })
            .await?;
        info!("Deleted user {} and {} task(s)", user_id, cascaded);
        Ok(cascaded)
    }

    /// Replace the whole document after checking its invariants.
    #[instrument(skip(self, document), level = "debug", fields(users = document.users.len(), tasks = document.tasks.len()))]
    pub async fn import_data(&self, document: Document) -> StoreResult<()> {
        self.transact(IMPORT_DATA_KEY, move |doc| {
            document.validate()?;
            *doc = document;
            Ok(())
        })
        .await?;
        info!("Imported document");
        Ok(())
    }

    /// Current document. Takes no lock: writes are atomic renames, so a read
    /// sees the last committed state.
    pub async fn get_all_data(&self) -> StoreResult<Document> {
        self.backend.load_document().await
    }

    pub async fn export_data(&self) -> StoreResult<Document> {
        self.get_all_data().await
    }

    pub fn lock_status(&self) -> LockStatus {
        self.lock_manager.status()
    }

    pub fn sweep_expired_locks(&self) -> usize {
        self.lock_manager.sweep_expired()
    }
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("backend", &self.backend.backend_name())
            .field("lock_manager", &self.lock_manager.lock_type())
            .finish()
    }
}
