use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use taskdoc_core::{Document, StoreError, TaskStatus, TaskUpdate};
use taskdoc_local::storage::{read_document, temp_path_for, write_document};
use taskdoc_local::{StoreOptions, TaskStore};
use tempfile::TempDir;

fn open_store(temp: &TempDir) -> TaskStore {
    TaskStore::open(&StoreOptions::new(temp.path().join("data").join("tasks.json")))
}

#[tokio::test]
async fn user_task_lifecycle() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);

    let user = store.create_user("A", "a@example.com").await.unwrap();
    let task = store
        .create_task("T1", "first task", "work", &user.id)
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.assigned_user_id, user.id);

    let completed = store
        .update_task(&task.id, TaskUpdate::status(TaskStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed.status, TaskStatus::Completed);
    assert!(completed.updated_at > completed.created_at);

    store.delete_user(&user.id).await.unwrap();
    let doc = store.get_all_data().await.unwrap();
    assert!(doc.tasks.iter().all(|t| t.id != task.id));
    assert!(doc.users.is_empty());
    assert_eq!(store.lock_status().count, 0);
}

#[tokio::test]
async fn duplicate_user_name() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);

    store.create_user("A", "a@example.com").await.unwrap();
    let err = store.create_user("A", "a2@example.com").await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateUser(ref name) if name == "A"));

    let doc = store.get_all_data().await.unwrap();
    assert_eq!(doc.users.len(), 1);
    assert_eq!(doc.users[0].email, "a@example.com");
}

#[tokio::test]
async fn bootstrap_read_of_missing_file() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    assert_eq!(store.get_all_data().await.unwrap(), Document::default());
    assert_eq!(
        read_document(&temp.path().join("nowhere.json")).await.unwrap(),
        Document::default()
    );
}

#[tokio::test]
async fn documents_survive_reopen() {
    let temp = TempDir::new().unwrap();
    let (user, task) = {
        let store = open_store(&temp);
        let user = store.create_user("A", "a@example.com").await.unwrap();
        let task = store.create_task("T1", "", "work", &user.id).await.unwrap();
        (user, task)
    };

    let reopened = open_store(&temp);
    let doc = reopened.get_all_data().await.unwrap();
    assert_eq!(doc.users, vec![user]);
    assert_eq!(doc.tasks, vec![task]);
}

#[tokio::test]
async fn interrupted_write_keeps_last_commit() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tasks.json");
    let temp_path = temp_path_for(&path, ".tmp");
    let store = TaskStore::open(&StoreOptions::new(&path));

    let user = store.create_user("A", "a@example.com").await.unwrap();
    let committed = store.get_all_data().await.unwrap();

    // Simulate a crash after the temporary file was written.
    let mut next = committed.clone();
    next.users.clear();
    std::fs::write(&temp_path, serde_json::to_vec(&next).unwrap()).unwrap();

    assert_eq!(store.get_all_data().await.unwrap(), committed);
    assert!(store.get_all_data().await.unwrap().user(&user.id).is_some());

    // A completed write replaces both.
    write_document(&path, &temp_path, &next).await.unwrap();
    assert_eq!(store.get_all_data().await.unwrap(), next);
    assert!(!temp_path.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_on_one_task_are_serialized() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(open_store(&temp));
    let user = store.create_user("A", "a@example.com").await.unwrap();
    let task = store.create_task("", "", "work", &user.id).await.unwrap();

    const N: usize = 10;
    let appends = (0..N).map(|i| {
        let store = Arc::clone(&store);
        let task_id = task.id.clone();
        async move {
            store
                .transact(&format!("update_task_{}", task_id), move |doc| {
                    let current = doc
                        .task(&task_id)
                        .map(|t| t.description.clone())
                        .ok_or_else(|| StoreError::TaskNotFound(task_id.clone()))?;
                    let update = TaskUpdate {
                        description: Some(format!("{}[{}]", current, i)),
                        ..Default::default()
                    };
                    if let Some(task) = doc.task_mut(&task_id) {
                        update.apply(task);
                    }
                    Ok(())
                })
                .await
        }
    });

    for result in join_all(appends).await {
        result.unwrap();
    }

    let doc = store.get_all_data().await.unwrap();
    let description = &doc.task(&task.id).unwrap().description;
    for i in 0..N {
        assert_eq!(description.matches(&format!("[{}]", i)).count(), 1, "{}", description);
    }
}

#[tokio::test]
async fn lock_timeout_is_reported_and_recoverable() {
    let temp = TempDir::new().unwrap();
    let mut options = StoreOptions::new(temp.path().join("tasks.json"));
    options.lock_timeout = Duration::from_millis(60);
    let store = TaskStore::open(&options);

    let user = store.create_user("A", "a@example.com").await.unwrap();
    assert!(store
        .lock_manager()
        .try_acquire(&format!("delete_user_{}", user.id))
        .acquired);

    let err = store.delete_user(&user.id).await.unwrap_err();
    assert!(matches!(err, StoreError::LockTimeout(_)));
    assert!(store.get_all_data().await.unwrap().user(&user.id).is_some());

    store.lock_manager().release(&format!("delete_user_{}", user.id));
    store.delete_user(&user.id).await.unwrap();
}
