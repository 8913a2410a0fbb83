use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a user with a fresh id, stamped now.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            email: email.into(),
            created_at: Utc::now(),
        }
    }
}

/// Completion state of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(format!(
                "unknown task status '{}' (expected 'pending' or 'completed')",
                other
            )),
        }
    }
}

/// A task record. `assigned_user_id` always refers to a user in the same document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub assigned_user_id: String,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a pending task with a fresh id.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        assigned_user_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            title: title.into(),
            description: description.into(),
            category: category.into(),
            assigned_user_id: assigned_user_id.into(),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a task. Only fields that are `Some` are changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn assign(user_id: impl Into<String>) -> Self {
        Self {
            assigned_user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.assigned_user_id.is_none()
            && self.status.is_none()
    }

    /// Merge the present fields into `task` and refresh `updated_at`.
    ///
    /// Referential checks on `assigned_user_id` are the caller's job.
    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(user_id) = self.assigned_user_id {
            task.assigned_user_id = user_id;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        task.updated_at = next_timestamp(task.updated_at.max(task.created_at));
    }
}

/// The whole persisted state: every user and task, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Document {
    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }

    pub fn user_by_name(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }

    pub fn contains_user(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u.id == user_id)
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// Remove a task by ID.
    pub fn remove_task(&mut self, task_id: &str) -> Option<Task> {
        let pos = self.tasks.iter().position(|t| t.id == task_id)?;
        Some(self.tasks.remove(pos))
    }

    /// Remove a user and every task assigned to it.
    ///
    /// Returns the removed user and the number of cascaded tasks, or `None`
    /// (with the document untouched) if the user does not exist.
    pub fn remove_user_cascade(&mut self, user_id: &str) -> Option<(User, usize)> {
        let pos = self.users.iter().position(|u| u.id == user_id)?;
        let user = self.users.remove(pos);
        let before = self.tasks.len();
        self.tasks.retain(|t| t.assigned_user_id != user_id);
        Some((user, before - self.tasks.len()))
    }

    pub fn tasks_for_user<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| t.assigned_user_id == user_id)
    }

    /// Check the structural invariants: unique ids per collection and no
    /// task referencing a missing user.
    pub fn validate(&self) -> Result<(), StoreError> {
        let mut user_ids = HashSet::with_capacity(self.users.len());
        for user in &self.users {
            if !user_ids.insert(user.id.as_str()) {
                return Err(StoreError::InvalidDocument(format!(
                    "duplicate user id {}",
                    user.id
                )));
            }
        }

        let mut task_ids = HashSet::with_capacity(self.tasks.len());
        for task in &self.tasks {
            if !task_ids.insert(task.id.as_str()) {
                return Err(StoreError::InvalidDocument(format!(
                    "duplicate task id {}",
                    task.id
                )));
            }
            if !user_ids.contains(task.assigned_user_id.as_str()) {
                return Err(StoreError::InvalidDocument(format!(
                    "task {} is assigned to missing user {}",
                    task.id, task.assigned_user_id
                )));
            }
        }
        Ok(())
    }
}

/// Generate a new record identifier (random UUID v4).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time, forced strictly after `previous`.
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
