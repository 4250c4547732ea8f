//! In-memory task store.
//!
//! The [`TaskStore`] owns the canonical `name → Task` mapping. Insertion
//! order is preserved so listings are stable. Reads return snapshots; a
//! concurrent insert never shows up halfway through a listing.

use std::collections::HashMap;

use taskcast_proto::task::{Priority, Task};
use tokio::sync::RwLock;

/// Errors that can occur on store mutations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A task with the same name already exists. Creation is rejected;
    /// the stored record is left untouched.
    #[error("a task named `{0}` already exists")]
    DuplicateName(String),
}

/// Mapping plus insertion order, guarded as one unit so the two never
/// disagree.
#[derive(Default)]
struct StoreInner {
    tasks: HashMap<String, Task>,
    order: Vec<String>,
}

/// Thread-safe in-memory task store with insertion-order listing.
///
/// All operations are safe to call concurrently; mutations are mutually
/// exclusive via [`RwLock`].
#[derive(Default)]
pub struct TaskStore {
    inner: RwLock<StoreInner>,
}

impl TaskStore {
    /// Creates a new, empty task store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a task if its name is not already present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateName`] if a task with the same name
    /// exists; the stored record is unchanged in that case.
    pub async fn add(&self, task: Task) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.tasks.contains_key(&task.name) {
            return Err(StoreError::DuplicateName(task.name));
        }
        inner.order.push(task.name.clone());
        inner.tasks.insert(task.name.clone(), task);
        drop(inner);
        Ok(())
    }

    /// Returns a snapshot of all tasks in insertion order.
    pub async fn all(&self) -> Vec<Task> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|name| inner.tasks.get(name).cloned())
            .collect()
    }

    /// Returns the task with the given name, if present.
    pub async fn by_name(&self, name: &str) -> Option<Task> {
        let inner = self.inner.read().await;
        inner.tasks.get(name).cloned()
    }

    /// Returns all tasks with the given priority, in insertion order.
    pub async fn by_priority(&self, priority: Priority) -> Vec<Task> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|name| inner.tasks.get(name))
            .filter(|task| task.priority == priority)
            .cloned()
            .collect()
    }

    /// Removes the task with the given name.
    ///
    /// Returns `true` if it existed and was removed, `false` if absent.
    pub async fn remove(&self, name: &str) -> bool {
        let mut inner = self.inner.write().await;
        if inner.tasks.remove(name).is_none() {
            return false;
        }
        inner.order.retain(|n| n != name);
        drop(inner);
        true
    }

    /// Returns the number of stored tasks.
    pub async fn len(&self) -> usize {
        let inner = self.inner.read().await;
        inner.order.len()
    }

    /// Returns `true` if the store holds no tasks.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
