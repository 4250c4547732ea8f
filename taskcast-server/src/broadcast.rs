//! Broadcast engine and subscription lifecycle.
//!
//! [`TaskFeed`] ties the task store to the session registry: every
//! successfully created task is fanned out to a point-in-time snapshot of
//! the live sessions, and a new subscriber first receives a replay of the
//! current store contents before live broadcasts.
//!
//! Delivery is a non-blocking `try_send` into each session's bounded queue,
//! drained by that session's own transport loop. A send that fails — queue
//! full or session gone — drops that session from the registry and never
//! delays delivery to the others, and never surfaces to the publisher.
//!
//! `create` and `subscribe` are serialized by one mutex, which fixes the
//! global publish order and makes replay exact: for any subscriber, each
//! task lands in either its replay snapshot or its live stream, never both,
//! never neither. The store and registry keep their own locks; `unsubscribe`
//! and the per-session delivery loops never touch the mutex, so slow
//! transports and departing sessions cannot block publishing.

use std::sync::Arc;

use taskcast_proto::task::{Priority, Task, TaskError};
use tokio::sync::{Mutex, mpsc};

use crate::sessions::{SessionHandle, SessionId, SessionRegistry};
use crate::store::{StoreError, TaskStore};

/// Errors returned to task creators.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The store rejected the task (duplicate name).
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The task failed validation before reaching the store.
    #[error(transparent)]
    InvalidTask(#[from] TaskError),
}

/// A live subscription: the session's handle plus the receiving end of its
/// delivery queue. Replay frames are already enqueued when this is returned;
/// live frames follow in publish order.
pub struct Subscription {
    /// Handle identifying the session; use its id to unsubscribe.
    pub handle: SessionHandle,
    /// Receiving end of the session's delivery queue.
    pub receiver: mpsc::Receiver<Task>,
}

/// The task feed: store, registry, and the fan-out path between them.
///
/// Constructed once per process and shared via [`Arc`]; there is no global
/// instance.
pub struct TaskFeed {
    store: TaskStore,
    registry: SessionRegistry,
    /// Serializes `create` and `subscribe` so replay and live broadcast
    /// compose without duplicates or gaps.
    sequence: Mutex<()>,
}

impl Default for TaskFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskFeed {
    /// Creates a feed with the default per-session queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: TaskStore::new(),
            registry: SessionRegistry::new(),
            sequence: Mutex::new(()),
        }
    }

    /// Creates a feed whose sessions get delivery queues of the given
    /// capacity.
    #[must_use]
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            store: TaskStore::new(),
            registry: SessionRegistry::with_queue_capacity(queue_capacity),
            sequence: Mutex::new(()),
        }
    }

    /// Validates and stores a task, then broadcasts it to every live
    /// session.
    ///
    /// Broadcast happens exactly once per successful insert. Delivery
    /// failures are handled internally (the failing session is dropped) and
    /// never reported to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidTask`] for an empty name, or
    /// [`FeedError::Store`] if the name is already taken.
    pub async fn create(&self, task: Task) -> Result<(), FeedError> {
        task.validate()?;
        let _order = self.sequence.lock().await;
        self.store.add(task.clone()).await?;
        tracing::debug!(task = %task.name, priority = %task.priority, "task created");
        self.publish(&task).await;
        Ok(())
    }

    /// Registers a new subscriber session and enqueues a replay of the
    /// current store contents, in store order, ahead of any live broadcast.
    ///
    /// If the replay alone overflows the session's queue the session is
    /// dropped on the spot — the uniform overflow policy — and the returned
    /// receiver yields only the frames enqueued before the overflow.
    pub async fn subscribe(&self) -> Subscription {
        let _order = self.sequence.lock().await;
        let replay = self.store.all().await;
        let (handle, receiver) = self.registry.register().await;
        tracing::info!(session_id = %handle.id(), replay = replay.len(), "subscriber joined");

        for task in replay {
            if let Err(e) = handle.try_deliver(task) {
                tracing::warn!(
                    session_id = %handle.id(),
                    error = %e,
                    "replay overflowed session queue, dropping session"
                );
                self.registry.unregister(handle.id()).await;
                break;
            }
        }

        Subscription { handle, receiver }
    }

    /// Closes and deregisters a session. Idempotent; safe to call from the
    /// transport layer and from delivery-failure handling alike.
    pub async fn unsubscribe(&self, id: SessionId) -> bool {
        let removed = self.registry.unregister(id).await;
        if removed {
            tracing::info!(session_id = %id, "subscriber left");
        }
        removed
    }

    /// Delivers a task to every session in a registry snapshot taken now.
    ///
    /// Each delivery is attempted independently; sessions whose delivery
    /// fails are deregistered after the loop.
    async fn publish(&self, task: &Task) {
        let sessions = self.registry.snapshot().await;
        let mut dropped = Vec::new();
        for session in &sessions {
            if let Err(e) = session.try_deliver(task.clone()) {
                tracing::warn!(
                    session_id = %session.id(),
                    task = %task.name,
                    error = %e,
                    "delivery failed, dropping session"
                );
                dropped.push(session.id());
            }
        }
        for id in dropped {
            self.registry.unregister(id).await;
        }
    }

    /// Returns a snapshot of all tasks in insertion order.
    pub async fn all_tasks(&self) -> Vec<Task> {
        self.store.all().await
    }

    /// Returns the task with the given name, if present.
    pub async fn task_by_name(&self, name: &str) -> Option<Task> {
        self.store.by_name(name).await
    }

    /// Returns all tasks with the given priority, in insertion order.
    pub async fn tasks_by_priority(&self, priority: Priority) -> Vec<Task> {
        self.store.by_priority(priority).await
    }

    /// Removes a task by name. Returns `true` if it existed. Removals are
    /// not broadcast; the feed only carries creations.
    pub async fn remove_task(&self, name: &str) -> bool {
        let removed = self.store.remove(name).await;
        if removed {
            tracing::debug!(task = %name, "task removed");
        }
        removed
    }

    /// Returns the number of live subscriber sessions.
    pub async fn session_count(&self) -> usize {
        self.registry.len().await
    }
}

/// Convenience alias used by the transport layer and tests.
pub type SharedFeed = Arc<TaskFeed>;
