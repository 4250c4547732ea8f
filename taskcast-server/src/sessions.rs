//! Subscriber sessions and the live-session registry.
//!
//! A [`SessionHandle`] is the sending side of one subscriber: a bounded
//! delivery queue plus a closed flag. The [`SessionRegistry`] owns the set
//! of live sessions and hands out point-in-time snapshots for fan-out, so
//! delivery never holds the registry lock.
//!
//! Queues are bounded on purpose. A subscriber that stops draining its queue
//! fills it, the next delivery fails, and the session is dropped — one stuck
//! transport never stalls the publisher or other subscribers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use taskcast_proto::task::Task;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

/// Unique identifier for a subscriber session, based on UUID v7 for
/// time-ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new time-ordered session identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a delivery to a session did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The session's bounded queue is full; the subscriber is not draining.
    #[error("delivery queue full")]
    QueueFull,
    /// The session is closed or its receiver has been dropped.
    #[error("session closed")]
    Closed,
}

/// Sending side of one subscriber session.
///
/// Cheap to clone; clones share the queue and the closed flag. Held by the
/// registry while the session is live, and briefly by fan-out snapshots.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    sender: mpsc::Sender<Task>,
    closed: Arc<AtomicBool>,
}

impl SessionHandle {
    fn new(id: SessionId, sender: mpsc::Sender<Task>) -> Self {
        Self {
            id,
            sender,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the session's identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Attempts to enqueue a task for delivery without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Closed`] if the session was closed or its
    /// receiver dropped, [`DeliveryError::QueueFull`] if the bounded queue
    /// is at capacity.
    pub fn try_deliver(&self, task: Task) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.sender.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Marks the session closed. Stale snapshot holders see the flag and
    /// stop delivering; the transport's delivery loop ends once all handle
    /// clones are dropped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Returns `true` once the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Default per-session delivery queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Registry of currently live subscriber sessions.
///
/// Membership changes are atomic with respect to [`SessionRegistry::snapshot`]:
/// a snapshot sees either the old or the new membership, never a
/// half-mutated set, and a session appears at most once.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    queue_capacity: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Creates an empty registry with the default queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Creates an empty registry whose sessions get queues of the given
    /// capacity.
    #[must_use]
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Creates a new session with a fresh id, adds it to the live set, and
    /// returns its handle together with the receiving end of its queue.
    pub async fn register(&self) -> (SessionHandle, mpsc::Receiver<Task>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let handle = SessionHandle::new(SessionId::new(), tx);
        let mut sessions = self.sessions.write().await;
        sessions.insert(handle.id(), handle.clone());
        drop(sessions);
        (handle, rx)
    }

    /// Removes and closes a session. Idempotent: removing an absent id is a
    /// no-op returning `false`.
    pub async fn unregister(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(&id);
        drop(sessions);
        match removed {
            Some(handle) => {
                handle.close();
                true
            }
            None => false,
        }
    }

    /// Returns the sessions live at the instant of the call.
    ///
    /// The returned handles are safe to iterate without holding any lock;
    /// a session unregistered mid-iteration just fails its delivery.
    pub async fn snapshot(&self) -> Vec<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.values().cloned().collect()
    }

    /// Returns the number of live sessions.
    pub async fn len(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Returns `true` if no session is live.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
