//! Task model types shared between the server and its clients.
//!
//! A [`Task`] is an immutable value identified by its `name`; two tasks with
//! the same name are the same entity as far as the store is concerned.

use serde::{Deserialize, Serialize};

/// Urgency of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Can wait indefinitely.
    Low,
    /// Should be done soon.
    Medium,
    /// Should be done next.
    High,
    /// Drop everything else.
    Vital,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Vital => write!(f, "Vital"),
        }
    }
}

/// Error returned when a priority string does not name a known variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown priority `{0}`")]
pub struct ParsePriorityError(String);

impl std::str::FromStr for Priority {
    type Err = ParsePriorityError;

    /// Parses a priority name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "vital" => Ok(Self::Vital),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

/// Error returned when a task fails validation.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task name is empty; names are the task's identity.
    #[error("task name must not be empty")]
    EmptyName,
}

/// A single tracked task.
///
/// `name` is the unique key. Tasks are immutable once created; updating a
/// task is out of scope for the broadcast core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique, non-empty task name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Task urgency.
    pub priority: Priority,
}

impl Task {
    /// Creates a new task from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, priority: Priority) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            priority,
        }
    }

    /// Checks the task's invariants.
    ///
    /// Tasks arriving off the wire or out of a JSON body bypass [`Task::new`],
    /// so the server validates before storing.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::EmptyName`] if the name is empty.
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.name.is_empty() {
            return Err(TaskError::EmptyName);
        }
        Ok(())
    }
}
