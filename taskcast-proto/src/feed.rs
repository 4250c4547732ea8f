//! Task feed wire protocol.
//!
//! Defines the [`FeedMessage`] enum that is postcard-encoded and sent over
//! WebSocket binary frames between feed subscribers and the server. The
//! WebSocket transport preserves message boundaries, so no length framing
//! is needed.

use serde::{Deserialize, Serialize};

use crate::task::Task;

/// Error type for feed encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum FeedCodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Messages exchanged on a task feed connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedMessage {
    /// Server → client: one task, sent both during the initial replay and
    /// for live broadcasts. Replay frames always precede live frames.
    Task(Task),

    /// Client → server: create this task and broadcast it to every
    /// subscriber (including the submitter).
    Submit(Task),

    /// Server → client: a submission was rejected. Sent only to the
    /// offending session; other subscribers never see it.
    Error {
        /// Human-readable rejection reason.
        reason: String,
    },
}

/// Encodes a [`FeedMessage`] into bytes using postcard.
///
/// # Errors
///
/// Returns [`FeedCodecError::Serialization`] if the message cannot be
/// serialized.
pub fn encode(msg: &FeedMessage) -> Result<Vec<u8>, FeedCodecError> {
    postcard::to_allocvec(msg).map_err(|e| FeedCodecError::Serialization(e.to_string()))
}

/// Decodes a [`FeedMessage`] from bytes using postcard.
///
/// # Errors
///
/// Returns [`FeedCodecError::Serialization`] if the bytes cannot be
/// deserialized.
pub fn decode(bytes: &[u8]) -> Result<FeedMessage, FeedCodecError> {
    postcard::from_bytes(bytes).map_err(|e| FeedCodecError::Serialization(e.to_string()))
}
