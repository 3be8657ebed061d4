//! Pet Backend Traits
//!
//! Trait definitions for the remote service that talks on the pet's behalf.
//! The Conductor only ever sees a [`PetBackend`]; tests swap in scripted
//! backends and the CLI wires up [`HttpBackend`](super::HttpBackend).
//!
//! # Design Philosophy
//!
//! A backend answers one chat message with two things:
//! - the pet's replies, in the order they should be shown
//! - well-being adjustments to apply to the pet's stats
//!
//! The reply is parsed completely before it is returned, so a malformed
//! payload can never half-apply stat changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pet::StatChange;

/// A chat message sent to the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// What the user said
    pub message: String,
}

impl ChatRequest {
    /// Create a request for `message`
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The backend's answer to one chat message
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PetReply {
    /// Replies from the pet, in display order
    #[serde(default)]
    pub messages: Vec<String>,
    /// Stat adjustments requested by the backend
    #[serde(default)]
    pub changes: Vec<StatChange>,
}

impl PetReply {
    /// A reply with messages and no stat changes
    pub fn text<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
            changes: Vec::new(),
        }
    }

    /// Add stat changes
    #[must_use]
    pub fn with_changes(mut self, changes: Vec<StatChange>) -> Self {
        self.changes = changes;
        self
    }
}

/// Errors from a backend call
#[derive(Debug, Error)]
pub enum BackendError {
    /// The call did not finish in time
    #[error("backend request timed out")]
    Timeout,

    /// The backend could not be reached
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// The payload could not be parsed
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Whether another attempt might succeed
    ///
    /// Client errors (4xx) are final; everything else is worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => !(400..500).contains(status),
            Self::Timeout | Self::Connection(_) | Self::Malformed(_) => true,
        }
    }
}

/// Pet backend trait
///
/// Implement this trait to plug in a different service.
#[async_trait]
pub trait PetBackend: Send + Sync {
    /// Backend name, for logs
    fn name(&self) -> &str;

    /// Send one chat message and wait for the complete reply
    async fn send(&self, request: &ChatRequest) -> Result<PetReply, BackendError>;
}
