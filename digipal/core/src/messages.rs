//! Conductor Messages
//!
//! Messages sent from the Conductor to UI surfaces. These are everything a
//! surface needs to draw the pet screen: chat bubbles, the typed-out text of
//! the reply currently being revealed, the "talking" flag that drives the
//! avatar's mouth animation, and stat gauge updates.
//!
//! # Design Philosophy
//!
//! Surfaces are pure renderers. They never decide when a message is complete
//! or how stats change; they draw what the Conductor tells them to.

use serde::{Deserialize, Serialize};

use crate::pet::{PetMood, PetState, PetStats};

/// Messages from Conductor to UI Surface
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ConductorMessage {
    // ============================================
    // Conversation Messages
    // ============================================
    /// A message was appended to the transcript
    Message {
        /// Unique message ID for tracking
        id: MessageId,
        /// Who sent this message
        role: MessageRole,
        /// The message content (full text, even while it is being typed)
        content: String,
        /// Whether this is a transient "thinking" placeholder
        #[serde(default)]
        loading: bool,
    },

    /// A message was removed from the transcript (loading placeholders)
    MessageRemoved {
        /// ID of the removed message
        id: MessageId,
    },

    /// More characters of a pet reply have been revealed
    Typing {
        /// Message being revealed
        message_id: MessageId,
        /// Text revealed so far
        text: String,
    },

    /// A pet reply is fully revealed
    TypingComplete {
        /// Message that completed
        message_id: MessageId,
        /// The complete text
        final_content: String,
    },

    // ============================================
    // Pet Directives
    // ============================================
    /// Talking flag changed (drives the avatar's talking animation)
    Talking {
        /// Whether the pet is currently talking
        talking: bool,
    },

    /// Pet stats changed
    Stats {
        /// Current stats
        stats: PetStats,
        /// Mood derived from the stats
        mood: PetMood,
    },

    /// Pet appearance or identity changed
    PetUpdated {
        /// The full pet state
        pet: PetState,
    },

    // ============================================
    // System Messages
    // ============================================
    /// System notification
    Notify {
        /// Notification level
        level: NotifyLevel,
        /// Message content
        message: String,
    },

    /// Conductor state change
    State {
        /// The new state
        state: ConductorState,
    },

    /// Request surface to quit
    Quit {
        /// Optional goodbye message
        message: Option<String>,
    },
}

/// Message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("msg_{id}"))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    /// User input
    User,
    /// The pet
    Pet,
}

/// Notification levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
}

/// Conductor operational states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConductorState {
    /// Starting up, not ready
    Initializing,
    /// Ready for input
    Ready,
    /// Waiting on the backend
    Thinking,
    /// Revealing replies
    Responding,
    /// Capturing voice input
    Listening,
    /// Shutting down
    ShuttingDown,
}

impl ConductorState {
    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Initializing => "Starting up...",
            Self::Ready => "Ready",
            Self::Thinking => "Thinking...",
            Self::Responding => "Responding...",
            Self::Listening => "Listening",
            Self::ShuttingDown => "Shutting down...",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_unique() {
        let id1 = MessageId::new();
        let id2 = MessageId::new();
        assert_ne!(id1, id2);
        assert!(id1.0.starts_with("msg_"));
    }

    #[test]
    fn test_conductor_state_description() {
        assert_eq!(ConductorState::Ready.description(), "Ready");
        assert_eq!(ConductorState::Thinking.description(), "Thinking...");
    }

    #[test]
    fn test_message_serializes_with_role() {
        let msg = ConductorMessage::Message {
            id: MessageId("msg_test".to_string()),
            role: MessageRole::Pet,
            content: "Yum!".to_string(),
            loading: false,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"Pet\""));
        assert!(json.contains("Yum!"));
    }
}
