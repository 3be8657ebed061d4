//! Chat Transcript
//!
//! The ordered history of one chat session between the user and the pet.
//! Insertion order is chronological order. The whole history is kept; the
//! surface shows only the last [`MAX_VISIBLE_MESSAGES`].
//!
//! # Design Philosophy
//!
//! The transcript is shared between the Conductor (user messages, loading
//! placeholders) and the response sequencer (typed pet replies). It is a
//! cheap cloneable handle over one lock, and every method finishes its work
//! before returning, so nothing ever holds the lock across an `.await`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::messages::{MessageId, MessageRole};

/// How many messages the surface shows at once
pub const MAX_VISIBLE_MESSAGES: usize = 5;

/// A message in the conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message ID
    pub id: MessageId,
    /// Message content (the full text, even while typing)
    pub text: String,
    /// Who sent this message
    pub role: MessageRole,
    /// When the message was created
    pub timestamp: DateTime<Utc>,
    /// Transient "thinking" placeholder
    pub is_loading: bool,
    /// Still being revealed character by character
    pub is_typing: bool,
}

impl ChatMessage {
    fn new(role: MessageRole, text: String) -> Self {
        Self {
            id: MessageId::new(),
            text,
            role,
            timestamp: Utc::now(),
            is_loading: false,
            is_typing: false,
        }
    }
}

/// Shared, ordered chat history
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    messages: Arc<Mutex<Vec<ChatMessage>>>,
}

impl Transcript {
    /// Create an empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user message
    pub fn push_user(&self, text: impl Into<String>) -> ChatMessage {
        self.push(ChatMessage::new(MessageRole::User, text.into()))
    }

    /// Insert the pet's "thinking" placeholder
    pub fn push_loading(&self) -> ChatMessage {
        let mut msg = ChatMessage::new(MessageRole::Pet, String::new());
        msg.is_loading = true;
        self.push(msg)
    }

    /// Append a pet reply that is about to be typed out
    pub fn push_typing(&self, text: impl Into<String>) -> ChatMessage {
        let mut msg = ChatMessage::new(MessageRole::Pet, text.into());
        msg.is_typing = true;
        self.push(msg)
    }

    fn push(&self, msg: ChatMessage) -> ChatMessage {
        self.messages.lock().push(msg.clone());
        msg
    }

    /// Remove a message; returns whether it was present
    pub fn remove(&self, id: &MessageId) -> bool {
        let mut messages = self.messages.lock();
        let before = messages.len();
        messages.retain(|m| &m.id != id);
        messages.len() != before
    }

    /// Mark one message as fully revealed
    pub fn complete_typing(&self, id: &MessageId) -> bool {
        let mut messages = self.messages.lock();
        match messages.iter_mut().find(|m| &m.id == id) {
            Some(msg) if msg.is_typing => {
                msg.is_typing = false;
                true
            }
            _ => false,
        }
    }

    /// Mark every typing message as complete, returning the ones that changed
    pub fn complete_all_typing(&self) -> Vec<ChatMessage> {
        let mut messages = self.messages.lock();
        messages
            .iter_mut()
            .filter(|m| m.is_typing)
            .map(|m| {
                m.is_typing = false;
                m.clone()
            })
            .collect()
    }

    /// Look up a message by ID
    pub fn get(&self, id: &MessageId) -> Option<ChatMessage> {
        self.messages.lock().iter().find(|m| &m.id == id).cloned()
    }

    /// The full history
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().clone()
    }

    /// The most recent [`MAX_VISIBLE_MESSAGES`] messages
    pub fn visible(&self) -> Vec<ChatMessage> {
        let messages = self.messages.lock();
        let start = messages.len().saturating_sub(MAX_VISIBLE_MESSAGES);
        messages[start..].to_vec()
    }

    /// Number of messages in the history
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Drop all history
    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}
