//! Surface Events
//!
//! Events sent from UI surfaces to the Conductor. These represent all the ways
//! a surface can report what the user did.
//!
//! # Design Philosophy
//!
//! Surfaces are "dumb" renderers that forward user actions to the Conductor.
//! They don't interpret what actions mean - they just report what happened.
//! The Conductor decides how to respond.

use serde::{Deserialize, Serialize};

/// Events from UI Surface to Conductor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceEvent {
    // ============================================
    // User Input Events
    // ============================================
    /// User submitted a chat message
    UserMessage {
        /// The message content
        content: String,
    },

    /// User executed a command (e.g., /help, /quit)
    UserCommand {
        /// Command name (without leading /)
        command: String,
        /// Command arguments
        args: Vec<String>,
    },

    // ============================================
    // Voice Events
    // ============================================
    /// User pressed the microphone button
    VoiceStart,

    /// User released the microphone button
    VoiceStop,

    // ============================================
    // Interaction Events
    // ============================================
    /// User clicked/tapped the pet
    PetClicked,

    // ============================================
    // Lifecycle Events
    // ============================================
    /// User requested quit
    QuitRequested,
}

impl SurfaceEvent {
    /// Turn a line of typed input into an event
    ///
    /// Lines starting with `/` are commands; everything else is a chat
    /// message. Returns `None` for blank input.
    #[must_use]
    pub fn from_input(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(rest) = line.strip_prefix('/') {
            let mut parts = rest.split_whitespace();
            let command = parts.next()?.to_lowercase();
            let args = parts.map(String::from).collect();
            return Some(Self::UserCommand { command, args });
        }

        Some(Self::UserMessage {
            content: line.to_string(),
        })
    }
}
