//! Terminal rendering of conductor messages
//!
//! Plain mode writes a chat log: user lines are echoed by the terminal, pet
//! replies appear character by character as the conductor reveals them.
//! JSON mode writes one serialized message per line for scripting.

use std::collections::HashMap;

use digipal_core::{ConductorMessage, MessageId, MessageRole, NotifyLevel};

/// Output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable chat log
    Plain,
    /// One JSON message per line
    Json,
}

/// Turns conductor messages into terminal output
pub struct Renderer {
    mode: OutputMode,
    pet_name: String,
    /// Bytes of each in-flight reply already written
    revealed: HashMap<MessageId, usize>,
}

impl Renderer {
    pub fn new(mode: OutputMode, pet_name: impl Into<String>) -> Self {
        Self {
            mode,
            pet_name: pet_name.into(),
            revealed: HashMap::new(),
        }
    }

    /// Text to write for `msg`, if any
    pub fn render(&mut self, msg: &ConductorMessage) -> Option<String> {
        match self.mode {
            OutputMode::Json => match serde_json::to_string(msg) {
                Ok(line) => Some(format!("{line}\n")),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to serialize message");
                    None
                }
            },
            OutputMode::Plain => self.render_plain(msg),
        }
    }

    fn render_plain(&mut self, msg: &ConductorMessage) -> Option<String> {
        match msg {
            ConductorMessage::Message {
                id,
                role: MessageRole::Pet,
                loading: false,
                ..
            } => {
                self.revealed.insert(id.clone(), 0);
                Some(format!("{}: ", self.pet_name))
            }
            ConductorMessage::Message { loading: true, .. } => {
                Some(format!("({} is thinking...)\n", self.pet_name))
            }
            ConductorMessage::Typing { message_id, text } => {
                let written = self.revealed.get_mut(message_id)?;
                let delta = text.get(*written..)?.to_string();
                *written = text.len();
                (!delta.is_empty()).then_some(delta)
            }
            ConductorMessage::TypingComplete {
                message_id,
                final_content,
            } => {
                let written = self.revealed.remove(message_id)?;
                let rest = final_content.get(written..).unwrap_or_default();
                Some(format!("{rest}\n"))
            }
            ConductorMessage::PetUpdated { pet } => {
                self.pet_name.clone_from(&pet.name);
                let hat = pet
                    .hat
                    .as_deref()
                    .map(|h| format!(", wearing {h}"))
                    .unwrap_or_default();
                Some(format!(
                    "* {} the {} ({}{hat})\n",
                    pet.name, pet.pet_type, pet.color
                ))
            }
            ConductorMessage::Notify { level, message } => {
                let prefix = match level {
                    NotifyLevel::Info => "*",
                    NotifyLevel::Warning => "! warning:",
                    NotifyLevel::Error => "! error:",
                };
                Some(format!("{prefix} {message}\n"))
            }
            ConductorMessage::Quit { message } => {
                message.as_ref().map(|m| format!("{}: {m}\n", self.pet_name))
            }
            ConductorMessage::Message { .. }
            | ConductorMessage::MessageRemoved { .. }
            | ConductorMessage::Talking { .. }
            | ConductorMessage::Stats { .. }
            | ConductorMessage::State { .. } => None,
        }
    }
}
