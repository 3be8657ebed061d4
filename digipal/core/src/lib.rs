//! DigiPal Core - Headless Virtual Pet Engine
//!
//! This crate provides the core logic for DigiPal, a virtual pet you chat
//! with, completely independent of any UI framework. It can drive a terminal,
//! a mobile app, or run headless for testing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          UI Surfaces                              │
//! │       ┌──────────────┐   ┌──────────────┐   ┌──────────────┐      │
//! │       │  Terminal    │   │   Mobile     │   │  Headless    │      │
//! │       └──────┬───────┘   └──────┬───────┘   └──────┬───────┘      │
//! │              └──────────────────┴──────────────────┘              │
//! │                     SurfaceEvent (up)                             │
//! │                   ConductorMessage (down)                         │
//! └────────────────────────────┼─────────────────────────────────────┘
//!                              │
//! ┌────────────────────────────┼─────────────────────────────────────┐
//! │                       DIGIPAL CORE                                │
//! │  ┌─────────────────────────┴──────────────────────────────────┐  │
//! │  │                        Conductor                            │  │
//! │  │  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌──────────┐ │  │
//! │  │  │ StatStore │  │  Change   │  │ Response  │  │ Backend  │ │  │
//! │  │  │  + decay  │  │  Applier  │  │ Sequencer │  │ (retry)  │ │  │
//! │  │  └───────────┘  └───────────┘  └───────────┘  └──────────┘ │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Conductor`]: Runs chat turns end to end
//! - [`StatStore`]: Owns the pet and applies decay and interactions
//! - [`ChangeApplier`]: Maps backend stat changes onto the store
//! - [`ResponseSequencer`]: Types out (and optionally speaks) pet replies
//! - [`ConductorMessage`]: Messages sent from Conductor to UI surfaces
//! - [`SurfaceEvent`]: Events sent from UI surfaces to Conductor
//!
//! # Quick Start
//!
//! ```ignore
//! use digipal_core::{backend::HttpBackend, Conductor, ConductorConfig, SurfaceEvent};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (tx, mut rx) = mpsc::channel(256);
//!
//!     let config = ConductorConfig::default();
//!     let backend = HttpBackend::new("http://localhost:3000/chat", config.retry.timeout)?;
//!     let conductor = Conductor::new(backend, config, tx);
//!
//!     conductor.start().await?;
//!     conductor.greet().await?;
//!
//!     conductor
//!         .handle_event(SurfaceEvent::UserMessage { content: "I'm hungry".into() })
//!         .await?;
//!
//!     while let Some(msg) = rx.recv().await {
//!         // Render message to UI
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`pet`]: Stats, archetypes, decay, the stat store, and change application
//! - [`sequencer`]: Typed/spoken delivery of pet replies
//! - [`conductor`]: Main Conductor struct
//! - [`backend`]: Pet backend abstraction (HTTP) with timeout and retry
//! - [`voice`]: Speech synthesis and recognition collaborators
//! - [`session`]: Chat transcript
//! - [`events`]: Events from UI surfaces to Conductor
//! - [`messages`]: Messages from Conductor to UI surfaces
//! - [`config`]: TOML + environment configuration
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on any terminal or UI framework.

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod conductor;
pub mod config;
pub mod events;
pub mod messages;
pub mod pet;
pub mod sequencer;
pub mod session;
pub mod voice;

// Re-exports for convenience
pub use backend::{
    send_with_retry, BackendError, ChatRequest, HttpBackend, PetBackend, PetReply, RetryPolicy,
};
pub use conductor::{
    Collaborators, Conductor, ConductorConfig, Presentation, TurnOutcome, FALLBACK_MESSAGE,
};
pub use events::SurfaceEvent;
pub use messages::{ConductorMessage, ConductorState, MessageId, MessageRole, NotifyLevel};
pub use pet::{
    ChangeApplier, Clock, DecayRates, LogCategory, ManualClock, PetCustomization, PetMood,
    PetState, PetStats, PetType, StatChange, StatKind, StatStore, StatsLogEntry, SystemClock,
};
pub use sequencer::{ResponseSequencer, SequencePhase, SpeechState};
pub use session::{ChatMessage, Transcript, MAX_VISIBLE_MESSAGES};
pub use voice::{
    Capability, SilentSpeech, SpeechOptions, SpeechRecognizer, SpeechSynthesizer,
    UnavailableRecognizer, VoiceError,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, DigipalConfig, DigipalToml,
};
