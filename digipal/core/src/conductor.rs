//! Conductor - The Orchestration Core
//!
//! The Conductor is the "brain" of DigiPal. It orchestrates:
//! - Chat turns against the pet backend (with timeout and retry)
//! - Stat changes requested by the backend
//! - Typed and spoken delivery of the pet's replies
//! - The stat decay ticker
//! - Communication with UI surfaces
//!
//! # Design Philosophy
//!
//! The Conductor is UI-agnostic. It doesn't know or care whether it's talking
//! to a terminal, a mobile app, or a test harness. It communicates through:
//! - `ConductorMessage`: Commands sent TO the UI surface
//! - `SurfaceEvent`: Events received FROM the UI surface
//!
//! # Turns
//!
//! Every entry point takes `&self`, so a surface can start a new turn while a
//! previous one is still waiting on the network. Each turn takes a generation
//! number; when a newer turn starts, the older one drops its network call and
//! reports [`TurnOutcome::Superseded`] without touching the pet.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::backend::{send_with_retry, ChatRequest, PetBackend, RetryPolicy};
use crate::config::DigipalConfig;
use crate::events::SurfaceEvent;
use crate::messages::{ConductorMessage, ConductorState, MessageRole, NotifyLevel};
use crate::pet::{
    ChangeApplier, Clock, DecayRates, PetCustomization, PetMood, PetState, PetStats, PetType,
    StatStore, StatsLogEntry, SystemClock, COLOR_PALETTE, DEFAULT_DECAY_TICK, DEFAULT_PET_NAME,
};
use crate::sequencer::ResponseSequencer;
use crate::session::{ChatMessage, Transcript};
use crate::voice::{
    Capability, SilentSpeech, SpeechOptions, SpeechRecognizer, SpeechSynthesizer,
    UnavailableRecognizer,
};

/// Shown when the backend cannot be reached
pub const FALLBACK_MESSAGE: &str = "I'm having trouble connecting right now. Can you try again?";

/// What the greeting turn sends to the backend
pub const GREETING_PROMPT: &str = "Hello";

const HELP_TEXT: &str = "Available commands: /help, /stats, /mood, /color, /name <name>, \
                         /pet <cat|dog|bunny|frog|cactus>, /hat <name|none>, /mute, /unmute, \
                         /log, /quit";

/// How many log entries `/log` shows
const LOG_PREVIEW: usize = 5;

/// Conductor configuration
#[derive(Clone, Debug)]
pub struct ConductorConfig {
    /// Timeout and retry behavior for backend calls
    pub retry: RetryPolicy,
    /// Whether replies are narrated
    pub speech_enabled: bool,
    /// Narration voice
    pub speech_options: SpeechOptions,
    /// Decay ticker period
    pub decay_tick: Duration,
    /// Decay rates
    pub decay_rates: DecayRates,
    /// Name of the starting pet
    pub pet_name: String,
    /// Archetype of the starting pet
    pub pet_type: PetType,
    /// Body color override for the starting pet
    pub pet_color: Option<String>,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            speech_enabled: true,
            speech_options: SpeechOptions::default(),
            decay_tick: DEFAULT_DECAY_TICK,
            decay_rates: DecayRates::default(),
            pet_name: DEFAULT_PET_NAME.to_string(),
            pet_type: PetType::default(),
            pet_color: None,
        }
    }
}

impl From<&DigipalConfig> for ConductorConfig {
    fn from(config: &DigipalConfig) -> Self {
        Self {
            retry: config.retry,
            speech_enabled: config.speech_enabled,
            speech_options: SpeechOptions {
                language: config.speech_language.clone(),
                ..SpeechOptions::default()
            },
            decay_tick: config.decay_tick,
            decay_rates: config.decay_rates,
            pet_name: config.pet_name.clone(),
            pet_type: config.pet_type,
            pet_color: config.pet_color.clone(),
        }
    }
}

/// External collaborators the Conductor consumes
#[derive(Clone)]
pub struct Collaborators {
    /// Wall-clock source
    pub clock: Arc<dyn Clock>,
    /// Text-to-speech
    pub speech: Arc<dyn SpeechSynthesizer>,
    /// Speech-to-text
    pub recognizer: Arc<dyn SpeechRecognizer>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            speech: Arc::new(SilentSpeech),
            recognizer: Arc::new(UnavailableRecognizer::default()),
        }
    }
}

/// How a chat turn ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnOutcome {
    /// Blank input; nothing happened
    Ignored,
    /// The backend replied and the reply is being presented
    Replied,
    /// The backend failed; the apology is being presented
    Fallback,
    /// A newer turn started before this one finished
    Superseded,
}

/// Everything a surface needs to draw the pet screen
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Presentation {
    /// The pet
    pub pet: PetState,
    /// Current stats
    pub stats: PetStats,
    /// Mood derived from the stats
    pub mood: PetMood,
    /// The visible window of the transcript
    pub messages: Vec<ChatMessage>,
    /// Whether the pet is mid-reveal
    pub talking: bool,
    /// Text revealed so far of the current reply
    pub typed_text: String,
    /// Operational state
    pub state: ConductorState,
    /// Whether replies are narrated
    pub speech_enabled: bool,
}

/// The Conductor - headless orchestration core
pub struct Conductor<B: PetBackend> {
    /// Configuration
    config: ConductorConfig,
    /// Pet backend
    backend: Arc<B>,
    /// Owner of the pet state
    store: Arc<StatStore>,
    /// Applies backend stat changes
    changes: ChangeApplier,
    /// Chat history
    transcript: Transcript,
    /// Typed/spoken delivery of replies
    sequencer: ResponseSequencer,
    /// Speech-to-text
    recognizer: Arc<dyn SpeechRecognizer>,
    /// Current operational state
    state: Mutex<ConductorState>,
    /// Generation of the newest turn
    turn: watch::Sender<u64>,
    /// Whether voice capture is running
    listening: AtomicBool,
    /// Decay ticker and stats forwarder
    background: Mutex<Vec<JoinHandle<()>>>,
    /// Channel to send messages to UI surface
    tx: mpsc::Sender<ConductorMessage>,
}

impl<B: PetBackend + 'static> Conductor<B> {
    /// Create a new Conductor with the given backend
    pub fn new(backend: B, config: ConductorConfig, tx: mpsc::Sender<ConductorMessage>) -> Self {
        Self::with_collaborators(backend, config, tx, Collaborators::default())
    }

    /// Create a new Conductor with explicit collaborators
    pub fn with_collaborators(
        backend: B,
        config: ConductorConfig,
        tx: mpsc::Sender<ConductorMessage>,
        collaborators: Collaborators,
    ) -> Self {
        let mut pet = PetState::new(
            config.pet_name.clone(),
            config.pet_type,
            collaborators.clock.now(),
        );
        if let Some(ref color) = config.pet_color {
            pet.color.clone_from(color);
        }

        let store = Arc::new(StatStore::new(pet, collaborators.clock).with_rates(config.decay_rates));
        let transcript = Transcript::new();
        let sequencer = ResponseSequencer::new(transcript.clone(), collaborators.speech, tx.clone())
            .with_speech_options(config.speech_options.clone())
            .with_speech_enabled(config.speech_enabled);
        let (turn, _) = watch::channel(0);

        Self {
            changes: ChangeApplier::new(Arc::clone(&store)),
            config,
            backend: Arc::new(backend),
            store,
            transcript,
            sequencer,
            recognizer: collaborators.recognizer,
            state: Mutex::new(ConductorState::Initializing),
            turn,
            listening: AtomicBool::new(false),
            background: Mutex::new(Vec::new()),
            tx,
        }
    }

    /// Get current state
    pub fn state(&self) -> ConductorState {
        let state = *self.state.lock();
        if state == ConductorState::Ready && self.sequencer.is_active() {
            ConductorState::Responding
        } else {
            state
        }
    }

    /// The pet state owner
    pub fn store(&self) -> &Arc<StatStore> {
        &self.store
    }

    /// The chat history
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The reply sequencer
    pub fn sequencer(&self) -> &ResponseSequencer {
        &self.sequencer
    }

    /// Applied stat changes so far
    pub fn stats_log(&self) -> Vec<StatsLogEntry> {
        self.changes.log()
    }

    /// Snapshot for drawing
    pub fn presentation(&self) -> Presentation {
        let pet = self.store.state();
        Presentation {
            stats: pet.stats,
            mood: pet.mood(),
            pet,
            messages: self.transcript.visible(),
            talking: self.sequencer.talking(),
            typed_text: self.sequencer.typed_text(),
            state: self.state(),
            speech_enabled: self.sequencer.speech_enabled(),
        }
    }

    /// Start the Conductor: launch the decay ticker and publish the pet
    pub async fn start(&self) -> anyhow::Result<()> {
        self.set_state(ConductorState::Initializing).await;

        let ticker = self.store.spawn_decay_ticker(self.config.decay_tick);
        let forwarder = self.spawn_stats_forwarder();
        self.background.lock().extend([ticker, forwarder]);

        let pet = self.store.state();
        tracing::info!(
            pet = %pet.name,
            pet_type = %pet.pet_type,
            backend = self.backend.name(),
            "Conductor started"
        );
        self.send(ConductorMessage::PetUpdated { pet: pet.clone() })
            .await;
        self.send(ConductorMessage::Stats {
            stats: pet.stats,
            mood: pet.mood(),
        })
        .await;

        self.set_state(ConductorState::Ready).await;
        Ok(())
    }

    /// Forward every stat change to the surface
    fn spawn_stats_forwarder(&self) -> JoinHandle<()> {
        let mut rx = self.store.subscribe();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let stats = *rx.borrow_and_update();
                let msg = ConductorMessage::Stats {
                    stats,
                    mood: stats.mood_bucket(),
                };
                if tx.send(msg).await.is_err() {
                    break;
                }
            }
        })
    }

    /// Open the conversation
    ///
    /// Sends a hello to the backend without recording a user message. If the
    /// backend is unreachable the pet introduces itself instead.
    pub async fn greet(&self) -> anyhow::Result<TurnOutcome> {
        let name = self.store.state().name;
        let fallback = format!("Hello! I'm {name}. How can I help you today?");
        self.run_turn(GREETING_PROMPT, &fallback, false).await
    }

    /// Run one chat turn for `text`
    pub async fn send_user_message(&self, text: &str) -> anyhow::Result<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }
        self.run_turn(text, FALLBACK_MESSAGE, true).await
    }

    async fn run_turn(
        &self,
        text: &str,
        fallback: &str,
        record_user: bool,
    ) -> anyhow::Result<TurnOutcome> {
        // Supersede older turns first, then interrupt whatever the pet was saying
        let generation = self.next_generation();
        let mut turn_rx = self.turn.subscribe();
        self.sequencer.cancel().await;

        if record_user {
            let msg = self.transcript.push_user(text);
            self.send(ConductorMessage::Message {
                id: msg.id,
                role: MessageRole::User,
                content: msg.text,
                loading: false,
            })
            .await;
        }

        let placeholder = self.transcript.push_loading();
        self.send(ConductorMessage::Message {
            id: placeholder.id.clone(),
            role: MessageRole::Pet,
            content: String::new(),
            loading: true,
        })
        .await;
        self.set_state(ConductorState::Thinking).await;

        let request = ChatRequest::new(text);
        let result = tokio::select! {
            result = send_with_retry(&*self.backend, &request, &self.config.retry) => Some(result),
            () = wait_superseded(&mut turn_rx, generation) => None,
        };

        self.transcript.remove(&placeholder.id);
        self.send(ConductorMessage::MessageRemoved { id: placeholder.id })
            .await;

        let Some(result) = result else {
            tracing::debug!(generation, "Turn superseded while waiting on the backend");
            return Ok(TurnOutcome::Superseded);
        };

        let (messages, changes, outcome) = match result {
            Ok(reply) => {
                tracing::info!(
                    messages = reply.messages.len(),
                    changes = reply.changes.len(),
                    "Backend reply received"
                );
                (reply.messages, reply.changes, TurnOutcome::Replied)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Backend unavailable, using fallback reply");
                (vec![fallback.to_string()], Vec::new(), TurnOutcome::Fallback)
            }
        };

        // Generation check, stat changes and playback start share one critical
        // section; a newer turn either rejects this one or cancels its playback
        let started = self.sequencer.play_if(messages, || {
            if self.current_generation() != generation {
                return None;
            }

            let mut lead = Vec::with_capacity(2);
            if self.changes.apply(&changes) > 0 {
                let stats = self.store.stats();
                lead.push(ConductorMessage::Stats {
                    stats,
                    mood: stats.mood_bucket(),
                });
            }
            *self.state.lock() = ConductorState::Ready;
            lead.push(ConductorMessage::State {
                state: ConductorState::Ready,
            });
            Some(lead)
        });

        if started {
            Ok(outcome)
        } else {
            tracing::debug!(generation, "Turn superseded, dropping reply");
            Ok(TurnOutcome::Superseded)
        }
    }

    fn next_generation(&self) -> u64 {
        let mut generation = 0;
        self.turn.send_modify(|g| {
            *g += 1;
            generation = *g;
        });
        generation
    }

    fn current_generation(&self) -> u64 {
        *self.turn.borrow()
    }

    /// Handle an event from the UI surface
    pub async fn handle_event(&self, event: SurfaceEvent) -> anyhow::Result<()> {
        match event {
            SurfaceEvent::UserMessage { content } => {
                self.send_user_message(&content).await?;
            }

            SurfaceEvent::UserCommand { command, args } => {
                self.handle_command(&command, &args).await?;
            }

            SurfaceEvent::VoiceStart => {
                self.start_listening().await?;
            }

            SurfaceEvent::VoiceStop => {
                self.stop_listening().await?;
            }

            SurfaceEvent::PetClicked => {
                let pet = self.store.state();
                self.send(ConductorMessage::Stats {
                    stats: pet.stats,
                    mood: pet.mood(),
                })
                .await;
                self.notify(
                    NotifyLevel::Info,
                    &format!("{} is feeling {}", pet.name, pet.mood()),
                )
                .await;
            }

            SurfaceEvent::QuitRequested => {
                self.shutdown().await?;
            }
        }

        Ok(())
    }

    /// Handle a user command
    async fn handle_command(&self, command: &str, args: &[String]) -> anyhow::Result<()> {
        match command {
            "help" => {
                self.notify(NotifyLevel::Info, HELP_TEXT).await;
            }
            "stats" => {
                let stats = self.store.stats();
                self.notify(
                    NotifyLevel::Info,
                    &format!(
                        "Hunger {:.0} | Hydration {:.0} | Activity {:.0} | Mood {:.0} | Health {:.0}",
                        stats.hunger, stats.hydration, stats.activity, stats.mood, stats.health
                    ),
                )
                .await;
            }
            "mood" => {
                let pet = self.store.state();
                self.notify(
                    NotifyLevel::Info,
                    &format!("{} is feeling {}", pet.name, pet.mood()),
                )
                .await;
            }
            "color" => {
                let color = COLOR_PALETTE
                    .choose(&mut rand::thread_rng())
                    .copied()
                    .unwrap_or(COLOR_PALETTE[0]);
                self.customize(PetCustomization {
                    color: Some(color.to_string()),
                    ..Default::default()
                })
                .await;
            }
            "name" if !args.is_empty() => {
                self.customize(PetCustomization {
                    name: Some(args.join(" ")),
                    ..Default::default()
                })
                .await;
            }
            "pet" if !args.is_empty() => match args[0].parse::<PetType>() {
                Ok(pet_type) => {
                    self.customize(PetCustomization {
                        pet_type: Some(pet_type),
                        ..Default::default()
                    })
                    .await;
                }
                Err(e) => {
                    self.notify(NotifyLevel::Warning, &e).await;
                }
            },
            "hat" if !args.is_empty() => {
                let hat = args.join(" ");
                let hat = if hat.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(hat)
                };
                self.customize(PetCustomization {
                    hat: Some(hat),
                    ..Default::default()
                })
                .await;
            }
            "mute" => {
                self.sequencer.set_speech_enabled(false);
                self.notify(NotifyLevel::Info, "Speech off").await;
            }
            "unmute" => {
                self.sequencer.set_speech_enabled(true);
                self.notify(NotifyLevel::Info, "Speech on").await;
            }
            "log" => {
                let log = self.changes.log();
                let mut lines = vec![format!("{} stat changes this session", log.len())];
                lines.extend(log.iter().rev().take(LOG_PREVIEW).map(|entry| {
                    format!(
                        "{} {:?} {:+}",
                        entry.timestamp.format("%H:%M:%S"),
                        entry.category,
                        entry.value
                    )
                }));
                self.notify(NotifyLevel::Info, &lines.join("\n")).await;
            }
            "quit" | "exit" => {
                self.shutdown().await?;
            }
            "name" | "pet" | "hat" => {
                self.notify(NotifyLevel::Warning, &format!("Usage: /{command} <value>"))
                    .await;
            }
            _ => {
                self.notify(
                    NotifyLevel::Warning,
                    &format!("Unknown command: /{command}"),
                )
                .await;
            }
        }

        Ok(())
    }

    /// Apply cosmetic changes and tell the surface
    pub async fn customize(&self, changes: PetCustomization) -> PetState {
        let pet = self.store.customize(changes);
        tracing::info!(name = %pet.name, pet_type = %pet.pet_type, color = %pet.color, "Pet customized");
        self.send(ConductorMessage::PetUpdated { pet: pet.clone() })
            .await;
        pet
    }

    /// Begin voice capture
    ///
    /// Availability is checked first; an unavailable recognizer produces a
    /// warning for the surface instead of an error.
    pub async fn start_listening(&self) -> anyhow::Result<()> {
        if let Capability::Unavailable { reason } = self.recognizer.availability() {
            self.notify(
                NotifyLevel::Warning,
                &format!("Voice Recognition Unavailable: {reason}"),
            )
            .await;
            return Ok(());
        }

        match self.recognizer.start_listening().await {
            Ok(()) => {
                self.listening.store(true, Ordering::SeqCst);
                self.set_state(ConductorState::Listening).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to start listening");
                self.notify(NotifyLevel::Error, &e.to_string()).await;
            }
        }
        Ok(())
    }

    /// End voice capture and send what was heard
    pub async fn stop_listening(&self) -> anyhow::Result<TurnOutcome> {
        if !self.listening.swap(false, Ordering::SeqCst) {
            return Ok(TurnOutcome::Ignored);
        }

        match self.recognizer.stop_listening().await {
            Ok(text) => {
                self.set_state(ConductorState::Ready).await;
                self.send_user_message(&text).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Speech recognition failed");
                self.notify(NotifyLevel::Error, &e.to_string()).await;
                self.set_state(ConductorState::Ready).await;
                Ok(TurnOutcome::Ignored)
            }
        }
    }

    /// Shut down the Conductor
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.set_state(ConductorState::ShuttingDown).await;

        // Drop any in-flight turn and silence the pet
        self.next_generation();
        self.sequencer.cancel().await;
        for task in self.background.lock().drain(..) {
            task.abort();
        }

        // Send quit to UI
        self.send(ConductorMessage::Quit {
            message: Some("Goodbye!".to_string()),
        })
        .await;

        Ok(())
    }

    /// Set state and notify UI
    async fn set_state(&self, state: ConductorState) {
        *self.state.lock() = state;
        self.send(ConductorMessage::State { state }).await;
    }

    /// Send notification
    async fn notify(&self, level: NotifyLevel, message: &str) {
        self.send(ConductorMessage::Notify {
            level,
            message: message.to_string(),
        })
        .await;
    }

    /// Send a message to the UI surface
    async fn send(&self, msg: ConductorMessage) {
        if let Err(e) = self.tx.send(msg).await {
            tracing::warn!("Failed to send message to surface: {}", e);
        }
    }
}

impl<B: PetBackend> Drop for Conductor<B> {
    fn drop(&mut self) {
        for task in self.background.lock().drain(..) {
            task.abort();
        }
    }
}

/// Resolves once a turn newer than `generation` has started
async fn wait_superseded(rx: &mut watch::Receiver<u64>, generation: u64) {
    if rx.wait_for(|current| *current != generation).await.is_err() {
        // Sender gone; the conductor is being dropped
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, PetReply};
    use crate::pet::{ManualClock, StatChange, StatKind};

    // Mock backend for testing
    struct MockBackend {
        reply: Result<PetReply, u16>,
    }

    #[async_trait::async_trait]
    impl PetBackend for MockBackend {
        fn name(&self) -> &str {
            "Mock"
        }

        async fn send(&self, _request: &ChatRequest) -> Result<PetReply, BackendError> {
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(status) => Err(BackendError::Status {
                    status: *status,
                    body: String::new(),
                }),
            }
        }
    }

    fn conductor(reply: Result<PetReply, u16>) -> (Conductor<MockBackend>, mpsc::Receiver<ConductorMessage>) {
        let (tx, rx) = mpsc::channel(1024);
        let collaborators = Collaborators {
            clock: Arc::new(ManualClock::default()),
            ..Collaborators::default()
        };
        let config = ConductorConfig {
            speech_enabled: false,
            ..ConductorConfig::default()
        };
        (
            Conductor::with_collaborators(MockBackend { reply }, config, tx, collaborators),
            rx,
        )
    }

    async fn settle(conductor: &Conductor<MockBackend>) {
        while conductor.sequencer().is_active() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    fn notifications(rx: &mut mpsc::Receiver<ConductorMessage>) -> Vec<(NotifyLevel, String)> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let ConductorMessage::Notify { level, message } = msg {
                out.push((level, message));
            }
        }
        out
    }

    #[tokio::test]
    async fn test_conductor_creation() {
        let (conductor, _rx) = conductor(Ok(PetReply::default()));
        assert_eq!(conductor.state(), ConductorState::Initializing);
        assert_eq!(conductor.store().state().name, "DigiPal");
        assert!(conductor.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_conductor_start() {
        let (conductor, mut rx) = conductor(Ok(PetReply::default()));
        conductor.start().await.unwrap();
        assert_eq!(conductor.state(), ConductorState::Ready);

        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, ConductorMessage::State { .. }));
        conductor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_blank_message_is_ignored() {
        let (conductor, _rx) = conductor(Ok(PetReply::text(["hi"])));
        let outcome = conductor.send_user_message("   ").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Ignored);
        assert!(conductor.transcript().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_applies_changes() {
        let reply = PetReply::text(["Yum!"]).with_changes(vec![StatChange::new("food", 10.0)]);
        let (conductor, _rx) = conductor(Ok(reply));
        conductor.store().apply_interaction(StatKind::Hunger, -40.0);

        let outcome = conductor.send_user_message("snack?").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Replied);
        settle(&conductor).await;
        assert!((conductor.store().stats().hunger - 70.0).abs() < 1e-9);
        assert_eq!(conductor.stats_log().len(), 1);

        let messages = conductor.transcript().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].text, "Yum!");
        assert!(messages.iter().all(|m| !m.is_loading));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_falls_back_without_changes() {
        let (conductor, _rx) = conductor(Err(400));
        let before = conductor.store().stats();

        let outcome = conductor.send_user_message("hello?").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Fallback);
        settle(&conductor).await;
        assert_eq!(conductor.store().stats(), before);

        let messages = conductor.transcript().messages();
        assert_eq!(messages.last().unwrap().text, FALLBACK_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_fallback_uses_pet_name() {
        let (conductor, _rx) = conductor(Err(404));
        let outcome = conductor.greet().await.unwrap();
        assert_eq!(outcome, TurnOutcome::Fallback);
        settle(&conductor).await;

        let messages = conductor.transcript().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].text,
            "Hello! I'm DigiPal. How can I help you today?"
        );
    }

    #[tokio::test]
    async fn test_commands_customize_pet() {
        let (conductor, _rx) = conductor(Ok(PetReply::default()));
        conductor
            .handle_event(SurfaceEvent::UserCommand {
                command: "name".into(),
                args: vec!["Pico".into()],
            })
            .await
            .unwrap();
        conductor
            .handle_event(SurfaceEvent::UserCommand {
                command: "pet".into(),
                args: vec!["frog".into()],
            })
            .await
            .unwrap();
        conductor
            .handle_event(SurfaceEvent::UserCommand {
                command: "color".into(),
                args: Vec::new(),
            })
            .await
            .unwrap();

        let pet = conductor.store().state();
        assert_eq!(pet.name, "Pico");
        assert_eq!(pet.pet_type, PetType::Frog);
        assert!(COLOR_PALETTE.contains(&pet.color.as_str()));
    }

    #[tokio::test]
    async fn test_mute_and_unknown_command() {
        let (conductor, mut rx) = conductor(Ok(PetReply::default()));
        conductor.sequencer().set_speech_enabled(true);
        conductor
            .handle_event(SurfaceEvent::from_input("/mute").unwrap())
            .await
            .unwrap();
        assert!(!conductor.presentation().speech_enabled);

        conductor
            .handle_event(SurfaceEvent::from_input("/dance").unwrap())
            .await
            .unwrap();
        let notes = notifications(&mut rx);
        assert!(notes
            .iter()
            .any(|(level, msg)| *level == NotifyLevel::Warning && msg.contains("/dance")));
    }

    #[tokio::test]
    async fn test_voice_unavailable_notifies() {
        let (conductor, mut rx) = conductor(Ok(PetReply::default()));
        conductor.handle_event(SurfaceEvent::VoiceStart).await.unwrap();

        let notes = notifications(&mut rx);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, NotifyLevel::Warning);
        assert!(notes[0].1.starts_with("Voice Recognition Unavailable"));
        assert_eq!(
            conductor.stop_listening().await.unwrap(),
            TurnOutcome::Ignored
        );
    }
}
