//! Response Sequencer
//!
//! Presents a list of pet replies one at a time. Each reply is appended to
//! the transcript, optionally spoken, and revealed character by character
//! while the pet's "talking" flag is up. Replies that arrive together wait in
//! a pending queue and play after a short settle pause.
//!
//! # Lifecycle
//!
//! ```text
//! per message:   Queued ──> Speaking + Typing ──> Complete
//! per sequence:  Idle ──> Active ──> Idle
//! ```
//!
//! # Cancellation
//!
//! A new user turn calls [`ResponseSequencer::cancel`]. Cancellation aborts
//! the reveal task and waits for it to be gone, aborts in-flight speech,
//! clears the queue, and finishes any half-typed message with its full text
//! so the transcript never keeps a truncated reply. After `cancel` returns
//! no timer belonging to the old sequence can fire.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::messages::{ConductorMessage, ConductorState, MessageId, MessageRole};
use crate::session::Transcript;
use crate::voice::{SpeechOptions, SpeechSynthesizer};

/// Pause between starting speech and revealing the first character
pub const SPEECH_LEAD_DELAY: Duration = Duration::from_millis(300);

/// Time between revealed characters
pub const CHAR_INTERVAL: Duration = Duration::from_millis(30);

/// Pause after a message completes before the next one starts
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Speech lifecycle of one message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeechState {
    /// Synthesis in progress
    Speaking,
    /// Synthesis finished
    Finished,
    /// Synthesis failed (the reveal is unaffected)
    Failed,
}

/// Whether a sequence is playing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequencePhase {
    /// Nothing to present
    #[default]
    Idle,
    /// Presenting replies
    Active,
}

#[derive(Default)]
struct Playback {
    phase: SequencePhase,
    queue: VecDeque<String>,
    current: Option<MessageId>,
    typed_text: String,
    talking: bool,
    speech: HashMap<MessageId, SpeechState>,
    speech_tasks: Vec<JoinHandle<()>>,
}

struct Inner {
    transcript: Transcript,
    speech: Arc<dyn SpeechSynthesizer>,
    speech_options: SpeechOptions,
    speech_enabled: AtomicBool,
    tx: mpsc::Sender<ConductorMessage>,
    playback: Mutex<Playback>,
}

impl Inner {
    async fn send(&self, msg: ConductorMessage) {
        if let Err(e) = self.tx.send(msg).await {
            tracing::warn!("Failed to send message to surface: {}", e);
        }
    }

    fn next_message(&self) -> Option<String> {
        let mut playback = self.playback.lock();
        let next = playback.queue.pop_front();
        if next.is_none() {
            playback.phase = SequencePhase::Idle;
            playback.current = None;
            playback.speech.clear();
            playback.speech_tasks.retain(|task| !task.is_finished());
        }
        next
    }

    fn start_speech(self: &Arc<Self>, id: &MessageId, text: &str) {
        let speech = Arc::clone(&self.speech);
        let options = self.speech_options.clone();
        let inner = Arc::downgrade(self);
        let task_id = id.clone();
        let text = text.to_string();

        let mut playback = self.playback.lock();
        playback.speech.insert(id.clone(), SpeechState::Speaking);
        let task = tokio::spawn(async move {
            let state = match speech.speak(&text, &options).await {
                Ok(()) => SpeechState::Finished,
                Err(e) => {
                    tracing::warn!(message_id = %task_id, error = %e, "Speech synthesis failed");
                    SpeechState::Failed
                }
            };
            if let Some(inner) = inner.upgrade() {
                if let Some(entry) = inner.playback.lock().speech.get_mut(&task_id) {
                    *entry = state;
                }
            }
        });
        playback.speech_tasks.push(task);
    }

    fn set_talking(&self, talking: bool) -> bool {
        let mut playback = self.playback.lock();
        let changed = playback.talking != talking;
        playback.talking = talking;
        changed
    }

    async fn reveal(self: &Arc<Self>, text: String) {
        let msg = self.transcript.push_typing(text.clone());
        let id = msg.id.clone();
        {
            let mut playback = self.playback.lock();
            playback.current = Some(id.clone());
            playback.typed_text.clear();
        }
        self.send(ConductorMessage::Message {
            id: id.clone(),
            role: MessageRole::Pet,
            content: text.clone(),
            loading: false,
        })
        .await;

        if self.speech_enabled.load(Ordering::Relaxed) {
            self.start_speech(&id, &text);
            tokio::time::sleep(SPEECH_LEAD_DELAY).await;
        }

        if self.set_talking(true) {
            self.send(ConductorMessage::Talking { talking: true }).await;
        }

        let total = text.chars().count();
        let mut typed = String::with_capacity(text.len());
        for (i, ch) in text.chars().enumerate() {
            tokio::time::sleep(CHAR_INTERVAL).await;
            typed.push(ch);
            {
                let mut playback = self.playback.lock();
                playback.typed_text.clone_from(&typed);
                if i + 1 == total {
                    playback.talking = false;
                }
            }
            // Progress updates may be dropped if the surface is behind
            let _ = self.tx.try_send(ConductorMessage::Typing {
                message_id: id.clone(),
                text: typed.clone(),
            });
        }
        self.set_talking(false);
        self.send(ConductorMessage::Talking { talking: false }).await;

        self.transcript.complete_typing(&id);
        self.playback.lock().current = None;
        self.send(ConductorMessage::TypingComplete {
            message_id: id,
            final_content: text,
        })
        .await;
    }

    async fn run(self: Arc<Self>, lead: Vec<ConductorMessage>) {
        for msg in lead {
            self.send(msg).await;
        }
        if self.playback.lock().queue.is_empty() {
            return;
        }

        self.send(ConductorMessage::State {
            state: ConductorState::Responding,
        })
        .await;

        while let Some(text) = self.next_message() {
            self.reveal(text).await;
            tokio::time::sleep(SETTLE_DELAY).await;
        }

        tracing::debug!("Response sequence finished");
        self.send(ConductorMessage::State {
            state: ConductorState::Ready,
        })
        .await;
    }
}

/// Presents pet replies one at a time
pub struct ResponseSequencer {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ResponseSequencer {
    /// Create a sequencer writing into `transcript` and reporting on `tx`
    pub fn new(
        transcript: Transcript,
        speech: Arc<dyn SpeechSynthesizer>,
        tx: mpsc::Sender<ConductorMessage>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transcript,
                speech,
                speech_options: SpeechOptions::default(),
                speech_enabled: AtomicBool::new(false),
                tx,
                playback: Mutex::new(Playback::default()),
            }),
            task: Mutex::new(None),
        }
    }

    /// Use `options` when narrating
    #[must_use]
    pub fn with_speech_options(mut self, options: SpeechOptions) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.speech_options = options;
        }
        self
    }

    /// Start with speech on or off
    #[must_use]
    pub fn with_speech_enabled(self, enabled: bool) -> Self {
        self.set_speech_enabled(enabled);
        self
    }

    /// Turn narration on or off for messages that start after this call
    pub fn set_speech_enabled(&self, enabled: bool) {
        self.inner.speech_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether narration is on
    pub fn speech_enabled(&self) -> bool {
        self.inner.speech_enabled.load(Ordering::Relaxed)
    }

    /// Present `messages` in order
    ///
    /// Blank entries are dropped; an empty list does nothing. Anything still
    /// playing is cancelled first.
    pub async fn play(&self, messages: Vec<String>) {
        if messages.iter().all(|m| m.trim().is_empty()) {
            return;
        }

        self.cancel().await;
        self.play_if(messages, || Some(Vec::new()));
    }

    /// Present `messages` only if `admit` allows it
    ///
    /// `admit` runs while the task slot is locked, so a concurrent
    /// [`cancel`](Self::cancel) either stops the new sequence or completes
    /// before `admit` is consulted. Returning `None` rejects the sequence;
    /// `Some(lead)` accepts it and `lead` is sent ahead of the first reply.
    /// Returns whether the sequence was admitted.
    pub fn play_if<F>(&self, messages: Vec<String>, admit: F) -> bool
    where
        F: FnOnce() -> Option<Vec<ConductorMessage>>,
    {
        let messages: VecDeque<String> = messages
            .into_iter()
            .filter(|m| !m.trim().is_empty())
            .collect();

        let mut task = self.task.lock();
        let Some(lead) = admit() else {
            return false;
        };
        if messages.is_empty() && lead.is_empty() {
            return true;
        }

        if let Some(stale) = task.take() {
            tracing::debug!("Replacing unfinished response sequence");
            stale.abort();
        }
        {
            let mut playback = self.inner.playback.lock();
            if !messages.is_empty() {
                playback.phase = SequencePhase::Active;
            }
            playback.queue = messages;
            tracing::debug!(count = playback.queue.len(), "Starting response sequence");
        }

        *task = Some(tokio::spawn(Arc::clone(&self.inner).run(lead)));
        true
    }

    /// Stop everything and leave the transcript consistent
    pub async fn cancel(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.abort();
            // Wait for the task to be dropped so none of its timers survive
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "Response sequence task failed");
                }
            }
        }

        let (speech_tasks, was_talking, had_speech) = {
            let mut playback = self.inner.playback.lock();
            let speech_tasks = std::mem::take(&mut playback.speech_tasks);
            let had_speech = !speech_tasks.is_empty();
            let was_talking = playback.talking;
            *playback = Playback::default();
            (speech_tasks, was_talking, had_speech)
        };

        for task in speech_tasks {
            task.abort();
        }
        if had_speech {
            self.inner.speech.stop().await;
        }

        for msg in self.inner.transcript.complete_all_typing() {
            tracing::debug!(message_id = %msg.id, "Completing interrupted message");
            self.inner
                .send(ConductorMessage::TypingComplete {
                    message_id: msg.id,
                    final_content: msg.text,
                })
                .await;
        }
        if was_talking {
            self.inner
                .send(ConductorMessage::Talking { talking: false })
                .await;
        }
    }

    /// Current phase
    pub fn phase(&self) -> SequencePhase {
        self.inner.playback.lock().phase
    }

    /// Whether a sequence is playing
    pub fn is_active(&self) -> bool {
        self.phase() == SequencePhase::Active
    }

    /// Whether the pet is mid-reveal
    pub fn talking(&self) -> bool {
        self.inner.playback.lock().talking
    }

    /// Text revealed so far of the current message
    pub fn typed_text(&self) -> String {
        self.inner.playback.lock().typed_text.clone()
    }

    /// ID of the message being revealed
    pub fn current_message(&self) -> Option<MessageId> {
        self.inner.playback.lock().current.clone()
    }

    /// Replies waiting behind the current one
    pub fn pending_len(&self) -> usize {
        self.inner.playback.lock().queue.len()
    }

    /// Speech lifecycle of a message in the current sequence
    pub fn speech_state(&self, id: &MessageId) -> Option<SpeechState> {
        self.inner.playback.lock().speech.get(id).copied()
    }
}

impl Drop for ResponseSequencer {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        for task in self.inner.playback.lock().speech_tasks.drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::{SilentSpeech, VoiceError};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    fn sequencer(
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> (ResponseSequencer, Transcript, mpsc::Receiver<ConductorMessage>) {
        let transcript = Transcript::new();
        let (tx, rx) = mpsc::channel(1024);
        (
            ResponseSequencer::new(transcript.clone(), speech, tx),
            transcript,
            rx,
        )
    }

    fn drain(rx: &mut mpsc::Receiver<ConductorMessage>) -> Vec<ConductorMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    async fn wait_idle(seq: &ResponseSequencer) {
        while seq.is_active() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_messages_in_order() {
        let (seq, transcript, mut rx) = sequencer(Arc::new(SilentSpeech));
        seq.play(vec!["Hi".into(), "Bye".into()]).await;
        assert!(seq.is_active());
        assert_eq!(seq.pending_len(), 2);

        wait_idle(&seq).await;

        let texts: Vec<String> = transcript.messages().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["Hi", "Bye"]);
        assert!(transcript.messages().iter().all(|m| !m.is_typing));
        assert!(!seq.talking());

        let completed: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|m| match m {
                ConductorMessage::TypingComplete { final_content, .. } => Some(final_content),
                _ => None,
            })
            .collect();
        assert_eq!(completed, vec!["Hi", "Bye"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_and_empty_lists_are_noop() {
        let (seq, transcript, _rx) = sequencer(Arc::new(SilentSpeech));
        seq.play(Vec::new()).await;
        seq.play(vec!["   ".into(), String::new()]).await;
        assert_eq!(seq.phase(), SequencePhase::Idle);
        assert!(transcript.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_talking_during_reveal() {
        let (seq, _transcript, _rx) = sequencer(Arc::new(SilentSpeech));
        seq.play(vec!["Hello there".into()]).await;

        // 5 characters in
        tokio::time::sleep(CHAR_INTERVAL * 5 + Duration::from_millis(5)).await;
        assert!(seq.talking());
        assert_eq!(seq.typed_text(), "Hello");

        tokio::time::sleep(CHAR_INTERVAL * 10).await;
        assert!(!seq.talking());
        assert_eq!(seq.typed_text(), "Hello there");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_typing() {
        let (seq, transcript, mut rx) = sequencer(Arc::new(SilentSpeech));
        seq.play(vec!["A long first reply".into(), "Second".into()]).await;

        tokio::time::sleep(CHAR_INTERVAL * 4 + Duration::from_millis(5)).await;
        assert!(seq.talking());
        assert_eq!(seq.pending_len(), 1);

        seq.cancel().await;

        assert_eq!(seq.pending_len(), 0);
        assert_eq!(seq.phase(), SequencePhase::Idle);
        assert!(!seq.talking());
        let messages = transcript.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "A long first reply");
        assert!(!messages[0].is_typing);
        drain(&mut rx);

        // Nothing from the old sequence fires later
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transcript.len(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    struct CountingSpeech {
        spoken: AtomicUsize,
        stopped: AtomicUsize,
        fail: bool,
        takes: Duration,
    }

    impl CountingSpeech {
        fn new(fail: bool, takes: Duration) -> Self {
            Self {
                spoken: AtomicUsize::new(0),
                stopped: AtomicUsize::new(0),
                fail,
                takes,
            }
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for CountingSpeech {
        async fn speak(&self, _text: &str, _options: &SpeechOptions) -> Result<(), VoiceError> {
            self.spoken.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.takes).await;
            if self.fail {
                Err(VoiceError::Synthesis("no voice".into()))
            } else {
                Ok(())
            }
        }

        async fn stop(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_speech_lead_delay_and_stop() {
        let speech = Arc::new(CountingSpeech::new(false, Duration::from_secs(5)));
        let (seq, _transcript, _rx) = sequencer(speech.clone());
        let seq = seq.with_speech_enabled(true);
        seq.play(vec!["Hello".into()]).await;

        // Still in the lead delay
        tokio::time::sleep(SPEECH_LEAD_DELAY - Duration::from_millis(50)).await;
        assert_eq!(speech.spoken.load(Ordering::SeqCst), 1);
        assert!(seq.typed_text().is_empty());
        let id = seq.current_message().unwrap();
        assert_eq!(seq.speech_state(&id), Some(SpeechState::Speaking));

        tokio::time::sleep(Duration::from_millis(50) + CHAR_INTERVAL * 2 + Duration::from_millis(5)).await;
        assert_eq!(seq.typed_text(), "He");

        seq.cancel().await;
        assert_eq!(speech.stopped.load(Ordering::SeqCst), 1);
        assert_eq!(seq.speech_state(&id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_speech_failure_does_not_affect_reveal() {
        let speech = Arc::new(CountingSpeech::new(true, Duration::from_secs(5)));
        let (seq, transcript, _rx) = sequencer(speech);
        let seq = seq.with_speech_enabled(true);
        seq.play(vec!["Ok".into()]).await;

        wait_idle(&seq).await;
        let messages = transcript.messages();
        assert_eq!(messages[0].text, "Ok");
        assert!(!messages[0].is_typing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_speech_failure_marks_failed_mid_reveal() {
        let speech = Arc::new(CountingSpeech::new(true, Duration::ZERO));
        let (seq, transcript, _rx) = sequencer(speech);
        let seq = seq.with_speech_enabled(true);
        seq.play(vec!["Hello there".into()]).await;

        tokio::time::sleep(SPEECH_LEAD_DELAY + CHAR_INTERVAL * 3 + Duration::from_millis(5)).await;
        let id = seq.current_message().unwrap();
        assert_eq!(seq.speech_state(&id), Some(SpeechState::Failed));
        assert!(seq.talking());
        assert_eq!(seq.typed_text(), "Hel");

        wait_idle(&seq).await;
        let messages = transcript.messages();
        assert_eq!(messages[0].text, "Hello there");
        assert!(!messages[0].is_typing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_sequence_does_not_start() {
        let (seq, transcript, mut rx) = sequencer(Arc::new(SilentSpeech));
        assert!(!seq.play_if(vec!["stale".into()], || None));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(seq.phase(), SequencePhase::Idle);
        assert!(transcript.is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lead_messages_precede_first_reply() {
        let (seq, _transcript, mut rx) = sequencer(Arc::new(SilentSpeech));
        let lead = ConductorMessage::Talking { talking: false };
        assert!(seq.play_if(vec!["Hi".into()], || Some(vec![lead])));
        wait_idle(&seq).await;

        let stream = drain(&mut rx);
        assert!(matches!(stream[0], ConductorMessage::Talking { talking: false }));
        assert!(matches!(
            stream[1],
            ConductorMessage::State {
                state: ConductorState::Responding
            }
        ));
        assert!(matches!(stream[2], ConductorMessage::Message { .. }));
    }
}
