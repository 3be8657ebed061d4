//! Voice collaborators
//!
//! Speech synthesis (the pet reading its replies aloud) and speech
//! recognition (the user talking instead of typing) live outside the engine.
//! The Conductor only consumes them through these traits.
//!
//! Recognition availability is a synchronous capability check so the surface
//! can explain why the microphone button does nothing before any capture is
//! attempted.

use async_trait::async_trait;
use thiserror::Error;

/// Voice options for speech synthesis
#[derive(Clone, Debug, PartialEq)]
pub struct SpeechOptions {
    /// BCP-47 language tag
    pub language: String,
    /// Pitch multiplier
    pub pitch: f32,
    /// Rate multiplier
    pub rate: f32,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            pitch: 1.0,
            rate: 1.0,
        }
    }
}

/// Errors from the voice collaborators
#[derive(Debug, Error)]
pub enum VoiceError {
    /// Synthesis failed
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    /// Recognition is not available on this platform
    #[error("speech recognition unavailable: {0}")]
    Unavailable(String),

    /// Recognition failed
    #[error("speech recognition failed: {0}")]
    Recognition(String),
}

/// Text-to-speech
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text`; resolves when playback finishes
    async fn speak(&self, text: &str, options: &SpeechOptions) -> Result<(), VoiceError>;

    /// Stop any playback in progress; resolves once output has been flushed
    async fn stop(&self);
}

/// A synthesizer that says nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentSpeech;

#[async_trait]
impl SpeechSynthesizer for SilentSpeech {
    async fn speak(&self, _text: &str, _options: &SpeechOptions) -> Result<(), VoiceError> {
        Ok(())
    }

    async fn stop(&self) {}
}

/// Whether a capability can be used right now
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Capability {
    /// Ready to use
    Available,
    /// Not usable, with a reason the user can read
    Unavailable {
        /// Why not
        reason: String,
    },
}

impl Capability {
    /// Whether the capability is available
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// Speech-to-text
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Synchronous availability check
    fn availability(&self) -> Capability;

    /// Begin capturing audio
    async fn start_listening(&self) -> Result<(), VoiceError>;

    /// Stop capturing and return the recognized text
    async fn stop_listening(&self) -> Result<String, VoiceError>;
}

/// Recognizer for platforms without speech capture
#[derive(Clone, Debug)]
pub struct UnavailableRecognizer {
    reason: String,
}

impl UnavailableRecognizer {
    /// Create a recognizer that always reports `reason`
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableRecognizer {
    fn default() -> Self {
        Self::new("Voice recognition is not available on this device.")
    }
}

#[async_trait]
impl SpeechRecognizer for UnavailableRecognizer {
    fn availability(&self) -> Capability {
        Capability::Unavailable {
            reason: self.reason.clone(),
        }
    }

    async fn start_listening(&self) -> Result<(), VoiceError> {
        Err(VoiceError::Unavailable(self.reason.clone()))
    }

    async fn stop_listening(&self) -> Result<String, VoiceError> {
        Err(VoiceError::Unavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_recognizer() {
        let recognizer = UnavailableRecognizer::default();
        assert!(!recognizer.availability().is_available());
        assert!(matches!(
            recognizer.start_listening().await,
            Err(VoiceError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_silent_speech() {
        assert!(SilentSpeech.speak("hi", &SpeechOptions::default()).await.is_ok());
        SilentSpeech.stop().await;
    }
}
