//! Speech capabilities — recognition and synthesis behind traits.
//!
//! Pages never touch audio devices directly; they hold an
//! `Arc<dyn SpeechRecognizer>` and an `Arc<dyn SpeechSynthesizer>`. The
//! synthesizer is shared process-wide so "at most one audible utterance"
//! holds across pages.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use myteacher_core::types::{SpeechStatus, Utterance};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecognitionError {
    /// No recognition engine on this host (no microphone, no server).
    #[error("speech recognition is not supported here")]
    Unsupported,

    #[error("audio capture failed: {0}")]
    Capture(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    /// Session ended without a transcript.
    #[error("no speech detected")]
    NoSpeech,
}

/// One-shot, non-continuous speech recognition.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Capability probe. Pages skip listening entirely when this is false.
    fn available(&self) -> bool {
        true
    }

    /// Listen for a single utterance in `lang` (BCP-47) and return the final
    /// transcript. Never yields interim results.
    async fn recognize_once(&self, lang: &str) -> Result<String, RecognitionError>;
}

/// Text-to-speech with cancel-all-then-speak semantics.
pub trait SpeechSynthesizer: Send + Sync {
    /// Silence whatever is playing and start `utterance`.
    fn speak(&self, utterance: Utterance);

    /// Silence everything.
    fn cancel(&self);

    /// Playback status, for backends that track one.
    fn status(&self) -> Option<SpeechStatus> {
        None
    }
}

/// Recognizer for hosts with no recognition capability.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

#[async_trait]
impl SpeechRecognizer for Unsupported {
    fn available(&self) -> bool {
        false
    }

    async fn recognize_once(&self, lang: &str) -> Result<String, RecognitionError> {
        debug!("recognize_once({lang}): no recognizer available");
        Err(RecognitionError::Unsupported)
    }
}

/// Synthesizer that only logs. Used with `--mute`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl SpeechSynthesizer for Silent {
    fn speak(&self, utterance: Utterance) {
        info!(
            "speak [{} @ {:.1}x]: {}",
            utterance.lang, utterance.rate, utterance.text
        );
    }

    fn cancel(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsupported_always_reports_unsupported() {
        let err = Unsupported.recognize_once("hi-IN").await.unwrap_err();
        assert_eq!(err, RecognitionError::Unsupported);
    }

    #[test]
    fn silent_accepts_utterances() {
        let synth: &dyn SpeechSynthesizer = &Silent;
        synth.speak(Utterance::new("नमस्ते", "hi-IN", 0.9));
        synth.cancel();
    }
}
