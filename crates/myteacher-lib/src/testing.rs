//! Test doubles for the speech and translation traits.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use myteacher_core::types::{LanguagePair, Utterance};

use crate::speech::{RecognitionError, SpeechRecognizer, SpeechSynthesizer};
use crate::translate::{TranslateError, Translator};

// ─── Translator ────────────────────────────────────────────────────────────

pub enum Reply {
    Text(String),
    Fail,
    /// Wait for the notify before answering with the text.
    Held(Arc<Notify>, String),
}

#[derive(Default)]
pub struct FakeTranslator {
    replies: Mutex<VecDeque<Reply>>,
    pub calls: Mutex<Vec<(String, LanguagePair)>>,
}

impl FakeTranslator {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, LanguagePair)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str, pair: LanguagePair) -> Result<String, TranslateError> {
        self.calls.lock().unwrap().push((text.to_string(), pair));
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(t)) => Ok(t),
            Some(Reply::Held(gate, t)) => {
                gate.notified().await;
                Ok(t)
            }
            Some(Reply::Fail) | None => Err(TranslateError::Malformed("scripted failure".into())),
        }
    }
}

// ─── Recognizer ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeRecognizer {
    results: Mutex<VecDeque<Result<String, RecognitionError>>>,
    gate: Option<Arc<Notify>>,
    pub langs: Mutex<Vec<String>>,
}

impl FakeRecognizer {
    pub fn new(results: impl IntoIterator<Item = Result<String, RecognitionError>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into_iter().collect()),
            gate: None,
            langs: Mutex::new(Vec::new()),
        })
    }

    /// Recognizer whose sessions stay open until `gate` is notified.
    pub fn held(gate: Arc<Notify>, result: Result<String, RecognitionError>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(VecDeque::from([result])),
            gate: Some(gate),
            langs: Mutex::new(Vec::new()),
        })
    }

    pub fn sessions(&self) -> usize {
        self.langs.lock().unwrap().len()
    }
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn recognize_once(&self, lang: &str) -> Result<String, RecognitionError> {
        self.langs.lock().unwrap().push(lang.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.results.lock().unwrap().pop_front();
        next.unwrap_or(Err(RecognitionError::NoSpeech))
    }
}

// ─── Synthesizer ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum SynthEvent {
    Speak(Utterance),
    Cancel,
}

/// Tracks what would be audible: `speak` replaces, `cancel` clears.
#[derive(Default)]
pub struct RecordingSynth {
    pub events: Mutex<Vec<SynthEvent>>,
    audible: Mutex<Option<Utterance>>,
}

impl RecordingSynth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                SynthEvent::Speak(u) => Some(u.clone()),
                SynthEvent::Cancel => None,
            })
            .collect()
    }

    pub fn audible(&self) -> Option<Utterance> {
        self.audible.lock().unwrap().clone()
    }
}

impl SpeechSynthesizer for RecordingSynth {
    fn speak(&self, utterance: Utterance) {
        self.events.lock().unwrap().push(SynthEvent::Speak(utterance.clone()));
        *self.audible.lock().unwrap() = Some(utterance);
    }

    fn cancel(&self) {
        self.events.lock().unwrap().push(SynthEvent::Cancel);
        *self.audible.lock().unwrap() = None;
    }
}
