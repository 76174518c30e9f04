//! Audio practice pages — listen → translate → speak.
//!
//! One controller serves the three audio pages; the [`PageConfig`] decides
//! which languages flow through it. State is page-local and dies with the
//! controller.
//!
//! Every `translate` call takes a generation number. Only the newest
//! generation may write its result, speak, or clear the loading flag; older
//! requests still complete on the network but their results are dropped.
//! Once a page is closed nothing it started may write state or speak.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, warn};

use myteacher_core::text_prep::is_blank;
use myteacher_core::types::{Page, PageConfig, PageSnapshot, Utterance};

use crate::speech::{RecognitionError, SpeechRecognizer, SpeechSynthesizer};
use crate::translate::Translator;

/// External capabilities a page talks to.
#[derive(Clone)]
pub struct Services {
    pub translator: Arc<dyn Translator>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synth: Arc<dyn SpeechSynthesizer>,
}

/// How a listening session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum Listen {
    /// A session (or a translation) was already running.
    Busy,
    Unsupported,
    Heard { text: String },
    Ended { reason: String },
}

/// How a translation request ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum Outcome {
    /// Blank input; nothing was sent.
    Skipped,
    Translated { text: String },
    /// The page's failure message is now displayed.
    Failed { message: String },
    /// A newer request (or unmount) took over before this one finished.
    Superseded,
}

#[derive(Debug, Default)]
struct PageState {
    source_text: String,
    translated_text: String,
    loading: bool,
    listening: bool,
}

pub struct PracticePage {
    page: Page,
    config: PageConfig,
    services: Services,
    state: Mutex<PageState>,
    generation: AtomicU64,
    closed: AtomicBool,
}

impl PracticePage {
    pub fn new(page: Page, services: Services) -> Self {
        Self {
            page,
            config: page.config(),
            services,
            state: Mutex::new(PageState::default()),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    /// Run one recognition session; the transcript becomes the source text
    /// and is translated straight away.
    pub async fn start_listening(&self) -> Listen {
        if !self.services.recognizer.available() {
            debug!("{}: recognition unavailable, staying inert", self.page);
            return Listen::Unsupported;
        }

        {
            let mut s = self.lock();
            if s.listening || s.loading {
                return Listen::Busy;
            }
            s.source_text.clear();
            s.translated_text.clear();
            s.listening = true;
        }

        let heard = self
            .services
            .recognizer
            .recognize_once(self.config.recognition_lang)
            .await;
        self.lock().listening = false;

        if self.is_closed() {
            debug!("{}: closed while listening, dropping transcript", self.page);
            return Listen::Ended {
                reason: "page closed".into(),
            };
        }

        match heard {
            Ok(text) => {
                debug!("{}: heard {} chars", self.page, text.len());
                self.lock().source_text = text.clone();
                self.translate(&text).await;
                Listen::Heard { text }
            }
            Err(RecognitionError::Unsupported) => Listen::Unsupported,
            Err(e) => {
                debug!("{}: listening ended: {e}", self.page);
                Listen::Ended {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Translate `text` with the page's language pair and speak the result.
    pub async fn translate(&self, text: &str) -> Outcome {
        if is_blank(text) {
            return Outcome::Skipped;
        }
        if self.is_closed() {
            return Outcome::Superseded;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock().loading = true;

        let result = self
            .services
            .translator
            .translate(text.trim(), self.config.pair)
            .await;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("{}: dropping superseded translation", self.page);
            return Outcome::Superseded;
        }

        let mut s = self.lock();
        s.loading = false;
        match result {
            Ok(translated) => {
                s.translated_text = translated.clone();
                drop(s);
                self.speak(&translated);
                Outcome::Translated { text: translated }
            }
            Err(e) => {
                warn!("{}: {e}", self.page);
                s.translated_text = self.config.failure_message.to_string();
                Outcome::Failed {
                    message: self.config.failure_message.to_string(),
                }
            }
        }
    }

    /// Speak `text` in the page's synthesis language, cutting off anything
    /// already playing.
    pub fn speak(&self, text: &str) {
        self.services.synth.speak(Utterance::new(
            text,
            self.config.synthesis_lang,
            self.config.speech_rate,
        ));
    }

    /// Replay the current translation. Returns false when there is nothing
    /// to replay.
    pub fn replay(&self) -> bool {
        let text = {
            let s = self.lock();
            if s.loading || s.translated_text.is_empty() {
                return false;
            }
            s.translated_text.clone()
        };
        self.speak(&text);
        true
    }

    /// Unmount: results of in-flight requests are discarded from here on.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> PageSnapshot {
        let s = self.lock();
        PageSnapshot {
            source_text: s.source_text.clone(),
            translated_text: s.translated_text.clone(),
            loading: s.loading,
            listening: s.listening,
            ..Default::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use myteacher_core::types::LanguagePair;
    use tokio::sync::Notify;

    use super::*;
    use crate::speech::Unsupported;
    use crate::testing::{FakeRecognizer, FakeTranslator, RecordingSynth, Reply};

    fn page_with(
        page: Page,
        translator: Arc<FakeTranslator>,
        recognizer: Arc<dyn SpeechRecognizer>,
        synth: Arc<RecordingSynth>,
    ) -> PracticePage {
        PracticePage::new(
            page,
            Services {
                translator,
                recognizer,
                synth,
            },
        )
    }

    #[tokio::test]
    async fn heard_text_is_translated_and_spoken() {
        let translator = FakeTranslator::new([Reply::Text("How are you?".into())]);
        let recognizer = FakeRecognizer::new([Ok("आप कैसे हैं?".to_string())]);
        let synth = RecordingSynth::new();
        let page = page_with(Page::HindiToEnglish, translator.clone(), recognizer.clone(), synth.clone());

        let listen = page.start_listening().await;
        assert_eq!(
            listen,
            Listen::Heard {
                text: "आप कैसे हैं?".into()
            }
        );
        assert_eq!(recognizer.langs.lock().unwrap().as_slice(), ["hi-IN"]);
        assert_eq!(
            translator.calls(),
            vec![("आप कैसे हैं?".to_string(), LanguagePair::new("hi", "en"))]
        );

        let snap = page.snapshot();
        assert_eq!(snap.source_text, "आप कैसे हैं?");
        assert_eq!(snap.translated_text, "How are you?");
        assert!(!snap.loading);
        assert!(!snap.listening);

        assert_eq!(
            synth.spoken(),
            vec![Utterance::new("How are you?", "en-US", 0.9)]
        );
    }

    #[tokio::test]
    async fn blank_input_is_a_no_op() {
        let translator = FakeTranslator::new([]);
        let synth = RecordingSynth::new();
        let page = page_with(Page::EnglishToHindi, translator.clone(), Arc::new(Unsupported), synth.clone());

        assert_eq!(page.translate("").await, Outcome::Skipped);
        assert_eq!(page.translate("  \n\t").await, Outcome::Skipped);

        assert!(translator.calls().is_empty());
        assert_eq!(page.snapshot(), PageSnapshot::default());
        assert!(synth.spoken().is_empty());
    }

    #[tokio::test]
    async fn failure_shows_page_message_and_clears_loading() {
        for (page, message) in [
            (Page::HindiToEnglish, "Translation failed. Try again."),
            (Page::EnglishToHindi, "Translation failed. Try again."),
            (Page::HindiToSanskrit, "Anuvada viphala (Translation failed)."),
        ] {
            let translator = FakeTranslator::new([Reply::Fail]);
            let synth = RecordingSynth::new();
            let p = page_with(page, translator, Arc::new(Unsupported), synth.clone());

            let out = p.translate("something").await;
            assert_eq!(
                out,
                Outcome::Failed {
                    message: message.into()
                }
            );
            let snap = p.snapshot();
            assert_eq!(snap.translated_text, message);
            assert!(!snap.loading);
            assert!(synth.spoken().is_empty());
        }
    }

    #[tokio::test]
    async fn sanskrit_page_speaks_slower_in_hindi_voice() {
        let translator = FakeTranslator::new([Reply::Text("नमः".into())]);
        let synth = RecordingSynth::new();
        let p = page_with(Page::HindiToSanskrit, translator.clone(), Arc::new(Unsupported), synth.clone());

        p.translate("नमस्ते").await;
        assert_eq!(translator.calls()[0].1, LanguagePair::new("hi", "sa"));
        assert_eq!(synth.spoken(), vec![Utterance::new("नमः", "hi-IN", 0.8)]);
    }

    #[tokio::test]
    async fn unsupported_recognizer_leaves_page_inert() {
        let translator = FakeTranslator::new([]);
        let synth = RecordingSynth::new();
        let p = page_with(Page::HindiToEnglish, translator.clone(), Arc::new(Unsupported), synth);

        assert_eq!(p.start_listening().await, Listen::Unsupported);
        let snap = p.snapshot();
        assert!(!snap.listening);
        assert!(snap.alert.is_none());
        assert!(translator.calls().is_empty());
    }

    #[tokio::test]
    async fn second_listen_while_active_is_busy() {
        let gate = Arc::new(Notify::new());
        let recognizer = FakeRecognizer::held(gate.clone(), Ok("hello".into()));
        let translator = FakeTranslator::new([Reply::Text("नमस्ते".into())]);
        let synth = RecordingSynth::new();
        let p = Arc::new(page_with(Page::EnglishToHindi, translator, recognizer.clone(), synth));

        let first = tokio::spawn({
            let p = p.clone();
            async move { p.start_listening().await }
        });
        while !p.snapshot().listening {
            tokio::task::yield_now().await;
        }

        assert_eq!(p.start_listening().await, Listen::Busy);
        assert_eq!(recognizer.sessions(), 1);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), Listen::Heard { text: "hello".into() });
        assert_eq!(p.snapshot().translated_text, "नमस्ते");
    }

    #[tokio::test]
    async fn recognition_error_returns_to_idle() {
        let recognizer = FakeRecognizer::new([Err(RecognitionError::NoSpeech)]);
        let translator = FakeTranslator::new([]);
        let p = page_with(Page::HindiToEnglish, translator.clone(), recognizer, RecordingSynth::new());

        let out = p.start_listening().await;
        assert!(matches!(out, Listen::Ended { .. }));
        assert!(!p.snapshot().listening);
        assert!(translator.calls().is_empty());
    }

    #[tokio::test]
    async fn newer_translation_supersedes_pending_one() {
        let gate = Arc::new(Notify::new());
        let translator = FakeTranslator::new([
            Reply::Held(gate.clone(), "stale".into()),
            Reply::Text("fresh".into()),
        ]);
        let synth = RecordingSynth::new();
        let p = Arc::new(page_with(Page::HindiToEnglish, translator.clone(), Arc::new(Unsupported), synth.clone()));

        let slow = tokio::spawn({
            let p = p.clone();
            async move { p.translate("पहला").await }
        });
        while translator.calls().is_empty() {
            tokio::task::yield_now().await;
        }

        assert_eq!(p.translate("दूसरा").await, Outcome::Translated { text: "fresh".into() });
        gate.notify_one();
        assert_eq!(slow.await.unwrap(), Outcome::Superseded);

        let snap = p.snapshot();
        assert_eq!(snap.translated_text, "fresh");
        assert!(!snap.loading);
        assert_eq!(synth.spoken().len(), 1);
    }

    #[tokio::test]
    async fn close_discards_in_flight_result() {
        let gate = Arc::new(Notify::new());
        let translator = FakeTranslator::new([Reply::Held(gate.clone(), "late".into())]);
        let synth = RecordingSynth::new();
        let p = Arc::new(page_with(Page::EnglishToHindi, translator.clone(), Arc::new(Unsupported), synth.clone()));

        let pending = tokio::spawn({
            let p = p.clone();
            async move { p.translate("late").await }
        });
        while translator.calls().is_empty() {
            tokio::task::yield_now().await;
        }

        p.close();
        gate.notify_one();
        assert_eq!(pending.await.unwrap(), Outcome::Superseded);
        assert!(synth.spoken().is_empty());
    }

    #[tokio::test]
    async fn transcript_arriving_after_close_is_dropped() {
        let gate = Arc::new(Notify::new());
        let recognizer = FakeRecognizer::held(gate.clone(), Ok("आप कैसे हैं?".into()));
        let translator = FakeTranslator::new([Reply::Text("How are you?".into())]);
        let synth = RecordingSynth::new();
        let p = Arc::new(page_with(Page::HindiToEnglish, translator.clone(), recognizer, synth.clone()));

        let listening = tokio::spawn({
            let p = p.clone();
            async move { p.start_listening().await }
        });
        while !p.snapshot().listening {
            tokio::task::yield_now().await;
        }

        p.close();
        gate.notify_one();
        assert!(matches!(listening.await.unwrap(), Listen::Ended { .. }));
        assert!(translator.calls().is_empty());
        assert_eq!(p.snapshot().source_text, "");
        assert!(synth.spoken().is_empty());
        assert_eq!(p.translate("फिर से").await, Outcome::Superseded);
    }

    #[tokio::test]
    async fn replay_needs_a_translation() {
        let translator = FakeTranslator::new([Reply::Text("Good night".into())]);
        let synth = RecordingSynth::new();
        let p = page_with(Page::HindiToEnglish, translator, Arc::new(Unsupported), synth.clone());

        assert!(!p.replay());
        p.translate("शुभ रात्रि").await;
        assert!(p.replay());
        assert_eq!(synth.spoken().len(), 2);
        assert_eq!(synth.audible().unwrap().text, "Good night");
    }
}
