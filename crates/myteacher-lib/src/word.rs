//! Word-click translator page.
//!
//! The paragraph is typed or dictated in English and shown as
//! whitespace-delimited tokens. Clicking a token translates just that word
//! to Hindi and speaks it; a second control reads the raw token aloud in
//! English.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use myteacher_core::text_prep::{append_transcript, clean_word, split_words};
use myteacher_core::types::{
    Page, PageConfig, PageSnapshot, Utterance, LOADING_PLACEHOLDER, UNSUPPORTED_ALERT,
};

use crate::page::{Listen, Outcome, Services};
use crate::speech::RecognitionError;

const ENGLISH_VOICE_LANG: &str = "en-US";
const ENGLISH_VOICE_RATE: f32 = 1.0;

#[derive(Debug, Default)]
struct WordState {
    paragraph: String,
    clicked_word: Option<String>,
    translation: String,
    loading: bool,
    listening: bool,
    alert: Option<String>,
}

pub struct WordTranslator {
    config: PageConfig,
    services: Services,
    state: Mutex<WordState>,
    generation: AtomicU64,
    closed: AtomicBool,
}

impl WordTranslator {
    pub fn new(services: Services) -> Self {
        Self {
            config: Page::WordTranslator.config(),
            services,
            state: Mutex::new(WordState::default()),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Replace the paragraph (typing).
    pub fn set_paragraph(&self, text: &str) {
        self.lock().paragraph = text.to_string();
    }

    /// Dictate one English phrase and append it to the paragraph.
    ///
    /// Unlike the audio pages, a missing recognizer is surfaced to the user
    /// through the page alert.
    pub async fn dictate(&self) -> Result<Listen, RecognitionError> {
        if !self.services.recognizer.available() {
            self.raise_unsupported();
            return Err(RecognitionError::Unsupported);
        }

        {
            let mut s = self.lock();
            if s.listening {
                return Ok(Listen::Busy);
            }
            s.listening = true;
        }

        let heard = self
            .services
            .recognizer
            .recognize_once(self.config.recognition_lang)
            .await;

        let mut s = self.lock();
        s.listening = false;
        if self.is_closed() {
            debug!("word-translator: closed while dictating, dropping transcript");
            return Ok(Listen::Ended {
                reason: "page closed".into(),
            });
        }
        match heard {
            Ok(text) => {
                s.paragraph = append_transcript(&s.paragraph, &text);
                Ok(Listen::Heard { text })
            }
            Err(RecognitionError::Unsupported) => {
                drop(s);
                self.raise_unsupported();
                Err(RecognitionError::Unsupported)
            }
            Err(e) => {
                debug!("word-translator: dictation ended: {e}");
                Ok(Listen::Ended {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Current clickable tokens.
    pub fn words(&self) -> Vec<String> {
        split_words(&self.lock().paragraph)
    }

    pub fn word_at(&self, index: usize) -> Option<String> {
        self.words().into_iter().nth(index)
    }

    /// Translate a single clicked token. Punctuation is stripped first; a
    /// token that cleans to nothing is ignored.
    pub async fn translate_word(&self, word: &str) -> Outcome {
        let cleaned = clean_word(word);
        if cleaned.is_empty() {
            return Outcome::Skipped;
        }
        if self.is_closed() {
            return Outcome::Superseded;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut s = self.lock();
            s.clicked_word = Some(cleaned.clone());
            s.loading = true;
            s.translation = LOADING_PLACEHOLDER.to_string();
        }

        let result = self
            .services
            .translator
            .translate(&cleaned, self.config.pair)
            .await;

        if self.generation.load(Ordering::SeqCst) != generation {
            return Outcome::Superseded;
        }

        let mut s = self.lock();
        s.loading = false;
        match result {
            Ok(hindi) => {
                s.translation = hindi.clone();
                drop(s);
                self.services.synth.speak(Utterance::new(
                    hindi.as_str(),
                    self.config.synthesis_lang,
                    self.config.speech_rate,
                ));
                Outcome::Translated { text: hindi }
            }
            Err(e) => {
                warn!("word-translator: '{cleaned}': {e}");
                s.translation = self.config.failure_message.to_string();
                Outcome::Failed {
                    message: self.config.failure_message.to_string(),
                }
            }
        }
    }

    /// Read a token aloud in English exactly as written, without translating.
    pub fn speak_word(&self, word: &str) {
        self.services.synth.speak(Utterance::new(
            word,
            ENGLISH_VOICE_LANG,
            ENGLISH_VOICE_RATE,
        ));
    }

    pub fn dismiss_alert(&self) {
        self.lock().alert = None;
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
            source_text: s.paragraph.clone(),
            translated_text: s.translation.clone(),
            loading: s.loading,
            listening: s.listening,
            clicked_word: s.clicked_word.clone(),
            alert: s.alert.clone(),
            words: split_words(&s.paragraph),
        }
    }

    fn raise_unsupported(&self) {
        warn!("word-translator: dictation unavailable");
        self.lock().alert = Some(UNSUPPORTED_ALERT.to_string());
    }

    fn lock(&self) -> MutexGuard<'_, WordState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
