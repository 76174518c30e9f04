//! Shared types for the MyTeacher voice translator.
//!
//! Used by myteacher-lib, myteacher-cli, and any front-end talking to the
//! HTTP API. Kept here so consumers can depend on the types without pulling
//! in tokio, rodio, or cpal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ─── Constants ─────────────────────────────────────────────────────────────

/// External page opened once per session before the first practice page.
pub const AD_URL: &str =
    "https://www.effectivegatecpm.com/ynr4zqfyc?key=47c7532215e22f2958124a99aa5ab73e";

/// Length of the ad-gate countdown.
pub const COUNTDOWN_SECS: u32 = 5;

/// Public translation endpoint (`client=gtx` flavour).
pub const TRANSLATE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Shown in place of a word translation while its request is in flight.
pub const LOADING_PLACEHOLDER: &str = "...";

/// Alert raised by the word translator when dictation is unavailable.
pub const UNSUPPORTED_ALERT: &str = "Voice recognition is not supported on this system.";

// ─── Pages ─────────────────────────────────────────────────────────────────

/// The four practice pages reachable from the home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Page {
    HindiToEnglish,
    EnglishToHindi,
    WordTranslator,
    HindiToSanskrit,
}

impl Page {
    /// Home-screen order.
    pub const ALL: [Page; 4] = [
        Page::HindiToEnglish,
        Page::EnglishToHindi,
        Page::WordTranslator,
        Page::HindiToSanskrit,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Page::HindiToEnglish => "hindi-to-english",
            Page::EnglishToHindi => "english-to-hindi",
            Page::WordTranslator => "word-translator",
            Page::HindiToSanskrit => "hindi-to-sanskrit",
        }
    }

    /// Label of the home-screen button.
    pub fn title(self) -> &'static str {
        match self {
            Page::HindiToEnglish => "Hindi → English Practice",
            Page::EnglishToHindi => "English → Hindi Practice",
            Page::WordTranslator => "Word Translator",
            Page::HindiToSanskrit => "Hindi → Sanskrit Practice",
        }
    }

    /// Language wiring for this page.
    pub fn config(self) -> PageConfig {
        match self {
            Page::HindiToEnglish => PageConfig {
                pair: LanguagePair::new("hi", "en"),
                recognition_lang: "hi-IN",
                synthesis_lang: "en-US",
                speech_rate: 0.9,
                failure_message: "Translation failed. Try again.",
            },
            Page::EnglishToHindi => PageConfig {
                pair: LanguagePair::new("en", "hi"),
                recognition_lang: "en-US",
                synthesis_lang: "hi-IN",
                speech_rate: 0.9,
                failure_message: "Translation failed. Try again.",
            },
            Page::WordTranslator => PageConfig {
                pair: LanguagePair::new("en", "hi"),
                recognition_lang: "en-US",
                synthesis_lang: "hi-IN",
                speech_rate: 0.9,
                failure_message: "N/A",
            },
            // No Sanskrit voice exists; Devanagari output is read with the Hindi voice.
            Page::HindiToSanskrit => PageConfig {
                pair: LanguagePair::new("hi", "sa"),
                recognition_lang: "hi-IN",
                synthesis_lang: "hi-IN",
                speech_rate: 0.8,
                failure_message: "Anuvada viphala (Translation failed).",
            },
        }
    }

    /// Whether the page is driven by the word-click controller rather than
    /// the listen → translate → speak loop.
    pub fn is_word_translator(self) -> bool {
        self == Page::WordTranslator
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Page {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Page::ALL
            .into_iter()
            .find(|p| p.id() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Page::ALL.iter().map(|p| p.id()).collect();
                format!("unknown page '{s}'; valid pages: {}", valid.join(", "))
            })
    }
}

/// Source and target codes for a translation request (`sl` / `tl`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LanguagePair {
    pub source: &'static str,
    pub target: &'static str,
}

impl LanguagePair {
    pub const fn new(source: &'static str, target: &'static str) -> Self {
        Self { source, target }
    }
}

/// Per-page language configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageConfig {
    pub pair: LanguagePair,
    /// BCP-47 tag handed to the recognizer.
    pub recognition_lang: &'static str,
    /// BCP-47 tag handed to the synthesizer.
    pub synthesis_lang: &'static str,
    pub speech_rate: f32,
    /// Displayed instead of a translation when the request fails.
    pub failure_message: &'static str,
}

// ─── Speech ────────────────────────────────────────────────────────────────

/// A single text-to-speech playback request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
}

impl Utterance {
    pub fn new(text: impl Into<String>, lang: impl Into<String>, rate: f32) -> Self {
        Self {
            text: text.into(),
            lang: lang.into(),
            rate,
        }
    }
}

/// Observable synthesizer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechState {
    Idle,
    Fetching,
    Playing,
}

/// Synthesizer status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SpeechStatus {
    pub state: SpeechState,
    /// Bumped by every `speak` and `cancel`.
    pub epoch: u64,
    pub text: Option<String>,
}

// ─── Views ─────────────────────────────────────────────────────────────────

/// What the user is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "camelCase")]
pub enum Screen {
    Home,
    Counting { seconds: u32, target: Option<Page> },
    Showing { page: Page },
}

/// Page-local state as rendered by a front-end.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub source_text: String,
    pub translated_text: String,
    pub loading: bool,
    pub listening: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clicked_word: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<String>,
}
