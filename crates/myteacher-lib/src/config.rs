//! Application configuration.
//!
//! Every field has a default, so an empty (or absent) TOML file is valid:
//!
//! ```toml
//! kokoro_url = "http://localhost:3001"
//! whisper_url = "http://localhost:2022"
//! mute = false
//!
//! [voices]
//! "hi-IN" = "hf_alpha"
//! "en-US" = "af_heart"
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use myteacher_core::text_prep::primary_subtag;
use myteacher_core::types::{AD_URL, TRANSLATE_ENDPOINT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub translate_endpoint: String,
    pub ad_url: String,
    /// Kokoro TTS server (OpenAI-compatible speech endpoint).
    pub kokoro_url: String,
    /// Whisper server (OpenAI-compatible transcription endpoint).
    pub whisper_url: String,
    pub whisper_model: String,
    /// Kokoro voice per BCP-47 synthesis tag.
    pub voices: HashMap<String, String>,
    /// Log utterances instead of playing them.
    pub mute: bool,
    /// Disable microphone capture; pages behave as if recognition is
    /// unsupported.
    pub no_mic: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 2040,
            translate_endpoint: TRANSLATE_ENDPOINT.into(),
            ad_url: AD_URL.into(),
            kokoro_url: "http://localhost:3001".into(),
            whisper_url: "http://localhost:2022".into(),
            whisper_model: "base".into(),
            voices: default_voices(),
            mute: false,
            no_mic: false,
        }
    }
}

fn default_voices() -> HashMap<String, String> {
    HashMap::from([
        ("hi-IN".to_string(), "hf_alpha".to_string()),
        ("en-US".to_string(), "af_heart".to_string()),
    ])
}

impl AppConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        myteacher_core::wav::validate_whisper_model(&self.whisper_model)
            .map_err(ConfigError::Invalid)?;
        if self.voices.is_empty() {
            return Err(ConfigError::Invalid("no voices configured".into()));
        }
        Ok(())
    }

    /// Kokoro voice for a synthesis tag: exact tag, then primary subtag,
    /// then the English voice.
    pub fn voice_for(&self, lang: &str) -> String {
        if let Some(v) = self.voices.get(lang) {
            return v.clone();
        }
        let primary = primary_subtag(lang);
        self.voices
            .iter()
            .find(|(tag, _)| primary_subtag(tag) == primary)
            .or_else(|| self.voices.get_key_value("en-US"))
            .or_else(|| self.voices.iter().next())
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| "af_heart".to_string())
    }
}
