//! Translation client for the public `translate_a/single` endpoint.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use myteacher_core::text_prep::parse_translation;
use myteacher_core::types::{LanguagePair, TRANSLATE_ENDPOINT};

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("translation service returned {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed translation response: {0}")]
    Malformed(String),
}

/// Anything that can turn text in one language into another.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, pair: LanguagePair) -> Result<String, TranslateError>;
}

/// HTTP translator using the `client=gtx` query interface.
#[derive(Clone)]
pub struct GtxTranslator {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for GtxTranslator {
    fn default() -> Self {
        Self::new(TRANSLATE_ENDPOINT)
    }
}

impl GtxTranslator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Translator for GtxTranslator {
    async fn translate(&self, text: &str, pair: LanguagePair) -> Result<String, TranslateError> {
        debug!(
            "translate: {}→{} ({} chars)",
            pair.source,
            pair.target,
            text.len()
        );

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", pair.source),
                ("tl", pair.target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TranslateError::Status(status));
        }

        let body = resp.text().await?;
        parse_translation(&body).map_err(TranslateError::Malformed)
    }
}
