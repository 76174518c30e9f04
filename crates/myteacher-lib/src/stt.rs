//! Whisper-backed speech recognition — VAD capture and transcription.
//!
//! A session opens the microphone, waits for speech, stops after a stretch
//! of trailing silence, and sends the captured WAV to a Whisper server with
//! the session's language. One transcript per session, no interim results.

use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use myteacher_core::text_prep::primary_subtag;
use myteacher_core::wav::{compute_rms, write_wav, SAMPLE_RATE};

use crate::capture::{has_input_device, CaptureError, Microphone};
use crate::speech::{RecognitionError, SpeechRecognizer};

// VAD constants
const SILENCE_THRESHOLD: f32 = 0.004;
const MIN_SPEECH_MS: u64 = 180;
const SILENCE_DURATION_MS: u64 = 700;
const MAX_CAPTURE_MS: u64 = 12_000;
const NO_SPEECH_TIMEOUT_MS: u64 = 7_000;
const READ_TIMEOUT_MS: u64 = 500;

pub struct WhisperRecognizer {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl WhisperRecognizer {
    pub fn new(whisper_url: &str, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!(
                "{}/v1/audio/transcriptions",
                whisper_url.trim_end_matches('/')
            ),
            model: model.into(),
        }
    }

    /// POST a WAV clip and return the cleaned transcript.
    pub async fn transcribe_wav(&self, wav: Vec<u8>, lang: &str) -> Result<String, String> {
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| format!("mime error: {e}"))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", primary_subtag(lang).to_string())
            .text("response_format", "json");

        let resp = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("transcription request failed: {e}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("transcription failed ({status}): {body}"));
        }

        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| format!("invalid transcription JSON: {e}"))?;
        Ok(clean_transcript(
            value.get("text").and_then(|v| v.as_str()).unwrap_or(""),
        ))
    }
}

#[async_trait]
impl SpeechRecognizer for WhisperRecognizer {
    fn available(&self) -> bool {
        has_input_device()
    }

    async fn recognize_once(&self, lang: &str) -> Result<String, RecognitionError> {
        let mut mic = Microphone::open().map_err(|e| match e {
            CaptureError::NoDevice => RecognitionError::Unsupported,
            CaptureError::Failed(msg) => RecognitionError::Capture(msg),
        })?;

        let audio = capture_utterance(&mut mic).await?;
        drop(mic);

        if audio.is_empty() {
            return Err(RecognitionError::NoSpeech);
        }

        debug!(
            "stt: transcribing {} ms of {lang} audio",
            audio.len() as u64 * 1000 / u64::from(SAMPLE_RATE)
        );
        let text = self
            .transcribe_wav(write_wav(&audio, SAMPLE_RATE), lang)
            .await
            .map_err(RecognitionError::Transcription)?;

        if text.is_empty() {
            return Err(RecognitionError::NoSpeech);
        }
        Ok(text)
    }
}

/// Whisper marks silence with `[BLANK_AUDIO]`.
fn clean_transcript(raw: &str) -> String {
    raw.replace("[BLANK_AUDIO]", "").trim().to_string()
}

/// Read chunks until speech followed by silence, the capture limit, or the
/// no-speech timeout. Returns an empty buffer when nothing was said.
async fn capture_utterance(mic: &mut Microphone) -> Result<Vec<i16>, RecognitionError> {
    let mut vad = Vad::default();
    let mut audio: Vec<i16> = Vec::new();
    let start = Instant::now();

    loop {
        let samples = match tokio::time::timeout(
            std::time::Duration::from_millis(READ_TIMEOUT_MS),
            mic.read_chunk(),
        )
        .await
        {
            Ok(Ok(s)) => s,
            Ok(Err(e)) if audio.is_empty() => return Err(RecognitionError::Capture(e)),
            Ok(Err(_)) => break,
            Err(_) => return Err(RecognitionError::Capture("capture read timeout".into())),
        };

        let chunk_ms = samples.len() as u64 * 1000 / u64::from(SAMPLE_RATE);
        let step = vad.feed(compute_rms(&samples), chunk_ms);
        if vad.speech_detected() {
            audio.extend_from_slice(&samples);
        }

        let elapsed = start.elapsed().as_millis() as u64;
        match step {
            VadStep::Done => break,
            VadStep::Continue if !vad.speech_detected() && elapsed >= NO_SPEECH_TIMEOUT_MS => {
                return Ok(Vec::new());
            }
            VadStep::Continue if vad.speech_detected() && elapsed >= MAX_CAPTURE_MS => break,
            VadStep::Continue => {}
        }
    }

    Ok(audio)
}

#[derive(Debug, PartialEq, Eq)]
enum VadStep {
    Continue,
    /// Speech ended with enough trailing silence.
    Done,
}

/// Energy-based voice activity detector, clocked by audio duration.
#[derive(Debug, Default)]
struct Vad {
    speech_ms: Option<u64>,
    silence_ms: u64,
}

impl Vad {
    fn speech_detected(&self) -> bool {
        self.speech_ms.is_some()
    }

    fn feed(&mut self, rms: f32, chunk_ms: u64) -> VadStep {
        if rms > SILENCE_THRESHOLD {
            self.silence_ms = 0;
            *self.speech_ms.get_or_insert(0) += chunk_ms;
            return VadStep::Continue;
        }

        let Some(speech) = self.speech_ms.as_mut() else {
            return VadStep::Continue;
        };
        // Trailing silence still counts toward the utterance length.
        *speech += chunk_ms;
        if *speech < MIN_SPEECH_MS {
            return VadStep::Continue;
        }
        self.silence_ms += chunk_ms;
        if self.silence_ms >= SILENCE_DURATION_MS {
            VadStep::Done
        } else {
            VadStep::Continue
        }
    }
}
