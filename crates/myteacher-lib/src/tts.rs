//! Speech engine — utterance → Kokoro PCM fetch → rodio playback.
//!
//! ```text
//! speak(u) → bump epoch, stop sink → [job_tx] → dispatcher → fetch task
//!     → POST Kokoro, buffer PCM → [play_cmd_tx] → playback thread → Sink
//! ```
//!
//! Epoch-based cancellation: every `speak()` and `cancel()` bumps an
//! [`AtomicU64`]. Fetches and queued audio from an older epoch are dropped
//! before they reach the sink, so at most one utterance is ever audible.
//!
//! Utterances are short (a word or a sentence), so each is fetched whole
//! and played as one buffer rather than streamed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use myteacher_core::types::{SpeechState, SpeechStatus, Utterance};
use myteacher_core::wav::pcm_from_le_bytes;

use crate::config::AppConfig;
use crate::speech::SpeechSynthesizer;

/// Kokoro PCM format: 24 kHz mono 16-bit signed LE.
const PCM_SAMPLE_RATE: u32 = 24_000;
const PCM_CHANNELS: u16 = 1;

/// How often the playback thread checks whether the sink drained.
const PLAYBACK_POLL: Duration = Duration::from_millis(100);

/// Cloneable handle to the speech engine. All methods are non-blocking.
#[derive(Clone)]
pub struct SpeechEngine {
    job_tx: mpsc::UnboundedSender<FetchJob>,
    play_cmd_tx: std::sync::mpsc::Sender<PlayCmd>,
    status_tx: watch::Sender<SpeechStatus>,
    epoch: Arc<AtomicU64>,
    config: Arc<AppConfig>,
}

// ─── Internal types ────────────────────────────────────────────────────────

struct FetchJob {
    text: String,
    voice: String,
    speed: f32,
    epoch: u64,
}

enum PlayCmd {
    Play { samples: Vec<i16>, epoch: u64 },
    Stop,
}

// ─── Engine construction ───────────────────────────────────────────────────

impl SpeechEngine {
    /// Spawn the dispatcher task and playback thread. Must be called from
    /// within a tokio runtime.
    pub fn new(config: &AppConfig) -> Self {
        let epoch = Arc::new(AtomicU64::new(0));
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(SpeechStatus {
            state: SpeechState::Idle,
            epoch: 0,
            text: None,
        });

        // Playback OS thread (rodio OutputStream is !Send)
        let (play_cmd_tx, play_cmd_rx) = std::sync::mpsc::channel::<PlayCmd>();
        let play_status_tx = status_tx.clone();
        let play_epoch = epoch.clone();
        if let Err(e) = std::thread::Builder::new()
            .name("myteacher-playback".into())
            .spawn(move || playback_thread(play_cmd_rx, play_status_tx, play_epoch))
        {
            error!("speech: failed to spawn playback thread: {e}");
        }

        let dispatch_tx = play_cmd_tx.clone();
        let dispatch_epoch = epoch.clone();
        let dispatch_status = status_tx.clone();
        let url = format!("{}/v1/audio/speech", config.kokoro_url.trim_end_matches('/'));
        tokio::spawn(async move {
            dispatcher_task(job_rx, dispatch_tx, dispatch_epoch, dispatch_status, url).await;
        });

        Self {
            job_tx,
            play_cmd_tx,
            status_tx,
            epoch,
            config: Arc::new(config.clone()),
        }
    }

    /// Bump the epoch and silence the sink. Returns the new epoch.
    fn interrupt(&self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.play_cmd_tx.send(PlayCmd::Stop);
        epoch
    }
}

impl SpeechSynthesizer for SpeechEngine {
    fn speak(&self, utterance: Utterance) {
        let epoch = self.interrupt();
        if utterance.text.trim().is_empty() {
            update_status(&self.status_tx, |s| {
                s.state = SpeechState::Idle;
                s.epoch = epoch;
                s.text = None;
            });
            return;
        }

        let voice = self.config.voice_for(&utterance.lang);
        debug!(
            "speak: epoch {epoch}, voice {voice}, {} chars",
            utterance.text.len()
        );
        update_status(&self.status_tx, |s| {
            s.state = SpeechState::Fetching;
            s.epoch = epoch;
            s.text = Some(utterance.text.clone());
        });

        let _ = self.job_tx.send(FetchJob {
            text: utterance.text,
            voice,
            speed: utterance.rate,
            epoch,
        });
    }

    fn cancel(&self) {
        let epoch = self.interrupt();
        update_status(&self.status_tx, |s| {
            s.state = SpeechState::Idle;
            s.epoch = epoch;
            s.text = None;
        });
    }

    fn status(&self) -> Option<SpeechStatus> {
        Some(self.status_tx.borrow().clone())
    }
}

// ─── Dispatcher and fetch ─────────────────────────────────────────────────

async fn dispatcher_task(
    mut job_rx: mpsc::UnboundedReceiver<FetchJob>,
    play_cmd_tx: std::sync::mpsc::Sender<PlayCmd>,
    epoch: Arc<AtomicU64>,
    status_tx: watch::Sender<SpeechStatus>,
    url: String,
) {
    let client = reqwest::Client::new();

    // One task per job so a slow, superseded fetch never delays the next one.
    while let Some(job) = job_rx.recv().await {
        if job.epoch != epoch.load(Ordering::SeqCst) {
            debug!("fetch: discarding stale job (epoch {})", job.epoch);
            continue;
        }

        let client = client.clone();
        let url = url.clone();
        let epoch = epoch.clone();
        let play_cmd_tx = play_cmd_tx.clone();
        let status_tx = status_tx.clone();
        tokio::spawn(async move {
            let job_epoch = job.epoch;
            match fetch_pcm(&client, &url, &job, &epoch).await {
                Ok(Some(samples)) => {
                    let _ = play_cmd_tx.send(PlayCmd::Play {
                        samples,
                        epoch: job_epoch,
                    });
                }
                Ok(None) => debug!("fetch: epoch {job_epoch} superseded mid-download"),
                Err(e) => {
                    warn!("fetch: {e}");
                    update_status(&status_tx, |s| {
                        if s.epoch == job_epoch {
                            s.state = SpeechState::Idle;
                        }
                    });
                }
            }
        });
    }
}

fn speech_request(job: &FetchJob) -> serde_json::Value {
    serde_json::json!({
        "input": job.text,
        "voice": job.voice,
        "model": "kokoro",
        "response_format": "pcm",
        "stream": true,
        "speed": job.speed,
    })
}

/// POST one utterance to Kokoro and collect its PCM. Returns `Ok(None)` when
/// the job's epoch was superseded while downloading.
async fn fetch_pcm(
    client: &reqwest::Client,
    url: &str,
    job: &FetchJob,
    epoch: &AtomicU64,
) -> Result<Option<Vec<i16>>, String> {
    let resp = client
        .post(url)
        .json(&speech_request(job))
        .send()
        .await
        .map_err(|e| format!("Kokoro request failed: {e}"))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(format!("Kokoro error {status}: {body}"));
    }

    let mut stream = resp.bytes_stream();
    let mut carry: Option<u8> = None;
    let mut pcm: Vec<i16> = Vec::new();

    while let Some(chunk) = stream.next().await {
        if job.epoch != epoch.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let chunk = chunk.map_err(|e| format!("Kokoro stream error: {e}"))?;
        let (samples, rest) = pcm_from_le_bytes(&chunk, carry.take());
        carry = rest;
        pcm.extend(samples);
    }

    if job.epoch != epoch.load(Ordering::SeqCst) {
        return Ok(None);
    }
    Ok(Some(pcm))
}

// ─── Playback OS thread ───────────────────────────────────────────────────

fn playback_thread(
    cmd_rx: std::sync::mpsc::Receiver<PlayCmd>,
    status_tx: watch::Sender<SpeechStatus>,
    epoch: Arc<AtomicU64>,
) {
    let (_stream, stream_handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            error!("playback: failed to open audio output: {e}");
            return;
        }
    };

    let new_sink = || match Sink::try_new(&stream_handle) {
        Ok(sink) => Some(sink),
        Err(e) => {
            error!("playback: failed to create sink: {e}");
            None
        }
    };
    let Some(mut sink) = new_sink() else {
        return;
    };

    loop {
        match cmd_rx.recv_timeout(PLAYBACK_POLL) {
            Ok(PlayCmd::Play {
                samples,
                epoch: job_epoch,
            }) => {
                if job_epoch != epoch.load(Ordering::SeqCst) {
                    debug!("playback: dropping stale audio (epoch {job_epoch})");
                    continue;
                }
                sink.append(SamplesBuffer::new(PCM_CHANNELS, PCM_SAMPLE_RATE, samples));
                update_status(&status_tx, |s| {
                    if s.epoch == job_epoch {
                        s.state = SpeechState::Playing;
                    }
                });
            }
            Ok(PlayCmd::Stop) => {
                // A stopped sink cannot be reused.
                sink.stop();
                let Some(fresh) = new_sink() else {
                    return;
                };
                sink = fresh;
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                sink.stop();
                break;
            }
        }

        if sink.empty() {
            update_status(&status_tx, |s| {
                if s.state == SpeechState::Playing {
                    s.state = SpeechState::Idle;
                }
            });
        }
    }
}

fn update_status(tx: &watch::Sender<SpeechStatus>, f: impl FnOnce(&mut SpeechStatus)) {
    tx.send_modify(f);
}

#[cfg(test)]
mod tests {
    use axum::routing::post;
    use axum::{Json, Router};

    use super::*;

    fn job(epoch: u64) -> FetchJob {
        FetchJob {
            text: "नमस्ते".into(),
            voice: "hf_alpha".into(),
            speed: 0.9,
            epoch,
        }
    }

    async fn kokoro_stub() -> String {
        async fn speech(Json(body): Json<serde_json::Value>) -> Vec<u8> {
            assert_eq!(body["response_format"], "pcm");
            assert_eq!(body["voice"], "hf_alpha");
            vec![0x01, 0x00, 0xFF, 0x7F, 0x00]
        }
        let app = Router::new().route("/v1/audio/speech", post(speech));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1/audio/speech")
    }

    #[test]
    fn request_body_carries_voice_and_speed() {
        let body = speech_request(&job(1));
        assert_eq!(body["input"], "नमस्ते");
        assert_eq!(body["voice"], "hf_alpha");
        assert_eq!(body["model"], "kokoro");
        assert!((body["speed"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn fetch_collects_pcm_for_current_epoch() {
        let url = kokoro_stub().await;
        let epoch = AtomicU64::new(3);
        let pcm = fetch_pcm(&reqwest::Client::new(), &url, &job(3), &epoch)
            .await
            .unwrap();
        // the dangling fifth byte is not a whole sample
        assert_eq!(pcm, Some(vec![1, 32767]));
    }

    #[tokio::test]
    async fn fetch_for_stale_epoch_yields_nothing() {
        let url = kokoro_stub().await;
        let epoch = AtomicU64::new(4);
        let pcm = fetch_pcm(&reqwest::Client::new(), &url, &job(3), &epoch)
            .await
            .unwrap();
        assert_eq!(pcm, None);
    }

    #[tokio::test]
    async fn newer_utterance_replaces_older_one() {
        let engine = SpeechEngine::new(&AppConfig {
            kokoro_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        });

        engine.speak(Utterance::new("first", "en-US", 0.9));
        engine.speak(Utterance::new("second", "hi-IN", 0.9));

        let status = engine.status().unwrap();
        assert_eq!(status.epoch, 2);
        assert_eq!(status.text.as_deref(), Some("second"));

        engine.cancel();
        let status = engine.status().unwrap();
        assert_eq!(status.state, SpeechState::Idle);
        assert_eq!(status.epoch, 3);
        assert_eq!(status.text, None);
    }
}
