//! Microphone capture using cpal.
//!
//! [`Microphone`] reads the system default input device and delivers 16 kHz
//! mono i16 samples whatever the device's native format, rate, or channel
//! count. The cpal stream lives on its own OS thread and is torn down when
//! the `Microphone` is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use tokio::sync::mpsc;
use tracing::{debug, error};

use myteacher_core::wav::SAMPLE_RATE;

/// Samples per [`Microphone::read_chunk`]: 100 ms at 16 kHz.
pub const CHUNK_SAMPLES: usize = 1_600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The host has no input device at all.
    NoDevice,
    Failed(String),
}

/// Whether the host exposes a default input device.
pub fn has_input_device() -> bool {
    cpal::default_host().default_input_device().is_some()
}

pub struct Microphone {
    rx: mpsc::UnboundedReceiver<Vec<i16>>,
    pending: Vec<i16>,
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Microphone {
    /// Open the default input device and start capturing.
    pub fn open() -> Result<Self, CaptureError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or(CaptureError::NoDevice)?;

        let supported = device
            .default_input_config()
            .map_err(|e| CaptureError::Failed(format!("no usable input config: {e}")))?;

        let native_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        debug!("capture: {native_rate} Hz, {channels} ch, {sample_format:?}");

        let (tx, rx) = mpsc::unbounded_channel::<Vec<i16>>();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        // cpal Stream is !Send on macOS, so it is built and dropped on this thread.
        let thread = std::thread::Builder::new()
            .name("myteacher-capture".into())
            .spawn(move || {
                let deliver = move |mono16: Vec<i16>| {
                    let resampled = resample_linear(&mono16, native_rate, SAMPLE_RATE);
                    let _ = tx.send(resampled);
                };

                let stream = match sample_format {
                    SampleFormat::I16 => {
                        let stop = thread_stop.clone();
                        device.build_input_stream(
                            &config,
                            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                                if !stop.load(Ordering::Relaxed) {
                                    deliver(mix_to_mono(data, channels));
                                }
                            },
                            |err| error!("capture: stream error: {err}"),
                            None,
                        )
                    }
                    SampleFormat::F32 => {
                        let stop = thread_stop.clone();
                        device.build_input_stream(
                            &config,
                            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                                if !stop.load(Ordering::Relaxed) {
                                    let pcm: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                                    deliver(mix_to_mono(&pcm, channels));
                                }
                            },
                            |err| error!("capture: stream error: {err}"),
                            None,
                        )
                    }
                    other => {
                        error!("capture: unsupported sample format {other:?}");
                        return;
                    }
                };

                let stream = match stream {
                    Ok(s) => s,
                    Err(e) => {
                        error!("capture: failed to build stream: {e}");
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    error!("capture: failed to start stream: {e}");
                    return;
                }

                while !thread_stop.load(Ordering::Relaxed) {
                    std::thread::park();
                }
            })
            .map_err(|e| CaptureError::Failed(format!("failed to spawn capture thread: {e}")))?;

        Ok(Self {
            rx,
            pending: Vec::new(),
            stop,
            thread: Some(thread),
        })
    }

    /// Read exactly [`CHUNK_SAMPLES`] samples. Errors once the capture
    /// thread has gone away.
    pub async fn read_chunk(&mut self) -> Result<Vec<i16>, String> {
        while self.pending.len() < CHUNK_SAMPLES {
            match self.rx.recv().await {
                Some(samples) => self.pending.extend_from_slice(&samples),
                None => return Err("capture stream ended".to_string()),
            }
        }
        Ok(self.pending.drain(..CHUNK_SAMPLES).collect())
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

// ─── Sample conversion ─────────────────────────────────────────────────────

fn f32_to_i16(s: f32) -> i16 {
    (s.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Average interleaved channels down to mono.
fn mix_to_mono(input: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return input.to_vec();
    }
    input
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            (sum / i32::from(channels)) as i16
        })
        .collect()
}

/// Linear-interpolation resampler. Plenty for speech recognition.
fn resample_linear(input: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }
    let step = f64::from(from_rate) / f64::from(to_rate);
    let out_len = (input.len() as f64 / step) as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos as usize;
            let frac = pos - idx as f64;
            let a = f64::from(input[idx]);
            let b = input.get(idx + 1).map_or(a, |&s| f64::from(s));
            (a + frac * (b - a)) as i16
        })
        .collect()
}
