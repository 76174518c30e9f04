//! PCM and WAV helpers shared by capture, recognition, and playback.
//!
//! Pure functions — no I/O, no async runtime.

/// Microphone capture rate handed to Whisper (16 kHz mono).
pub const SAMPLE_RATE: u32 = 16_000;

const WHISPER_MODELS: &[&str] = &["tiny", "base", "small", "medium", "large"];

/// Check a Whisper model name before it is sent to the server.
pub fn validate_whisper_model(model: &str) -> Result<(), String> {
    if WHISPER_MODELS.contains(&model) {
        return Ok(());
    }
    Err(format!(
        "unknown whisper model '{model}'; expected one of: {}",
        WHISPER_MODELS.join(", ")
    ))
}

/// RMS level of 16-bit samples, normalized to 0.0–1.0. Drives the VAD.
pub fn compute_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f64 = samples
        .iter()
        .map(|&s| {
            let v = f64::from(s) / 32768.0;
            v * v
        })
        .sum();
    (energy / samples.len() as f64).sqrt() as f32
}

/// Encode 16-bit mono samples as a canonical 44-byte-header WAV file.
pub fn write_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut buf = Vec::with_capacity(44 + data_len as usize);

    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_len).to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&1u16.to_le_bytes()); // mono
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes());
    buf.extend_from_slice(&16u16.to_le_bytes());

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_len.to_le_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}

/// Decode little-endian i16 PCM from a network chunk.
///
/// Chunks can split a sample in half; the odd trailing byte is returned and
/// must be passed back in as `carry` with the next chunk.
pub fn pcm_from_le_bytes(bytes: &[u8], carry: Option<u8>) -> (Vec<i16>, Option<u8>) {
    let joined;
    let slice = match carry {
        Some(b) => {
            let mut v = Vec::with_capacity(1 + bytes.len());
            v.push(b);
            v.extend_from_slice(bytes);
            joined = v;
            &joined[..]
        }
        None => bytes,
    };

    let samples = slice
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let rest = (slice.len() % 2 == 1).then(|| slice[slice.len() - 1]);

    (samples, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_layout() {
        let wav = write_wav(&[0i16; 100], SAMPLE_RATE);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(wav.len(), 44 + 200);
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), 16_000);
    }

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(compute_rms(&[0i16; 1000]), 0.0);
        assert_eq!(compute_rms(&[]), 0.0);
    }

    #[test]
    fn rms_of_half_scale() {
        let rms = compute_rms(&[16384i16; 100]);
        assert!(rms > 0.4 && rms < 0.6, "rms={rms}");
    }

    #[test]
    fn whisper_models() {
        assert!(validate_whisper_model("base").is_ok());
        assert!(validate_whisper_model("huge").is_err());
        assert!(validate_whisper_model("").is_err());
    }

    #[test]
    fn pcm_even_chunk() {
        let (samples, carry) = pcm_from_le_bytes(&[0x01, 0x00, 0xFF, 0x7F], None);
        assert_eq!(samples, vec![1, 32767]);
        assert_eq!(carry, None);
    }

    #[test]
    fn pcm_odd_chunk_carries_byte() {
        let (samples, carry) = pcm_from_le_bytes(&[0x01, 0x00, 0xFF], None);
        assert_eq!(samples, vec![1]);
        assert_eq!(carry, Some(0xFF));

        let (samples, carry) = pcm_from_le_bytes(&[0x7F], carry);
        assert_eq!(samples, vec![32767]);
        assert_eq!(carry, None);
    }
}
