//! PCM transport codec.
//!
//! Converts between normalized `f32` samples and the base64 text form of
//! 16-bit signed little-endian PCM used on the realtime wire.
//!
//! Outgoing samples are scaled by 32768 and saturated into the `i16` range, so
//! a full-scale positive sample of `1.0` encodes as `32767` rather than
//! wrapping to `-32768`.

use base64::prelude::*;
use thiserror::Error;

/// Scale factor between normalized samples and 16-bit PCM.
pub const PCM_SCALE: f32 = 32768.0;

/// Errors produced while decoding incoming audio payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid base64 audio payload: {0}")]
    InvalidBase64(String),
    #[error("PCM payload has odd byte length {0}")]
    OddByteLength(usize),
}

/// Convert one normalized sample to 16-bit PCM.
///
/// Values outside `[-1.0, 1.0)` saturate at the `i16` bounds and `NaN`
/// becomes silence.
#[inline]
pub fn sample_to_pcm16(sample: f32) -> i16 {
    // float -> int `as` casts saturate and map NaN to 0
    (sample * PCM_SCALE) as i16
}

/// Convert one 16-bit PCM sample back to the normalized range.
#[inline]
pub fn pcm16_to_sample(value: i16) -> f32 {
    value as f32 / PCM_SCALE
}

/// Pack normalized samples into 16-bit little-endian PCM bytes.
pub fn samples_to_pcm16_le(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&sample_to_pcm16(sample).to_le_bytes());
    }
    bytes
}

/// Unpack 16-bit little-endian PCM bytes into normalized samples.
pub fn pcm16_le_to_samples(bytes: &[u8]) -> Result<Vec<f32>, DecodeError> {
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddByteLength(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| pcm16_to_sample(i16::from_le_bytes([pair[0], pair[1]])))
        .collect())
}

/// Encode captured samples as base64 PCM16 text for the realtime session.
pub fn encode_outgoing(samples: &[f32]) -> String {
    BASE64_STANDARD.encode(samples_to_pcm16_le(samples))
}

/// Decode a base64 PCM16 payload received from the realtime session.
pub fn decode_incoming(text: &str) -> Result<Vec<f32>, DecodeError> {
    let bytes = BASE64_STANDARD
        .decode(text)
        .map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;
    pcm16_le_to_samples(&bytes)
}

/// Duration in seconds of `sample_count` mono samples at `sample_rate`.
#[inline]
pub fn duration_secs(sample_count: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    sample_count as f64 / sample_rate as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_scale_saturates() {
        assert_eq!(sample_to_pcm16(1.0), 32767);
        assert_eq!(sample_to_pcm16(-1.0), -32768);
        assert_eq!(sample_to_pcm16(1.5), 32767);
        assert_eq!(sample_to_pcm16(-3.0), -32768);
        assert_eq!(sample_to_pcm16(f32::NAN), 0);
    }

    #[test]
    fn test_scaling_truncates_toward_zero() {
        assert_eq!(sample_to_pcm16(0.5), 16384);
        assert_eq!(sample_to_pcm16(-0.5), -16384);
        assert_eq!(sample_to_pcm16(0.00001), 0);
    }

    #[test]
    fn test_little_endian_layout() {
        let bytes = samples_to_pcm16_le(&[0.5, -1.0]);
        assert_eq!(bytes, vec![0x00, 0x40, 0x00, 0x80]);
    }

    #[test]
    fn test_encode_known_payload() {
        // 16384 -> [0x00, 0x40] -> "AEA="
        assert_eq!(encode_outgoing(&[0.5]), "AEA=");
        assert_eq!(encode_outgoing(&[]), "");
    }

    #[test]
    fn test_decode_known_payload() {
        let samples = decode_incoming("AEAAgA==").unwrap();
        assert_eq!(samples, vec![0.5, -1.0]);
    }

    #[test]
    fn test_decode_rejects_odd_length() {
        // three bytes
        let text = BASE64_STANDARD.encode([1u8, 2, 3]);
        assert_eq!(decode_incoming(&text), Err(DecodeError::OddByteLength(3)));
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        let result = decode_incoming("not base64 at all!");
        assert!(matches!(result, Err(DecodeError::InvalidBase64(_))));
    }

    #[test]
    fn test_round_trip_within_one_step() {
        let input: Vec<f32> = (0..2048)
            .map(|i| ((i as f32) * 0.013).sin() * 0.97)
            .chain([1.0, -1.0, 0.0, 0.999_99, -0.999_99])
            .collect();

        let decoded = decode_incoming(&encode_outgoing(&input)).unwrap();
        assert_eq!(decoded.len(), input.len());
        for (original, restored) in input.iter().zip(decoded.iter()) {
            assert!(
                (original - restored).abs() <= 1.0 / PCM_SCALE,
                "{original} decoded as {restored}"
            );
        }
    }

    #[test]
    fn test_duration_secs() {
        assert_eq!(duration_secs(24_000, 24_000), 1.0);
        assert_eq!(duration_secs(2_400, 24_000), 0.1);
        assert_eq!(duration_secs(10, 0), 0.0);
    }
}
