//! Audio Test Fixtures
//!
//! Programmatically generated mono float audio. Generated audio keeps the
//! inputs reproducible and needs no fixture files.
//!
//! Rates:
//! - Capture: 16kHz (microphone towards the model)
//! - Playback: 24kHz (speech from the model)

use std::f32::consts::PI;

use homie_voice::core::audio::codec::encode_outgoing;

/// Microphone sample rate
pub const CAPTURE_RATE: u32 = 16000;

/// Model speech sample rate
pub const PLAYBACK_RATE: u32 = 24000;

/// Number of samples in `ms` milliseconds at `rate`
pub fn samples_for_ms(ms: u32, rate: u32) -> usize {
    (rate as usize * ms as usize) / 1000
}

/// Generate silence
pub fn generate_silence(samples: usize) -> Vec<f32> {
    vec![0.0; samples]
}

/// Generate a sine wave tone with peak `amplitude` (0.0 - 1.0)
pub fn generate_sine_wave(samples: usize, frequency: f32, amplitude: f32, rate: u32) -> Vec<f32> {
    let angular_freq = 2.0 * PI * frequency / rate as f32;
    (0..samples)
        .map(|i| (angular_freq * i as f32).sin() * amplitude)
        .collect()
}

/// Generate a speech-like signal: a 220Hz carrier with a syllable-rate
/// (4Hz) amplitude envelope
pub fn generate_speech_like(samples: usize, rate: u32) -> Vec<f32> {
    let carrier = 2.0 * PI * 220.0 / rate as f32;
    let envelope = 2.0 * PI * 4.0 / rate as f32;
    (0..samples)
        .map(|i| {
            let t = i as f32;
            let level = 0.5 * (1.0 + (envelope * t).sin()) * 0.6;
            (carrier * t).sin() * level
        })
        .collect()
}

/// Deterministic white noise in [-amplitude, amplitude]
pub fn generate_white_noise(samples: usize, amplitude: f32) -> Vec<f32> {
    let mut state: u64 = 12345;
    (0..samples)
        .map(|_| {
            // Linear congruential generator
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            let random = ((state >> 16) & 0x7FFF) as f32 / 0x7FFF as f32;
            (random * 2.0 - 1.0) * amplitude
        })
        .collect()
}

/// Base64 PCM16 speech chunk of `ms` milliseconds at 24kHz, as the model
/// sends it
pub fn model_speech_chunk(ms: u32) -> String {
    let samples = samples_for_ms(ms, PLAYBACK_RATE);
    encode_outgoing(&generate_sine_wave(samples, 440.0, 0.3, PLAYBACK_RATE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_for_ms() {
        assert_eq!(samples_for_ms(100, PLAYBACK_RATE), 2400);
        assert_eq!(samples_for_ms(256, CAPTURE_RATE), 4096);
    }

    #[test]
    fn test_generators_stay_in_range() {
        for signal in [
            generate_sine_wave(1000, 440.0, 0.8, CAPTURE_RATE),
            generate_speech_like(1000, CAPTURE_RATE),
            generate_white_noise(1000, 0.5),
        ] {
            assert!(signal.iter().all(|s| (-1.0..=1.0).contains(s)));
        }
    }
}
