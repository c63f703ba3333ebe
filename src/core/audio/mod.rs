//! Audio primitives for the voice session.
//!
//! - [`codec`]: PCM16 base64 transport encoding
//! - [`scheduler`]: gapless playback on an output clock
//! - [`capture`]: fixed-block microphone capture with RMS metering
//! - `device` (feature `device-audio`): local microphone and speaker via cpal

pub mod capture;
pub mod codec;
#[cfg(feature = "device-audio")]
pub mod device;
pub mod scheduler;

use std::sync::Arc;

use async_trait::async_trait;

pub use capture::{
    BlockAccumulator, CAPTURE_BLOCK_SIZE, CAPTURE_MIME_TYPE, CAPTURE_SAMPLE_RATE, CaptureError,
    CapturePipeline, EncodedFrame, FrameSink, MicrophoneStream, rms,
};
pub use codec::{DecodeError, PCM_SCALE, decode_incoming, encode_outgoing};
#[cfg(feature = "device-audio")]
pub use device::CpalAudio;
pub use scheduler::{
    AudioOutput, PlaybackBuffer, PlaybackError, PlaybackHandle, PlaybackScheduler, ScheduledSlot,
};

/// Sample rate of synthesized speech received from the model.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Source of microphone input and speaker output for a session.
///
/// Both resources are scoped: dropping the returned stream or the last
/// reference to the output releases the device.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Acquire the microphone, delivering mono samples at `sample_rate`.
    async fn open_microphone(&self, sample_rate: u32) -> Result<MicrophoneStream, CaptureError>;

    /// Acquire the speaker.
    async fn open_output(&self) -> Result<Arc<dyn AudioOutput>, PlaybackError>;
}

/// Backend for hosts without local audio devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableAudio;

#[async_trait]
impl AudioBackend for UnavailableAudio {
    async fn open_microphone(&self, _sample_rate: u32) -> Result<MicrophoneStream, CaptureError> {
        Err(CaptureError::NoInputDevice)
    }

    async fn open_output(&self) -> Result<Arc<dyn AudioOutput>, PlaybackError> {
        Err(PlaybackError::NoOutputDevice)
    }
}

/// Backend used when none is configured explicitly.
pub fn default_backend() -> Arc<dyn AudioBackend> {
    #[cfg(feature = "device-audio")]
    {
        Arc::new(CpalAudio::default())
    }
    #[cfg(not(feature = "device-audio"))]
    {
        Arc::new(UnavailableAudio)
    }
}
