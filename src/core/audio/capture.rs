//! Microphone capture pipeline.
//!
//! Raw microphone chunks are regrouped into fixed 4096-sample blocks. For
//! every block the pipeline publishes an RMS level for metering, encodes the
//! block as PCM16 and forwards it to a [`FrameSink`] tagged with the capture
//! MIME type.

use std::any::Any;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::codec::encode_outgoing;

/// Sample rate audio is captured at.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Samples per forwarded block.
pub const CAPTURE_BLOCK_SIZE: usize = 4096;

/// MIME type attached to every outgoing frame.
pub const CAPTURE_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Errors raised while acquiring or reading the microphone.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Microphone permission denied")]
    PermissionDenied,
    #[error("No input device available")]
    NoInputDevice,
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),
    #[error("Input stream error: {0}")]
    Stream(String),
}

/// One encoded capture block, ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub mime_type: String,
    pub data: String,
}

impl EncodedFrame {
    /// Encode a 16 kHz capture block.
    pub fn from_block(block: &[f32]) -> Self {
        Self {
            mime_type: CAPTURE_MIME_TYPE.to_string(),
            data: encode_outgoing(block),
        }
    }
}

/// Destination for encoded frames.
///
/// `send_frame` must not suspend; implementations drop the frame when they
/// cannot take it.
pub trait FrameSink: Send + Sync {
    fn send_frame(&self, frame: EncodedFrame);
}

/// Root-mean-square level of a block.
pub fn rms(block: &[f32]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    let sum: f32 = block.iter().map(|s| s * s).sum();
    (sum / block.len() as f32).sqrt()
}

/// Live microphone feed at [`CAPTURE_SAMPLE_RATE`].
///
/// Holds the device guard; the device is released when the stream is
/// dropped.
pub struct MicrophoneStream {
    chunks: mpsc::Receiver<Vec<f32>>,
    _guard: Box<dyn Any + Send>,
}

impl MicrophoneStream {
    pub fn new(chunks: mpsc::Receiver<Vec<f32>>, guard: Box<dyn Any + Send>) -> Self {
        Self {
            chunks,
            _guard: guard,
        }
    }

    /// Next raw chunk, or `None` once the device stopped.
    pub async fn next_chunk(&mut self) -> Option<Vec<f32>> {
        self.chunks.recv().await
    }
}

impl std::fmt::Debug for MicrophoneStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrophoneStream").finish_non_exhaustive()
    }
}

/// Regroups arbitrary chunks into fixed-size blocks.
#[derive(Debug)]
pub struct BlockAccumulator {
    block_size: usize,
    pending: Vec<f32>,
}

impl BlockAccumulator {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            pending: Vec::with_capacity(block_size),
        }
    }

    /// Append `chunk` and return every block completed by it.
    pub fn push(&mut self, chunk: &[f32]) -> Vec<Vec<f32>> {
        self.pending.extend_from_slice(chunk);

        let mut blocks = Vec::new();
        while self.pending.len() >= self.block_size {
            let rest = self.pending.split_off(self.block_size);
            blocks.push(std::mem::replace(&mut self.pending, rest));
        }
        blocks
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Running capture task.
#[derive(Debug)]
pub struct CapturePipeline {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CapturePipeline {
    /// Start forwarding blocks from `mic` into `sink`, publishing levels on
    /// `meter`.
    pub fn start<S>(mic: MicrophoneStream, sink: S, meter: watch::Sender<f32>) -> Self
    where
        S: FrameSink + 'static,
    {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_capture(mic, sink, meter, cancel.clone()));
        info!("Capture pipeline started");

        Self {
            cancel,
            task: Some(task),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Detach from the microphone and release it. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            match task.await {
                Ok(()) => info!("Capture pipeline stopped"),
                Err(e) => warn!("Capture task ended abnormally: {}", e),
            }
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_capture<S: FrameSink>(
    mut mic: MicrophoneStream,
    sink: S,
    meter: watch::Sender<f32>,
    cancel: CancellationToken,
) {
    let mut blocks = BlockAccumulator::new(CAPTURE_BLOCK_SIZE);
    let mut forwarded: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = mic.next_chunk() => {
                let Some(chunk) = chunk else {
                    debug!("Microphone stream ended");
                    break;
                };
                for block in blocks.push(&chunk) {
                    meter.send_replace(rms(&block));
                    sink.send_frame(EncodedFrame::from_block(&block));
                    forwarded += 1;
                }
            }
        }
    }

    meter.send_replace(0.0);
    drop(mic);
    debug!(forwarded, "Capture task exited");
}
