//! Local microphone and speaker through `cpal`.
//!
//! `cpal::Stream` is `!Send` on some platforms, so each stream lives on its
//! own OS thread for as long as the corresponding handle is alive. The async
//! side only sees channels and shared atomics.
//!
//! Input is downmixed to mono and resampled to the requested capture rate
//! with `rubato`. Output runs a small mixer whose frame counter is the
//! playback clock; chunks start at the frame matching their scheduled time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, Device, SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use rubato::{FftFixedIn, Resampler as _};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use super::capture::{CaptureError, MicrophoneStream};
use super::scheduler::{AudioOutput, PlaybackBuffer, PlaybackError, PlaybackHandle};
use super::AudioBackend;

/// Resampler input chunk length.
const RESAMPLE_CHUNK: usize = 1024;

/// How often device threads check their stop flag.
const THREAD_POLL: Duration = Duration::from_millis(20);

/// Capacity of the chunk channel towards the capture pipeline.
const MIC_CHANNEL_CAPACITY: usize = 64;

/// Default input/output devices of the default cpal host.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalAudio;

#[async_trait]
impl AudioBackend for CpalAudio {
    async fn open_microphone(&self, sample_rate: u32) -> Result<MicrophoneStream, CaptureError> {
        let (chunk_tx, chunk_rx) = mpsc::channel(MIC_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        thread::Builder::new()
            .name("homie-mic".into())
            .spawn(move || run_microphone(sample_rate, chunk_tx, ready_tx, thread_stop))
            .map_err(|e| CaptureError::Stream(format!("failed to spawn capture thread: {e}")))?;

        ready_rx
            .await
            .map_err(|_| CaptureError::Stream("capture thread exited".to_string()))??;

        Ok(MicrophoneStream::new(chunk_rx, Box::new(StopOnDrop(stop))))
    }

    async fn open_output(&self) -> Result<Arc<dyn AudioOutput>, PlaybackError> {
        let mixer = Arc::new(Mutex::new(Mixer::default()));
        let frames_played = Arc::new(AtomicU64::new(0));
        let closed = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread_mixer = mixer.clone();
        let thread_frames = frames_played.clone();
        let thread_closed = closed.clone();
        thread::Builder::new()
            .name("homie-speaker".into())
            .spawn(move || run_speaker(thread_mixer, thread_frames, ready_tx, thread_closed))
            .map_err(|e| PlaybackError::Device(format!("failed to spawn output thread: {e}")))?;

        let device_rate = ready_rx
            .await
            .map_err(|_| PlaybackError::Device("output thread exited".to_string()))??;

        Ok(Arc::new(CpalOutput {
            mixer,
            frames_played,
            device_rate,
            closed,
            last_placement: Mutex::new(None),
        }))
    }
}

/// Sets the stop flag of a device thread when dropped.
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

// =============================================================================
// Input
// =============================================================================

fn map_build_error(e: BuildStreamError) -> CaptureError {
    match e {
        BuildStreamError::DeviceNotAvailable => CaptureError::NoInputDevice,
        other => {
            let message = other.to_string();
            if message.to_lowercase().contains("permission") {
                CaptureError::PermissionDenied
            } else {
                CaptureError::Stream(message)
            }
        }
    }
}

fn open_input_stream(raw_tx: std::sync::mpsc::Sender<Vec<f32>>) -> Result<(Stream, u32), CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(CaptureError::NoInputDevice)?;
    let config = device
        .default_input_config()
        .map_err(|e| CaptureError::Stream(e.to_string()))?;

    let channels = config.channels();
    let device_rate = config.sample_rate().0;
    let stream = build_input_stream(&device, &config, channels, raw_tx)?;
    stream.play().map_err(|e| CaptureError::Stream(e.to_string()))?;

    debug!(device_rate, channels, "Microphone opened");
    Ok((stream, device_rate))
}

fn build_input_stream(
    device: &Device,
    config: &cpal::SupportedStreamConfig,
    channels: u16,
    raw_tx: std::sync::mpsc::Sender<Vec<f32>>,
) -> Result<Stream, CaptureError> {
    let stream_config: StreamConfig = config.clone().into();
    let err_fn = |err: cpal::StreamError| {
        error!(%err, "Audio input stream error");
    };

    let stream = match config.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = raw_tx.send(downmix(data, channels));
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let float_data: Vec<f32> = data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                let _ = raw_tx.send(downmix(&float_data, channels));
            },
            err_fn,
            None,
        ),
        SampleFormat::I32 => device.build_input_stream(
            &stream_config,
            move |data: &[i32], _: &cpal::InputCallbackInfo| {
                let float_data: Vec<f32> =
                    data.iter().map(|&s| s as f32 / 2_147_483_648.0).collect();
                let _ = raw_tx.send(downmix(&float_data, channels));
            },
            err_fn,
            None,
        ),
        other => {
            return Err(CaptureError::UnsupportedFormat(format!("{other:?}")));
        }
    };

    stream.map_err(map_build_error)
}

fn run_microphone(
    target_rate: u32,
    chunk_tx: mpsc::Sender<Vec<f32>>,
    ready_tx: oneshot::Sender<Result<(), CaptureError>>,
    stop: Arc<AtomicBool>,
) {
    let (raw_tx, raw_rx) = std::sync::mpsc::channel::<Vec<f32>>();

    let (stream, device_rate) = match open_input_stream(raw_tx) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let mut converter = match RateConverter::new(device_rate, target_rate) {
        Ok(converter) => converter,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    while !stop.load(Ordering::SeqCst) {
        let raw = match raw_rx.recv_timeout(THREAD_POLL) {
            Ok(raw) => raw,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        let converted = match converter.push(&raw) {
            Ok(converted) => converted,
            Err(e) => {
                warn!("Dropping microphone chunk: {}", e);
                continue;
            }
        };
        if converted.is_empty() {
            continue;
        }
        match chunk_tx.try_send(converted) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Capture pipeline is behind, dropping microphone chunk");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }

    drop(stream);
    debug!("Microphone released");
}

/// Average interleaved channels into mono.
fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Streaming sample-rate conversion of the microphone feed.
enum RateConverter {
    Passthrough,
    Fft {
        resampler: FftFixedIn<f32>,
        pending: Vec<f32>,
    },
}

impl RateConverter {
    fn new(from: u32, to: u32) -> Result<Self, CaptureError> {
        if from == to {
            return Ok(Self::Passthrough);
        }
        let resampler = FftFixedIn::<f32>::new(from as usize, to as usize, RESAMPLE_CHUNK, 2, 1)
            .map_err(|e| CaptureError::UnsupportedFormat(e.to_string()))?;
        Ok(Self::Fft {
            resampler,
            pending: Vec::with_capacity(RESAMPLE_CHUNK * 2),
        })
    }

    fn push(&mut self, samples: &[f32]) -> Result<Vec<f32>, CaptureError> {
        match self {
            Self::Passthrough => Ok(samples.to_vec()),
            Self::Fft { resampler, pending } => {
                pending.extend_from_slice(samples);
                let mut output = Vec::new();
                while pending.len() >= RESAMPLE_CHUNK {
                    let rest = pending.split_off(RESAMPLE_CHUNK);
                    let chunk = std::mem::replace(pending, rest);
                    let result = resampler
                        .process(&[&chunk], None)
                        .map_err(|e| CaptureError::Stream(e.to_string()))?;
                    if let Some(channel) = result.first() {
                        output.extend_from_slice(channel);
                    }
                }
                Ok(output)
            }
        }
    }
}

// =============================================================================
// Output
// =============================================================================

struct Voice {
    start_frame: u64,
    samples: Vec<f32>,
    position: usize,
    stopped: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

#[derive(Default)]
struct Mixer {
    voices: Vec<Voice>,
}

impl Mixer {
    /// Render `frames` mono frames beginning at absolute frame `first`.
    fn render(&mut self, first: u64, frames: usize, out: &mut Vec<f32>) {
        out.clear();
        out.resize(frames, 0.0);

        self.voices.retain(|voice| !voice.stopped.load(Ordering::Relaxed));
        for voice in &mut self.voices {
            for (offset, slot) in out.iter_mut().enumerate() {
                let frame = first + offset as u64;
                if frame < voice.start_frame || voice.position >= voice.samples.len() {
                    continue;
                }
                *slot += voice.samples[voice.position];
                voice.position += 1;
            }
        }
        self.voices.retain(|voice| {
            let done = voice.position >= voice.samples.len();
            if done {
                voice.finished.store(true, Ordering::SeqCst);
            }
            !done
        });
        for slot in out.iter_mut() {
            *slot = slot.clamp(-1.0, 1.0);
        }
    }
}

fn run_speaker(
    mixer: Arc<Mutex<Mixer>>,
    frames_played: Arc<AtomicU64>,
    ready_tx: oneshot::Sender<Result<u32, PlaybackError>>,
    closed: Arc<AtomicBool>,
) {
    let stream = match open_output_stream(mixer.clone(), frames_played) {
        Ok((stream, rate)) => {
            let _ = ready_tx.send(Ok(rate));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    while !closed.load(Ordering::SeqCst) {
        thread::sleep(THREAD_POLL);
    }

    drop(stream);
    mixer.lock().voices.clear();
    debug!("Speaker released");
}

fn open_output_stream(
    mixer: Arc<Mutex<Mixer>>,
    frames_played: Arc<AtomicU64>,
) -> Result<(Stream, u32), PlaybackError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(PlaybackError::NoOutputDevice)?;
    let config = device
        .default_output_config()
        .map_err(|e| PlaybackError::Device(e.to_string()))?;

    let channels = config.channels().max(1) as usize;
    let device_rate = config.sample_rate().0;
    let stream_config: StreamConfig = config.clone().into();
    let err_fn = |err: cpal::StreamError| {
        error!(%err, "Audio output stream error");
    };

    let stream = match config.sample_format() {
        SampleFormat::F32 => {
            let mut mono = Vec::new();
            device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    let first = frames_played.load(Ordering::SeqCst);
                    mixer.lock().render(first, frames, &mut mono);
                    for (frame, sample) in data.chunks_mut(channels).zip(mono.iter()) {
                        frame.fill(*sample);
                    }
                    frames_played.fetch_add(frames as u64, Ordering::SeqCst);
                },
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let mut mono = Vec::new();
            device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    let first = frames_played.load(Ordering::SeqCst);
                    mixer.lock().render(first, frames, &mut mono);
                    for (frame, sample) in data.chunks_mut(channels).zip(mono.iter()) {
                        frame.fill(super::codec::sample_to_pcm16(*sample));
                    }
                    frames_played.fetch_add(frames as u64, Ordering::SeqCst);
                },
                err_fn,
                None,
            )
        }
        other => {
            return Err(PlaybackError::Device(format!(
                "Unsupported sample format: {other:?}"
            )));
        }
    }
    .map_err(|e| PlaybackError::Device(e.to_string()))?;

    stream
        .play()
        .map_err(|e| PlaybackError::Device(e.to_string()))?;

    debug!(device_rate, channels, "Speaker opened");
    Ok((stream, device_rate))
}

/// End of the most recently placed chunk on the device timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Placement {
    end_time: f64,
    end_frame: u64,
}

/// Frame span of a chunk scheduled at `at` seconds for `duration` seconds.
///
/// Frames are derived from the chunk's end time, not its sample count, so
/// rounding never accumulates. A chunk starting where the previous one ended
/// continues from that exact frame.
fn place(previous: Option<Placement>, at: f64, duration: f64, rate: u32) -> (u64, usize, Placement) {
    let rate = rate as f64;
    let at = at.max(0.0);
    let start_frame = match previous {
        Some(p) if ((p.end_time - at) * rate).abs() < 0.5 => p.end_frame,
        _ => (at * rate).round() as u64,
    };
    let end_time = at + duration.max(0.0);
    let end_frame = ((end_time * rate).round() as u64).max(start_frame);
    let placement = Placement {
        end_time,
        end_frame,
    };
    (start_frame, (end_frame - start_frame) as usize, placement)
}

/// Linear interpolation of `samples` onto exactly `out_len` frames.
fn resample_linear(samples: &[f32], out_len: usize) -> Vec<f32> {
    if samples.is_empty() || out_len == 0 {
        return Vec::new();
    }
    if out_len == samples.len() {
        return samples.to_vec();
    }
    let ratio = samples.len() as f64 / out_len as f64;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let index = pos.floor() as usize;
            let frac = (pos - index as f64) as f32;
            let a = samples[index.min(samples.len() - 1)];
            let b = samples[(index + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

struct CpalOutput {
    mixer: Arc<Mutex<Mixer>>,
    frames_played: Arc<AtomicU64>,
    device_rate: u32,
    closed: Arc<AtomicBool>,
    last_placement: Mutex<Option<Placement>>,
}

struct CpalPlayback {
    stopped: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl PlaybackHandle for CpalPlayback {
    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl AudioOutput for CpalOutput {
    fn now(&self) -> f64 {
        self.frames_played.load(Ordering::SeqCst) as f64 / self.device_rate as f64
    }

    fn sample_rate(&self) -> u32 {
        self.device_rate
    }

    fn start_at(
        &self,
        buffer: PlaybackBuffer,
        at: f64,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PlaybackError::OutputClosed);
        }

        let (start_frame, frames) = {
            let mut last = self.last_placement.lock();
            let (start_frame, frames, placement) =
                place(*last, at, buffer.duration(), self.device_rate);
            *last = Some(placement);
            (start_frame, frames)
        };

        let stopped = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let voice = Voice {
            start_frame,
            samples: resample_linear(&buffer.samples, frames),
            position: 0,
            stopped: stopped.clone(),
            finished: finished.clone(),
        };
        self.mixer.lock().voices.push(voice);

        Ok(Box::new(CpalPlayback { stopped, finished }))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
