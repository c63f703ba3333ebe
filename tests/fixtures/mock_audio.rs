//! Fake audio devices
//!
//! [`FakeOutput`] records every started chunk and exposes a clock the test
//! moves by hand. [`FakeAudio`] hands out microphones backed by channels the
//! test feeds, and tracks whether each one was released.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use homie_voice::core::audio::{
    AudioBackend, AudioOutput, CaptureError, MicrophoneStream, PlaybackBuffer, PlaybackError,
    PlaybackHandle,
};

/// One chunk started on the fake output
#[derive(Clone)]
pub struct StartedChunk {
    pub at: f64,
    pub duration: f64,
    pub stopped: Arc<AtomicBool>,
    pub finished: Arc<AtomicBool>,
}

impl StartedChunk {
    pub fn end(&self) -> f64 {
        self.at + self.duration
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

struct FakeHandle {
    stopped: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl PlaybackHandle for FakeHandle {
    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// Output device with a manual clock
#[derive(Default)]
pub struct FakeOutput {
    now: Mutex<f64>,
    started: Mutex<Vec<StartedChunk>>,
    closed: AtomicBool,
}

impl FakeOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_now(&self, now: f64) {
        *self.now.lock() = now;
    }

    /// Move the clock forward and mark chunks that ended by then as finished
    pub fn advance(&self, seconds: f64) {
        let now = {
            let mut guard = self.now.lock();
            *guard += seconds;
            *guard
        };
        for chunk in self.started.lock().iter() {
            if chunk.end() <= now && !chunk.is_stopped() {
                chunk.finished.store(true, Ordering::SeqCst);
            }
        }
    }

    pub fn started(&self) -> Vec<StartedChunk> {
        self.started.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl AudioOutput for FakeOutput {
    fn now(&self) -> f64 {
        *self.now.lock()
    }

    fn sample_rate(&self) -> u32 {
        24_000
    }

    fn start_at(
        &self,
        buffer: PlaybackBuffer,
        at: f64,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        if self.is_closed() {
            return Err(PlaybackError::OutputClosed);
        }
        let stopped = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        self.started.lock().push(StartedChunk {
            at,
            duration: buffer.duration(),
            stopped: stopped.clone(),
            finished: finished.clone(),
        });
        Ok(Box::new(FakeHandle { stopped, finished }))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Sets its flag when the microphone guard is dropped
struct ReleaseFlag(Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Audio backend handing out fake devices
///
/// Every `open_output` creates a fresh [`FakeOutput`], so a closed output of
/// an earlier session never leaks into the next one.
#[derive(Default)]
pub struct FakeAudio {
    outputs: Mutex<Vec<Arc<FakeOutput>>>,
    microphones: Mutex<Vec<(mpsc::Sender<Vec<f32>>, Arc<AtomicBool>)>>,
    deny_microphone: AtomicBool,
}

impl FakeAudio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next microphone requests fail with a permission error
    pub fn deny_microphone(&self) {
        self.deny_microphone.store(true, Ordering::SeqCst);
    }

    /// Feed for the most recently opened microphone
    pub fn last_microphone(&self) -> Option<mpsc::Sender<Vec<f32>>> {
        self.microphones.lock().last().map(|(tx, _)| tx.clone())
    }

    pub fn microphones_opened(&self) -> usize {
        self.microphones.lock().len()
    }

    /// Microphones acquired and not yet released
    pub fn live_microphones(&self) -> usize {
        self.microphones
            .lock()
            .iter()
            .filter(|(_, released)| !released.load(Ordering::SeqCst))
            .count()
    }

    pub fn outputs_opened(&self) -> usize {
        self.outputs.lock().len()
    }

    /// Output of the most recent session
    pub fn last_output(&self) -> Option<Arc<FakeOutput>> {
        self.outputs.lock().last().cloned()
    }
}

#[async_trait]
impl AudioBackend for FakeAudio {
    async fn open_microphone(&self, _sample_rate: u32) -> Result<MicrophoneStream, CaptureError> {
        if self.deny_microphone.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied);
        }
        let (tx, rx) = mpsc::channel(64);
        let released = Arc::new(AtomicBool::new(false));
        self.microphones.lock().push((tx, released.clone()));
        Ok(MicrophoneStream::new(rx, Box::new(ReleaseFlag(released))))
    }

    async fn open_output(&self) -> Result<Arc<dyn AudioOutput>, PlaybackError> {
        let output = FakeOutput::new();
        self.outputs.lock().push(output.clone());
        Ok(output)
    }
}
