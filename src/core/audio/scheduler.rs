//! Gapless playback scheduling against the output clock.
//!
//! Each decoded chunk starts exactly where the previous one ends. When the
//! cursor has fallen behind the output clock (the output drained, or nothing
//! has been queued yet) it snaps forward to "now" before the chunk starts.
//! An interruption stops every live chunk and resets the cursor so the next
//! chunk starts immediately.
//!
//! The scheduler is owned by a single task and is not shared; it needs no
//! locking.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::codec::duration_secs;

/// Errors raised by an audio output while starting playback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("No audio output device available")]
    NoOutputDevice,
    #[error("Audio output closed")]
    OutputClosed,
    #[error("Audio output error: {0}")]
    Device(String),
}

/// Decoded mono audio ready for scheduling.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PlaybackBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        duration_secs(self.samples.len(), self.sample_rate)
    }
}

/// Handle to one chunk started on an [`AudioOutput`].
pub trait PlaybackHandle: Send {
    /// Stop the chunk, whether it is pending or already audible.
    fn stop(&mut self);

    /// True once the chunk played to its end.
    fn is_finished(&self) -> bool;
}

/// Output device abstraction with its own monotonic clock.
///
/// Implementations release the underlying device when the last reference is
/// dropped or [`AudioOutput::close`] is called.
pub trait AudioOutput: Send + Sync {
    /// Current position of the output clock in seconds.
    fn now(&self) -> f64;

    /// Sample rate the output expects buffers in.
    fn sample_rate(&self) -> u32;

    /// Start `buffer` at clock time `at` (seconds).
    fn start_at(
        &self,
        buffer: PlaybackBuffer,
        at: f64,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError>;

    /// Release the device early. Further calls to `start_at` fail.
    fn close(&self) {}
}

/// Placement of a chunk on the output timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSlot {
    pub id: u64,
    pub start: f64,
    pub end: f64,
}

struct LivePlayback {
    slot: ScheduledSlot,
    handle: Box<dyn PlaybackHandle>,
}

/// Sequential scheduler for incoming speech chunks.
pub struct PlaybackScheduler {
    output: Arc<dyn AudioOutput>,
    cursor: f64,
    live: Vec<LivePlayback>,
    next_id: u64,
}

impl PlaybackScheduler {
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output,
            cursor: 0.0,
            live: Vec::new(),
            next_id: 0,
        }
    }

    /// Next free slot on the output timeline.
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Number of chunks that are queued or audible.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Schedule `buffer` right after everything already queued.
    pub fn enqueue(&mut self, buffer: PlaybackBuffer) -> Result<ScheduledSlot, PlaybackError> {
        self.reap_finished();

        let now = self.output.now();
        if self.cursor < now {
            self.cursor = now;
        }

        let start = self.cursor;
        let duration = buffer.duration();
        let handle = self.output.start_at(buffer, start)?;

        let slot = ScheduledSlot {
            id: self.next_id,
            start,
            end: start + duration,
        };
        self.next_id += 1;
        self.cursor += duration;
        self.live.push(LivePlayback { slot, handle });

        debug!(
            chunk_id = slot.id,
            start = slot.start,
            duration, "Scheduled playback chunk"
        );
        Ok(slot)
    }

    /// Remove every chunk whose handle reports completion.
    pub fn reap_finished(&mut self) -> usize {
        let before = self.live.len();
        self.live.retain(|entry| !entry.handle.is_finished());
        before - self.live.len()
    }

    /// Stop all live chunks and reset the cursor.
    ///
    /// Returns how many chunks were stopped.
    pub fn interrupt(&mut self) -> usize {
        let stopped = self.live.len();
        for mut entry in self.live.drain(..) {
            entry.handle.stop();
        }
        self.cursor = 0.0;

        if stopped > 0 {
            debug!(stopped, "Playback interrupted");
        }
        stopped
    }

    /// Stop playback and release the output device.
    pub fn shutdown(&mut self) {
        let stopped = self.interrupt();
        if stopped > 0 {
            warn!(stopped, "Discarded queued speech during shutdown");
        }
        self.output.close();
    }
}

impl std::fmt::Debug for PlaybackScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackScheduler")
            .field("cursor", &self.cursor)
            .field("live", &self.live.len())
            .finish()
    }
}
