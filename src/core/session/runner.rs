//! Message loop of one running session.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::SessionStatus;
use super::controller::Shared;
use crate::core::audio::{
    CapturePipeline, PLAYBACK_SAMPLE_RATE, PlaybackBuffer, PlaybackScheduler, decode_incoming,
};
use crate::core::realtime::{
    AudioChunk, Citation, ClientMessage, RealtimeConnection, ServerMessage, TransportEvent,
};
use crate::core::tools::ToolDispatcher;
use crate::errors::VoiceError;

/// Why the message loop stopped.
#[derive(Debug)]
enum SessionEnd {
    Stopped,
    RemoteClosed(Option<String>),
    Failed(String),
}

/// Everything one session owns. Dropped as a unit at teardown.
pub(super) struct SessionContext {
    pub id: Uuid,
    pub connection: RealtimeConnection,
    pub capture: CapturePipeline,
    pub scheduler: PlaybackScheduler,
    pub dispatcher: ToolDispatcher,
    pub shared: Arc<Shared>,
}

/// Sample rate carried in a `audio/pcm;rate=N` MIME type.
pub(super) fn mime_sample_rate(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.trim().parse().ok())
}

/// Drive the session until it is cancelled or the connection ends, then
/// release every resource it holds.
pub(super) async fn run_session(mut ctx: SessionContext, cancel: CancellationToken) {
    let end = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break SessionEnd::Stopped,
            event = ctx.connection.incoming.recv() => match event {
                Some(TransportEvent::Message(message)) => ctx.on_message(message).await,
                Some(TransportEvent::Closed { reason }) => break SessionEnd::RemoteClosed(reason),
                Some(TransportEvent::Failed(e)) => break SessionEnd::Failed(e.to_string()),
                None => break SessionEnd::RemoteClosed(None),
            },
        }
    };

    ctx.teardown(end).await;
}

impl SessionContext {
    async fn on_message(&mut self, message: ServerMessage) {
        if !message.tool_calls.is_empty() {
            self.answer_tool_calls(&message).await;
        }

        if !message.cancelled_tool_calls.is_empty() {
            // calls run to completion before the next message is read
            debug!(
                session_id = %self.id,
                ids = ?message.cancelled_tool_calls,
                "Model cancelled tool calls that already completed"
            );
        }

        for chunk in &message.audio {
            self.play(chunk);
        }

        if message.interrupted {
            let stopped = self.scheduler.interrupt();
            info!(session_id = %self.id, stopped, "User interrupted the model");
        }

        if !message.citations.is_empty() {
            self.record_citations(message.citations);
        }

        for text in &message.text {
            debug!(session_id = %self.id, text = %text, "Model text");
        }

        if message.turn_complete {
            debug!(session_id = %self.id, "Model turn complete");
        }

        if let Some(time_left) = message.go_away {
            warn!(session_id = %self.id, time_left = %time_left, "Server is about to close the session");
        }
    }

    async fn answer_tool_calls(&mut self, message: &ServerMessage) {
        let responses = self.dispatcher.handle_batch(&message.tool_calls).await;
        debug!(
            session_id = %self.id,
            calls = message.tool_calls.len(),
            responses = responses.len(),
            "Tool calls dispatched"
        );
        if responses.is_empty() {
            return;
        }

        if self
            .connection
            .outgoing
            .send(ClientMessage::ToolResponses(responses))
            .await
            .is_err()
        {
            warn!(session_id = %self.id, "Transport closed before tool responses were sent");
        }
    }

    fn play(&mut self, chunk: &AudioChunk) {
        let samples = match decode_incoming(&chunk.data) {
            Ok(samples) => samples,
            Err(e) => {
                let err = VoiceError::from(e);
                warn!(session_id = %self.id, bytes = chunk.data.len(), "Dropping audio chunk: {}", err);
                return;
            }
        };
        if samples.is_empty() {
            return;
        }

        let sample_rate = chunk
            .mime_type
            .as_deref()
            .and_then(mime_sample_rate)
            .unwrap_or(PLAYBACK_SAMPLE_RATE);

        if let Err(e) = self
            .scheduler
            .enqueue(PlaybackBuffer::new(samples, sample_rate))
        {
            warn!(session_id = %self.id, "Failed to schedule playback: {}", e);
        }
    }

    fn record_citations(&self, citations: Vec<Citation>) {
        self.shared.citations.send_if_modified(|known| {
            let before = known.len();
            for citation in citations {
                if !known.iter().any(|c| c.uri == citation.uri) {
                    known.push(citation);
                }
            }
            known.len() != before
        });
    }

    /// Stop capture, silence playback and close the connection.
    pub(super) async fn release(mut self) {
        self.capture.stop().await;
        self.scheduler.shutdown();
        self.connection.close().await;
    }

    async fn teardown(self, end: SessionEnd) {
        let id = self.id;
        let shared = self.shared.clone();
        shared.detach_outgoing();
        shared.clear_session_id(id);
        self.release().await;
        shared.volume.send_replace(0.0);

        match end {
            SessionEnd::Stopped => info!(session_id = %id, "Voice session stopped"),
            SessionEnd::RemoteClosed(reason) => {
                info!(session_id = %id, reason = ?reason, "Voice session closed by the model");
                shared.set_status(SessionStatus::Ended);
            }
            SessionEnd::Failed(detail) => {
                let err = VoiceError::ConnectionLost(detail);
                tracing::error!(session_id = %id, "Voice session failed: {}", err);
                shared.set_status(SessionStatus::Error(err.user_message().to_string()));
            }
        }
    }
}
