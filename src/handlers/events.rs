//! Voice event stream
//!
//! `GET /voice/events` upgrades to a WebSocket that pushes JSON events to the
//! UI: session status changes, microphone level, filter changes (with the
//! new match count) and grounding citations. The socket is send-only; any
//! client frame other than a close is ignored.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::core::listings::SearchFilters;
use crate::core::realtime::Citation;
use crate::core::session::SessionStatus;
use crate::state::AppState;

/// Event pushed to the UI.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoiceEvent {
    Status { status: SessionStatus },
    Volume { level: f32 },
    Filters { filters: SearchFilters, count: usize },
    Citations { citations: Vec<Citation> },
}

pub async fn voice_events_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_events_socket(socket, state))
}

async fn filters_event(state: &AppState, filters: SearchFilters) -> VoiceEvent {
    let count = match state.listings.search(&filters).await {
        Ok(listings) => listings.len(),
        Err(e) => {
            warn!("Listing refresh failed: {}", e);
            0
        }
    };
    VoiceEvent::Filters { filters, count }
}

async fn send_event(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    event: &VoiceEvent,
) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize voice event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_events_socket(socket: WebSocket, state: Arc<AppState>) {
    info!("Voice event stream connected");

    let (mut sender, mut receiver) = socket.split();
    let mut status_rx = state.voice.subscribe_status();
    let mut volume_rx = state.voice.subscribe_volume();
    let mut citations_rx = state.voice.subscribe_citations();
    let mut filters_rx = state.filters.subscribe();

    // current snapshot first
    let status = status_rx.borrow_and_update().clone();
    let citations = citations_rx.borrow_and_update().clone();
    let initial = [
        VoiceEvent::Status { status },
        filters_event(&state, state.filters.snapshot()).await,
        VoiceEvent::Citations { citations },
    ];
    for event in &initial {
        if !send_event(&mut sender, event).await {
            return;
        }
    }

    loop {
        let event = tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = status_rx.borrow_and_update().clone();
                VoiceEvent::Status { status }
            }
            changed = volume_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let level = *volume_rx.borrow_and_update();
                VoiceEvent::Volume { level }
            }
            changed = citations_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let citations = citations_rx.borrow_and_update().clone();
                VoiceEvent::Citations { citations }
            }
            filters = filters_rx.recv() => match filters {
                Ok(filters) => filters_event(&state, filters).await,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event stream lagged behind filter changes");
                    filters_event(&state, state.filters.snapshot()).await
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            },
        };

        if !send_event(&mut sender, &event).await {
            break;
        }
    }

    info!("Voice event stream closed");
}
