//! Gemini Live API client implementation.
//!
//! This module provides [`GeminiLiveConnector`], which implements
//! [`RealtimeConnector`] on top of the Gemini Live bidirectional WebSocket.
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/...BidiGenerateContent?key=<key>`
//! - Protocol: WebSocket with JSON messages (text or binary frames)
//! - Audio in: PCM 16-bit, 16kHz, mono, little-endian, base64 encoded
//! - Audio out: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded
//!
//! The connector sends the setup message first and only hands out the
//! connection after the server answered with `setupComplete`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::config::{GEMINI_LIVE_URL, live_url};
use super::messages::{LiveClientMessage, LiveServerMessage};
use crate::core::realtime::base::{
    ClientMessage, RealtimeConnection, RealtimeConnector, RealtimeError, RealtimeResult,
    ServerMessage, SessionSetup, TransportEvent,
};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for events towards the session.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default bound on connection establishment.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Opens Gemini Live sessions.
pub struct GeminiLiveConnector {
    api_key: String,
    base_url: String,
    connect_timeout: Duration,
}

impl GeminiLiveConnector {
    /// Create a connector for the public endpoint.
    pub fn new(api_key: impl Into<String>) -> RealtimeResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }
        Ok(Self {
            api_key,
            base_url: GEMINI_LIVE_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    /// Point the connector at another endpoint (used against local servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    async fn open(&self, setup: &SessionSetup) -> RealtimeResult<RealtimeConnection> {
        let url = live_url(&self.base_url, &self.api_key)?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
        debug!(base_url = %self.base_url, "WebSocket connected, sending setup");

        let (mut ws_sink, mut ws_source) = ws_stream.split();

        let setup_json = serde_json::to_string(&LiveClientMessage::setup(setup))
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        ws_sink
            .send(Message::Text(setup_json.into()))
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;

        let early = wait_for_setup_complete(&mut ws_sink, &mut ws_source).await?;
        info!(model = %setup.model, "Connected to Gemini Live API");

        let (outgoing_tx, outgoing_rx) = mpsc::channel::<ClientMessage>(WS_CHANNEL_CAPACITY);
        let (incoming_tx, incoming_rx) = mpsc::channel::<TransportEvent>(EVENT_CHANNEL_CAPACITY);

        for message in early {
            let _ = incoming_tx.try_send(TransportEvent::Message(message));
        }

        let task = tokio::spawn(run_transport(ws_sink, ws_source, outgoing_rx, incoming_tx));

        Ok(RealtimeConnection::new(outgoing_tx, incoming_rx, Some(task)))
    }
}

impl Drop for GeminiLiveConnector {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.api_key.zeroize();
    }
}

impl std::fmt::Debug for GeminiLiveConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiLiveConnector")
            .field("base_url", &self.base_url)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RealtimeConnector for GeminiLiveConnector {
    async fn connect(&self, setup: &SessionSetup) -> RealtimeResult<RealtimeConnection> {
        match tokio::time::timeout(self.connect_timeout, self.open(setup)).await {
            Ok(result) => result,
            Err(_) => Err(RealtimeError::Timeout(format!(
                "no setup acknowledgement within {}ms",
                self.connect_timeout.as_millis()
            ))),
        }
    }
}

/// Decode one JSON frame.
fn parse_frame(bytes: &[u8]) -> RealtimeResult<ServerMessage> {
    serde_json::from_slice::<LiveServerMessage>(bytes)
        .map(LiveServerMessage::into_server_message)
        .map_err(|e| RealtimeError::SerializationError(e.to_string()))
}

/// Read until `setupComplete`, keeping any content that arrived first.
async fn wait_for_setup_complete(
    sink: &mut WsSink,
    source: &mut WsSource,
) -> RealtimeResult<Vec<ServerMessage>> {
    let mut early = Vec::new();

    loop {
        let frame = match source.next().await {
            Some(Ok(Message::Text(text))) => parse_frame(text.as_bytes()),
            Some(Ok(Message::Binary(data))) => parse_frame(&data),
            Some(Ok(Message::Ping(data))) => {
                let _ = sink.send(Message::Pong(data)).await;
                continue;
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| f.reason.as_str().to_string())
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "no reason given".to_string());
                return Err(RealtimeError::ConnectionFailed(format!(
                    "server closed the connection during setup: {reason}"
                )));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(RealtimeError::WebSocketError(e.to_string())),
            None => {
                return Err(RealtimeError::ConnectionFailed(
                    "connection ended during setup".to_string(),
                ));
            }
        };

        match frame {
            Ok(message) if message.setup_complete => return Ok(early),
            Ok(message) => early.push(message),
            Err(e) => warn!("Ignoring unparseable frame during setup: {}", e),
        }
    }
}

fn to_wire(message: ClientMessage) -> Option<LiveClientMessage> {
    match message {
        ClientMessage::Audio { mime_type, data } => {
            Some(LiveClientMessage::audio(mime_type, data))
        }
        ClientMessage::ToolResponses(responses) => {
            Some(LiveClientMessage::tool_responses(responses))
        }
        ClientMessage::Close => None,
    }
}

/// Pump messages between the session channels and the socket.
async fn run_transport(
    mut ws_sink: WsSink,
    mut ws_source: WsSource,
    mut outgoing_rx: mpsc::Receiver<ClientMessage>,
    incoming_tx: mpsc::Sender<TransportEvent>,
) {
    loop {
        tokio::select! {
            outgoing = outgoing_rx.recv() => {
                let Some(wire) = outgoing.and_then(to_wire) else {
                    debug!("Closing Gemini Live connection");
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                };

                let json = match serde_json::to_string(&wire) {
                    Ok(j) => j,
                    Err(e) => {
                        error!("Failed to serialize client message: {}", e);
                        continue;
                    }
                };

                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                    error!("Failed to send WebSocket message: {}", e);
                    let _ = incoming_tx
                        .send(TransportEvent::Failed(RealtimeError::WebSocketError(e.to_string())))
                        .await;
                    break;
                }
            }

            incoming = ws_source.next() => {
                let parsed = match incoming {
                    Some(Ok(Message::Text(text))) => parse_frame(text.as_bytes()),
                    Some(Ok(Message::Binary(data))) => parse_frame(&data),
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                            error!("Failed to send pong: {}", e);
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map(|f| f.reason.as_str().to_string()).filter(|r| !r.is_empty());
                        info!(reason = ?reason, "WebSocket closed by server");
                        let _ = incoming_tx.send(TransportEvent::Closed { reason }).await;
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        let _ = incoming_tx
                            .send(TransportEvent::Failed(RealtimeError::WebSocketError(e.to_string())))
                            .await;
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended");
                        let _ = incoming_tx.send(TransportEvent::Closed { reason: None }).await;
                        break;
                    }
                };

                match parsed {
                    Ok(message) if message.is_empty() => {}
                    Ok(message) => {
                        if incoming_tx.send(TransportEvent::Message(message)).await.is_err() {
                            debug!("Session dropped its receiver, stopping transport");
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to parse server message: {}", e),
                }
            }
        }
    }
}
