//! Gemini Live Mock Server
//!
//! Accepts WebSocket connections on a random local port, reads the setup
//! message and answers it according to [`SetupBehavior`]. Every accepted
//! connection is handed to the test as a [`MockLiveSession`], which sees the
//! client's JSON messages and can push server frames back.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use super::MockStats;

const WAIT: Duration = Duration::from_secs(3);

/// How the server answers the setup message
#[derive(Debug, Clone, PartialEq)]
pub enum SetupBehavior {
    /// Reply with `{"setupComplete": {}}`
    Acknowledge,
    /// Send these frames first, then acknowledge
    AcknowledgeAfter(Vec<Value>),
    /// Never answer
    Silent,
    /// Close the socket with this reason instead of answering
    Reject(String),
}

/// Frames the test asks the server to write
enum Outbound {
    Json(Value),
    Close(String),
}

/// One accepted client connection
pub struct MockLiveSession {
    /// Request URI including the `key` query parameter
    pub uri: String,
    /// The client's setup message
    pub setup: Value,
    received: mpsc::UnboundedReceiver<Value>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl MockLiveSession {
    /// Push a server message to the client.
    pub fn send(&self, message: Value) {
        let _ = self.outbound.send(Outbound::Json(message));
    }

    /// Close the socket with a reason.
    pub fn close(&self, reason: &str) {
        let _ = self.outbound.send(Outbound::Close(reason.to_string()));
    }

    /// Next client message of any kind.
    pub async fn next_message(&mut self) -> Option<Value> {
        tokio::time::timeout(WAIT, self.received.recv())
            .await
            .expect("timed out waiting for a client message")
    }

    /// Next client message carrying `key` at the top level, skipping others.
    pub async fn next_with(&mut self, key: &str) -> Value {
        loop {
            let message = self
                .next_message()
                .await
                .unwrap_or_else(|| panic!("connection ended before a `{key}` message"));
            if message.get(key).is_some() {
                return message;
            }
        }
    }

    /// Resolves once the client closed the connection.
    pub async fn wait_closed(&mut self) {
        let drain = async { while self.received.recv().await.is_some() {} };
        tokio::time::timeout(WAIT, drain)
            .await
            .expect("client did not close the connection");
    }
}

/// Local Gemini Live endpoint
pub struct GeminiLiveMock {
    pub url: String,
    pub stats: Arc<MockStats>,
    sessions: mpsc::UnboundedReceiver<MockLiveSession>,
}

impl GeminiLiveMock {
    /// Bind to 127.0.0.1 on a random port and start accepting.
    pub async fn start(behavior: SetupBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let stats = Arc::new(MockStats::default());
        let (sessions_tx, sessions) = mpsc::unbounded_channel();

        let accept_stats = stats.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_stats.record_connection();
                tokio::spawn(handle_connection(
                    stream,
                    behavior.clone(),
                    accept_stats.clone(),
                    sessions_tx.clone(),
                ));
            }
        });

        Self {
            url: format!("ws://{addr}/ws/live"),
            stats,
            sessions,
        }
    }

    /// Next connection whose setup message has been read.
    pub async fn next_session(&mut self) -> MockLiveSession {
        tokio::time::timeout(WAIT, self.sessions.recv())
            .await
            .expect("no client connected")
            .expect("mock server stopped")
    }
}

fn close_message(reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: reason.to_string().into(),
    }))
}

fn text(value: &Value) -> Message {
    Message::Text(value.to_string().into())
}

fn parse(message: &Message) -> Option<Value> {
    match message {
        Message::Text(text) => serde_json::from_str(text.as_str()).ok(),
        Message::Binary(data) => serde_json::from_slice(data).ok(),
        _ => None,
    }
}

async fn handle_connection(
    stream: TcpStream,
    behavior: SetupBehavior,
    stats: Arc<MockStats>,
    sessions: mpsc::UnboundedSender<MockLiveSession>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut uri = String::new();
    let ws_stream = accept_hdr_async(
        stream,
        |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            uri = req.uri().to_string();
            Ok(resp)
        },
    )
    .await?;
    let (mut write, mut read) = ws_stream.split();

    // The first frame must be the setup message
    let setup = loop {
        match read.next().await {
            Some(Ok(message)) => {
                if let Some(value) = parse(&message) {
                    stats.record_received();
                    break value;
                }
            }
            _ => return Ok(()),
        }
    };

    match &behavior {
        SetupBehavior::Acknowledge => {
            write.send(text(&json!({"setupComplete": {}}))).await?;
        }
        SetupBehavior::AcknowledgeAfter(early) => {
            for frame in early {
                write.send(text(frame)).await?;
            }
            write.send(text(&json!({"setupComplete": {}}))).await?;
        }
        SetupBehavior::Silent => {}
        SetupBehavior::Reject(reason) => {
            write.send(close_message(reason)).await?;
            return Ok(());
        }
    }

    let (received_tx, received) = mpsc::unbounded_channel();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel();
    let _ = sessions.send(MockLiveSession {
        uri,
        setup,
        received,
        outbound,
    });

    loop {
        tokio::select! {
            incoming = read.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(message)) => {
                    if let Some(value) = parse(&message) {
                        stats.record_received();
                        let _ = received_tx.send(value);
                    }
                }
            },
            outgoing = outbound_rx.recv() => match outgoing {
                Some(Outbound::Json(value)) => {
                    write.send(text(&value)).await?;
                    stats.record_sent();
                }
                Some(Outbound::Close(reason)) => {
                    write.send(close_message(&reason)).await?;
                    break;
                }
                // test dropped the session; keep draining until the client leaves
                None => {
                    while let Some(Ok(message)) = read.next().await {
                        if matches!(message, Message::Close(_)) {
                            break;
                        }
                    }
                    break;
                }
            },
        }
    }

    Ok(())
}
