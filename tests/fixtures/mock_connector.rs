//! Channel-backed realtime connector
//!
//! Each successful `connect` hands the far ends of the connection channels
//! to the test, which then plays the model: it pushes [`TransportEvent`]s
//! and reads the [`ClientMessage`]s the session sends.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use homie_voice::core::realtime::{
    ClientMessage, RealtimeConnection, RealtimeConnector, RealtimeError, RealtimeResult,
    ServerMessage, SessionSetup, ToolResponse, TransportEvent,
};

/// Model side of one connection
pub struct ModelSide {
    pub setup: SessionSetup,
    pub from_client: mpsc::Receiver<ClientMessage>,
    pub to_client: mpsc::Sender<TransportEvent>,
}

impl ModelSide {
    pub async fn send(&self, message: ServerMessage) {
        self.to_client
            .send(TransportEvent::Message(message))
            .await
            .expect("session dropped its receiver");
    }

    /// Next message other than microphone audio
    pub async fn next_control(&mut self) -> Option<ClientMessage> {
        let wait = async {
            while let Some(message) = self.from_client.recv().await {
                if !matches!(message, ClientMessage::Audio { .. }) {
                    return Some(message);
                }
            }
            None
        };
        tokio::time::timeout(Duration::from_secs(2), wait)
            .await
            .expect("timed out waiting for a client message")
    }

    /// Next batch of tool responses
    pub async fn next_tool_responses(&mut self) -> Vec<ToolResponse> {
        match self.next_control().await {
            Some(ClientMessage::ToolResponses(responses)) => responses,
            other => panic!("expected tool responses, got {other:?}"),
        }
    }

    /// Next microphone frame
    pub async fn next_audio(&mut self) -> (String, String) {
        let message = tokio::time::timeout(Duration::from_secs(2), self.from_client.recv())
            .await
            .expect("timed out waiting for audio");
        match message {
            Some(ClientMessage::Audio { mime_type, data }) => (mime_type, data),
            other => panic!("expected audio, got {other:?}"),
        }
    }

    /// True once the session closed its end of the connection
    pub fn is_closed_by_client(&self) -> bool {
        self.to_client.is_closed()
    }
}

/// Connector whose connections are driven by the test
pub struct MockConnector {
    sides: mpsc::UnboundedSender<ModelSide>,
    fail_with: Mutex<Option<RealtimeError>>,
    hang: AtomicBool,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ModelSide>) {
        let (sides, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            sides,
            fail_with: Mutex::new(None),
            hang: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        });
        (connector, rx)
    }

    /// Make every following connect attempt fail with `error`
    pub fn fail_with(&self, error: RealtimeError) {
        *self.fail_with.lock() = Some(error);
    }

    /// While set, connect attempts never complete
    pub fn hang_connects(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealtimeConnector for MockConnector {
    async fn connect(&self, setup: &SessionSetup) -> RealtimeResult<RealtimeConnection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(error) = self.fail_with.lock().clone() {
            return Err(error);
        }

        let (out_tx, out_rx) = mpsc::channel(256);
        let (in_tx, in_rx) = mpsc::channel(256);
        let _ = self.sides.send(ModelSide {
            setup: setup.clone(),
            from_client: out_rx,
            to_client: in_tx,
        });
        Ok(RealtimeConnection::new(out_tx, in_rx, None))
    }
}
