use std::sync::Arc;

use parking_lot::{Mutex as SyncMutex, RwLock};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::runner::{SessionContext, run_session};
use super::{SessionConfig, SessionStatus};
use crate::core::audio::{
    AudioBackend, CAPTURE_SAMPLE_RATE, CapturePipeline, EncodedFrame, FrameSink, PlaybackScheduler,
};
use crate::core::realtime::{Citation, ClientMessage, RealtimeConnector, SessionSetup};
use crate::core::tools::{ToolDispatcher, declarations};
use crate::errors::{VoiceError, VoiceResult};

/// State shared between the controller, its session task and the capture
/// pipeline.
pub(super) struct Shared {
    pub status: watch::Sender<SessionStatus>,
    pub volume: watch::Sender<f32>,
    pub citations: watch::Sender<Vec<Citation>>,
    outgoing: RwLock<Option<mpsc::Sender<ClientMessage>>>,
    session_id: RwLock<Option<Uuid>>,
}

impl Shared {
    pub fn set_status(&self, status: SessionStatus) {
        let previous = self.status.send_replace(status.clone());
        if previous != status {
            info!(from = %previous, to = %status, "Voice session state changed");
        }
    }

    fn attach_outgoing(&self, sender: mpsc::Sender<ClientMessage>) {
        *self.outgoing.write() = Some(sender);
    }

    pub fn detach_outgoing(&self) {
        self.outgoing.write().take();
    }

    /// Forget `id` unless a newer session has already replaced it.
    pub fn clear_session_id(&self, id: Uuid) {
        let mut current = self.session_id.write();
        if *current == Some(id) {
            current.take();
        }
    }

    fn send_frame(&self, frame: EncodedFrame) {
        let guard = self.outgoing.read();
        let Some(sender) = guard.as_ref() else {
            return;
        };

        let message = ClientMessage::Audio {
            mime_type: frame.mime_type,
            data: frame.data,
        };
        if let Err(e) = sender.try_send(message) {
            match e {
                mpsc::error::TrySendError::Full(_) => warn!("Outgoing queue full, dropping frame"),
                mpsc::error::TrySendError::Closed(_) => debug!("Connection closed, dropping frame"),
            }
        }
    }
}

/// Capture sink that hands frames to the controller's send path.
struct FrameForwarder(Arc<Shared>);

impl FrameSink for FrameForwarder {
    fn send_frame(&self, frame: EncodedFrame) {
        self.0.send_frame(frame);
    }
}

struct ActiveSession {
    id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// A start that has not installed its session yet.
struct PendingStart {
    id: Uuid,
    cancel: CancellationToken,
}

/// Devices and connection of a session that is ready to run.
struct OpenedSession {
    id: Uuid,
    model: String,
    ctx: SessionContext,
}

/// Owner of the single voice session.
///
/// `start` replaces any running session, `stop` is idempotent and
/// `send_frame` never blocks. Observers follow the session through the
/// status, volume and citation watches.
///
/// Connecting happens outside the session lock: a pending start never
/// blocks `status`, `session_id` or `stop`, and `stop` (or a newer `start`)
/// aborts it.
pub struct SessionController {
    connector: Option<Arc<dyn RealtimeConnector>>,
    audio: Arc<dyn AudioBackend>,
    dispatcher: ToolDispatcher,
    shared: Arc<Shared>,
    active: Mutex<Option<ActiveSession>>,
    pending: SyncMutex<Option<PendingStart>>,
}

impl SessionController {
    /// `connector` is `None` when no API key is configured; `start` then
    /// fails with [`VoiceError::MissingApiKey`].
    pub fn new(
        connector: Option<Arc<dyn RealtimeConnector>>,
        audio: Arc<dyn AudioBackend>,
        dispatcher: ToolDispatcher,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::Idle);
        let (volume, _) = watch::channel(0.0f32);
        let (citations, _) = watch::channel(Vec::new());

        Self {
            connector,
            audio,
            dispatcher,
            shared: Arc::new(Shared {
                status,
                volume,
                citations,
                outgoing: RwLock::new(None),
                session_id: RwLock::new(None),
            }),
            active: Mutex::new(None),
            pending: SyncMutex::new(None),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.shared.status.subscribe()
    }

    /// Microphone level, one update per capture block.
    pub fn subscribe_volume(&self) -> watch::Receiver<f32> {
        self.shared.volume.subscribe()
    }

    pub fn subscribe_citations(&self) -> watch::Receiver<Vec<Citation>> {
        self.shared.citations.subscribe()
    }

    /// Sources the model cited during the current session.
    pub fn citations(&self) -> Vec<Citation> {
        self.shared.citations.borrow().clone()
    }

    /// Id of the session currently held, if any.
    pub fn session_id(&self) -> Option<Uuid> {
        *self.shared.session_id.read()
    }

    /// Forward one encoded frame to the open connection.
    ///
    /// Frames are dropped silently while no session is connected.
    pub fn send_frame(&self, frame: EncodedFrame) {
        self.shared.send_frame(frame);
    }

    /// Open a new session, tearing down the current one first.
    ///
    /// Fails with [`VoiceError::Cancelled`] when `stop` or another `start`
    /// supersedes this one before it is running.
    pub async fn start(&self, config: SessionConfig) -> VoiceResult<Uuid> {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let superseded = self.pending.lock().replace(PendingStart {
            id,
            cancel: cancel.clone(),
        });
        if let Some(superseded) = superseded {
            debug!(session_id = %superseded.id, "Aborting pending voice session start");
            superseded.cancel.cancel();
        }

        {
            let mut active = self.active.lock().await;
            if let Some(previous) = active.take() {
                info!(session_id = %previous.id, "Replacing running voice session");
                self.shared.session_id.write().take();
                shutdown(previous).await;
            }
        }

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(VoiceError::Cancelled),
            result = self.open(id, config) => result,
        };

        let result = match opened {
            Ok(opened) => self.install(opened, &cancel).await,
            Err(err) => Err(err),
        };
        self.clear_pending(id);

        match result {
            Ok(()) => Ok(id),
            Err(err) if err == VoiceError::Cancelled || cancel.is_cancelled() => {
                info!(session_id = %id, "Voice session start cancelled");
                Err(VoiceError::Cancelled)
            }
            Err(err) => {
                warn!("Voice session failed to start: {}", err);
                self.shared
                    .set_status(SessionStatus::Error(err.user_message().to_string()));
                Err(err)
            }
        }
    }

    /// Stop the session and return to `Idle`. Safe to call at any time,
    /// including while a start is still connecting.
    pub async fn stop(&self) {
        if let Some(pending) = self.pending.lock().take() {
            debug!(session_id = %pending.id, "Cancelling pending voice session start");
            pending.cancel.cancel();
        }

        let mut active = self.active.lock().await;
        self.shared.session_id.write().take();
        if let Some(session) = active.take() {
            shutdown(session).await;
        }
        self.shared.set_status(SessionStatus::Idle);
    }

    fn clear_pending(&self, id: Uuid) {
        let mut pending = self.pending.lock();
        if pending.as_ref().is_some_and(|p| p.id == id) {
            pending.take();
        }
    }

    /// Acquire devices and connect. Runs without holding the session lock.
    async fn open(&self, id: Uuid, config: SessionConfig) -> VoiceResult<OpenedSession> {
        let connector = self.connector.clone().ok_or(VoiceError::MissingApiKey)?;
        if config.model.trim().is_empty() {
            return Err(VoiceError::Config("model is required".to_string()));
        }

        self.shared.set_status(SessionStatus::Connecting);

        // devices first so a denied microphone never opens a connection
        let output = self.audio.open_output().await?;
        let microphone = match self.audio.open_microphone(CAPTURE_SAMPLE_RATE).await {
            Ok(microphone) => microphone,
            Err(e) => {
                output.close();
                return Err(e.into());
            }
        };

        let setup = SessionSetup {
            model: config.model,
            voice: Some(config.voice.as_str().to_string()),
            system_instruction: config.persona,
            tools: declarations(),
            google_search: config.google_search,
        };
        let connection = match connector.connect(&setup).await {
            Ok(connection) => connection,
            Err(e) => {
                output.close();
                return Err(e.into());
            }
        };
        self.shared.set_status(SessionStatus::Connected);

        let capture = CapturePipeline::start(
            microphone,
            FrameForwarder(self.shared.clone()),
            self.shared.volume.clone(),
        );

        Ok(OpenedSession {
            id,
            model: setup.model,
            ctx: SessionContext {
                id,
                connection,
                capture,
                scheduler: PlaybackScheduler::new(output),
                dispatcher: self.dispatcher.clone(),
                shared: self.shared.clone(),
            },
        })
    }

    /// Make `opened` the running session unless the start was superseded
    /// while connecting.
    async fn install(&self, opened: OpenedSession, cancel: &CancellationToken) -> VoiceResult<()> {
        let OpenedSession { id, model, ctx } = opened;
        let mut active = self.active.lock().await;
        if cancel.is_cancelled() {
            // still under the lock, so a newer session cannot be attached yet
            ctx.release().await;
            return Err(VoiceError::Cancelled);
        }

        self.shared.citations.send_replace(Vec::new());
        self.shared.attach_outgoing(ctx.connection.outgoing.clone());
        *self.shared.session_id.write() = Some(id);

        // Active before the task runs, so an immediate remote close wins
        self.shared.set_status(SessionStatus::Active);
        let session_cancel = CancellationToken::new();
        let task = tokio::spawn(run_session(ctx, session_cancel.clone()));
        info!(session_id = %id, model = %model, "Voice session started");

        *active = Some(ActiveSession {
            id,
            cancel: session_cancel,
            task,
        });
        Ok(())
    }
}

async fn shutdown(session: ActiveSession) {
    session.cancel.cancel();
    if let Err(e) = session.task.await {
        warn!(session_id = %session.id, "Session task ended abnormally: {}", e);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.get_mut().take() {
            pending.cancel.cancel();
        }
        // the session task releases its devices once cancelled
        if let Ok(mut active) = self.active.try_lock() {
            if let Some(session) = active.take() {
                session.cancel.cancel();
            }
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("status", &self.status())
            .field("has_connector", &self.connector.is_some())
            .finish_non_exhaustive()
    }
}
