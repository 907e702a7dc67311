use crate::config::MirrorCamConfig;
use crate::errors::Fault;
use crate::platform::CapabilityProvider;
use crate::router::RouterState;
use crate::session::state::{CommandHandle, ControlCommand, SessionHandle, SessionInfo};
use crate::session::worker::{Published, Request, SessionWorker};
use crate::sink::SinkHandle;
use crate::types::{
    CapabilitySnapshot, DisplayDescriptor, LensFacing, MeteringPoint, WhiteBalanceMode,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;

const FAULT_CHANNEL_CAPACITY: usize = 64;

/// Tunables for the session controller
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerOptions {
    /// How long tap-to-focus metering stays locked before auto-cancel
    pub focus_auto_cancel: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            focus_auto_cancel: Duration::from_millis(3000),
        }
    }
}

impl ControllerOptions {
    pub fn from_config(config: &MirrorCamConfig) -> Self {
        Self {
            focus_auto_cancel: Duration::from_millis(config.camera.focus_auto_cancel_ms),
        }
    }
}

struct Inner {
    requests: mpsc::UnboundedSender<Request>,
    snapshot: watch::Receiver<CapabilitySnapshot>,
    session: watch::Receiver<SessionInfo>,
    router: watch::Receiver<RouterState>,
    faults: broadcast::Sender<Fault>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the camera session controller.
///
/// Cloning is cheap; every clone talks to the same worker task. All methods
/// return without waiting on hardware except [`CameraController::initialize`]
/// and [`CameraController::shutdown`], which suspend until the worker answers.
#[derive(Clone)]
pub struct CameraController {
    inner: Arc<Inner>,
}

impl CameraController {
    /// Start the session worker on the current tokio runtime.
    pub fn spawn<P: CapabilityProvider>(provider: P, options: ControllerOptions) -> Self {
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let (snapshot, snapshot_rx) = watch::channel(CapabilitySnapshot::unsupported());
        let (session, session_rx) = watch::channel(SessionInfo::default());
        let (router, router_rx) = watch::channel(RouterState::default());
        let (faults, _) = broadcast::channel(FAULT_CHANNEL_CAPACITY);

        let published = Published {
            snapshot,
            session,
            router,
            faults: faults.clone(),
        };
        let (worker, events_rx) =
            SessionWorker::new(provider, published, options.focus_auto_cancel);
        let handle = tokio::spawn(worker.run(requests_rx, events_rx));

        Self {
            inner: Arc::new(Inner {
                requests,
                snapshot: snapshot_rx,
                session: session_rx,
                router: router_rx,
                faults,
                worker: Mutex::new(Some(handle)),
            }),
        }
    }

    /// Unbind any current session and bind `lens` with `primary` as the
    /// remembered on-device sink.
    pub async fn initialize(
        &self,
        lens: LensFacing,
        primary: SinkHandle,
    ) -> Result<SessionHandle, Fault> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .requests
            .send(Request::Initialize {
                lens,
                primary,
                reply,
            })
            .map_err(|_| Fault::initialization("camera controller is shut down"))?;
        rx.await
            .unwrap_or_else(|_| Err(Fault::initialization("camera controller stopped while binding")))
    }

    pub fn set_zoom(&self, ratio: f32) -> CommandHandle {
        self.command(ControlCommand::Zoom(ratio))
    }

    pub fn set_exposure_index(&self, index: i32) -> CommandHandle {
        self.command(ControlCommand::Exposure(index))
    }

    pub fn set_torch(&self, enabled: bool) -> CommandHandle {
        self.command(ControlCommand::Torch(enabled))
    }

    pub fn set_white_balance(&self, mode: WhiteBalanceMode) -> CommandHandle {
        self.command(ControlCommand::WhiteBalance(mode))
    }

    pub fn focus_at(&self, point: MeteringPoint) -> CommandHandle {
        self.command(ControlCommand::FocusAt(point))
    }

    fn command(&self, command: ControlCommand) -> CommandHandle {
        let operation = command.operation();
        let (handle, reply) = CommandHandle::new(operation);
        if let Err(mpsc::error::SendError(Request::Command { reply, .. })) =
            self.inner.requests.send(Request::Command { command, reply })
        {
            let fault = Fault::no_session(operation);
            log::warn!("{}", fault);
            let _ = self.inner.faults.send(fault.clone());
            let _ = reply.send(Err(fault));
        }
        handle
    }

    /// The derived external display changed (appeared, vanished or changed identity).
    pub fn external_display_changed(&self, display: Option<DisplayDescriptor>) {
        let _ = self.inner.requests.send(Request::ExternalDisplay(display));
    }

    /// The presentation window on `display_id` created its surface.
    pub fn external_surface_ready(&self, display_id: u32, sink: SinkHandle) {
        let _ = self
            .inner
            .requests
            .send(Request::SurfaceReady { display_id, sink });
    }

    /// The presentation surface on `display_id` was destroyed.
    pub fn external_surface_lost(&self, display_id: u32) {
        let _ = self.inner.requests.send(Request::SurfaceLost { display_id });
    }

    /// Unbind, detach observers and stop the worker. Idempotent.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.inner.requests.send(Request::Shutdown { reply }).is_ok() {
            let _ = rx.await;
        }
        if let Some(worker) = self.inner.worker.lock().await.take() {
            if let Err(e) = worker.await {
                log::warn!("Session worker ended abnormally: {}", e);
            }
        }
    }

    /// Last published capability snapshot
    pub fn snapshot(&self) -> CapabilitySnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<CapabilitySnapshot> {
        self.inner.snapshot.clone()
    }

    pub fn session_info(&self) -> SessionInfo {
        self.inner.session.borrow().clone()
    }

    pub fn watch_session(&self) -> watch::Receiver<SessionInfo> {
        self.inner.session.clone()
    }

    pub fn router_state(&self) -> RouterState {
        self.inner.router.borrow().clone()
    }

    pub fn watch_router(&self) -> watch::Receiver<RouterState> {
        self.inner.router.clone()
    }

    pub fn subscribe_faults(&self) -> broadcast::Receiver<Fault> {
        self.inner.faults.subscribe()
    }
}
