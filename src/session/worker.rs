//! The session worker: single writer for everything the hardware touches.
//!
//! One task owns the bound camera session, the surface router and the
//! published state. Requests from controller handles and events from
//! observers and command completions are handled one at a time, so a
//! snapshot is never assembled from interleaved partial updates and commands
//! reach the hardware in the order they were issued.

use crate::errors::{ControlOp, Fault, HardwareError};
use crate::platform::{CameraSession, CapabilityProvider, PendingCommand};
use crate::router::{RouterState, SurfaceRouter};
use crate::session::state::{ControlCommand, SessionHandle, SessionInfo, SessionPhase};
use crate::sink::SinkHandle;
use crate::types::{CapabilitySnapshot, CapabilityUpdate, DisplayDescriptor, LensFacing};
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

pub(crate) type Reply = oneshot::Sender<Result<(), Fault>>;

/// Messages from controller handles
pub(crate) enum Request {
    Initialize {
        lens: LensFacing,
        primary: SinkHandle,
        reply: oneshot::Sender<Result<SessionHandle, Fault>>,
    },
    Command {
        command: ControlCommand,
        reply: Reply,
    },
    ExternalDisplay(Option<DisplayDescriptor>),
    SurfaceReady {
        display_id: u32,
        sink: SinkHandle,
    },
    SurfaceLost {
        display_id: u32,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Messages posted back by tasks the worker spawned, tagged with the
/// generation of the session they belong to.
pub(crate) enum Event {
    Capability {
        generation: u64,
        update: CapabilityUpdate,
    },
    CommandDone {
        generation: u64,
        operation: ControlOp,
        result: Result<(), HardwareError>,
        reply: Reply,
    },
}

/// Write ends of everything the worker publishes
pub(crate) struct Published {
    pub snapshot: watch::Sender<CapabilitySnapshot>,
    pub session: watch::Sender<SessionInfo>,
    pub router: watch::Sender<RouterState>,
    pub faults: broadcast::Sender<Fault>,
}

struct BoundSession<S> {
    generation: u64,
    lens: LensFacing,
    camera: S,
    observer: JoinHandle<()>,
}

pub(crate) struct SessionWorker<P: CapabilityProvider> {
    provider: P,
    bound: Option<BoundSession<P::Session>>,
    generation: u64,
    router: SurfaceRouter,
    published: Published,
    events: mpsc::UnboundedSender<Event>,
    focus_auto_cancel: Duration,
}

impl<P: CapabilityProvider> SessionWorker<P> {
    pub(crate) fn new(
        provider: P,
        published: Published,
        focus_auto_cancel: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let worker = Self {
            provider,
            bound: None,
            generation: 0,
            router: SurfaceRouter::new(),
            published,
            events,
            focus_auto_cancel,
        };
        (worker, events_rx)
    }

    pub(crate) async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Request>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => {
                        if self.handle_request(request).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }
        log::debug!("Session worker stopped");
    }

    async fn handle_request(&mut self, request: Request) -> ControlFlow<()> {
        match request {
            Request::Initialize {
                lens,
                primary,
                reply,
            } => {
                let result = self.initialize(lens, primary).await;
                let _ = reply.send(result);
            }
            Request::Command { command, reply } => self.dispatch(command, reply),
            Request::ExternalDisplay(display) => {
                let faults = self
                    .router
                    .on_display_changed(self.bound.as_mut().map(|b| &mut b.camera), display);
                self.after_routing(faults);
            }
            Request::SurfaceReady { display_id, sink } => {
                let faults = self.router.on_surface_ready(
                    self.bound.as_mut().map(|b| &mut b.camera),
                    display_id,
                    sink,
                );
                self.after_routing(faults);
            }
            Request::SurfaceLost { display_id } => {
                let faults = self
                    .router
                    .on_surface_lost(self.bound.as_mut().map(|b| &mut b.camera), display_id);
                self.after_routing(faults);
            }
            Request::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    pub(crate) fn handle_event(&mut self, event: Event) {
        match event {
            Event::Capability { generation, update } => {
                if !self.is_current(generation) {
                    log::debug!(
                        "Dropping capability update from superseded session {}",
                        generation
                    );
                    return;
                }
                let next = self.published.snapshot.borrow().with_update(update);
                self.published.snapshot.send_replace(next);
            }
            Event::CommandDone {
                generation,
                operation,
                result,
                reply,
            } => {
                if !self.is_current(generation) {
                    log::debug!(
                        "Discarding {} result from superseded session {}",
                        operation,
                        generation
                    );
                    return;
                }
                match result {
                    Ok(()) => {
                        let _ = reply.send(Ok(()));
                    }
                    Err(err) => self.report(reply, Fault::control(operation, err.to_string())),
                }
            }
        }
    }

    pub(crate) async fn initialize(
        &mut self,
        lens: LensFacing,
        primary: SinkHandle,
    ) -> Result<SessionHandle, Fault> {
        self.teardown();
        self.router.remember_primary(primary.clone());
        self.generation += 1;
        let generation = self.generation;
        self.publish_session(SessionPhase::Binding, Some(lens));

        let target = self.router.bind_target().unwrap_or(primary);
        log::info!(
            "Binding {} camera (generation {}) to sink {}",
            lens,
            generation,
            target.id()
        );

        let mut camera = match self.provider.bind(lens, target.clone()).await {
            Ok(camera) => camera,
            Err(err) => {
                log::error!("Failed to bind {} camera: {}", lens, err);
                self.publish_session(SessionPhase::Unbound, None);
                let fault = Fault::initialization(err.to_string());
                let _ = self.published.faults.send(fault.clone());
                return Err(fault);
            }
        };

        let mut snapshot = camera.capabilities();
        snapshot.available_white_balance_modes =
            match self.provider.available_white_balance_modes(&camera) {
                Ok(modes) => modes,
                Err(err) => {
                    let fault = Fault::capability_query(err.to_string());
                    log::warn!("{}", fault);
                    let _ = self.published.faults.send(fault);
                    BTreeSet::new()
                }
            };
        self.published.snapshot.send_replace(snapshot.normalized());
        self.router.on_session_bound(&target);

        let mut updates = camera.observe();
        let events = self.events.clone();
        let observer = tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                if events
                    .send(Event::Capability { generation, update })
                    .is_err()
                {
                    break;
                }
            }
        });

        self.bound = Some(BoundSession {
            generation,
            lens,
            camera,
            observer,
        });
        self.publish_session(SessionPhase::Bound, Some(lens));
        self.publish_router();
        log::info!("{} camera bound (generation {})", lens, generation);
        Ok(SessionHandle { generation, lens })
    }

    fn dispatch(&mut self, command: ControlCommand, reply: Reply) {
        let operation = command.operation();
        let snapshot = self.published.snapshot.borrow().clone();
        let focus_auto_cancel = self.focus_auto_cancel;

        let submitted = match self.bound.as_mut() {
            Some(bound) => submit(&mut bound.camera, &snapshot, command, focus_auto_cancel)
                .map(|pending| (bound.generation, pending)),
            None => Err(Fault::no_session(operation)),
        };

        match submitted {
            Ok((generation, pending)) => {
                let events = self.events.clone();
                tokio::spawn(async move {
                    let result = pending.await;
                    let _ = events.send(Event::CommandDone {
                        generation,
                        operation,
                        result,
                        reply,
                    });
                });
            }
            Err(fault) => self.report(reply, fault),
        }
    }

    fn report(&self, reply: Reply, fault: Fault) {
        log::warn!("{}", fault);
        let _ = self.published.faults.send(fault.clone());
        let _ = reply.send(Err(fault));
    }

    fn after_routing(&mut self, faults: Vec<Fault>) {
        for fault in faults {
            let _ = self.published.faults.send(fault);
        }
        self.publish_router();
    }

    fn is_current(&self, generation: u64) -> bool {
        self.bound
            .as_ref()
            .is_some_and(|bound| bound.generation == generation)
    }

    /// Detach observers, then unbind. Safe with nothing bound.
    fn teardown(&mut self) {
        if let Some(mut bound) = self.bound.take() {
            log::info!(
                "Releasing {} camera session (generation {})",
                bound.lens,
                bound.generation
            );
            bound.camera.remove_observers();
            bound.observer.abort();
        }
        self.provider.unbind_all();
        self.router.on_session_unbound();
        self.published
            .snapshot
            .send_replace(CapabilitySnapshot::unsupported());
        self.publish_router();
    }

    fn shutdown(&mut self) {
        self.teardown();
        self.publish_session(SessionPhase::Unbound, None);
    }

    fn publish_session(&self, phase: SessionPhase, lens: Option<LensFacing>) {
        self.published.session.send_replace(SessionInfo {
            phase,
            generation: self.generation,
            lens,
        });
    }

    fn publish_router(&self) {
        self.published.router.send_replace(self.router.state());
    }
}

/// Validates `command` against the last published snapshot and hands the
/// coerced value to the hardware.
fn submit<S: CameraSession>(
    camera: &mut S,
    snapshot: &CapabilitySnapshot,
    command: ControlCommand,
    focus_auto_cancel: Duration,
) -> Result<PendingCommand, Fault> {
    let operation = command.operation();
    match command {
        ControlCommand::Zoom(requested) => {
            let ratio = snapshot
                .clamp_zoom(requested)
                .ok_or_else(|| Fault::control(operation, "zoom ratio is not a number"))?;
            log::debug!("Zoom requested {} -> dispatching {}", requested, ratio);
            Ok(camera.set_zoom_ratio(ratio))
        }
        ControlCommand::Exposure(requested) => {
            if !snapshot.exposure_supported {
                return Err(Fault::control(
                    operation,
                    "exposure compensation is not supported",
                ));
            }
            let index = snapshot.clamp_exposure(requested);
            log::debug!("Exposure requested {} -> dispatching {}", requested, index);
            Ok(camera.set_exposure_index(index))
        }
        ControlCommand::Torch(enabled) => {
            if enabled && !snapshot.has_flash_unit {
                return Err(Fault::control(operation, "camera has no flash unit"));
            }
            log::debug!("Torch -> {}", enabled);
            Ok(camera.enable_torch(enabled))
        }
        ControlCommand::WhiteBalance(mode) => {
            let available = &snapshot.available_white_balance_modes;
            if !available.is_empty() && !available.contains(&mode) {
                return Err(Fault::control(
                    operation,
                    format!("white balance mode {} is not available", mode.label()),
                ));
            }
            log::debug!("White balance -> {}", mode.label());
            Ok(camera.set_white_balance_mode(mode))
        }
        ControlCommand::FocusAt(point) => {
            let point = point
                .clamped()
                .ok_or_else(|| Fault::control(operation, "focus point is not a number"))?;
            log::debug!("Focus and metering at ({:.3}, {:.3})", point.x, point.y);
            Ok(camera.start_focus_and_metering(point, focus_auto_cancel))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::create_sink;
    use crate::testing::{HardwareCall, SimulatedProvider};
    use crate::types::ZoomState;

    fn worker(
        provider: SimulatedProvider,
    ) -> (
        SessionWorker<SimulatedProvider>,
        watch::Receiver<CapabilitySnapshot>,
        broadcast::Receiver<Fault>,
    ) {
        let (snapshot, snapshot_rx) = watch::channel(CapabilitySnapshot::unsupported());
        let (session, _) = watch::channel(SessionInfo::default());
        let (router, _) = watch::channel(RouterState::default());
        let (faults, faults_rx) = broadcast::channel(16);
        let published = Published {
            snapshot,
            session,
            router,
            faults,
        };
        let (worker, _events) = SessionWorker::new(provider, published, Duration::from_secs(3));
        (worker, snapshot_rx, faults_rx)
    }

    fn wide_zoom() -> CapabilityUpdate {
        CapabilityUpdate::Zoom(ZoomState {
            ratio: 4.0,
            min: 0.5,
            max: 10.0,
        })
    }

    #[tokio::test]
    async fn test_stale_capability_update_is_dropped() {
        let provider = SimulatedProvider::new();
        let (mut worker, snapshot, _faults) = worker(provider);
        let main = create_sink("main").into_ready();

        let first = worker.initialize(LensFacing::Back, main.clone()).await.unwrap();
        let second = worker.initialize(LensFacing::Front, main).await.unwrap();
        let before = snapshot.borrow().clone();

        worker.handle_event(Event::Capability {
            generation: first.generation,
            update: wide_zoom(),
        });
        assert_eq!(*snapshot.borrow(), before);

        worker.handle_event(Event::Capability {
            generation: second.generation,
            update: wide_zoom(),
        });
        assert_eq!(snapshot.borrow().max_zoom, 10.0);
    }

    #[tokio::test]
    async fn test_stale_command_result_is_discarded() {
        let provider = SimulatedProvider::new();
        let (mut worker, _snapshot, mut faults) = worker(provider);
        let main = create_sink("main").into_ready();
        let first = worker.initialize(LensFacing::Back, main.clone()).await.unwrap();
        worker.initialize(LensFacing::Back, main).await.unwrap();

        let (handle, reply) = crate::session::CommandHandle::new(ControlOp::SetZoom);
        worker.handle_event(Event::CommandDone {
            generation: first.generation,
            operation: ControlOp::SetZoom,
            result: Err(HardwareError::CommandFailed("late".into())),
            reply,
        });

        assert_eq!(handle.outcome().await, Err(Fault::superseded(ControlOp::SetZoom)));
        assert!(faults.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rebind_detaches_observers_before_unbinding() {
        let provider = SimulatedProvider::new();
        let (mut worker, _snapshot, _faults) = worker(provider.clone());
        let main = create_sink("main").into_ready();
        worker.initialize(LensFacing::Back, main.clone()).await.unwrap();
        provider.clear_calls();

        worker.initialize(LensFacing::Front, main).await.unwrap();

        let calls = provider.calls();
        let removed = calls
            .iter()
            .position(|c| *c == HardwareCall::RemoveObservers)
            .unwrap();
        let unbound = calls
            .iter()
            .position(|c| *c == HardwareCall::UnbindAll)
            .unwrap();
        let bound = calls
            .iter()
            .position(|c| matches!(c, HardwareCall::Bind { .. }))
            .unwrap();
        assert!(removed < unbound && unbound < bound);
        assert_eq!(provider.observer_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_request_stops_worker() {
        let provider = SimulatedProvider::new();
        let (mut worker, snapshot, _faults) = worker(provider.clone());
        worker
            .initialize(LensFacing::Back, create_sink("main").into_ready())
            .await
            .unwrap();

        let (reply, rx) = oneshot::channel();
        let flow = worker.handle_request(Request::Shutdown { reply }).await;

        assert!(flow.is_break());
        assert!(rx.await.is_ok());
        assert_eq!(provider.bound_lens(), None);
        assert_eq!(*snapshot.borrow(), CapabilitySnapshot::unsupported());
    }

    #[tokio::test]
    async fn test_failed_white_balance_query_degrades() {
        let provider = SimulatedProvider::new();
        provider.fail_white_balance_query(HardwareError::Unavailable("metadata".into()));
        let (mut worker, snapshot, mut faults) = worker(provider);
        let main = create_sink("main").into_ready();

        worker.initialize(LensFacing::Back, main).await.unwrap();

        assert!(snapshot.borrow().available_white_balance_modes.is_empty());
        assert!(matches!(
            faults.try_recv(),
            Ok(Fault::CapabilityQuery { .. })
        ));
    }
}
