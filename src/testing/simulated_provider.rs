//! Simulated capability provider
//!
//! Behaves like a two-lens phone camera: the back lens zooms, meters exposure
//! and has a flash unit; the front lens has none of that. Every hardware
//! call is recorded so tests can assert on ordering, and failures can be
//! scripted per call.

use crate::errors::HardwareError;
use crate::platform::{CameraSession, CapabilityProvider, PendingCommand, PreviewOutput};
use crate::sink::SinkHandle;
use crate::types::{
    CapabilitySnapshot, CapabilityUpdate, ExposureState, ExposureStep, LensFacing,
    MeteringPoint, WhiteBalanceMode, ZoomState,
};
use futures::FutureExt;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

/// One call made against the simulated hardware
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareCall {
    Bind { lens: LensFacing, sink_id: u64 },
    UnbindAll,
    RemoveObservers,
    SetZoomRatio(f32),
    SetExposureIndex(i32),
    EnableTorch(bool),
    FocusAndMetering { x: f32, y: f32, auto_cancel_ms: u64 },
    SetWhiteBalance(WhiteBalanceMode),
    SetMainSink(Option<u64>),
    SetExternalSink(Option<u64>),
}

/// What one lens reports once bound
#[derive(Debug, Clone, PartialEq)]
pub struct LensProfile {
    pub capabilities: CapabilitySnapshot,
    pub white_balance_modes: BTreeSet<WhiteBalanceMode>,
}

impl LensProfile {
    pub fn back_camera() -> Self {
        let capabilities = CapabilitySnapshot {
            zoom_ratio: 1.0,
            min_zoom: 1.0,
            max_zoom: 8.0,
            exposure_index: 0,
            min_exposure_index: -2,
            max_exposure_index: 2,
            exposure_step: ExposureStep::new(1, 3),
            exposure_supported: true,
            has_flash_unit: true,
            torch_on: false,
            available_white_balance_modes: BTreeSet::new(),
        };
        let white_balance_modes = [
            WhiteBalanceMode::Auto,
            WhiteBalanceMode::Incandescent,
            WhiteBalanceMode::Fluorescent,
            WhiteBalanceMode::Daylight,
            WhiteBalanceMode::Cloudy,
            WhiteBalanceMode::Shade,
        ]
        .into_iter()
        .collect();
        Self {
            capabilities,
            white_balance_modes,
        }
    }

    pub fn front_camera() -> Self {
        Self {
            capabilities: CapabilitySnapshot::unsupported(),
            white_balance_modes: [WhiteBalanceMode::Auto].into_iter().collect(),
        }
    }
}

struct Observer {
    session: u64,
    tx: mpsc::UnboundedSender<CapabilityUpdate>,
}

struct State {
    profiles: HashMap<LensFacing, LensProfile>,
    calls: Vec<HardwareCall>,
    fail_next_bind: Option<HardwareError>,
    fail_next_command: Option<HardwareError>,
    fail_next_external_attach: Option<HardwareError>,
    white_balance_error: Option<HardwareError>,
    observers: Vec<Observer>,
    current: CapabilitySnapshot,
    bound_lens: Option<LensFacing>,
    session: u64,
    writer: Option<u64>,
}

impl State {
    fn publish(&mut self, update: CapabilityUpdate) {
        self.current = self.current.with_update(update.clone());
        let session = self.session;
        self.observers.retain(|observer| {
            observer.session != session || observer.tx.send(update.clone()).is_ok()
        });
    }

    /// Single writer slot: detaching an empty slot and attaching over an
    /// occupied one are both refused.
    fn attach(&mut self, sink: Option<&SinkHandle>) -> Result<(), HardwareError> {
        match (sink, self.writer) {
            (None, None) => Err(HardwareError::SinkNotReady(
                "preview output has no attached sink".to_string(),
            )),
            (None, Some(_)) => {
                self.writer = None;
                Ok(())
            }
            (Some(sink), Some(current)) => Err(HardwareError::Rejected(format!(
                "sink {} attached while sink {} still writes",
                sink.id(),
                current
            ))),
            (Some(sink), None) => {
                self.writer = Some(sink.id());
                Ok(())
            }
        }
    }
}

/// Cloneable handle; clones share the same simulated hardware.
#[derive(Clone)]
pub struct SimulatedProvider {
    state: Arc<Mutex<State>>,
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedProvider {
    pub fn new() -> Self {
        let profiles = [
            (LensFacing::Back, LensProfile::back_camera()),
            (LensFacing::Front, LensProfile::front_camera()),
        ]
        .into_iter()
        .collect();
        Self {
            state: Arc::new(Mutex::new(State {
                profiles,
                calls: Vec::new(),
                fail_next_bind: None,
                fail_next_command: None,
                fail_next_external_attach: None,
                white_balance_error: None,
                observers: Vec::new(),
                current: CapabilitySnapshot::unsupported(),
                bound_lens: None,
                session: 0,
                writer: None,
            })),
        }
    }

    /// Remove `lens` from the device, so binding it fails.
    pub fn without_lens(self, lens: LensFacing) -> Self {
        self.lock().profiles.remove(&lens);
        self
    }

    pub fn with_profile(self, lens: LensFacing, profile: LensProfile) -> Self {
        self.lock().profiles.insert(lens, profile);
        self
    }

    pub fn fail_next_bind(&self, err: HardwareError) {
        self.lock().fail_next_bind = Some(err);
    }

    pub fn fail_next_command(&self, err: HardwareError) {
        self.lock().fail_next_command = Some(err);
    }

    /// The next attempt to attach an external sink is refused with `err`.
    pub fn fail_next_external_attach(&self, err: HardwareError) {
        self.lock().fail_next_external_attach = Some(err);
    }

    /// Every later white-balance metadata query fails with `err`.
    pub fn fail_white_balance_query(&self, err: HardwareError) {
        self.lock().white_balance_error = Some(err);
    }

    /// Hardware-initiated capability change on the bound session
    pub fn push(&self, update: CapabilityUpdate) {
        self.lock().publish(update);
    }

    pub fn calls(&self) -> Vec<HardwareCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Observer registrations still installed
    pub fn observer_count(&self) -> usize {
        self.lock()
            .observers
            .iter()
            .filter(|observer| !observer.tx.is_closed())
            .count()
    }

    /// Id of the sink the preview output is writing to
    pub fn active_sink(&self) -> Option<u64> {
        self.lock().writer
    }

    pub fn bound_lens(&self) -> Option<LensFacing> {
        self.lock().bound_lens
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CapabilityProvider for SimulatedProvider {
    type Session = SimulatedCamera;

    fn bind(
        &self,
        lens: LensFacing,
        sink: SinkHandle,
    ) -> impl Future<Output = Result<SimulatedCamera, HardwareError>> + Send {
        let state = self.state.clone();
        async move {
            // Binding completes on a later poll, like a real provider.
            tokio::task::yield_now().await;

            let mut guard = lock(&state);
            guard.calls.push(HardwareCall::Bind {
                lens,
                sink_id: sink.id(),
            });
            if let Some(err) = guard.fail_next_bind.take() {
                return Err(err);
            }
            let profile = guard
                .profiles
                .get(&lens)
                .cloned()
                .ok_or(HardwareError::NoMatchingLens(lens))?;
            guard.attach(Some(&sink))?;

            guard.session += 1;
            guard.bound_lens = Some(lens);
            guard.current = profile.capabilities.normalized();
            log::debug!("Simulated {} camera bound as session {}", lens, guard.session);
            Ok(SimulatedCamera {
                state: state.clone(),
                session: guard.session,
                white_balance_modes: profile.white_balance_modes,
            })
        }
    }

    fn unbind_all(&self) {
        let mut state = self.lock();
        state.calls.push(HardwareCall::UnbindAll);
        state.bound_lens = None;
        state.writer = None;
        state.session += 1;
        state.current = CapabilitySnapshot::unsupported();
    }

    fn available_white_balance_modes(
        &self,
        session: &SimulatedCamera,
    ) -> Result<BTreeSet<WhiteBalanceMode>, HardwareError> {
        match &self.lock().white_balance_error {
            Some(err) => Err(err.clone()),
            None => Ok(session.white_balance_modes.clone()),
        }
    }
}

/// A bound simulated session. Commands against a released session fail.
pub struct SimulatedCamera {
    state: Arc<Mutex<State>>,
    session: u64,
    white_balance_modes: BTreeSet<WhiteBalanceMode>,
}

impl SimulatedCamera {
    /// Records `call` and runs `apply` if the session is still live and no
    /// failure was scripted.
    fn command<F>(&mut self, call: HardwareCall, apply: F) -> PendingCommand
    where
        F: FnOnce(&mut State) -> Result<(), HardwareError>,
    {
        let mut state = lock(&self.state);
        state.calls.push(call);
        let result = if state.session != self.session {
            Err(HardwareError::Unavailable("session released".to_string()))
        } else if let Some(err) = state.fail_next_command.take() {
            Err(err)
        } else {
            apply(&mut *state)
        };
        futures::future::ready(result).boxed()
    }
}

impl PreviewOutput for SimulatedCamera {
    fn set_main_sink(&mut self, sink: Option<&SinkHandle>) -> Result<(), HardwareError> {
        let mut state = lock(&self.state);
        state.calls.push(HardwareCall::SetMainSink(sink.map(SinkHandle::id)));
        state.attach(sink)
    }

    fn set_external_sink(&mut self, sink: Option<&SinkHandle>) -> Result<(), HardwareError> {
        let mut state = lock(&self.state);
        state
            .calls
            .push(HardwareCall::SetExternalSink(sink.map(SinkHandle::id)));
        if sink.is_some() {
            if let Some(err) = state.fail_next_external_attach.take() {
                return Err(err);
            }
        }
        state.attach(sink)
    }
}

impl CameraSession for SimulatedCamera {
    fn capabilities(&self) -> CapabilitySnapshot {
        lock(&self.state).current.clone()
    }

    fn observe(&mut self) -> mpsc::UnboundedReceiver<CapabilityUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.state).observers.push(Observer {
            session: self.session,
            tx,
        });
        rx
    }

    fn remove_observers(&mut self) {
        let mut state = lock(&self.state);
        state.calls.push(HardwareCall::RemoveObservers);
        let session = self.session;
        state.observers.retain(|observer| observer.session != session);
    }

    fn set_zoom_ratio(&mut self, ratio: f32) -> PendingCommand {
        self.command(HardwareCall::SetZoomRatio(ratio), |state| {
            let current = &state.current;
            let zoom = ZoomState {
                ratio,
                min: current.min_zoom,
                max: current.max_zoom,
            };
            state.publish(CapabilityUpdate::Zoom(zoom));
            Ok(())
        })
    }

    fn set_exposure_index(&mut self, index: i32) -> PendingCommand {
        self.command(HardwareCall::SetExposureIndex(index), |state| {
            let current = &state.current;
            if !current.exposure_supported {
                return Err(HardwareError::Rejected(
                    "exposure compensation unsupported".to_string(),
                ));
            }
            let exposure = ExposureState {
                index,
                min: current.min_exposure_index,
                max: current.max_exposure_index,
                step: current.exposure_step,
                supported: true,
            };
            state.publish(CapabilityUpdate::Exposure(exposure));
            Ok(())
        })
    }

    fn enable_torch(&mut self, enabled: bool) -> PendingCommand {
        self.command(HardwareCall::EnableTorch(enabled), |state| {
            if enabled && !state.current.has_flash_unit {
                return Err(HardwareError::Rejected("no flash unit".to_string()));
            }
            state.publish(CapabilityUpdate::Torch(enabled));
            Ok(())
        })
    }

    fn start_focus_and_metering(
        &mut self,
        point: MeteringPoint,
        auto_cancel: Duration,
    ) -> PendingCommand {
        let call = HardwareCall::FocusAndMetering {
            x: point.x,
            y: point.y,
            auto_cancel_ms: auto_cancel.as_millis() as u64,
        };
        self.command(call, |_| Ok(()))
    }

    fn set_white_balance_mode(&mut self, mode: WhiteBalanceMode) -> PendingCommand {
        let supported = self.white_balance_modes.contains(&mode);
        self.command(HardwareCall::SetWhiteBalance(mode), move |_| {
            if supported {
                Ok(())
            } else {
                Err(HardwareError::Rejected(format!(
                    "white balance mode {} unsupported",
                    mode.label()
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::create_sink;

    #[tokio::test]
    async fn test_bind_reports_lens_profile() {
        let provider = SimulatedProvider::new();
        let sink = create_sink("main").into_ready();
        let camera = provider.bind(LensFacing::Back, sink.clone()).await.unwrap();

        assert!(camera.capabilities().zoom_supported());
        assert_eq!(provider.active_sink(), Some(sink.id()));
        assert_eq!(provider.bound_lens(), Some(LensFacing::Back));
        assert_eq!(
            provider.available_white_balance_modes(&camera).unwrap().len(),
            6
        );
    }

    #[tokio::test]
    async fn test_missing_lens_fails_bind() {
        let provider = SimulatedProvider::new().without_lens(LensFacing::Front);
        let sink = create_sink("main").into_ready();
        let err = provider.bind(LensFacing::Front, sink).await.err();
        assert_eq!(err, Some(HardwareError::NoMatchingLens(LensFacing::Front)));
    }

    #[tokio::test]
    async fn test_commands_echo_through_observers() {
        let provider = SimulatedProvider::new();
        let sink = create_sink("main").into_ready();
        let mut camera = provider.bind(LensFacing::Back, sink).await.unwrap();
        let mut updates = camera.observe();

        camera.enable_torch(true).await.unwrap();
        assert_eq!(updates.recv().await, Some(CapabilityUpdate::Torch(true)));
        assert!(camera.capabilities().torch_on);
    }

    #[tokio::test]
    async fn test_released_session_rejects_commands() {
        let provider = SimulatedProvider::new();
        let sink = create_sink("main").into_ready();
        let mut camera = provider.bind(LensFacing::Back, sink).await.unwrap();
        provider.unbind_all();

        assert!(camera.set_zoom_ratio(2.0).await.is_err());
    }

    #[tokio::test]
    async fn test_output_has_single_writer() {
        let provider = SimulatedProvider::new();
        let main = create_sink("main").into_ready();
        let external = create_sink("external").into_ready();
        let mut camera = provider.bind(LensFacing::Back, main).await.unwrap();

        assert!(matches!(
            camera.set_external_sink(Some(&external)),
            Err(HardwareError::Rejected(_))
        ));
        camera.set_main_sink(None).unwrap();
        assert!(matches!(
            camera.set_main_sink(None),
            Err(HardwareError::SinkNotReady(_))
        ));
        camera.set_external_sink(Some(&external)).unwrap();
        assert_eq!(provider.active_sink(), Some(external.id()));
    }
}
