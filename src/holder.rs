//! Session holder
//!
//! The UI-affine side of the core. Reads user preferences once at
//! construction, drives lens toggles and preference-backed controls through
//! the [`CameraController`], and turns the fault stream into presentation
//! state: a persistent initialization fault that stays until dismissed and a
//! transient control fault that expires on its own.

use crate::config::MirrorCamConfig;
use crate::errors::Fault;
use crate::preferences::{PreferenceStore, UserPreferences};
use crate::projector::{CapabilityView, UiStateProjector};
use crate::session::{CameraController, CommandHandle, SessionHandle, SessionPhase};
use crate::sink::SinkHandle;
use crate::types::{LensFacing, MeteringPoint, WhiteBalanceMode};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::Instant;

/// Everything the UI layer binds to, read in one go
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiState {
    pub lens: LensFacing,
    /// Horizontal flip applied to the on-device preview only
    pub mirror_preview: bool,
    pub selected_white_balance: WhiteBalanceMode,
    pub capabilities: CapabilityView,
    pub session_phase: SessionPhase,
    pub external_indicator_visible: bool,
    pub initialization_fault: Option<String>,
    pub transient_fault: Option<String>,
}

pub struct SessionHolder<S: PreferenceStore> {
    controller: CameraController,
    store: S,
    prefs: UserPreferences,
    primary: Option<SinkHandle>,
    projector: UiStateProjector,
    faults: broadcast::Receiver<Fault>,
    fault_ttl: Duration,
    initialization_fault: Option<Fault>,
    transient_fault: Option<(Fault, Instant)>,
}

impl<S: PreferenceStore> SessionHolder<S> {
    pub fn new(controller: CameraController, store: S, config: &MirrorCamConfig) -> Self {
        let prefs = UserPreferences::load(&store, config.camera.default_lens);
        log::info!(
            "Restored preferences: lens={} flip={} white_balance={}",
            prefs.lens_facing,
            prefs.flip_horizontal,
            prefs.white_balance.label()
        );
        Self {
            projector: UiStateProjector::new(controller.watch_snapshot()),
            faults: controller.subscribe_faults(),
            controller,
            store,
            prefs,
            primary: None,
            fault_ttl: Duration::from_millis(config.faults.transient_fault_ttl_ms),
            initialization_fault: None,
            transient_fault: None,
        }
    }

    pub fn controller(&self) -> &CameraController {
        &self.controller
    }

    pub fn preferences(&self) -> UserPreferences {
        self.prefs
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// First activation: bind the stored lens to `primary`.
    pub async fn activate(&mut self, primary: SinkHandle) -> Result<SessionHandle, Fault> {
        self.primary = Some(primary);
        self.bind().await
    }

    /// Switch to the other lens. The choice is persisted before rebinding,
    /// so it sticks even if the bind fails.
    pub async fn toggle_lens(&mut self) -> Result<SessionHandle, Fault> {
        let lens = self.prefs.lens_facing.toggled();
        self.prefs.lens_facing = lens;
        if let Err(e) = UserPreferences::store_lens(&mut self.store, lens) {
            log::warn!("Failed to persist lens selection: {}", e);
        }
        self.bind().await
    }

    /// Re-issue initialization after a failed bind.
    pub async fn retry(&mut self) -> Result<SessionHandle, Fault> {
        self.bind().await
    }

    async fn bind(&mut self) -> Result<SessionHandle, Fault> {
        let Some(primary) = self.primary.clone() else {
            let fault = Fault::initialization("no primary sink has been supplied");
            self.initialization_fault = Some(fault.clone());
            return Err(fault);
        };

        let result = self.controller.initialize(self.prefs.lens_facing, primary).await;
        // The worker broadcasts before replying; take those copies now so a
        // later dismiss is not undone by the next drain.
        self.drain_faults();
        match result {
            Ok(handle) => {
                self.initialization_fault = None;
                if self.stored_white_balance_applies() {
                    log::debug!(
                        "Re-applying stored white balance {}",
                        self.prefs.white_balance.label()
                    );
                    // Outcome surfaces through the fault stream.
                    let _ = self.controller.set_white_balance(self.prefs.white_balance);
                }
                Ok(handle)
            }
            Err(fault) => {
                self.initialization_fault = Some(fault.clone());
                Err(fault)
            }
        }
    }

    /// A stored non-Auto mode is re-applied only if the bound lens offers it.
    fn stored_white_balance_applies(&self) -> bool {
        let mode = self.prefs.white_balance;
        if mode == WhiteBalanceMode::Auto {
            return false;
        }
        let available = self.controller.snapshot().available_white_balance_modes;
        if !available.is_empty() && !available.contains(&mode) {
            log::debug!(
                "Stored white balance {} not offered by {} lens; leaving Auto",
                mode.label(),
                self.prefs.lens_facing
            );
            return false;
        }
        true
    }

    pub fn set_flip(&mut self, flip: bool) {
        self.prefs.flip_horizontal = flip;
        if let Err(e) = UserPreferences::store_flip(&mut self.store, flip) {
            log::warn!("Failed to persist flip flag: {}", e);
        }
    }

    pub fn toggle_flip(&mut self) -> bool {
        let flip = !self.prefs.flip_horizontal;
        self.set_flip(flip);
        flip
    }

    pub fn set_white_balance(&mut self, mode: WhiteBalanceMode) -> CommandHandle {
        self.prefs.white_balance = mode;
        if let Err(e) = UserPreferences::store_white_balance(&mut self.store, mode) {
            log::warn!("Failed to persist white balance mode: {}", e);
        }
        self.controller.set_white_balance(mode)
    }

    pub fn set_zoom(&self, ratio: f32) -> CommandHandle {
        self.controller.set_zoom(ratio)
    }

    pub fn set_exposure_index(&self, index: i32) -> CommandHandle {
        self.controller.set_exposure_index(index)
    }

    pub fn set_torch(&self, enabled: bool) -> CommandHandle {
        self.controller.set_torch(enabled)
    }

    pub fn focus_at(&self, point: MeteringPoint) -> CommandHandle {
        self.controller.focus_at(point)
    }

    pub fn dismiss_initialization_fault(&mut self) {
        self.initialization_fault = None;
    }

    /// Current presentation state. Drains pending faults first.
    pub fn ui_state(&mut self) -> UiState {
        self.drain_faults();
        let expired = self
            .transient_fault
            .as_ref()
            .is_some_and(|(_, shown_at)| shown_at.elapsed() >= self.fault_ttl);
        if expired {
            self.transient_fault = None;
        }

        let router = self.controller.router_state();
        UiState {
            lens: self.prefs.lens_facing,
            mirror_preview: self.prefs.flip_horizontal,
            selected_white_balance: self.prefs.white_balance,
            capabilities: self.projector.current().clone(),
            session_phase: self.controller.session_info().phase,
            external_indicator_visible: router.external_display.is_some(),
            initialization_fault: self.initialization_fault.as_ref().map(Fault::to_string),
            transient_fault: self
                .transient_fault
                .as_ref()
                .map(|(fault, _)| fault.to_string()),
        }
    }

    fn drain_faults(&mut self) {
        loop {
            match self.faults.try_recv() {
                Ok(fault @ Fault::Initialization { .. }) => self.initialization_fault = Some(fault),
                Ok(fault @ Fault::Control { .. }) => {
                    self.transient_fault = Some((fault, Instant::now()));
                }
                // Already degraded to defaults by the controller.
                Ok(Fault::CapabilityQuery { .. }) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!("Dropped {} faults before they could be shown", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    pub async fn shutdown(&self) {
        self.controller.shutdown().await;
    }
}
