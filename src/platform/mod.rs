//! Interfaces the core consumes from the hardware and display layers.
//!
//! The camera driver stack and the display manager are external collaborators.
//! They are reached only through the narrow traits below; `crate::testing`
//! provides simulated implementations.

pub mod display_monitor;

pub use display_monitor::{external_display, DisplayEvent, DisplayMonitor};

use crate::errors::HardwareError;
use crate::sink::SinkHandle;
use crate::types::{
    CapabilitySnapshot, CapabilityUpdate, DisplayDescriptor, LensFacing, MeteringPoint,
    WhiteBalanceMode,
};
use futures::future::BoxFuture;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Completion of a dispatched hardware command
pub type PendingCommand = BoxFuture<'static, Result<(), HardwareError>>;

/// The single logical preview output of a bound session.
pub trait PreviewOutput {
    /// Points the output at the on-device sink, or detaches it with `None`.
    fn set_main_sink(&mut self, sink: Option<&SinkHandle>) -> Result<(), HardwareError>;

    /// Points the output at the external-display sink, or detaches it with `None`.
    fn set_external_sink(&mut self, sink: Option<&SinkHandle>) -> Result<(), HardwareError>;
}

/// One bound hardware session.
///
/// Only the session worker ever holds a value of this type.
pub trait CameraSession: PreviewOutput + Send + 'static {
    /// Capability values the hardware reports right now.
    fn capabilities(&self) -> CapabilitySnapshot;

    /// Registers capability observers; updates arrive on the returned channel.
    fn observe(&mut self) -> mpsc::UnboundedReceiver<CapabilityUpdate>;

    /// Unregisters every observer installed by [`CameraSession::observe`].
    fn remove_observers(&mut self);

    fn set_zoom_ratio(&mut self, ratio: f32) -> PendingCommand;

    fn set_exposure_index(&mut self, index: i32) -> PendingCommand;

    fn enable_torch(&mut self, enabled: bool) -> PendingCommand;

    fn start_focus_and_metering(
        &mut self,
        point: MeteringPoint,
        auto_cancel: Duration,
    ) -> PendingCommand;

    fn set_white_balance_mode(&mut self, mode: WhiteBalanceMode) -> PendingCommand;
}

/// Binds camera sessions for a lens and an initial output sink.
pub trait CapabilityProvider: Send + Sync + 'static {
    type Session: CameraSession;

    fn bind(
        &self,
        lens: LensFacing,
        sink: SinkHandle,
    ) -> impl Future<Output = Result<Self::Session, HardwareError>> + Send;

    /// Releases every bound session. Safe to call with nothing bound.
    fn unbind_all(&self);

    /// Secondary metadata query for the session's supported AWB modes.
    fn available_white_balance_modes(
        &self,
        session: &Self::Session,
    ) -> Result<BTreeSet<WhiteBalanceMode>, HardwareError>;
}

/// Observable set of connected output displays.
pub trait DisplayDiscovery: Send + Sync + 'static {
    fn connected_displays(&self) -> watch::Receiver<Vec<DisplayDescriptor>>;

    fn start_listening(&self);

    fn stop_listening(&self);
}
