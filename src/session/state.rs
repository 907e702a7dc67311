use crate::errors::{ControlOp, Fault};
use crate::types::{LensFacing, MeteringPoint, WhiteBalanceMode};
use serde::Serialize;
use tokio::sync::oneshot;

/// Lifecycle of the controller's single session slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Unbound,
    Binding,
    Bound,
}

/// Published session status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub phase: SessionPhase,
    /// Generation of the most recent bind attempt; 0 before the first.
    pub generation: u64,
    pub lens: Option<LensFacing>,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Unbound,
            generation: 0,
            lens: None,
        }
    }
}

/// Identifies one successful bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionHandle {
    pub generation: u64,
    pub lens: LensFacing,
}

/// A user-issued control command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    Zoom(f32),
    Exposure(i32),
    Torch(bool),
    WhiteBalance(WhiteBalanceMode),
    FocusAt(MeteringPoint),
}

impl ControlCommand {
    pub fn operation(&self) -> ControlOp {
        match self {
            ControlCommand::Zoom(_) => ControlOp::SetZoom,
            ControlCommand::Exposure(_) => ControlOp::SetExposure,
            ControlCommand::Torch(_) => ControlOp::SetTorch,
            ControlCommand::WhiteBalance(_) => ControlOp::SetWhiteBalance,
            ControlCommand::FocusAt(_) => ControlOp::FocusAt,
        }
    }
}

/// Pending completion of a fire-and-forget command.
///
/// Dropping the handle does not cancel the command.
#[derive(Debug)]
pub struct CommandHandle {
    operation: ControlOp,
    rx: oneshot::Receiver<Result<(), Fault>>,
}

impl CommandHandle {
    pub(crate) fn new(operation: ControlOp) -> (Self, oneshot::Sender<Result<(), Fault>>) {
        let (tx, rx) = oneshot::channel();
        (Self { operation, rx }, tx)
    }

    pub fn operation(&self) -> ControlOp {
        self.operation
    }

    /// Waits for hardware confirmation. A result that belonged to a
    /// superseded session resolves to a `superseded` control fault.
    pub async fn outcome(self) -> Result<(), Fault> {
        let CommandHandle { operation, rx } = self;
        rx.await
            .unwrap_or_else(|_| Err(Fault::superseded(operation)))
    }
}
