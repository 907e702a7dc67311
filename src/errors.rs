//! Fault taxonomy and crate error types.
//!
//! Provider implementations report [`HardwareError`]; the session controller
//! converts every one of them into a [`Fault`] before anything reaches the UI.
//! [`MirrorCamError`] covers configuration and preference I/O.

use crate::types::LensFacing;
use std::fmt;
use thiserror::Error;

/// Which control a [`Fault::Control`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlOp {
    SetZoom,
    SetExposure,
    SetTorch,
    SetWhiteBalance,
    FocusAt,
    SetMainSink,
    SetExternalSink,
}

impl ControlOp {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlOp::SetZoom => "set_zoom",
            ControlOp::SetExposure => "set_exposure_index",
            ControlOp::SetTorch => "set_torch",
            ControlOp::SetWhiteBalance => "set_white_balance",
            ControlOp::FocusAt => "focus_at",
            ControlOp::SetMainSink => "set_main_sink",
            ControlOp::SetExternalSink => "set_external_sink",
        }
    }
}

impl fmt::Display for ControlOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reported, non-fatal error condition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// Session bind failed. Shown until the user dismisses it.
    #[error("Camera initialization failed: {message}")]
    Initialization { message: String },
    /// A command was rejected before dispatch or failed in hardware.
    #[error("{operation} failed: {message}")]
    Control { operation: ControlOp, message: String },
    /// A metadata query failed; the capability degrades to its default.
    #[error("Capability query failed: {message}")]
    CapabilityQuery { message: String },
}

impl Fault {
    pub fn initialization(message: impl Into<String>) -> Self {
        Fault::Initialization {
            message: message.into(),
        }
    }

    pub fn control(operation: ControlOp, message: impl Into<String>) -> Self {
        Fault::Control {
            operation,
            message: message.into(),
        }
    }

    pub fn capability_query(message: impl Into<String>) -> Self {
        Fault::CapabilityQuery {
            message: message.into(),
        }
    }

    pub fn no_session(operation: ControlOp) -> Self {
        Self::control(operation, "no camera session is bound")
    }

    pub fn superseded(operation: ControlOp) -> Self {
        Self::control(operation, "superseded")
    }

    /// Persistent faults stay visible until dismissed; the rest expire.
    pub fn is_persistent(&self) -> bool {
        matches!(self, Fault::Initialization { .. })
    }

    pub fn operation(&self) -> Option<ControlOp> {
        match self {
            Fault::Control { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

/// Errors raised by capability provider implementations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    #[error("camera provider unavailable: {0}")]
    Unavailable(String),
    #[error("no camera matches lens facing {0}")]
    NoMatchingLens(LensFacing),
    #[error("camera permission revoked")]
    PermissionRevoked,
    #[error("preview sink not ready: {0}")]
    SinkNotReady(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
    #[error("command rejected: {0}")]
    Rejected(String),
}

/// Configuration and preference persistence errors
#[derive(Debug, Error)]
pub enum MirrorCamError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("camera controller is no longer running")]
    ControllerClosed,
}
