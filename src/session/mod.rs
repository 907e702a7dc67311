//! Camera session controller
//!
//! Owns the one active hardware session, republishes its capabilities as an
//! immutable snapshot and executes control commands against it. Every bind
//! gets a fresh generation id; observer updates and command results tagged
//! with an older generation are discarded.

mod controller;
mod state;
mod worker;

pub use controller::{CameraController, ControllerOptions};
pub use state::{CommandHandle, ControlCommand, SessionHandle, SessionInfo, SessionPhase};
