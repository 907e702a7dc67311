//! Testing utilities for mirrorcam
//!
//! Simulated capability and display providers so the controller, router and
//! holder can be exercised offline. The `mirrorcam-sim` binary drives the
//! same simulators.

pub mod simulated_displays;
pub mod simulated_provider;

pub use simulated_displays::SimulatedDisplays;
pub use simulated_provider::{HardwareCall, LensProfile, SimulatedCamera, SimulatedProvider};
