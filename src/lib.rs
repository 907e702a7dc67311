//! mirrorcam: camera session and control state core with external display mirroring
//!
//! This crate owns one hardware camera session at a time, republishes its
//! capabilities as immutable snapshots and executes zoom, exposure, torch,
//! white-balance and tap-to-focus commands against it. A single logical
//! preview output is routed between the on-device sink and an external
//! display sink.
//!
//! # Features
//! - Single-writer session worker with generation-tagged stale event dropping
//! - Clamped, validated control commands with asynchronous fault reporting
//! - Detach-then-attach preview handoff driven by display hot-plug
//! - UI projection of capability state with explicit "supported" policy
//! - Key-value preference retention for lens, flip and white balance
//!
//! # Usage
//! ```rust,no_run
//! use mirrorcam::{create_sink, CameraController, ControllerOptions, LensFacing};
//! use mirrorcam::testing::SimulatedProvider;
//!
//! # async fn demo() {
//! let controller = CameraController::spawn(SimulatedProvider::new(), ControllerOptions::default());
//! let primary = create_sink("main").into_ready();
//! controller.initialize(LensFacing::Back, primary).await.unwrap();
//! controller.set_zoom(2.0);
//! controller.shutdown().await;
//! # }
//! ```
pub mod config;
pub mod errors;
pub mod holder;
pub mod invariant_ppt;
pub mod platform;
pub mod preferences;
pub mod projector;
pub mod router;
pub mod session;
pub mod sink;
pub mod types;

// Simulated providers for offline testing and the demo binary
pub mod testing;

// Re-exports for convenience
pub use config::MirrorCamConfig;
pub use errors::{ControlOp, Fault, HardwareError, MirrorCamError};
pub use holder::{SessionHolder, UiState};
pub use platform::{
    CameraSession, CapabilityProvider, DisplayDiscovery, DisplayEvent, DisplayMonitor,
    PreviewOutput,
};
pub use preferences::{
    MemoryPreferenceStore, PreferenceStore, TomlPreferenceStore, UserPreferences,
};
pub use projector::{project, CapabilityView, UiStateProjector};
pub use router::{RouterState, SinkRole};
pub use session::{
    CameraController, CommandHandle, ControlCommand, ControllerOptions, SessionHandle,
    SessionInfo, SessionPhase,
};
pub use sink::{create_sink, PendingSink, SinkHandle};
pub use types::{
    CapabilitySnapshot, CapabilityUpdate, DisplayDescriptor, ExposureState, ExposureStep,
    LensFacing, MeteringPoint, WhiteBalanceMode, ZoomState,
};

/// Initialize logging for the camera core
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "mirrorcam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "mirrorcam");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
    }
}
