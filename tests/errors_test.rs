#[cfg(test)]
mod error_tests {
    use mirrorcam::errors::{ControlOp, Fault, HardwareError, MirrorCamError};
    use mirrorcam::LensFacing;
    use std::error::Error;

    #[test]
    fn test_initialization_fault_display() {
        let fault = Fault::initialization("camera permission revoked");
        assert_eq!(
            fault.to_string(),
            "Camera initialization failed: camera permission revoked"
        );
        assert!(fault.is_persistent());
    }

    #[test]
    fn test_control_fault_carries_operation() {
        let fault = Fault::control(ControlOp::SetExposure, "out of range");
        assert_eq!(fault.to_string(), "set_exposure_index failed: out of range");
        assert_eq!(fault.operation(), Some(ControlOp::SetExposure));
        assert!(!fault.is_persistent());
    }

    #[test]
    fn test_capability_query_fault_display() {
        let fault = Fault::capability_query("metadata unavailable");
        assert!(fault.to_string().contains("Capability query failed"));
        assert_eq!(fault.operation(), None);
    }

    #[test]
    fn test_operation_names() {
        let names: Vec<_> = [
            ControlOp::SetZoom,
            ControlOp::SetExposure,
            ControlOp::SetTorch,
            ControlOp::SetWhiteBalance,
            ControlOp::FocusAt,
            ControlOp::SetMainSink,
            ControlOp::SetExternalSink,
        ]
        .iter()
        .map(|op| op.to_string())
        .collect();
        assert_eq!(
            names,
            vec![
                "set_zoom",
                "set_exposure_index",
                "set_torch",
                "set_white_balance",
                "focus_at",
                "set_main_sink",
                "set_external_sink",
            ]
        );
    }

    #[test]
    fn test_hardware_error_messages() {
        assert_eq!(
            HardwareError::NoMatchingLens(LensFacing::Back).to_string(),
            "no camera matches lens facing back"
        );
        assert_eq!(
            HardwareError::PermissionRevoked.to_string(),
            "camera permission revoked"
        );
        assert!(HardwareError::SinkNotReady("detached".into())
            .to_string()
            .contains("not ready"));
    }

    #[test]
    fn test_faults_implement_error_trait() {
        let fault = Fault::no_session(ControlOp::SetTorch);
        let _error_trait: &dyn Error = &fault;
        assert!(fault.source().is_none());
        assert!(fault.to_string().contains("no camera session is bound"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = MirrorCamError::Io {
            path: "/tmp/prefs.toml".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/prefs.toml"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_superseded_fault() {
        assert_eq!(
            Fault::superseded(ControlOp::SetZoom),
            Fault::control(ControlOp::SetZoom, "superseded")
        );
    }
}
