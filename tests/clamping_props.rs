//! Property-based tests for command coercion and UI projection
//!
//! Run with: cargo test --test clamping_props

use mirrorcam::projector::{project, supported_white_balance_presets, MASTER_WHITE_BALANCE_PRESETS};
use mirrorcam::testing::{HardwareCall, SimulatedProvider};
use mirrorcam::{
    create_sink, CameraController, CapabilitySnapshot, CapabilityUpdate, ControllerOptions,
    ExposureState, ExposureStep, LensFacing, WhiteBalanceMode, ZoomState,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Bind the back lens and return the value the hardware saw for one command.
fn forwarded(command: impl FnOnce(&CameraController)) -> Vec<HardwareCall> {
    tokio_test::block_on(async move {
        let provider = SimulatedProvider::new();
        let controller = CameraController::spawn(provider.clone(), ControllerOptions::default());
        controller
            .initialize(LensFacing::Back, create_sink("main").into_ready())
            .await
            .unwrap();
        provider.clear_calls();
        command(&controller);
        // A later command completes only after the earlier one was dispatched.
        let _ = controller.set_torch(false).outcome().await;
        controller.shutdown().await;
        provider.calls()
    })
}

fn any_mode() -> impl Strategy<Value = WhiteBalanceMode> {
    (0i64..=8).prop_map(|code| WhiteBalanceMode::from_code(code).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// INVARIANT: forwarded zoom equals clamp(z, 1.0, 8.0) for the back lens
    #[test]
    fn zoom_forwarded_clamped(z in -100.0f32..100.0) {
        let calls = forwarded(|c| { c.set_zoom(z); });
        let expected = z.clamp(1.0, 8.0);
        prop_assert_eq!(calls.first(), Some(&HardwareCall::SetZoomRatio(expected)));
    }

    /// INVARIANT: forwarded exposure equals clamp(i, -2, 2)
    #[test]
    fn exposure_forwarded_clamped(i in -1000i32..1000) {
        let calls = forwarded(|c| { c.set_exposure_index(i); });
        prop_assert_eq!(calls.first(), Some(&HardwareCall::SetExposureIndex(i.clamp(-2, 2))));
    }

    /// INVARIANT: zoomSupported == (minZoom < maxZoom) for every snapshot
    #[test]
    fn zoom_supported_matches_range(
        ratio in -10.0f32..10.0,
        min in -10.0f32..10.0,
        max in -10.0f32..10.0,
    ) {
        let snapshot = CapabilitySnapshot::unsupported()
            .with_update(CapabilityUpdate::Zoom(ZoomState { ratio, min, max }));
        let view = project(&snapshot);
        prop_assert_eq!(view.zoom_supported, snapshot.min_zoom < snapshot.max_zoom);
        prop_assert!(snapshot.min_zoom <= snapshot.zoom_ratio);
        prop_assert!(snapshot.zoom_ratio <= snapshot.max_zoom);
    }

    /// INVARIANT: normalized exposure state always contains its index
    #[test]
    fn exposure_index_within_range(
        index in -50i32..50,
        min in -50i32..50,
        max in -50i32..50,
        supported in any::<bool>(),
    ) {
        let snapshot = CapabilitySnapshot::unsupported().with_update(CapabilityUpdate::Exposure(
            ExposureState { index, min, max, step: ExposureStep::new(1, 2), supported },
        ));
        prop_assert!(snapshot.min_exposure_index <= snapshot.exposure_index);
        prop_assert!(snapshot.exposure_index <= snapshot.max_exposure_index);
        prop_assert_eq!(project(&snapshot).exposure_supported, supported);
    }

    /// INVARIANT: presets are the master-ordered intersection, never empty
    #[test]
    fn presets_are_ordered_intersection(modes in prop::collection::btree_set(any_mode(), 0..9)) {
        let presets = supported_white_balance_presets(&modes);
        prop_assert!(!presets.is_empty());
        let expected: Vec<_> = MASTER_WHITE_BALANCE_PRESETS
            .iter()
            .copied()
            .filter(|m| modes.contains(m))
            .collect();
        if expected.is_empty() {
            prop_assert_eq!(presets, vec![WhiteBalanceMode::Auto]);
        } else {
            prop_assert_eq!(presets, expected);
        }
    }
}

#[test]
fn non_finite_zoom_edges() {
    let calls = forwarded(|c| {
        c.set_zoom(f32::NAN);
        c.set_zoom(f32::INFINITY);
        c.set_zoom(f32::NEG_INFINITY);
    });
    let zooms: Vec<_> = calls
        .into_iter()
        .filter(|c| matches!(c, HardwareCall::SetZoomRatio(_)))
        .collect();
    assert_eq!(
        zooms,
        vec![HardwareCall::SetZoomRatio(8.0), HardwareCall::SetZoomRatio(1.0)]
    );
}

#[test]
fn presets_example_from_master_list() {
    let available: BTreeSet<_> = [WhiteBalanceMode::Auto, WhiteBalanceMode::Daylight]
        .into_iter()
        .collect();
    assert_eq!(
        supported_white_balance_presets(&available),
        vec![WhiteBalanceMode::Auto, WhiteBalanceMode::Daylight]
    );
}
