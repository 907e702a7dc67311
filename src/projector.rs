//! UI state projection
//!
//! Pure derivations from the latest [`CapabilitySnapshot`]: slider ranges,
//! enabled flags, formatted labels and the white-balance preset list. Each
//! new snapshot replaces the previous projection entirely.

use crate::types::{CapabilitySnapshot, WhiteBalanceMode};
use serde::Serialize;
use std::collections::BTreeSet;
use tokio::sync::watch;

/// Presets offered to the user, in display order
pub const MASTER_WHITE_BALANCE_PRESETS: [WhiteBalanceMode; 5] = [
    WhiteBalanceMode::Auto,
    WhiteBalanceMode::Incandescent,
    WhiteBalanceMode::Fluorescent,
    WhiteBalanceMode::Daylight,
    WhiteBalanceMode::Cloudy,
];

/// UI-bindable values derived from one snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityView {
    pub zoom_supported: bool,
    pub zoom_ratio: f32,
    pub zoom_range: (f32, f32),
    pub zoom_label: String,
    pub exposure_supported: bool,
    pub exposure_index: i32,
    pub exposure_range: (i32, i32),
    pub exposure_label: String,
    pub led_enabled: bool,
    pub led_is_on: bool,
    pub white_balance_presets: Vec<WhiteBalanceMode>,
}

/// Project `snapshot` into UI values.
pub fn project(snapshot: &CapabilitySnapshot) -> CapabilityView {
    CapabilityView {
        zoom_supported: snapshot.zoom_supported(),
        zoom_ratio: snapshot.zoom_ratio,
        zoom_range: (snapshot.min_zoom, snapshot.max_zoom),
        zoom_label: format_zoom(snapshot.zoom_ratio),
        exposure_supported: snapshot.exposure_supported,
        exposure_index: snapshot.exposure_index,
        exposure_range: (snapshot.min_exposure_index, snapshot.max_exposure_index),
        exposure_label: format_exposure(
            snapshot.exposure_index as f32 * snapshot.exposure_step.as_f32(),
        ),
        led_enabled: snapshot.has_flash_unit,
        // Hardware truth only; never set ahead of confirmation.
        led_is_on: snapshot.torch_on,
        white_balance_presets: supported_white_balance_presets(
            &snapshot.available_white_balance_modes,
        ),
    }
}

/// Master presets the hardware reports, in master order. Never empty: with
/// no overlap (including an empty report) the list is `[Auto]`.
pub fn supported_white_balance_presets(
    available: &BTreeSet<WhiteBalanceMode>,
) -> Vec<WhiteBalanceMode> {
    let presets: Vec<_> = MASTER_WHITE_BALANCE_PRESETS
        .iter()
        .copied()
        .filter(|mode| available.contains(mode))
        .collect();
    if presets.is_empty() {
        vec![WhiteBalanceMode::Auto]
    } else {
        presets
    }
}

pub fn format_zoom(ratio: f32) -> String {
    format!("{:.1}x", ratio)
}

pub fn format_exposure(ev: f32) -> String {
    // Avoid "-0.0 EV" for tiny negative values.
    let rounded = (ev * 10.0).round() / 10.0;
    if rounded > 0.0 {
        format!("+{:.1} EV", rounded)
    } else if rounded < 0.0 {
        format!("{:.1} EV", rounded)
    } else {
        "0.0 EV".to_string()
    }
}

/// Keeps a projection in step with a snapshot channel.
pub struct UiStateProjector {
    snapshots: watch::Receiver<CapabilitySnapshot>,
    current: CapabilityView,
}

impl UiStateProjector {
    pub fn new(mut snapshots: watch::Receiver<CapabilitySnapshot>) -> Self {
        let current = project(&snapshots.borrow_and_update());
        Self { snapshots, current }
    }

    /// Latest projection, recomputed if a newer snapshot was published.
    pub fn current(&mut self) -> &CapabilityView {
        if self.snapshots.has_changed().unwrap_or(false) {
            self.current = project(&self.snapshots.borrow_and_update());
        }
        &self.current
    }

    /// Wait for the next snapshot. `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<&CapabilityView> {
        self.snapshots.changed().await.ok()?;
        self.current = project(&self.snapshots.borrow_and_update());
        Some(&self.current)
    }
}
