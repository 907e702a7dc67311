//! Data model shared by the session controller, the surface router and the projector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::assert_invariant;

/// Which physical lens a session is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    Front,
    Back,
}

impl LensFacing {
    /// Integer code used in the persisted preference bag
    pub fn code(self) -> i64 {
        match self {
            LensFacing::Front => 0,
            LensFacing::Back => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(LensFacing::Front),
            1 => Some(LensFacing::Back),
            _ => None,
        }
    }

    /// The opposite lens, used by the lens toggle
    pub fn toggled(self) -> Self {
        match self {
            LensFacing::Front => LensFacing::Back,
            LensFacing::Back => LensFacing::Front,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LensFacing::Front => "front",
            LensFacing::Back => "back",
        }
    }
}

impl fmt::Display for LensFacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auto white-balance modes a capability provider may report.
///
/// Codes follow the hardware AWB mode numbering so that they can be persisted
/// and handed to providers unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WhiteBalanceMode {
    Off,
    Auto,
    Incandescent,
    Fluorescent,
    WarmFluorescent,
    Daylight,
    Cloudy,
    Twilight,
    Shade,
}

impl WhiteBalanceMode {
    pub fn code(self) -> i64 {
        match self {
            WhiteBalanceMode::Off => 0,
            WhiteBalanceMode::Auto => 1,
            WhiteBalanceMode::Incandescent => 2,
            WhiteBalanceMode::Fluorescent => 3,
            WhiteBalanceMode::WarmFluorescent => 4,
            WhiteBalanceMode::Daylight => 5,
            WhiteBalanceMode::Cloudy => 6,
            WhiteBalanceMode::Twilight => 7,
            WhiteBalanceMode::Shade => 8,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        let mode = match code {
            0 => WhiteBalanceMode::Off,
            1 => WhiteBalanceMode::Auto,
            2 => WhiteBalanceMode::Incandescent,
            3 => WhiteBalanceMode::Fluorescent,
            4 => WhiteBalanceMode::WarmFluorescent,
            5 => WhiteBalanceMode::Daylight,
            6 => WhiteBalanceMode::Cloudy,
            7 => WhiteBalanceMode::Twilight,
            8 => WhiteBalanceMode::Shade,
            _ => return None,
        };
        Some(mode)
    }

    pub fn label(self) -> &'static str {
        match self {
            WhiteBalanceMode::Off => "Off",
            WhiteBalanceMode::Auto => "Auto",
            WhiteBalanceMode::Incandescent => "Incandescent",
            WhiteBalanceMode::Fluorescent => "Fluorescent",
            WhiteBalanceMode::WarmFluorescent => "Warm fluorescent",
            WhiteBalanceMode::Daylight => "Daylight",
            WhiteBalanceMode::Cloudy => "Cloudy",
            WhiteBalanceMode::Twilight => "Twilight",
            WhiteBalanceMode::Shade => "Shade",
        }
    }
}

/// Exposure compensation step as a rational number of EV per index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureStep {
    pub numerator: i32,
    pub denominator: i32,
}

impl ExposureStep {
    pub const ZERO: ExposureStep = ExposureStep {
        numerator: 0,
        denominator: 1,
    };

    pub fn new(numerator: i32, denominator: i32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// EV per index step; a zero denominator reads as zero
    pub fn as_f32(self) -> f32 {
        if self.denominator == 0 {
            0.0
        } else {
            self.numerator as f32 / self.denominator as f32
        }
    }
}

impl Default for ExposureStep {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Zoom state as pushed by the provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomState {
    pub ratio: f32,
    pub min: f32,
    pub max: f32,
}

/// Exposure compensation state as pushed by the provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureState {
    pub index: i32,
    pub min: i32,
    pub max: i32,
    pub step: ExposureStep,
    pub supported: bool,
}

/// One capability property change pushed by a provider observer
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityUpdate {
    Zoom(ZoomState),
    Exposure(ExposureState),
    Torch(bool),
    FlashUnit(bool),
    WhiteBalanceModes(BTreeSet<WhiteBalanceMode>),
}

/// Immutable point-in-time view of what the bound session supports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    pub zoom_ratio: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub exposure_index: i32,
    pub min_exposure_index: i32,
    pub max_exposure_index: i32,
    pub exposure_step: ExposureStep,
    pub exposure_supported: bool,
    pub has_flash_unit: bool,
    pub torch_on: bool,
    pub available_white_balance_modes: BTreeSet<WhiteBalanceMode>,
}

impl CapabilitySnapshot {
    /// Degenerate snapshot published while no session is bound
    pub fn unsupported() -> Self {
        Self {
            zoom_ratio: 1.0,
            min_zoom: 1.0,
            max_zoom: 1.0,
            exposure_index: 0,
            min_exposure_index: 0,
            max_exposure_index: 0,
            exposure_step: ExposureStep::ZERO,
            exposure_supported: false,
            has_flash_unit: false,
            torch_on: false,
            available_white_balance_modes: BTreeSet::new(),
        }
    }

    pub fn zoom_supported(&self) -> bool {
        self.min_zoom < self.max_zoom
    }

    /// Returns a new snapshot with `update` replacing the matching fields.
    pub fn with_update(&self, update: CapabilityUpdate) -> Self {
        let mut next = self.clone();
        match update {
            CapabilityUpdate::Zoom(zoom) => {
                next.zoom_ratio = zoom.ratio;
                next.min_zoom = zoom.min;
                next.max_zoom = zoom.max;
            }
            CapabilityUpdate::Exposure(exposure) => {
                next.exposure_index = exposure.index;
                next.min_exposure_index = exposure.min;
                next.max_exposure_index = exposure.max;
                next.exposure_step = exposure.step;
                next.exposure_supported = exposure.supported;
            }
            CapabilityUpdate::Torch(on) => next.torch_on = on,
            CapabilityUpdate::FlashUnit(present) => next.has_flash_unit = present,
            CapabilityUpdate::WhiteBalanceModes(modes) => {
                next.available_white_balance_modes = modes;
            }
        }
        next.normalized()
    }

    /// Repairs provider values so every range is ordered and contains its
    /// current value. Non-finite zoom values collapse to the 1.0 point.
    pub fn normalized(mut self) -> Self {
        if !self.min_zoom.is_finite() || !self.max_zoom.is_finite() {
            self.min_zoom = 1.0;
            self.max_zoom = 1.0;
        }
        if self.min_zoom > self.max_zoom {
            std::mem::swap(&mut self.min_zoom, &mut self.max_zoom);
        }
        self.zoom_ratio = if self.zoom_ratio.is_nan() {
            self.min_zoom
        } else {
            clamp_f32(self.zoom_ratio, self.min_zoom, self.max_zoom)
        };

        if self.min_exposure_index > self.max_exposure_index {
            std::mem::swap(&mut self.min_exposure_index, &mut self.max_exposure_index);
        }
        self.exposure_index = self
            .exposure_index
            .clamp(self.min_exposure_index, self.max_exposure_index);

        assert_invariant!(
            self.min_zoom <= self.zoom_ratio && self.zoom_ratio <= self.max_zoom,
            "Snapshot zoom ratio lies within its range",
            "CapabilitySnapshot::normalized"
        );
        assert_invariant!(
            self.min_exposure_index <= self.exposure_index
                && self.exposure_index <= self.max_exposure_index,
            "Snapshot exposure index lies within its range",
            "CapabilitySnapshot::normalized"
        );
        self
    }

    /// Zoom ratio to forward for a requested value. `None` for NaN;
    /// infinities land on the matching bound.
    pub fn clamp_zoom(&self, requested: f32) -> Option<f32> {
        if requested.is_nan() {
            return None;
        }
        let (lo, hi) = ordered_f32(self.min_zoom, self.max_zoom);
        Some(clamp_f32(requested, lo, hi))
    }

    pub fn clamp_exposure(&self, requested: i32) -> i32 {
        let lo = self.min_exposure_index.min(self.max_exposure_index);
        let hi = self.min_exposure_index.max(self.max_exposure_index);
        requested.clamp(lo, hi)
    }
}

impl Default for CapabilitySnapshot {
    fn default() -> Self {
        Self::unsupported()
    }
}

fn ordered_f32(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn clamp_f32(value: f32, lo: f32, hi: f32) -> f32 {
    if value < lo {
        lo
    } else if value > hi {
        hi
    } else {
        value
    }
}

/// Tap-to-focus target in normalized preview coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeteringPoint {
    pub x: f32,
    pub y: f32,
}

impl MeteringPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Clamps both coordinates into `[0, 1]`; `None` if either is NaN.
    pub fn clamped(self) -> Option<Self> {
        if self.x.is_nan() || self.y.is_nan() {
            return None;
        }
        Some(Self {
            x: clamp_f32(self.x, 0.0, 1.0),
            y: clamp_f32(self.y, 0.0, 1.0),
        })
    }
}

/// One output display reported by the display discovery provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayDescriptor {
    pub id: u32,
    pub name: String,
}

impl DisplayDescriptor {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
