//! Travel limits and target normalization.
//!
//! Linear axes clamp out-of-range targets onto the nearest limit. Rotary
//! axes add or subtract exactly one turn, once; a target that is still out
//! of range afterwards is refused so the stored target never leaves the
//! limits.

use crate::error::ControllerError;
use serde::Serialize;
use stagectl_common::consts::{
    DEFAULT_LINEAR_LIMITS, FALLBACK_LIMITS, FULL_TURN_DEG, POSITION_DECIMALS, ROTARY_LIMITS,
};
use stagectl_common::hal::config::AxisKind;

/// Closed travel interval `[low, high]` with `low < high`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Limits {
    low: f64,
    high: f64,
}

impl Limits {
    /// Linear stage that reports no limits.
    pub const DEFAULT_LINEAR: Limits = Limits {
        low: DEFAULT_LINEAR_LIMITS.0,
        high: DEFAULT_LINEAR_LIMITS.1,
    };

    /// Used when a stage reports `low >= high`.
    pub const FALLBACK: Limits = Limits {
        low: FALLBACK_LIMITS.0,
        high: FALLBACK_LIMITS.1,
    };

    /// One turn of a rotary stage.
    pub const ROTARY: Limits = Limits {
        low: ROTARY_LIMITS.0,
        high: ROTARY_LIMITS.1,
    };

    /// Create limits.
    ///
    /// # Errors
    /// `ControllerError::Configuration` unless `low < high` (NaN included).
    pub fn new(low: f64, high: f64) -> Result<Self, ControllerError> {
        if !(low < high) {
            return Err(ControllerError::Configuration(format!(
                "low limit ({low}) must be smaller than high limit ({high})"
            )));
        }
        Ok(Self { low, high })
    }

    /// From a `(low, high)` pair.
    pub fn from_pair((low, high): (f64, f64)) -> Result<Self, ControllerError> {
        Self::new(low, high)
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Nearest value inside the limits.
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.low, self.high)
    }

    /// Apply one ±360° correction. None if the result is still out of range.
    pub fn wrap_once(&self, value: f64) -> Option<f64> {
        let wrapped = if value < self.low {
            value + FULL_TURN_DEG
        } else if value > self.high {
            value - FULL_TURN_DEG
        } else {
            value
        };
        self.contains(wrapped).then_some(wrapped)
    }

    /// Normalize a requested target for an axis of `kind`.
    ///
    /// In-range values come back unchanged, so normalizing twice is the
    /// same as normalizing once.
    ///
    /// # Errors
    /// `ControllerError::OutOfRange` for non-finite input, or a rotary value
    /// more than one turn outside the limits.
    pub fn normalize(&self, kind: AxisKind, value: f64) -> Result<f64, ControllerError> {
        let out_of_range = || ControllerError::OutOfRange {
            value,
            low: self.low,
            high: self.high,
        };

        if !value.is_finite() {
            return Err(out_of_range());
        }

        match kind {
            AxisKind::Linear => Ok(self.clamp(value)),
            AxisKind::Rotary => self.wrap_once(value).ok_or_else(out_of_range),
        }
    }
}

/// Round a position to the precision used for change detection.
pub fn round_position(value: f64) -> f64 {
    let scale = 10f64.powi(POSITION_DECIMALS);
    (value * scale).round() / scale
}
