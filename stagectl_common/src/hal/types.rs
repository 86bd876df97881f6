//! Hardware readout types.
//!
//! - `StatusFlags` - status word, bit layout modelled on the piezo controller STAT register
//! - `AxisReadout` - one status sample (position + flags)
//! - `StageInfo` - what the hardware reports when a session opens

use crate::hal::config::{AxisKind, Units};
use bitflags::bitflags;

bitflags! {
    /// Status bits reported by a stage controller.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatusFlags: u32 {
        /// Drive amplifiers are powered.
        const AMPLIFIERS_ENABLED = 1 << 0;
        /// Absolute position is known (index found).
        const ENCODER_VALID = 1 << 1;
        /// An index search is running.
        const SEARCHING_INDEX = 1 << 2;
        /// The stage is within its position window around the target.
        const POSITION_REACHED = 1 << 3;
        /// Encoder read error.
        const ENCODER_ERROR = 1 << 4;
        /// Stage sits on its low end.
        const AT_LOW_END = 1 << 5;
        /// Stage sits on its high end.
        const AT_HIGH_END = 1 << 6;
    }
}

/// One status sample read from the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisReadout {
    /// Estimated position in axis units.
    pub position: f64,
    /// Status word.
    pub flags: StatusFlags,
}

impl AxisReadout {
    /// Create a readout.
    pub fn new(position: f64, flags: StatusFlags) -> Self {
        Self { position, flags }
    }

    pub fn encoder_valid(&self) -> bool {
        self.flags.contains(StatusFlags::ENCODER_VALID)
    }

    pub fn encoder_error(&self) -> bool {
        self.flags.contains(StatusFlags::ENCODER_ERROR)
    }

    pub fn searching_index(&self) -> bool {
        self.flags.contains(StatusFlags::SEARCHING_INDEX)
    }

    pub fn position_reached(&self) -> bool {
        self.flags.contains(StatusFlags::POSITION_REACHED)
    }

    pub fn at_low_end(&self) -> bool {
        self.flags.contains(StatusFlags::AT_LOW_END)
    }

    pub fn at_high_end(&self) -> bool {
        self.flags.contains(StatusFlags::AT_HIGH_END)
    }
}

/// Stage description reported when a session opens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageInfo {
    /// Linear or rotary.
    pub kind: AxisKind,
    /// Units the hardware is currently using.
    pub units: Units,
    /// Reported low travel bound, if the controller has one configured.
    pub low_limit: Option<f64>,
    /// Reported high travel bound.
    pub high_limit: Option<f64>,
    /// Whether the stage supports an index search.
    pub has_index: bool,
}

impl StageInfo {
    /// Linear stage without reported limits.
    pub fn linear(units: Units) -> Self {
        Self {
            kind: AxisKind::Linear,
            units,
            low_limit: None,
            high_limit: None,
            has_index: true,
        }
    }

    /// Rotary stage in degrees.
    pub fn rotary() -> Self {
        Self {
            kind: AxisKind::Rotary,
            units: Units::Deg,
            low_limit: None,
            high_limit: None,
            has_index: true,
        }
    }

    /// Set reported limits.
    pub fn with_limits(mut self, low: f64, high: f64) -> Self {
        self.low_limit = Some(low);
        self.high_limit = Some(high);
        self
    }

    /// Mark the stage as having no index mark.
    pub fn without_index(mut self) -> Self {
        self.has_index = false;
        self
    }
}
