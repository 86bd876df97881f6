//! Prelude module for common re-exports.
//!
//! ```rust
//! use stagectl_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::hal::config::{AxisConfig, AxisKind, IndexConfig, StationConfig, Units};

// ─── Driver seam ────────────────────────────────────────────────────
pub use crate::hal::driver::{
    CancelToken, DriverError, DriverFactory, IndexSearch, SearchWait, StageDriver,
};
pub use crate::hal::types::{AxisReadout, StageInfo, StatusFlags};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{
    DEFAULT_LINEAR_LIMITS, DEFAULT_POLL_INTERVAL_MS, FALLBACK_LIMITS, FULL_TURN_DEG,
    POSITION_DECIMALS, ROTARY_LIMITS,
};

/// Default poll interval as Duration.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);
