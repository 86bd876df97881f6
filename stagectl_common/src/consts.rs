//! Workspace-wide constants.
//!
//! Single source of truth for defaults used by the controller, the drivers and
//! the configuration layer.

/// Interval between two status polls of a connected axis, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Decimal places kept when publishing an estimated position.
pub const POSITION_DECIMALS: i32 = 3;

/// One full revolution of a rotary stage, in degrees.
pub const FULL_TURN_DEG: f64 = 360.0;

/// Travel bounds used when a linear stage does not report its limits.
pub const DEFAULT_LINEAR_LIMITS: (f64, f64) = (-5.0, 5.0);

/// Travel bounds used when a stage reports `low >= high`.
pub const FALLBACK_LIMITS: (f64, f64) = (-1.0, 1.0);

/// Travel bounds of a rotary stage.
pub const ROTARY_LIMITS: (f64, f64) = (0.0, FULL_TURN_DEG);

/// Default motion speed in configured units per second.
pub const DEFAULT_SPEED: f64 = 10.0;

/// Default step size in configured units.
pub const DEFAULT_STEP_SIZE: f64 = 1.0;

/// Speed used while searching the encoder index.
pub const DEFAULT_INDEX_SPEED: f64 = 500.0;

/// Out-of-range target commanded to trigger the index search.
pub const DEFAULT_INDEX_APPROACH: f64 = -300.0;

/// Registry name of the driver used when an axis does not name one.
pub const DEFAULT_DRIVER: &str = "simulation";

/// Default station configuration path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/stagectl/station.toml";
