//! Station configuration types.
//!
//! - `StationConfig` - the whole `station.toml`
//! - `AxisConfig` - one motorized axis (identity, motion defaults, limits)
//! - `IndexConfig` - index search parameters
//! - `SimulationConfig` - knobs read only by the simulation driver
//!
//! # TOML Example
//!
//! ```toml
//! poll_interval_ms = 500
//!
//! [shared]
//! service_name = "microscope-stages"
//!
//! [[axes]]
//! name = "X"
//! serial_number = "7583835373835180D020"
//! kind = "linear"
//! units = "mm"
//!
//! [[axes]]
//! name = "R"
//! kind = "rotary"
//! units = "deg"
//! port = "/dev/ttyACM4"
//! ```

use crate::config::{ConfigError, SharedConfig, Validate};
use crate::consts::{
    DEFAULT_DRIVER, DEFAULT_INDEX_APPROACH, DEFAULT_INDEX_SPEED, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_SPEED, DEFAULT_STEP_SIZE,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f64::consts::PI;
use std::time::Duration;
use tracing::warn;

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

fn default_speed() -> f64 {
    DEFAULT_SPEED
}

fn default_step_size() -> f64 {
    DEFAULT_STEP_SIZE
}

fn default_index_speed() -> f64 {
    DEFAULT_INDEX_SPEED
}

fn default_index_approach() -> f64 {
    DEFAULT_INDEX_APPROACH
}

fn default_true() -> bool {
    true
}

/// Main configuration loaded from `station.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Common fields (service name, log level).
    pub shared: SharedConfig,

    /// Status poll interval for every connected axis.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Configured axes, in display order.
    #[serde(default)]
    pub axes: Vec<AxisConfig>,
}

impl StationConfig {
    /// Poll interval as Duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Find an axis by name (case-sensitive, e.g. `"Z3"`).
    pub fn axis(&self, name: &str) -> Option<&AxisConfig> {
        self.axes.iter().find(|a| a.name == name)
    }
}

impl Validate for StationConfig {
    /// # Validation Rules
    /// 1. `shared` valid
    /// 2. `poll_interval_ms` > 0
    /// 3. axis names unique
    /// 4. every axis valid on its own
    fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for axis in &self.axes {
            if !names.insert(axis.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate axis name: {}",
                    axis.name
                )));
            }
            axis.validate()?;
        }

        Ok(())
    }
}

/// Per-axis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Axis letter (unique identifier, e.g. "X", "Z3", "R").
    pub name: String,

    /// Registered driver name.
    #[serde(default = "default_driver")]
    pub driver: String,

    /// USB serial number used to locate the controller's port.
    #[serde(default)]
    pub serial_number: Option<String>,

    /// Explicit port; skips discovery when set.
    #[serde(default)]
    pub port: Option<String>,

    /// Stage kind. The hardware report wins after connection.
    #[serde(default)]
    pub kind: AxisKind,

    /// Units used for positions, speed and step size.
    #[serde(default)]
    pub units: Units,

    /// Initial speed in units per second.
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Initial step size in units.
    #[serde(default = "default_step_size")]
    pub step_size: f64,

    /// Travel bounds used before the hardware reports its own.
    #[serde(default)]
    pub low_limit: Option<f64>,
    #[serde(default)]
    pub high_limit: Option<f64>,

    /// Index search parameters.
    #[serde(default)]
    pub index: IndexConfig,

    /// Simulation-only parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl AxisConfig {
    /// Minimal linear axis with defaults, mostly for tests and tools.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: default_driver(),
            serial_number: None,
            port: None,
            kind: AxisKind::Linear,
            units: Units::Mm,
            speed: DEFAULT_SPEED,
            step_size: DEFAULT_STEP_SIZE,
            low_limit: None,
            high_limit: None,
            index: IndexConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }

    /// Same as `new` but rotary, in degrees.
    pub fn rotary(name: impl Into<String>) -> Self {
        Self {
            kind: AxisKind::Rotary,
            units: Units::Deg,
            ..Self::new(name)
        }
    }

    /// Both configured limits, if both are present.
    pub fn configured_limits(&self) -> Option<(f64, f64)> {
        self.low_limit.zip(self.high_limit)
    }
}

impl Validate for AxisConfig {
    /// # Validation Rules
    /// 1. `name` not empty
    /// 2. `speed` > 0, `step_size` > 0, index speed > 0
    /// 3. `low_limit` < `high_limit` (if both set)
    /// 4. exactly one of the two limits set is an error
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Axis has empty name".to_string(),
            ));
        }

        if !(self.speed > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "Axis '{}': speed must be > 0",
                self.name
            )));
        }

        if !(self.step_size > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "Axis '{}': step_size must be > 0",
                self.name
            )));
        }

        if self.index.enabled && !(self.index.speed > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "Axis '{}': index.speed must be > 0",
                self.name
            )));
        }

        match (self.low_limit, self.high_limit) {
            (Some(low), Some(high)) if low >= high => {
                return Err(ConfigError::ValidationError(format!(
                    "Axis '{}': low_limit ({}) must be < high_limit ({})",
                    self.name, low, high
                )));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::ValidationError(format!(
                    "Axis '{}': low_limit and high_limit must be set together",
                    self.name
                )));
            }
            _ => {}
        }

        if self.kind == AxisKind::Rotary && !self.units.is_angular() {
            warn!(
                "Axis '{}' is rotary but configured in {}; degrees will be used",
                self.name,
                self.units.symbol()
            );
        }

        Ok(())
    }
}

/// Kind of motion an axis performs, deciding the limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AxisKind {
    /// Translation stage: out-of-range targets are clamped.
    #[default]
    Linear,
    /// Rotation stage: out-of-range targets wrap by one turn.
    Rotary,
}

impl AxisKind {
    /// True for translation stages.
    pub fn is_linear(self) -> bool {
        self == AxisKind::Linear
    }
}

/// Units of measure for positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Millimetres (length base unit).
    #[default]
    Mm,
    /// Micrometres.
    Um,
    /// Nanometres.
    Nm,
    /// Inches.
    Inch,
    /// Degrees (angle base unit).
    Deg,
    /// Radians.
    Rad,
    /// Milliradians.
    Mrad,
}

impl Units {
    /// True for angle units.
    pub fn is_angular(self) -> bool {
        matches!(self, Units::Deg | Units::Rad | Units::Mrad)
    }

    /// How many of these units make one base unit (mm or degree).
    pub fn per_base_unit(self) -> f64 {
        match self {
            Units::Mm => 1.0,
            Units::Um => 1e3,
            Units::Nm => 1e6,
            Units::Inch => 1.0 / 25.4,
            Units::Deg => 1.0,
            Units::Rad => PI / 180.0,
            Units::Mrad => 1e3 * PI / 180.0,
        }
    }

    /// Convert a value in base units into these units.
    pub fn from_base(self, value: f64) -> f64 {
        value * self.per_base_unit()
    }

    /// Convert a value in these units into base units.
    pub fn to_base(self, value: f64) -> f64 {
        value / self.per_base_unit()
    }

    /// Short symbol for display.
    pub fn symbol(self) -> &'static str {
        match self {
            Units::Mm => "mm",
            Units::Um => "µm",
            Units::Nm => "nm",
            Units::Inch => "in",
            Units::Deg => "°",
            Units::Rad => "rad",
            Units::Mrad => "mrad",
        }
    }
}

/// Index (homing) search parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Whether the stage has an index mark at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Speed used during the search.
    #[serde(default = "default_index_speed")]
    pub speed: f64,

    /// Out-of-range target commanded to start the search.
    #[serde(default = "default_index_approach")]
    pub approach_position: f64,

    /// Give up after this many seconds. None waits indefinitely.
    #[serde(default)]
    pub timeout_s: Option<f64>,
}

impl IndexConfig {
    /// Timeout as Duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_s
            .filter(|s| *s > 0.0)
            .map(Duration::from_secs_f64)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            speed: DEFAULT_INDEX_SPEED,
            approach_position: DEFAULT_INDEX_APPROACH,
            timeout_s: None,
        }
    }
}

/// Parameters read only by the simulation driver.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SimulationConfig {
    /// Limits the simulated controller reports on open (in axis units).
    /// Falls back to the axis' configured limits.
    #[serde(default)]
    pub reported_low_limit: Option<f64>,
    #[serde(default)]
    pub reported_high_limit: Option<f64>,

    /// Where the index mark sits (in axis units).
    #[serde(default)]
    pub index_position: f64,

    /// Start with a valid encoder, as if the index had been found earlier.
    #[serde(default)]
    pub referenced_on_open: bool,

    /// Refuse to open, to exercise connection failures.
    #[serde(default)]
    pub fail_open: bool,

    /// Report a communication error after this many status reads.
    #[serde(default)]
    pub fail_after_reads: Option<u64>,
}
