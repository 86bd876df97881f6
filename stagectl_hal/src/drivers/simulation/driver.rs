//! Simulation driver implementation.
//!
//! The `SimulationDriver` implements `StageDriver` on top of an
//! `AxisSimulator`, so controllers can be developed and tested without a
//! stage attached. Time advances with the wall clock between calls.

use super::physics::{AxisSimulator, ReferencingState};
use stagectl_common::hal::config::{AxisConfig, AxisKind, SimulationConfig, Units};
use stagectl_common::hal::driver::{DriverError, IndexSearch, SearchWait, StageDriver};
use stagectl_common::hal::types::{AxisReadout, StageInfo};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Time slice of a blocking index search.
const SEARCH_SLICE: Duration = Duration::from_millis(2);

/// Simulation driver implementing the StageDriver trait.
pub struct SimulationDriver {
    /// Axis this instance simulates.
    axis_name: String,
    settings: SimulationConfig,
    kind: AxisKind,
    /// Units the stage starts in after open.
    default_units: Units,
    /// Units selected by the caller.
    units: Units,
    /// Limits reported on open, in `default_units`.
    reported_limits: Option<(f64, f64)>,
    has_index: bool,
    /// Open port, if any.
    port: Option<String>,
    axis: AxisSimulator,
    last_update: Instant,
    reads: u64,
    link_lost: bool,
}

impl SimulationDriver {
    /// Create a driver for one configured axis.
    pub fn new(config: &AxisConfig) -> Self {
        let settings = config.simulation.clone();
        let default_units = match config.kind {
            AxisKind::Linear => config.units,
            AxisKind::Rotary => Units::Deg,
        };
        let reported_limits = match config.kind {
            AxisKind::Rotary => None,
            AxisKind::Linear => settings
                .reported_low_limit
                .zip(settings.reported_high_limit)
                .or_else(|| config.configured_limits()),
        };
        let travel = reported_limits
            .map(|(low, high)| (default_units.to_base(low), default_units.to_base(high)));

        let axis = AxisSimulator::new(
            config.kind,
            travel,
            default_units.to_base(settings.index_position),
            default_units.to_base(config.speed),
        );

        Self {
            axis_name: config.name.clone(),
            settings,
            kind: config.kind,
            default_units,
            units: default_units,
            reported_limits,
            has_index: config.index.enabled,
            port: None,
            axis,
            last_update: Instant::now(),
            reads: 0,
            link_lost: false,
        }
    }

    /// Port of the current session.
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    fn ensure_ready(&self) -> Result<(), DriverError> {
        if self.port.is_none() {
            return Err(DriverError::NotOpen);
        }
        if self.link_lost {
            return Err(DriverError::Communication(format!(
                "simulated link loss on axis {}",
                self.axis_name
            )));
        }
        Ok(())
    }

    /// Advance the physics to now.
    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update);
        self.last_update = now;
        self.axis.update(dt);
    }

    fn wait_for_search(&mut self, timeout: Option<Duration>, search: &IndexSearch) -> Result<(), DriverError> {
        let started = Instant::now();
        loop {
            if search.cancel.is_cancelled() {
                self.axis.abort_search();
                debug!("Axis {}: index search cancelled", self.axis_name);
                return Err(DriverError::Cancelled);
            }

            thread::sleep(SEARCH_SLICE);
            self.advance();

            match self.axis.referencing_state() {
                ReferencingState::Referenced => return Ok(()),
                ReferencingState::Error | ReferencingState::Unreferenced => {
                    return Err(DriverError::IndexNotFound(format!(
                        "axis {} reached both ends without an index mark",
                        self.axis_name
                    )));
                }
                ReferencingState::SearchingIndex | ReferencingState::Reversing => {}
            }

            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    self.axis.abort_search();
                    return Err(DriverError::Timeout(limit));
                }
            }
        }
    }
}

impl StageDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn open(&mut self, port: &str) -> Result<StageInfo, DriverError> {
        if self.settings.fail_open {
            return Err(DriverError::OpenFailed {
                port: port.to_string(),
                reason: "simulated open failure".to_string(),
            });
        }

        self.units = self.default_units;
        self.reads = 0;
        self.link_lost = false;
        self.last_update = Instant::now();
        self.axis.enable();
        if self.settings.referenced_on_open {
            self.axis.set_referenced(true);
        }
        self.port = Some(port.to_string());

        info!(
            "Simulated {:?} stage for axis {} opened on {}",
            self.kind, self.axis_name, port
        );

        let info = match self.kind {
            AxisKind::Linear => StageInfo::linear(self.default_units),
            AxisKind::Rotary => StageInfo::rotary(),
        };
        let info = match self.reported_limits {
            Some((low, high)) => info.with_limits(low, high),
            None => info,
        };
        Ok(if self.has_index { info } else { info.without_index() })
    }

    fn close(&mut self) -> Result<(), DriverError> {
        let Some(port) = self.port.take() else {
            return Err(DriverError::NotOpen);
        };
        self.axis.disable();
        debug!("Simulated stage for axis {} closed on {}", self.axis_name, port);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn set_units(&mut self, units: Units) -> Result<(), DriverError> {
        self.ensure_ready()?;
        if self.kind == AxisKind::Rotary && !units.is_angular() {
            return Err(DriverError::Unsupported(format!(
                "{} on a rotary stage",
                units.symbol()
            )));
        }
        self.units = units;
        Ok(())
    }

    fn set_speed(&mut self, speed: f64) -> Result<(), DriverError> {
        self.ensure_ready()?;
        self.advance();
        self.axis.set_speed(self.units.to_base(speed));
        Ok(())
    }

    fn move_to(&mut self, position: f64) -> Result<(), DriverError> {
        self.ensure_ready()?;
        self.advance();
        self.axis.set_target(self.units.to_base(position));
        Ok(())
    }

    fn read_status(&mut self) -> Result<AxisReadout, DriverError> {
        self.ensure_ready()?;
        self.reads += 1;
        if let Some(limit) = self.settings.fail_after_reads {
            if self.reads > limit {
                warn!("Axis {}: simulating link loss after {} reads", self.axis_name, limit);
                self.link_lost = true;
                self.ensure_ready()?;
            }
        }
        self.advance();
        Ok(AxisReadout::new(
            self.units.from_base(self.axis.position()),
            self.axis.flags(),
        ))
    }

    fn find_index(&mut self, search: &IndexSearch) -> Result<(), DriverError> {
        self.ensure_ready()?;
        if !self.has_index {
            return Err(DriverError::Unsupported("index search".to_string()));
        }

        self.advance();
        self.axis.start_index_search(
            self.units.to_base(search.speed),
            self.units.to_base(search.approach_position),
        );

        match search.wait {
            SearchWait::Detached => Ok(()),
            SearchWait::Blocking { timeout } => self.wait_for_search(timeout, search),
        }
    }
}
