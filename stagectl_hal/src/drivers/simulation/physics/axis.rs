//! Stage motion simulator.
//!
//! Positions are kept in base units (mm or degrees). The stage moves toward
//! its target at constant speed; linear stages stop at their travel ends,
//! rotary stages stay wrapped into one turn.

use stagectl_common::consts::FULL_TURN_DEG;
use stagectl_common::hal::config::AxisKind;
use stagectl_common::hal::types::StatusFlags;
use std::time::Duration;
use tracing::{debug, trace};

use super::referencing::{ReferencingState, ReferencingStateMachine};

/// Position tolerance for end-of-travel and in-position checks.
const EPSILON: f64 = 1e-9;

/// Simulated stage.
pub struct AxisSimulator {
    kind: AxisKind,
    /// Current position in base units.
    position: f64,
    /// Target position in base units.
    target: f64,
    /// Positioning speed in base units/second.
    speed: f64,
    /// Speed used while searching the index.
    search_speed: f64,
    /// Physical travel ends, linear stages only.
    travel: Option<(f64, f64)>,
    /// Bounds used by a search when the stage reports no travel.
    search_bounds: Option<(f64, f64)>,
    enabled: bool,
    referenced: bool,
    at_low_end: bool,
    at_high_end: bool,
    referencing_sm: ReferencingStateMachine,
}

impl AxisSimulator {
    /// Create a stage at position 0.
    pub fn new(kind: AxisKind, travel: Option<(f64, f64)>, index_position: f64, speed: f64) -> Self {
        let (travel, period) = match kind {
            AxisKind::Linear => (travel, None),
            AxisKind::Rotary => (None, Some(FULL_TURN_DEG)),
        };
        Self {
            kind,
            position: 0.0,
            target: 0.0,
            speed,
            search_speed: speed,
            travel,
            search_bounds: None,
            enabled: false,
            referenced: false,
            at_low_end: false,
            at_high_end: false,
            referencing_sm: ReferencingStateMachine::new(index_position, period),
        }
    }

    /// Power the amplifiers.
    pub fn enable(&mut self) {
        self.enabled = true;
        self.target = self.position;
        debug!("Simulated stage enabled at {:.4}", self.position);
    }

    /// Power down. The encoder reference is lost.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.referenced = false;
        self.referencing_sm.reset();
        debug!("Simulated stage disabled");
    }

    /// Mark the encoder as valid without a search.
    pub fn set_referenced(&mut self, referenced: bool) {
        self.referenced = referenced;
    }

    /// Set positioning speed (base units/s).
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.abs();
    }

    /// Set a new target (base units). Rotary targets are taken modulo one turn.
    pub fn set_target(&mut self, target: f64) {
        self.target = match self.kind {
            AxisKind::Linear => target,
            AxisKind::Rotary => target.rem_euclid(FULL_TURN_DEG),
        };
    }

    /// Start an index search heading toward `approach` at `speed`.
    pub fn start_index_search(&mut self, speed: f64, approach: f64) {
        self.search_speed = speed.abs();
        self.referenced = false;
        let direction = if approach > self.position { 1.0 } else { -1.0 };

        let max_travel = match self.kind {
            AxisKind::Rotary => 2.0 * FULL_TURN_DEG,
            AxisKind::Linear => f64::INFINITY,
        };
        if self.kind.is_linear() && self.travel.is_none() {
            let reach = approach.abs().max(self.position.abs());
            self.search_bounds = Some((-reach, reach));
        }

        self.referencing_sm.start(direction, max_travel);
    }

    /// Stop a running search where the stage is.
    pub fn abort_search(&mut self) {
        if self.referencing_sm.is_active() {
            self.referencing_sm.reset();
            self.target = self.position;
            debug!("Index search aborted at {:.4}", self.position);
        }
    }

    /// Advance the simulation by `dt`.
    pub fn update(&mut self, dt: Duration) {
        if !self.enabled {
            return;
        }
        let dt_s = dt.as_secs_f64();

        if self.referencing_sm.is_active() {
            self.update_search_motion(dt_s);
        } else {
            self.update_positioning(dt_s);
        }

        trace!(
            "Stage: pos={:.4}, target={:.4}, state={:?}",
            self.position, self.target, self.referencing_sm.state()
        );
    }

    fn update_positioning(&mut self, dt: f64) {
        let error = self.target - self.position;
        let step = self.speed * dt;
        if error.abs() <= step {
            self.position = self.target;
        } else {
            self.position += step * error.signum();
        }
        self.apply_travel(self.travel);
    }

    fn update_search_motion(&mut self, dt: f64) {
        let from = self.position;
        let delta = self.search_speed * dt * self.referencing_sm.direction_multiplier();
        self.position += delta;

        let bounds = self.travel.or(self.search_bounds);
        let hit_end = self.apply_travel(bounds);
        let covered = self.position - from;

        if self.kind == AxisKind::Rotary {
            self.position = self.position.rem_euclid(FULL_TURN_DEG);
        }

        let mut done = self.referencing_sm.update(from, covered);
        if !done && hit_end {
            done = self.referencing_sm.end_reached();
        }
        if done {
            self.on_search_complete();
        }
    }

    /// Clamp into `bounds` and refresh end flags. Returns true when an end is touched.
    fn apply_travel(&mut self, bounds: Option<(f64, f64)>) -> bool {
        self.at_low_end = false;
        self.at_high_end = false;
        if self.kind == AxisKind::Rotary {
            return false;
        }
        let Some((low, high)) = bounds else {
            return false;
        };
        if self.position <= low + EPSILON {
            self.position = low;
            self.at_low_end = self.travel.is_some();
            return true;
        }
        if self.position >= high - EPSILON {
            self.position = high;
            self.at_high_end = self.travel.is_some();
            return true;
        }
        false
    }

    fn on_search_complete(&mut self) {
        match self.referencing_sm.state() {
            ReferencingState::Referenced => {
                self.referenced = true;
                self.position = self.referencing_sm.index_position();
                self.apply_travel(self.travel);
                debug!("Index found, stage at {:.4}", self.position);
            }
            _ => {
                debug!("Index search failed at {:.4}", self.position);
            }
        }
        self.search_bounds = None;
        self.target = self.position;
    }

    /// Current status word.
    pub fn flags(&self) -> StatusFlags {
        let mut flags = StatusFlags::empty();
        flags.set(StatusFlags::AMPLIFIERS_ENABLED, self.enabled);
        flags.set(StatusFlags::ENCODER_VALID, self.referenced);
        flags.set(StatusFlags::SEARCHING_INDEX, self.referencing_sm.is_active());
        flags.set(
            StatusFlags::POSITION_REACHED,
            self.enabled
                && !self.referencing_sm.is_active()
                && (self.target - self.position).abs() <= EPSILON,
        );
        flags.set(StatusFlags::AT_LOW_END, self.at_low_end);
        flags.set(StatusFlags::AT_HIGH_END, self.at_high_end);
        flags
    }

    /// Current position (base units).
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Current target (base units).
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Search progress.
    pub fn referencing_state(&self) -> ReferencingState {
        self.referencing_sm.state()
    }

    /// Whether the encoder is valid.
    pub fn is_referenced(&self) -> bool {
        self.referenced
    }
}
