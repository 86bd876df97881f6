//! Index search state machine.
//!
//! A search leaves in the approach direction and watches for the index mark.
//! If the stage hits the end of its travel first, it turns around once and
//! sweeps the other way. Hitting the second end means the mark is missing.
//!
//! On rotary stages the mark repeats every turn, so a crossing is checked
//! modulo the period.

use tracing::{debug, trace};

/// Search progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencingState {
    /// No search since the last reset.
    Unreferenced,
    /// Moving in the approach direction.
    SearchingIndex,
    /// First end reached without a mark, sweeping back.
    Reversing,
    /// Mark crossed, position is valid.
    Referenced,
    /// Both ends (or the travel budget) exhausted.
    Error,
}

/// Index search state machine.
pub struct ReferencingStateMachine {
    state: ReferencingState,
    /// Mark position in base units.
    index_position: f64,
    /// Period of the mark (one turn on rotary stages).
    period: Option<f64>,
    /// +1.0 or -1.0.
    direction: f64,
    /// Distance covered since `start`.
    travelled: f64,
    /// Give up after this much travel.
    max_travel: f64,
}

impl ReferencingStateMachine {
    /// Create an idle state machine.
    pub fn new(index_position: f64, period: Option<f64>) -> Self {
        Self {
            state: ReferencingState::Unreferenced,
            index_position,
            period,
            direction: -1.0,
            travelled: 0.0,
            max_travel: f64::INFINITY,
        }
    }

    /// Start a search moving in the sign of `direction`.
    pub fn start(&mut self, direction: f64, max_travel: f64) {
        self.direction = if direction > 0.0 { 1.0 } else { -1.0 };
        self.travelled = 0.0;
        self.max_travel = max_travel;
        self.state = ReferencingState::SearchingIndex;
        debug!(
            "Index search started towards {}",
            if self.direction > 0.0 { "+" } else { "-" }
        );
    }

    /// Feed one motion step from `from` covering `delta` (unwrapped).
    ///
    /// Returns `true` when the search finished, successfully or not.
    pub fn update(&mut self, from: f64, delta: f64) -> bool {
        if !self.is_active() {
            return false;
        }

        self.travelled += delta.abs();

        if self.crosses(from, from + delta) {
            trace!("Index mark crossed between {:.4} and {:.4}", from, from + delta);
            self.state = ReferencingState::Referenced;
            debug!("Index search complete");
            return true;
        }

        if self.travelled > self.max_travel {
            debug!("Index search exceeded {:.1} units of travel", self.max_travel);
            self.state = ReferencingState::Error;
            return true;
        }

        false
    }

    /// The stage hit an end of travel. Turns around once, fails the second time.
    ///
    /// Returns `true` when the search finished.
    pub fn end_reached(&mut self) -> bool {
        match self.state {
            ReferencingState::SearchingIndex => {
                trace!("End of travel reached, reversing");
                self.direction = -self.direction;
                self.state = ReferencingState::Reversing;
                false
            }
            ReferencingState::Reversing => {
                debug!("Both ends reached without an index mark");
                self.state = ReferencingState::Error;
                true
            }
            _ => false,
        }
    }

    fn crosses(&self, a: f64, b: f64) -> bool {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        match self.period {
            None => self.index_position >= lo && self.index_position <= hi,
            Some(period) => {
                let k = ((lo - self.index_position) / period).ceil();
                self.index_position + k * period <= hi
            }
        }
    }

    /// Mark position in base units.
    pub fn index_position(&self) -> f64 {
        self.index_position
    }

    /// Get current state.
    pub fn state(&self) -> ReferencingState {
        self.state
    }

    /// Check if a search is running.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            ReferencingState::SearchingIndex | ReferencingState::Reversing
        )
    }

    /// Direction multiplier for motion (-1 or 1).
    pub fn direction_multiplier(&self) -> f64 {
        self.direction
    }

    /// Abort any search and forget the result.
    pub fn reset(&mut self) {
        self.state = ReferencingState::Unreferenced;
        self.travelled = 0.0;
    }
}
