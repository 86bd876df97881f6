//! Observed axis state and the serializable snapshot.

use crate::limits::Limits;
use serde::Serialize;
use stagectl_common::hal::config::{AxisKind, Units};
use stagectl_common::hal::types::AxisReadout;
use std::fmt;

/// Axis state as seen from outside.
///
/// `Moving` is observed, never commanded: it holds while the last readout
/// does not report the position reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AxisState {
    Disconnected,
    Idle,
    Moving,
    SearchingIndex,
}

impl fmt::Display for AxisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AxisState::Disconnected => "disconnected",
            AxisState::Idle => "idle",
            AxisState::Moving => "moving",
            AxisState::SearchingIndex => "searching index",
        };
        f.write_str(name)
    }
}

/// Controller-side data of one axis.
#[derive(Debug, Clone)]
pub(crate) struct Axis {
    pub kind: AxisKind,
    pub units: Units,
    pub limits: Limits,
    pub desired_position: f64,
    /// Rounded position of the last readout; stale when disconnected.
    pub estimated_position: f64,
    pub speed: f64,
    pub step_size: f64,
    pub connected: bool,
    pub index_found: bool,
    pub has_index: bool,
    pub last_readout: Option<AxisReadout>,
}

impl Axis {
    /// Derive the state. `searching` is the controller's own search flag.
    pub fn state(&self, searching: bool) -> AxisState {
        if !self.connected {
            return AxisState::Disconnected;
        }
        if searching {
            return AxisState::SearchingIndex;
        }
        match self.last_readout {
            Some(readout) if readout.searching_index() => AxisState::SearchingIndex,
            Some(readout) if !readout.position_reached() => AxisState::Moving,
            _ => AxisState::Idle,
        }
    }
}

/// Point-in-time view of an axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisSnapshot {
    pub name: String,
    pub kind: AxisKind,
    pub units: Units,
    pub state: AxisState,
    pub connected: bool,
    pub index_found: bool,
    pub desired_position: f64,
    /// None until the first readout of the current session.
    pub estimated_position: Option<f64>,
    pub speed: f64,
    pub step_size: f64,
    pub low_limit: f64,
    pub high_limit: f64,
}

impl fmt::Display for AxisSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let estimated = self
            .estimated_position
            .map(|p| format!("{p:.3}"))
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{:<4} {:<16} dpos={:>9.3} epos={:>9} {} [{}, {}] index={}",
            self.name,
            self.state.to_string(),
            self.desired_position,
            estimated,
            self.units.symbol(),
            self.low_limit,
            self.high_limit,
            if self.index_found { "found" } else { "-" },
        )
    }
}
