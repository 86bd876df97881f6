//! Change detection between hardware readouts.
//!
//! `StatusTracker` turns a stream of `AxisReadout`s into the minimal set of
//! events: a channel is published only when its value differs from the last
//! one published, and the position only when its 3-decimal rounding changes.
//! It does not care where readouts come from, so a polling loop and an
//! event-driven source feed it the same way.

use crate::limits::{Limits, round_position};
use crate::status::{EventKind, Severity, StatusChannel, StatusUpdate};
use stagectl_common::hal::config::AxisKind;
use stagectl_common::hal::types::AxisReadout;

/// Controller-side values the status mapping depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadoutContext {
    pub kind: AxisKind,
    pub desired_position: f64,
    pub limits: Limits,
}

/// Map one readout onto channel values.
///
/// Limit channels are only produced for linear stages.
pub fn classify(ctx: &ReadoutContext, readout: &AxisReadout) -> Vec<StatusUpdate> {
    use StatusChannel::*;

    let mut updates = Vec::with_capacity(StatusChannel::COUNT);

    updates.push(if readout.encoder_error() {
        StatusUpdate::new(Connection, true, Severity::Alert, "Encoder error")
    } else {
        StatusUpdate::new(Connection, true, Severity::Ok, "Connected")
    });

    updates.push(if readout.encoder_valid() {
        StatusUpdate::new(Index, true, Severity::Ok, "Encoder valid")
    } else if readout.searching_index() {
        StatusUpdate::new(Index, true, Severity::Busy, "Searching index")
    } else {
        StatusUpdate::new(Index, false, Severity::Alert, "Index not found")
    });

    updates.push(match (readout.encoder_valid(), readout.position_reached()) {
        (true, true) => StatusUpdate::new(Moving, true, Severity::Ok, "Ready"),
        (false, true) => StatusUpdate::new(Moving, false, Severity::Ok, "Unknown position"),
        (_, false) => StatusUpdate::new(Moving, true, Severity::Busy, "Moving"),
    });

    if ctx.kind.is_linear() {
        updates.push(if readout.at_low_end() {
            StatusUpdate::new(LowLimit, true, Severity::Alert, "Low limit reached!")
        } else if ctx.desired_position <= ctx.limits.low() {
            StatusUpdate::new(LowLimit, true, Severity::Busy, "Trying to set lower limit!")
        } else {
            StatusUpdate::new(LowLimit, false, Severity::Alert, "Low limit OK")
        });

        updates.push(if readout.at_high_end() {
            StatusUpdate::new(HighLimit, true, Severity::Alert, "High limit reached!")
        } else if ctx.desired_position >= ctx.limits.high() {
            StatusUpdate::new(HighLimit, true, Severity::Busy, "Trying to set higher limit!")
        } else {
            StatusUpdate::new(HighLimit, false, Severity::Alert, "High limit OK")
        });
    }

    updates
}

/// Last published value per channel and of the position.
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    last: [Option<StatusUpdate>; StatusChannel::COUNT],
    last_position: Option<f64>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `update`; returns it back if it differs from the last one.
    pub fn record(&mut self, update: StatusUpdate) -> Option<StatusUpdate> {
        let slot = &mut self.last[update.channel.index()];
        if slot.as_ref() == Some(&update) {
            return None;
        }
        *slot = Some(update.clone());
        Some(update)
    }

    /// Events caused by `readout`, position first.
    pub fn observe(&mut self, ctx: &ReadoutContext, readout: &AxisReadout) -> Vec<EventKind> {
        let mut events = Vec::new();

        let position = round_position(readout.position);
        if self.last_position != Some(position) {
            self.last_position = Some(position);
            events.push(EventKind::EstimatedPosition(position));
        }

        events.extend(
            classify(ctx, readout)
                .into_iter()
                .filter_map(|update| self.record(update))
                .map(EventKind::Status),
        );

        events
    }

    /// Last published value of `channel`.
    pub fn last(&self, channel: StatusChannel) -> Option<&StatusUpdate> {
        self.last[channel.index()].as_ref()
    }

    /// Make the next value of `channel` publish even if unchanged.
    pub fn forget(&mut self, channel: StatusChannel) {
        self.last[channel.index()] = None;
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
