//! Status channels and the event bus.
//!
//! Every axis publishes `AxisEvent`s: status updates on five named
//! channels plus change notifications for its numeric parameters. Any number
//! of subscribers receive every event, in publication order.

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Named status channel of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusChannel {
    Connection,
    Index,
    Moving,
    LowLimit,
    HighLimit,
}

impl StatusChannel {
    /// Number of channels.
    pub const COUNT: usize = 5;

    /// All channels, in publication order.
    pub const ALL: [StatusChannel; Self::COUNT] = [
        StatusChannel::Connection,
        StatusChannel::Index,
        StatusChannel::Moving,
        StatusChannel::LowLimit,
        StatusChannel::HighLimit,
    ];

    /// Position in `ALL`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether the channel only concerns linear stages.
    pub fn is_limit(self) -> bool {
        matches!(self, StatusChannel::LowLimit | StatusChannel::HighLimit)
    }
}

impl fmt::Display for StatusChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusChannel::Connection => "connection",
            StatusChannel::Index => "index",
            StatusChannel::Moving => "moving",
            StatusChannel::LowLimit => "low-limit",
            StatusChannel::HighLimit => "high-limit",
        };
        f.write_str(name)
    }
}

/// Indicator colour of a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// Green.
    Ok,
    /// Orange: work in progress or a soft warning.
    Busy,
    /// Red.
    Alert,
    /// Gray: the channel does not apply.
    Disabled,
}

/// One status channel value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub channel: StatusChannel,
    /// Indicator lit or not.
    pub active: bool,
    pub severity: Severity,
    pub message: String,
}

impl StatusUpdate {
    pub fn new(
        channel: StatusChannel,
        active: bool,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            active,
            severity,
            message: message.into(),
        }
    }

    /// The update every channel receives when the axis goes offline.
    pub fn disconnected(channel: StatusChannel) -> Self {
        let severity = if channel.is_limit() {
            Severity::Alert
        } else {
            Severity::Ok
        };
        Self::new(channel, false, severity, "Disconnected")
    }

    /// Limit channels of a rotary stage.
    pub fn unlimited_rotation(channel: StatusChannel) -> Self {
        Self::new(channel, false, Severity::Disabled, "Unlimited rotation")
    }
}

/// What happened on an axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum EventKind {
    Status(StatusUpdate),
    DesiredPosition(f64),
    EstimatedPosition(f64),
    Speed(f64),
    StepSize(f64),
}

/// Event published by one axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisEvent {
    /// Axis name (e.g. "Z3").
    pub axis: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl AxisEvent {
    /// The status update carried by this event, if any.
    pub fn status(&self) -> Option<&StatusUpdate> {
        match &self.kind {
            EventKind::Status(update) => Some(update),
            _ => None,
        }
    }
}

/// Fan-out publisher. Cloning shares the subscriber list.
#[derive(Debug, Clone, Default)]
pub struct StatusBus {
    subscribers: Arc<Mutex<Vec<Sender<AxisEvent>>>>,
}

impl StatusBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// New receiver for every event published from now on.
    pub fn subscribe(&self) -> Receiver<AxisEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Send to all live subscribers. Dropped receivers are forgotten.
    pub fn publish(&self, event: AxisEvent) {
        trace!("{} {:?}", event.axis, event.kind);
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
