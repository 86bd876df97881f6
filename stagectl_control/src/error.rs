//! Controller error taxonomy.
//!
//! Hardware faults during an established session never reach callers as
//! errors; they are published as status and the axis degrades to
//! disconnected. The variants below are what `connect()` and the command
//! methods can return.

use stagectl_common::hal::driver::DriverError;
use stagectl_hal::RegistryError;
use thiserror::Error;

/// Errors returned by `AxisController` and `Station`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControllerError {
    /// No port configured and no attached device matches the serial number.
    #[error("No device found for axis {axis}{}", .serial.as_deref().map(|s| format!(" (serial {s})")).unwrap_or_default())]
    DeviceNotFound {
        axis: String,
        serial: Option<String>,
    },

    /// Opening or configuring the session failed.
    #[error("Failed to connect axis {axis}: {source}")]
    ConnectionFailed { axis: String, source: DriverError },

    /// The session failed while established.
    #[error("Communication lost on axis {axis}: {source}")]
    CommunicationLost { axis: String, source: DriverError },

    /// Invalid limits or axis parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The axis is busy with an index search.
    #[error("Axis {0} is searching its index")]
    IndexSearchInProgress(String),

    /// A rotary target more than one turn outside the limits, or not a number.
    #[error("Position {value} cannot be brought into [{low}, {high}]")]
    OutOfRange { value: f64, low: f64, high: f64 },

    /// Unknown driver in the axis configuration.
    #[error(transparent)]
    DriverNotFound(#[from] RegistryError),

    /// A worker thread could not be started.
    #[error("Failed to spawn worker for axis {axis}: {reason}")]
    WorkerSpawn { axis: String, reason: String },
}
