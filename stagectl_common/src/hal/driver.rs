//! Stage driver trait and error types.
//!
//! This module defines:
//! - `StageDriver` trait - one exclusive hardware session per axis
//! - `DriverError` enum - errors raised by a session
//! - `IndexSearch` - call-scoped parameters of an index search
//! - `CancelToken` - cooperative cancellation shared with a search in flight
//! - `DriverFactory` type alias - factory function type

use crate::hal::config::{AxisConfig, Units};
use crate::hal::types::{AxisReadout, StageInfo};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Error types for stage sessions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    /// Operation on a session that is not open (or already closed).
    #[error("Session is not open")]
    NotOpen,

    /// Opening the session failed.
    #[error("Failed to open {port}: {reason}")]
    OpenFailed {
        /// Port that was tried.
        port: String,
        /// Driver-specific reason.
        reason: String,
    },

    /// Hardware communication error on an open session.
    #[error("Hardware communication error: {0}")]
    Communication(String),

    /// The index search ended without finding the index mark.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// The index search was cancelled through its token.
    #[error("Index search cancelled")]
    Cancelled,

    /// The index search exceeded its timeout.
    #[error("Index search timed out after {0:?}")]
    Timeout(Duration),

    /// The driver does not implement the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl DriverError {
    /// True when the session can no longer be trusted.
    pub fn is_session_lost(&self) -> bool {
        matches!(self, DriverError::Communication(_) | DriverError::NotOpen)
    }
}

/// Cooperative cancellation flag.
///
/// Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How `find_index` waits for the search to finish.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchWait {
    /// Block until the index is found, the token is cancelled, or the timeout expires.
    Blocking {
        /// None waits indefinitely.
        timeout: Option<Duration>,
    },
    /// Issue the search and return; progress shows up in `read_status`.
    Detached,
}

/// Parameters of one index search.
///
/// Wait behaviour travels with the call, so concurrent searches on different
/// axes never influence each other.
#[derive(Debug, Clone)]
pub struct IndexSearch {
    /// Speed during the search, in axis units per second.
    pub speed: f64,
    /// Out-of-range target commanded to start the search.
    pub approach_position: f64,
    /// Wait behaviour.
    pub wait: SearchWait,
    /// Checked by blocking implementations between hardware round-trips.
    pub cancel: CancelToken,
}

impl IndexSearch {
    /// Blocking search without timeout.
    pub fn blocking(speed: f64, approach_position: f64) -> Self {
        Self {
            speed,
            approach_position,
            wait: SearchWait::Blocking { timeout: None },
            cancel: CancelToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait = SearchWait::Blocking { timeout };
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn(&AxisConfig) -> Box<dyn StageDriver>;

/// One exclusive hardware session for one axis.
///
/// The command stream of a stage controller is not safe for concurrent
/// writers; callers serialize every method of a session behind one lock.
///
/// # Lifecycle
///
/// 1. `open()` - bind to a port, report stage information
/// 2. `set_*`, `move_to`, `read_status`, `find_index` - while open
/// 3. `close()` - `NotOpen` if already closed
///
/// # Timing
///
/// | Operation | Expected duration |
/// |-----------|-------------------|
/// | `read_status()` | a few property reads |
/// | `move_to()` | returns once the target is accepted |
/// | `find_index()` | until physical motion completes |
pub trait StageDriver: Send {
    /// Driver identifier (e.g. "simulation").
    fn name(&self) -> &'static str;

    /// Open the session on `port`.
    ///
    /// # Errors
    /// `DriverError::OpenFailed` if the device does not answer.
    fn open(&mut self, port: &str) -> Result<StageInfo, DriverError>;

    /// Close the session.
    fn close(&mut self) -> Result<(), DriverError>;

    /// Whether the session is open.
    fn is_open(&self) -> bool;

    /// Select the units used by all following calls.
    fn set_units(&mut self, units: Units) -> Result<(), DriverError>;

    /// Set motion speed in units per second.
    fn set_speed(&mut self, speed: f64) -> Result<(), DriverError>;

    /// Set the controller-side step size.
    /// Default: not forwarded (many controllers have no such setting).
    fn set_step_size(&mut self, _step: f64) -> Result<(), DriverError> {
        Ok(())
    }

    /// Command a new target position.
    fn move_to(&mut self, position: f64) -> Result<(), DriverError>;

    /// Read position and status word.
    fn read_status(&mut self) -> Result<AxisReadout, DriverError>;

    /// Run an index search.
    ///
    /// With `SearchWait::Blocking` this must return `Cancelled` soon after
    /// `search.cancel` is set.
    fn find_index(&mut self, search: &IndexSearch) -> Result<(), DriverError>;
}
