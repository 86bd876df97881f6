//! # stagectl Axis Control
//!
//! Single point of control for each motorized axis of a microscope stage.
//! An `AxisController` accepts operator intent (desired position, steps,
//! speed, step size), enforces the travel-limit policy before anything is
//! written to hardware, and republishes what the hardware reports as five
//! named status channels.
//!
//! ## Threads
//!
//! | Thread | Work |
//! |--------|------|
//! | owner | commands (`&mut self`), connect/disconnect |
//! | `poll-<axis>` | periodic `read_status`, change detection, publication |
//! | `index-<axis>` | blocking index search |
//!
//! All three share one hardware session behind a mutex. `disconnect()`
//! joins both workers before the session is closed.
//!
//! ## Status Channels
//!
//! `Connection`, `Index`, `Moving`, `LowLimit`, `HighLimit`. Each update
//! carries an on/off flag, an indicator colour and a message. Updates are
//! published only when they differ from the previous one.

pub mod controller;
pub mod error;
pub mod limits;
pub mod state;
pub mod station;
pub mod status;
pub mod tracker;

pub use crate::controller::{AxisController, ControllerOptions};
pub use crate::error::ControllerError;
pub use crate::limits::Limits;
pub use crate::state::{AxisSnapshot, AxisState};
pub use crate::station::Station;
pub use crate::status::{AxisEvent, EventKind, Severity, StatusBus, StatusChannel, StatusUpdate};
