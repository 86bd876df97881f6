//! Hardware seam of the stagectl workspace.
//!
//! - [`config`] - station and per-axis configuration
//! - [`driver`] - the `StageDriver` session trait and its error type
//! - [`types`] - hardware readouts and stage information

pub mod config;
pub mod driver;
pub mod types;
