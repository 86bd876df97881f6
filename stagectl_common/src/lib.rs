//! stagectl common library
//!
//! Shared constants, configuration loading and the hardware driver seam used by
//! every crate in the stagectl workspace.
//!
//! # Module Structure
//!
//! - [`config`] - TOML loading trait and the fields shared by all binaries
//! - [`consts`] - Numeric defaults (poll interval, limits, index search)
//! - [`hal`] - Station/axis configuration, `StageDriver` trait and readout types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use stagectl_common::prelude::*;
//!
//! let limits = DEFAULT_LINEAR_LIMITS;
//! assert!(limits.0 < limits.1);
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
