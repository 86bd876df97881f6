//! # stagectl HAL
//!
//! Hardware side of the stagectl workspace: the registry that maps driver
//! names to factories, the built-in drivers, and discovery of controller
//! ports by USB serial number.
//!
//! Drivers implement `StageDriver` from `stagectl_common::hal::driver`.
//!
//! # Module Structure
//!
//! - [`driver_registry`] - name → factory registry
//! - [`drivers`] - driver implementations (simulation)
//! - [`discovery`] - serial port lookup
//!
//! ```text
//!  AxisConfig ──► DriverRegistry ──► Box<dyn StageDriver> ──► AxisController
//!       │                                                        ▲
//!       └── serial_number ──► PortResolver ──► port name ────────┘
//! ```

#![deny(missing_docs)]

pub mod discovery;
pub mod driver_registry;
pub mod drivers;

pub use crate::discovery::{FixedPortResolver, PortResolver, SerialPortResolver};
pub use crate::driver_registry::{DriverRegistry, RegistryError};
pub use crate::drivers::builtin_registry;
