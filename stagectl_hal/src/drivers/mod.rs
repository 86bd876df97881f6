//! Built-in stage drivers.

pub mod simulation;

use crate::driver_registry::DriverRegistry;
use stagectl_common::consts::DEFAULT_DRIVER;

/// Registry with every driver compiled into this crate.
pub fn builtin_registry() -> DriverRegistry {
    let mut registry = DriverRegistry::new();
    registry.register(DEFAULT_DRIVER, simulation::create_driver);
    registry
}
