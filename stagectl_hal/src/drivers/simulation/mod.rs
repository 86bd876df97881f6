//! Simulation driver module.
//!
//! Software stage for development and testing without physical hardware.

mod driver;
mod physics;

pub use driver::SimulationDriver;
pub use physics::{AxisSimulator, ReferencingState, ReferencingStateMachine};

use stagectl_common::hal::config::AxisConfig;
use stagectl_common::hal::driver::StageDriver;

/// Factory function to create a simulation driver instance.
pub fn create_driver(config: &AxisConfig) -> Box<dyn StageDriver> {
    Box::new(SimulationDriver::new(config))
}
