//! Physics simulation module.
//!
//! Constant-speed stage motion and the index search state machine.

mod axis;
mod referencing;

pub use axis::AxisSimulator;
pub use referencing::{ReferencingState, ReferencingStateMachine};
