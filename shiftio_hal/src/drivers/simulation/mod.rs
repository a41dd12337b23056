//! Simulation backend.
//!
//! In-memory 74x595 / 74x165 chains for development and testing without
//! physical hardware.

mod bus;
mod driver;

pub use bus::{SimLatch, SimTransport, SimWorld};
pub use driver::SimulationBackend;

use shiftio_common::hal::driver::IoBackend;

/// Factory function to create a simulation backend instance.
pub fn create_driver() -> Box<dyn IoBackend> {
    Box::new(SimulationBackend::new())
}
