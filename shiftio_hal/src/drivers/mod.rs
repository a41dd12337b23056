//! I/O backend implementations.
//!
//! - [`spidev`] - Linux `/dev/spidevB.C` transports with sysfs GPIO latches
//! - [`simulation`] - In-memory shift-register chains for development and testing
//!
//! # Adding New Backends
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `IoBackend` trait from `shiftio_common::hal::driver`
//! 3. Register its factory in [`register_all_drivers`]

pub mod simulation;
pub mod spidev;

use crate::driver_registry::DriverRegistry;

/// Register all built-in backends.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register("spidev", spidev::create_driver);
    registry.register("simulation", simulation::create_driver);
}
