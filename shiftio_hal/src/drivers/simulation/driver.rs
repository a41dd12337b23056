//! Simulation backend implementation.

use super::bus::SimWorld;
use shiftio_common::hal::config::BusConfig;
use shiftio_common::hal::driver::{HalError, IoBackend};
use shiftio_common::hal::line::{ByteTransport, LatchLine};
use std::io;
use tracing::{debug, info};

/// Backend serving transports and latches from a [`SimWorld`].
pub struct SimulationBackend {
    world: SimWorld,
    transports_opened: usize,
}

impl SimulationBackend {
    /// Backend over a fresh, empty world.
    pub fn new() -> Self {
        Self::with_world(SimWorld::new())
    }

    /// Backend over an existing world, so the caller can observe it.
    pub fn with_world(world: SimWorld) -> Self {
        Self {
            world,
            transports_opened: 0,
        }
    }

    /// Handle to the simulated buses.
    pub fn world(&self) -> SimWorld {
        self.world.clone()
    }
}

impl Default for SimulationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl IoBackend for SimulationBackend {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn open_transport(&mut self, bus: &BusConfig) -> io::Result<Box<dyn ByteTransport>> {
        let transport = self.world.open(&bus.device)?;
        self.transports_opened += 1;
        debug!(bus = %bus.name, "Simulated transport opened on {}", bus.device.display());
        Ok(Box::new(transport))
    }

    fn latch(&mut self, bus: &BusConfig, gpio: u32) -> Result<Box<dyn LatchLine>, HalError> {
        debug!(bus = %bus.name, "Simulated latch GPIO {} driven low", gpio);
        Ok(Box::new(self.world.latch(&bus.device, gpio)))
    }

    fn shutdown(&mut self) -> Result<(), HalError> {
        info!(
            "Simulation backend shutdown ({} transports opened)",
            self.transports_opened
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn bus() -> BusConfig {
        BusConfig {
            name: "spi1".to_string(),
            device: PathBuf::from("/dev/spidev1.0"),
            mode: None,
            max_speed_hz: None,
        }
    }

    #[test]
    fn backend_shares_world_with_caller() {
        let mut backend = SimulationBackend::new();
        let world = backend.world();
        let bus = bus();

        let mut latch = backend.latch(&bus, 4).unwrap();
        let mut transport = backend.open_transport(&bus).unwrap();
        transport.write_all(&[0x01, 0x02]).unwrap();
        latch.set().unwrap();

        assert_eq!(world.outputs(&bus.device, 4), Some(vec![0x01, 0x02]));
        assert_eq!(backend.name(), "simulation");
        assert!(backend.shutdown().is_ok());
    }

    #[test]
    fn open_failure_propagates() {
        let world = SimWorld::new();
        world.fail_open("/dev/spidev1.0");
        let mut backend = SimulationBackend::with_world(world);
        assert!(backend.open_transport(&bus()).is_err());
    }
}
