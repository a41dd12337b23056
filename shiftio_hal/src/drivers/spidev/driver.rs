//! spidev backend implementation.

use std::io;
use std::path::PathBuf;

use shiftio_common::hal::config::BusConfig;
use shiftio_common::hal::driver::{HalError, IoBackend};
use shiftio_common::hal::line::{ByteTransport, LatchLine};
use tracing::info;

use super::gpio::{SysfsGpio, default_root};
use super::transport::open_spidev;

/// Backend for Linux spidev buses with sysfs GPIO latches.
pub struct SpidevBackend {
    gpio_root: PathBuf,
}

impl SpidevBackend {
    /// Backend using `/sys/class/gpio`.
    pub fn new() -> Self {
        Self::with_gpio_root(default_root())
    }

    /// Backend using another sysfs GPIO directory.
    pub fn with_gpio_root(root: impl Into<PathBuf>) -> Self {
        Self {
            gpio_root: root.into(),
        }
    }
}

impl Default for SpidevBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl IoBackend for SpidevBackend {
    fn name(&self) -> &'static str {
        "spidev"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn open_transport(&mut self, bus: &BusConfig) -> io::Result<Box<dyn ByteTransport>> {
        Ok(Box::new(open_spidev(bus)?))
    }

    fn latch(&mut self, bus: &BusConfig, gpio: u32) -> Result<Box<dyn LatchLine>, HalError> {
        let line = SysfsGpio::output_low(&self.gpio_root, gpio).map_err(|e| {
            HalError::CommunicationError(format!("latch GPIO {gpio} on bus '{}': {e}", bus.name))
        })?;
        info!(bus = %bus.name, "Latch GPIO {} configured output-low", gpio);
        Ok(Box::new(line))
    }
}
