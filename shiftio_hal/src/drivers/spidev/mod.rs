//! Linux spidev backend.
//!
//! Transports are `/dev/spidevB.C` character devices; latch lines are sysfs
//! GPIOs under `/sys/class/gpio`.

mod driver;
mod gpio;
mod transport;

pub use driver::SpidevBackend;
pub use gpio::{SYSFS_GPIO_ROOT, SysfsGpio};
pub use transport::open_spidev;

use shiftio_common::hal::driver::IoBackend;

/// Factory function to create a spidev backend instance.
pub fn create_driver() -> Box<dyn IoBackend> {
    Box::new(SpidevBackend::new())
}
