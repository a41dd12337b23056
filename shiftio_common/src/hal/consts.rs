//! HAL constants.
//!
//! Defaults for expander refresh timing.

use std::time::Duration;

/// Canonical HAL service name (used for logging).
pub const HAL_SERVICE_NAME: &str = "shiftio_hal";

/// Default refresh period of an expander in milliseconds.
pub const DEFAULT_PERIOD_MS: u64 = 50;

/// Default settling delay around the latch edge in microseconds.
pub const DEFAULT_SETTLE_US: u64 = 2;

/// Default settling delay as Duration.
pub const DEFAULT_SETTLE: Duration = Duration::from_micros(DEFAULT_SETTLE_US);

/// Byte clocked out while the latch is held low when a chain has inputs only.
pub const FILLER_BYTE: u8 = 0x00;

/// Name of the default SPI backend.
pub const DEFAULT_BACKEND: &str = "spidev";
