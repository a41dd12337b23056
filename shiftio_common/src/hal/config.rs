//! HAL configuration types.
//!
//! This module contains configuration types for the I/O expansion HAL:
//! - `HalConfig` - Main configuration loaded from io.toml
//! - `BusConfig` - One serial bus (SPI character device)
//! - `ExpanderConfig` - One shift-register chain pair behind one latch
//! - `ErrorPolicy` - What a refresh flow does after a failed cycle

use crate::config::SharedConfig;
use crate::hal::consts::{DEFAULT_PERIOD_MS, DEFAULT_SETTLE_US};
use crate::hal::driver::HalError;
use crate::io::config::LineConfig;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

/// Default function for period_ms
fn default_period_ms() -> u64 {
    DEFAULT_PERIOD_MS
}

/// Default function for settle_us
fn default_settle_us() -> u64 {
    DEFAULT_SETTLE_US
}

/// Main configuration loaded from `io.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HalConfig {
    /// Service name and log level.
    pub shared: SharedConfig,

    /// Serial buses.
    #[serde(default)]
    pub buses: Vec<BusConfig>,

    /// Shift-register expanders, one refresh flow each.
    #[serde(default)]
    pub expanders: Vec<ExpanderConfig>,

    /// Named lines bound to expander bits.
    #[serde(default)]
    pub lines: Vec<LineConfig>,
}

impl HalConfig {
    /// Validate the configuration.
    ///
    /// # Validation Rules
    /// 1. Bus and expander names are non-empty and unique
    /// 2. Every expander references a configured bus
    /// 3. `period_ms` > 0
    /// 4. `output_bytes` / `input_bytes`, when present, are non-zero
    /// 5. `initial_output` fits in `output_bytes`
    /// 6. `latch_gpio` unique across expanders
    ///
    /// Line wiring is validated by `LineRegistry::from_config`.
    pub fn validate(&self) -> Result<(), HalError> {
        self.shared
            .validate()
            .map_err(|e| HalError::ConfigError(e.to_string()))?;

        let mut bus_names = HashSet::new();
        for bus in &self.buses {
            if bus.name.is_empty() {
                return Err(HalError::ConfigError("bus with empty name".to_string()));
            }
            if !bus_names.insert(bus.name.as_str()) {
                return Err(HalError::ConfigError(format!(
                    "Duplicate bus name: {}",
                    bus.name
                )));
            }
        }

        let mut expander_names = HashSet::new();
        let mut latches = HashMap::new();
        for exp in &self.expanders {
            if exp.name.is_empty() {
                return Err(HalError::ConfigError(
                    "expander with empty name".to_string(),
                ));
            }
            if !expander_names.insert(exp.name.as_str()) {
                return Err(HalError::ConfigError(format!(
                    "Duplicate expander name: {}",
                    exp.name
                )));
            }
            if !bus_names.contains(exp.bus.as_str()) {
                return Err(HalError::ConfigError(format!(
                    "Expander '{}': unknown bus '{}'",
                    exp.name, exp.bus
                )));
            }
            if let Some(other) = latches.insert(exp.latch_gpio, exp.name.as_str()) {
                return Err(HalError::ConfigError(format!(
                    "Expanders '{}' and '{}' share latch GPIO {}",
                    other, exp.name, exp.latch_gpio
                )));
            }
            exp.validate()?;
        }

        Ok(())
    }

    /// Look up a bus by name.
    pub fn bus(&self, name: &str) -> Option<&BusConfig> {
        self.buses.iter().find(|b| b.name == name)
    }

    /// Number of expanders attached to the bus `name`.
    pub fn expanders_on_bus(&self, name: &str) -> usize {
        self.expanders.iter().filter(|e| e.bus == name).count()
    }
}

/// One serial bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Bus name referenced by expanders.
    pub name: String,

    /// Character device path (e.g. `/dev/spidev1.0`).
    pub device: PathBuf,

    /// SPI mode (0-3). Left as configured by the kernel if omitted.
    #[serde(default)]
    pub mode: Option<u8>,

    /// Maximum SPI clock in Hz. Left as configured by the kernel if omitted.
    #[serde(default)]
    pub max_speed_hz: Option<u32>,
}

/// One shift-register expander: an output chain and/or an input chain
/// sharing one latch line on one bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpanderConfig {
    /// Expander name (also the refresh flow name).
    pub name: String,

    /// Bus the expander is wired to.
    pub bus: String,

    /// GPIO number of the latch line.
    pub latch_gpio: u32,

    /// Number of daisy-chained 8-bit output registers (74x595 style).
    #[serde(default)]
    pub output_bytes: Option<usize>,

    /// Number of daisy-chained 8-bit input registers (74x165 style).
    #[serde(default)]
    pub input_bytes: Option<usize>,

    /// Initial output pattern, address-increasing.
    #[serde(default)]
    pub initial_output: Vec<u8>,

    /// Delay between consecutive refreshes in milliseconds.
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    /// Settling delay before and after the latch edge in microseconds.
    #[serde(default = "default_settle_us")]
    pub settle_us: u64,

    /// Reaction to a failed refresh cycle.
    #[serde(default)]
    pub on_error: ErrorPolicy,
}

impl ExpanderConfig {
    /// Validate a single expander.
    pub fn validate(&self) -> Result<(), HalError> {
        if self.period_ms == 0 {
            return Err(HalError::ConfigError(format!(
                "Expander '{}': period_ms must be greater than 0",
                self.name
            )));
        }

        for (what, len) in [("output_bytes", self.output_bytes), ("input_bytes", self.input_bytes)] {
            if let Some(len) = len {
                if len == 0 {
                    return Err(HalError::ConfigError(format!(
                        "Expander '{}': {} must be greater than 0",
                        self.name, what
                    )));
                }
            }
        }

        let out_len = self.output_bytes.unwrap_or(0);
        if self.initial_output.len() > out_len {
            return Err(HalError::ConfigError(format!(
                "Expander '{}': initial_output has {} bytes but output_bytes is {}",
                self.name,
                self.initial_output.len(),
                out_len
            )));
        }

        Ok(())
    }

    /// Refresh period as Duration.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Settling delay as Duration.
    pub fn settle(&self) -> Duration {
        Duration::from_micros(self.settle_us)
    }
}

/// Reaction of a refresh flow to a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the flow and report to the supervisor, which terminates the process.
    #[default]
    Halt,
    /// Keep refreshing, halting only after this many consecutive failures.
    Retry(u32),
}
