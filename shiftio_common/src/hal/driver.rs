//! HAL backend trait and error types.
//!
//! This module defines:
//! - `IoBackend` trait - Interface for pluggable I/O backends
//! - `HalError` enum - Error types for HAL operations
//! - `DriverFactory` type alias - Factory function type

use crate::hal::config::BusConfig;
use crate::hal::line::{ByteTransport, LatchLine};
use std::io;
use thiserror::Error;

/// Error types for HAL operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Startup could not complete (transport not opened, misaligned buffer, ...)
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Hardware communication error
    #[error("Hardware communication error: {0}")]
    CommunicationError(String),

    /// Backend not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// A refresh flow stopped on an unrecoverable error
    #[error("Flow '{flow}' halted: {reason}")]
    FlowHalted {
        /// Expander name of the flow
        flow: String,
        /// Error that stopped it
        reason: String,
    },
}

/// Factory function type for creating backend instances.
pub type DriverFactory = fn() -> Box<dyn IoBackend>;

/// Trait defining the interface for I/O backends.
///
/// A backend knows how to open the byte transport of a bus and how to obtain
/// the latch line of an expander. HAL Core asks for every transport and latch
/// during `init()`; the returned objects are then owned by refresh flows and
/// used from the dedicated I/O executor.
///
/// # Lifecycle
///
/// 1. `latch()` / `open_transport()` - Called once per expander before the
///    flows start
/// 2. `shutdown()` - Called when HAL Core is stopping
pub trait IoBackend: Send {
    /// Returns the backend's unique identifier (e.g., "spidev", "simulation").
    fn name(&self) -> &'static str;

    /// Returns the backend's semantic version.
    fn version(&self) -> &'static str;

    /// Open a fresh transport handle on `bus`.
    ///
    /// Called once per expander; expanders sharing a bus each get their own
    /// handle and are serialized by a shared bus lock.
    fn open_transport(&mut self, bus: &BusConfig) -> io::Result<Box<dyn ByteTransport>>;

    /// Obtain the latch line for GPIO `gpio` of an expander on `bus`, driven low.
    fn latch(&mut self, bus: &BusConfig, gpio: u32) -> Result<Box<dyn LatchLine>, HalError>;

    /// Release backend resources.
    fn shutdown(&mut self) -> Result<(), HalError> {
        Ok(())
    }
}
