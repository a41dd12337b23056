//! # SHIFTIO HAL Library
//!
//! Periodic refresh of daisy-chained shift registers (74x595 outputs, 74x165
//! inputs) behind a byte transport and a latch line.
//!
//! # Module Structure
//!
//! - [`flow`] - Shift-register refresh flow, bus lock, trigger
//! - [`executor`] - Dedicated single-thread runtime for blocking bus I/O
//! - [`core`] - HalCore: buffers, line wiring, flow supervision
//! - [`driver_registry`] - Backend factory registration
//! - [`drivers`] - Backend implementations (spidev, simulation)
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      shiftio_hal                               │
//! │  ┌──────────────┐   ┌──────────────┐   ┌───────────────────┐   │
//! │  │ LineRegistry │──►│   HalCore    │◄──│  DriverRegistry   │   │
//! │  │ (BitRegister)│   │ (supervisor) │   │  spidev/simulation│   │
//! │  └──────┬───────┘   └──────┬───────┘   └───────────────────┘   │
//! │         │ BitBuffer        │ spawn                             │
//! │         ▼                  ▼                                   │
//! │  ┌──────────────────────────────────┐                          │
//! │  │  IoExecutor (io_thread)          │                          │
//! │  │   ShiftRegisterFlow × expanders  │──► LatchLine + transport │
//! │  │   BusLock per shared bus         │                          │
//! │  └──────────────────────────────────┘                          │
//! └────────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod core;
pub mod driver_registry;
pub mod drivers;
pub mod executor;
pub mod flow;

// Re-export key types for convenience
pub use crate::core::HalCore;
pub use crate::driver_registry::DriverRegistry;
pub use crate::executor::{FlowHandle, IoExecutor};
pub use crate::flow::{BusLock, FlowError, FlowSpec, FlowTrigger, ShiftRegisterFlow};
