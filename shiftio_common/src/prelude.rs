//! Prelude module for common re-exports.
//!
//! ```rust
//! use shiftio_common::prelude::*;
//! ```

// ─── Bits ───────────────────────────────────────────────────────────
pub use crate::bits::{BitBuffer, BitIndexError, BitRegister};

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::hal::config::{BusConfig, ErrorPolicy, ExpanderConfig, HalConfig};

// ─── HAL interfaces ─────────────────────────────────────────────────
pub use crate::hal::driver::{DriverFactory, HalError, IoBackend};
pub use crate::hal::line::{ByteTransport, DigitalLine, LatchLine};

// ─── Lines ──────────────────────────────────────────────────────────
pub use crate::io::config::{LineConfig, LineDirection};
pub use crate::io::registry::{ExpanderBuffers, LineRegistry};
