//! SHIFTIO Common Library
//!
//! Shared building blocks for shift-register based I/O expansion.
//!
//! # Module Structure
//!
//! - [`bits`] - Word-aligned shared bit buffers and bit-addressable registers
//! - [`hal`] - Line/transport interfaces, backend trait, expander configuration
//! - [`io`] - Named line wiring (`[[lines]]`) and the runtime line registry
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - System-wide defaults
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use shiftio_common::bits::{BitBuffer, BitRegister};
//!
//! let outputs = BitBuffer::from_bytes(&[0xDB, 0x76, 0xB6]);
//! let line = BitRegister::new(&outputs, 7, true);
//! assert!(!line.read());
//! line.write(true);
//! assert_eq!(outputs.to_bytes()[0], 0x5B);
//! ```

pub mod bits;
pub mod config;
pub mod consts;
pub mod hal;
pub mod io;
pub mod prelude;
