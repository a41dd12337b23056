//! Hardware abstraction layer interfaces and configuration.
//!
//! This module contains the interfaces the refresh flows consume
//! (latch lines, byte transports), the pluggable backend trait, and the
//! configuration types for buses and expanders.

pub mod config;
pub mod consts;
pub mod driver;
pub mod line;
