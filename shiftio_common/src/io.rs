//! Named line wiring.
//!
//! Binds semantic names (`portd_line1`, `blue_button`, ...) to single bits of
//! the expander buffers. Parsed from the `[[lines]]` tables of the I/O config
//! at startup; runtime access goes through [`registry::LineRegistry`].

pub mod config;
pub mod registry;
