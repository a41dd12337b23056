//! Line Registry: runtime name-based line access.
//!
//! Built once at startup from the `[[lines]]` config and the buffers the HAL
//! core allocated for each expander. Immutable after construction; every
//! entry is a [`BitRegister`] over a shared expander buffer, so lookups and
//! reads/writes never allocate.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, trace};

use super::config::{LineConfig, LineDirection};
use crate::bits::{BitBuffer, BitRegister};

// ─── Error Types ────────────────────────────────────────────────────

/// Line wiring validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineConfigError {
    /// Line with an empty name.
    #[error("line bound to '{expander}' bit {bit} has an empty name")]
    EmptyName {
        /// Expander name.
        expander: String,
        /// Bit index.
        bit: usize,
    },
    /// Two lines share a name.
    #[error("duplicate line name '{0}'")]
    NameDuplicate(String),
    /// Two lines address the same bit.
    #[error("lines '{first}' and '{second}' both bind {direction} bit {bit} of '{expander}'")]
    BitDuplicate {
        /// Expander name.
        expander: String,
        /// Chain direction.
        direction: LineDirection,
        /// Bit index.
        bit: usize,
        /// First line.
        first: String,
        /// Second line.
        second: String,
    },
    /// Line references an expander that is not configured.
    #[error("line '{line}' references unknown expander '{expander}'")]
    UnknownExpander {
        /// Line name.
        line: String,
        /// Expander name.
        expander: String,
    },
    /// Expander has no chain in the line's direction.
    #[error("line '{line}': expander '{expander}' has no {direction} chain")]
    DirectionMissing {
        /// Line name.
        line: String,
        /// Expander name.
        expander: String,
        /// Requested direction.
        direction: LineDirection,
    },
    /// Bit index beyond the chain length.
    #[error("line '{line}': bit {bit} out of range ({len_bits} bits)")]
    BitOutOfRange {
        /// Line name.
        line: String,
        /// Requested bit.
        bit: usize,
        /// Chain length in bits.
        len_bits: usize,
    },
}

// ─── ExpanderBuffers ────────────────────────────────────────────────

/// Buffers of one expander: the output chain image and the input chain image.
#[derive(Debug, Clone, Default)]
pub struct ExpanderBuffers {
    /// Output chain image, if the expander drives outputs.
    pub output: Option<BitBuffer>,
    /// Input chain image, if the expander samples inputs.
    pub input: Option<BitBuffer>,
}

impl ExpanderBuffers {
    /// Buffer for `direction`.
    pub fn get(&self, direction: LineDirection) -> Option<&BitBuffer> {
        match direction {
            LineDirection::Output => self.output.as_ref(),
            LineDirection::Input => self.input.as_ref(),
        }
    }
}

// ─── LineBinding ────────────────────────────────────────────────────

/// Runtime binding of a name to one expander bit.
#[derive(Debug, Clone)]
struct LineBinding {
    direction: LineDirection,
    register: BitRegister,
}

// ─── LineRegistry ───────────────────────────────────────────────────

/// Runtime line registry, mapping line names to bit registers.
#[derive(Debug, Clone, Default)]
pub struct LineRegistry {
    bindings: HashMap<String, LineBinding>,
    /// Number of output lines.
    pub output_count: usize,
    /// Number of input lines.
    pub input_count: usize,
}

impl LineRegistry {
    /// Build the registry, running all validation rules.
    ///
    /// Returns the first validation error encountered.
    pub fn from_config(
        lines: &[LineConfig],
        buffers: &HashMap<String, ExpanderBuffers>,
    ) -> Result<Self, LineConfigError> {
        let mut registry = Self::default();
        let mut bits: HashMap<(&str, LineDirection, usize), &str> = HashMap::new();

        for line in lines {
            if line.name.is_empty() {
                return Err(LineConfigError::EmptyName {
                    expander: line.expander.clone(),
                    bit: line.bit,
                });
            }
            if registry.bindings.contains_key(&line.name) {
                return Err(LineConfigError::NameDuplicate(line.name.clone()));
            }

            let expander =
                buffers
                    .get(&line.expander)
                    .ok_or_else(|| LineConfigError::UnknownExpander {
                        line: line.name.clone(),
                        expander: line.expander.clone(),
                    })?;
            let buffer =
                expander
                    .get(line.direction)
                    .ok_or_else(|| LineConfigError::DirectionMissing {
                        line: line.name.clone(),
                        expander: line.expander.clone(),
                        direction: line.direction,
                    })?;
            let register = BitRegister::try_new(buffer, line.bit, line.inverted).map_err(|e| {
                LineConfigError::BitOutOfRange {
                    line: line.name.clone(),
                    bit: e.index,
                    len_bits: e.len_bits,
                }
            })?;

            let key = (line.expander.as_str(), line.direction, line.bit);
            if let Some(first) = bits.insert(key, line.name.as_str()) {
                return Err(LineConfigError::BitDuplicate {
                    expander: line.expander.clone(),
                    direction: line.direction,
                    bit: line.bit,
                    first: first.to_string(),
                    second: line.name.clone(),
                });
            }

            trace!(
                "Line '{}' -> {} {} bit {}{}",
                line.name,
                line.expander,
                line.direction,
                line.bit,
                if line.inverted { " (inverted)" } else { "" }
            );
            match line.direction {
                LineDirection::Output => registry.output_count += 1,
                LineDirection::Input => registry.input_count += 1,
            }
            registry.bindings.insert(
                line.name.clone(),
                LineBinding {
                    direction: line.direction,
                    register,
                },
            );
        }

        debug!(
            "Line registry built: {} outputs, {} inputs",
            registry.output_count, registry.input_count
        );
        Ok(registry)
    }

    /// Register view of the named line.
    #[inline]
    pub fn line(&self, name: &str) -> Option<&BitRegister> {
        self.bindings.get(name).map(|b| &b.register)
    }

    /// Logical value of the named line.
    #[inline]
    pub fn read(&self, name: &str) -> Option<bool> {
        self.line(name).map(BitRegister::read)
    }

    /// Write the named output line. Returns `false` if no such output line exists.
    pub fn write(&self, name: &str, active: bool) -> bool {
        match self.bindings.get(name) {
            Some(b) if b.direction == LineDirection::Output => {
                b.register.write(active);
                true
            }
            _ => false,
        }
    }

    /// Number of registered lines.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True if no lines are registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
