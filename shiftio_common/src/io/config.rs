//! Line wiring configuration.
//!
//! Deserialized from the `[[lines]]` tables of `io.toml`:
//!
//! ```toml
//! [[lines]]
//! name = "portd_line1"
//! expander = "outputs"
//! direction = "output"
//! bit = 7
//! inverted = true
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which buffer of an expander a line lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineDirection {
    /// Bit of the output chain (written by higher layers, shifted out).
    Output,
    /// Bit of the input chain (sampled from hardware, read by higher layers).
    Input,
}

impl fmt::Display for LineDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output => write!(f, "output"),
            Self::Input => write!(f, "input"),
        }
    }
}

/// One named line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineConfig {
    /// Unique line name.
    pub name: String,

    /// Expander whose buffer holds the bit.
    pub expander: String,

    /// Output or input chain.
    pub direction: LineDirection,

    /// Bit index within the chain buffer (bit `n` = byte `n / 8`, bit `n % 8`).
    pub bit: usize,

    /// Active-low wiring.
    #[serde(default)]
    pub inverted: bool,

    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_from_toml() {
        let line: LineConfig = toml::from_str(
            r#"
name = "blue_button"
expander = "inputs"
direction = "input"
bit = 3
"#,
        )
        .unwrap();
        assert_eq!(line.direction, LineDirection::Input);
        assert_eq!(line.bit, 3);
        assert!(!line.inverted);
        assert!(line.description.is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = toml::from_str::<LineConfig>(
            r#"
name = "x"
expander = "outputs"
direction = "output"
bit = 0
pin = 4
"#,
        );
        assert!(result.is_err());
    }
}
