//! Engine and output configuration.
//!
//! A `Config` is owned by the session and handed by reference to the planner,
//! the expression binder and the output sinks.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Evaluate integer-kind columns as doubles. When false, integer and bitmap
    /// operands are compared as 64-bit integers taken from the slot's bit pattern.
    pub treat_integers_as_doubles: bool,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            treat_integers_as_doubles: true,
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Parses a JSON document, missing keys take their defaults
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Loads a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// Formatting options for text output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub field_delimiter: String,
    pub do_not_write_column_names: bool,
    pub do_not_write_null: bool,
    pub full_precision: bool,
    pub display_bitfields_binary: bool,
    pub disable_alignment_of_columns: bool,
    /// "default", or "wide" to print `name:type` headers
    pub output_format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            field_delimiter: "\t".to_string(),
            do_not_write_column_names: false,
            do_not_write_null: false,
            full_precision: false,
            display_bitfields_binary: false,
            disable_alignment_of_columns: false,
            output_format: "default".to_string(),
        }
    }
}
