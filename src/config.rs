//! Run configuration, loadable from a RON file.
//!
//! Every knob has a default matching the firmware this tool was built
//! against, so an empty config `()` is a valid file.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::Path;

/// Knobs for a capture run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Anti-alias low-pass cutoff, in Hz.
    pub cutoff_hz: f64,
    /// Butterworth filter order.
    pub filter_order: usize,
    /// Keep one sample in this many.
    pub decim_factor: usize,
    /// Baud rate the device streams at.
    pub target_baud: u32,
    /// Substring used to pick a serial port automatically.
    pub port_hint: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            cutoff_hz: 4_000.0,
            filter_order: 4,
            decim_factor: 10,
            target_baud: 500_000,
            port_hint: "CH340".to_string(),
        }
    }
}

impl CaptureConfig {
    /// Reads a config from a RON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let text = fs::read_to_string(path).map_err(ConfigFileError::Io)?;
        ron::from_str(&text).map_err(ConfigFileError::Ron)
    }
}

/// Why a config file could not be used.
#[derive(Debug)]
pub enum ConfigFileError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The file is not a valid `CaptureConfig`.
    Ron(ron::de::SpannedError),
}

impl fmt::Display for ConfigFileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ConfigFileError::Io(error) => Cow::from(format!("io error: {}", error)),
            ConfigFileError::Ron(error) => Cow::from(format!("ron error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ConfigFileError {}
