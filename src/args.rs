// Commandline argument parser using clap for decim8

use crate::config::CaptureConfig;
use clap::Parser;
use std::path::PathBuf;

/// Capture 8-bit PCM audio from a serial device and write a raw plus a
/// downsampled WAV.
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct CaptureArgs {
    /// RON file with capture settings; the flags below override its fields
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Serial port device to use, skipping auto-detection
    #[arg(short = 'p', long = "port")]
    pub port: Option<PathBuf>,

    /// Anti-alias low-pass cutoff in Hz
    #[arg(long = "cutoff")]
    pub cutoff_hz: Option<f64>,

    /// Butterworth filter order
    #[arg(long = "order")]
    pub filter_order: Option<usize>,

    /// Keep one sample in this many
    #[arg(short = 'd', long = "decim")]
    pub decim_factor: Option<usize>,

    /// Baud rate the device streams at
    #[arg(short = 'b', long = "baud")]
    pub target_baud: Option<u32>,

    /// Substring to look for when auto-detecting the serial port
    #[arg(long = "hint")]
    pub port_hint: Option<String>,

    /// Where the raw capture is written
    #[arg(long = "raw-out", default_value = "original.wav")]
    pub raw_out: PathBuf,

    /// Where the downsampled capture is written
    #[arg(short = 'o', long = "out", default_value = "processed_multirate.wav")]
    pub processed_out: PathBuf,

    /// Capture from a built-in simulated device instead of real hardware
    #[arg(long)]
    pub dummy: bool,
}

impl CaptureArgs {
    /// Folds the CLI overrides into `config`.
    pub fn apply_to(&self, config: &mut CaptureConfig) {
        if let Some(cutoff_hz) = self.cutoff_hz {
            config.cutoff_hz = cutoff_hz;
        }
        if let Some(filter_order) = self.filter_order {
            config.filter_order = filter_order;
        }
        if let Some(decim_factor) = self.decim_factor {
            config.decim_factor = decim_factor;
        }
        if let Some(target_baud) = self.target_baud {
            config.target_baud = target_baud;
        }
        if let Some(port_hint) = &self.port_hint {
            config.port_hint = port_hint.clone();
        }
    }
}
