//! Sequential wiring of the capture and multirate stages.
//!
//! Everything is buffered-then-processed: the capture completes before
//! decoding, decoding before filtering, filtering before decimation, and
//! decimation before the processed file is written.

use crate::byte_source::ByteSource;
use crate::config::CaptureConfig;
use crate::multirate::{self, ConfigError};
use crate::protocol::{self, CaptureError};
use crate::signal;
use crate::wav_writer::WaveformSink;
use log::info;
use std::borrow::Cow;
use std::fmt;
use std::path::Path;

/// Anything that can abort a capture run.
#[derive(Debug)]
pub enum PipelineError {
    /// The handshake with the device failed.
    Capture(CaptureError),
    /// A filter or decimation precondition was violated.
    Config(ConfigError),
    /// A waveform file could not be written.
    Sink(hound::Error),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            PipelineError::Capture(error) => Cow::from(format!("capture failed: {}", error)),
            PipelineError::Config(error) => Cow::from(format!("bad configuration: {}", error)),
            PipelineError::Sink(error) => Cow::from(format!("could not write waveform: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for PipelineError {}

impl From<CaptureError> for PipelineError {
    fn from(error: CaptureError) -> Self {
        PipelineError::Capture(error)
    }
}

impl From<ConfigError> for PipelineError {
    fn from(error: ConfigError) -> Self {
        PipelineError::Config(error)
    }
}

impl From<hound::Error> for PipelineError {
    fn from(error: hound::Error) -> Self {
        PipelineError::Sink(error)
    }
}

/// Runs one full capture: handshake, decode, raw WAV, multirate stage,
/// processed WAV.
///
/// Preconditions that do not depend on the device-declared sample rate
/// are rejected before any traffic reaches the source; the Nyquist bound
/// is checked as soon as the rate is known, before any filtering work.
pub fn run<S, W>(
    source: &mut S,
    sink: &mut W,
    config: &CaptureConfig,
    raw_out: &Path,
    processed_out: &Path,
) -> Result<(), PipelineError>
where
    S: ByteSource + ?Sized,
    W: WaveformSink + ?Sized,
{
    multirate::validate_static(config.cutoff_hz, config.filter_order, config.decim_factor)?;

    let capture = protocol::capture(source)?;
    let raw = signal::decode(&capture);

    sink.write(&raw.samples, raw.sample_rate, raw_out)?;
    info!(
        "raw capture written to {}: {} samples at {} Hz (~{:.2} s)",
        raw_out.display(),
        raw.samples.len(),
        raw.sample_rate,
        raw.duration_sec()
    );

    let processed = multirate::downsample(
        &raw,
        config.cutoff_hz,
        config.filter_order,
        config.decim_factor,
    )?;

    sink.write(&processed.samples, processed.sample_rate, processed_out)?;
    info!(
        "processed capture written to {}: {} samples at {} Hz",
        processed_out.display(),
        processed.samples.len(),
        processed.sample_rate
    );

    Ok(())
}
