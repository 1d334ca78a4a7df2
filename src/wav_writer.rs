//! Waveform persistence through the hound library.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

/// Bit width of every file this tool writes.
const BITS_PER_SAMPLE: u16 = 32;

/// Anything that can persist a mono float signal at a sample rate.
pub trait WaveformSink {
    /// Writes `samples` at `sample_rate` to `path`, replacing any
    /// existing file.
    fn write(&mut self, samples: &[f32], sample_rate: u32, path: &Path)
        -> Result<(), hound::Error>;
}

/// A [`WaveformSink`] that writes mono IEEE-float WAV files.
#[derive(Debug, Default)]
pub struct WavFileSink;

impl WaveformSink for WavFileSink {
    fn write(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
        path: &Path,
    ) -> Result<(), hound::Error> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: BITS_PER_SAMPLE,
            sample_format: SampleFormat::Float,
        };

        let mut writer = WavWriter::create(path, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }

        // Finalizing patches the length fields in the header.
        writer.finalize()
    }
}
