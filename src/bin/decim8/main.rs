//! Commandline entry point: capture from a serial device (or the built-in
//! dummy) and write the raw and downsampled WAV files.

use clap::Parser;
use decim8::{
    args::CaptureArgs,
    byte_source::{pick_port, SerialSource},
    config::CaptureConfig,
    dummy_device::DummyDevice,
    pipeline,
    wav_writer::WavFileSink,
};
use log::{error, info};
use std::process::ExitCode;

// Example:
// cargo run --
//           --port   /dev/ttyUSB0
//           --baud   500000
//           --cutoff 4000
//           --order  4
//           --decim  10
//           --out    processed_multirate.wav

/// Sample rate the dummy device advertises.
const DUMMY_SAMPLE_RATE: u32 = 16_000;

/// How much audio the dummy device synthesizes, in seconds.
const DUMMY_DURATION_SEC: f64 = 6.0;

fn main() -> ExitCode {
    env_logger::init();
    let args = CaptureArgs::parse();

    let mut config = match &args.config {
        Some(path) => match CaptureConfig::from_path(path) {
            Ok(config) => config,
            Err(error) => {
                error!("could not load {}: {}", path.display(), error);
                return ExitCode::FAILURE;
            }
        },
        None => CaptureConfig::default(),
    };
    args.apply_to(&mut config);

    let mut sink = WavFileSink;

    let result = if args.dummy {
        info!("using the built-in dummy device");
        let mut source = DummyDevice::new(DUMMY_SAMPLE_RATE, DUMMY_DURATION_SEC);
        pipeline::run(
            &mut source,
            &mut sink,
            &config,
            &args.raw_out,
            &args.processed_out,
        )
    } else {
        let port = match &args.port {
            Some(path) => path.clone(),
            None => match pick_port(&config.port_hint) {
                Ok(path) => path,
                Err(error) => {
                    error!("no usable serial port: {}", error);
                    return ExitCode::FAILURE;
                }
            },
        };

        let mut source = match SerialSource::open_stable(&port, config.target_baud) {
            Ok(source) => source,
            Err(error) => {
                error!("could not open {}: {}", port.display(), error);
                return ExitCode::FAILURE;
            }
        };

        // The port closes when `source` drops, whichever way `run` exits.
        pipeline::run(
            &mut source,
            &mut sink,
            &config,
            &args.raw_out,
            &args.processed_out,
        )
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{}", error);
            ExitCode::FAILURE
        }
    }
}
