//! decim8 records a short burst of 8-bit PCM audio from a microcontroller
//! over a serial link and reduces its sample rate without aliasing.
//!
//! The device side is tiny: on receiving `'S'` it streams a `RAW8\n`
//! marker, a little-endian sample-rate and length header, then the raw
//! payload. The host side (this crate) reads that frame, normalizes the
//! samples, writes the capture as a float WAV, runs a Butterworth
//! low-pass tuned below the post-decimation Nyquist frequency, keeps
//! every Nth sample, and writes the result as a second WAV.
//!
//! Everything is offline and single-threaded; the only blocking points
//! are the bounded serial reads, which return control when the port's
//! timeout expires.

#![warn(missing_docs)]
pub mod args;
pub mod byte_source;
pub mod config;
pub mod dummy_device;
pub mod framed;
pub mod multirate;
pub mod pipeline;
pub mod protocol;
pub mod signal;
pub mod wav_writer;
