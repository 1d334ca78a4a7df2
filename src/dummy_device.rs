//! A fake capture device for tests and hardware-free runs.
//!
//! Speaks the same wire protocol as the firmware: stays silent until the
//! start command arrives, then serves one `RAW8` frame in bounded chunks,
//! the way a serial buffer would.

use crate::byte_source::ByteSource;
use crate::protocol::{MAGIC, START_COMMAND};
use rand::prelude::*;
use std::f64::consts::PI;
use std::io;

/// Default cap on how many bytes a single read delivers.
const DEFAULT_CHUNK: usize = 64;

/// Frequency of the synthesized tone, in Hz.
const TONE_HZ: f64 = 440.0;

/// An in-process [`ByteSource`] that plays back one capture frame.
pub struct DummyDevice {
    frame: Vec<u8>,
    pos: usize,
    chunk: usize,
    armed: bool,
}

impl DummyDevice {
    /// A device holding a synthesized capture: a 440 Hz tone with a
    /// little measurement noise, `duration_sec` long at `sample_rate`.
    pub fn new(sample_rate: u32, duration_sec: f64) -> Self {
        let count = (sample_rate as f64 * duration_sec) as usize;
        let mut rng = thread_rng();
        let payload: Vec<u8> = (0..count)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                let tone = (2.0 * PI * TONE_HZ * t).sin() * 0.6;
                let noisy = tone + rng.gen_range(-0.05..0.05);
                (noisy * 128.0 + 128.0).clamp(0.0, 255.0) as u8
            })
            .collect();

        Self::from_payload(sample_rate, &payload)
    }

    /// A device that frames the given payload with a correct header.
    pub fn from_payload(sample_rate: u32, payload: &[u8]) -> Self {
        let mut frame = Vec::with_capacity(MAGIC.len() + 8 + payload.len());
        frame.extend_from_slice(MAGIC);
        frame.extend_from_slice(&sample_rate.to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload);
        Self::from_frame(frame)
    }

    /// A device that serves exactly these bytes, however malformed.
    pub fn from_frame(frame: Vec<u8>) -> Self {
        Self {
            frame,
            pos: 0,
            chunk: DEFAULT_CHUNK,
            armed: false,
        }
    }

    /// Caps how many bytes a single read can deliver.
    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }
}

impl ByteSource for DummyDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        if buf.contains(&START_COMMAND) {
            self.armed = true;
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.armed || self.pos >= self.frame.len() {
            return Ok(0);
        }

        let n = buf
            .len()
            .min(self.chunk)
            .min(self.frame.len() - self.pos);
        buf[..n].copy_from_slice(&self.frame[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
