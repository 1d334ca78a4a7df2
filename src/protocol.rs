//! The capture handshake: one command byte out, one framed 8-bit PCM
//! payload back.
//!
//! Wire format, integers little-endian:
//!
//! ```text
//! host -> device   'S'
//! device -> host   "RAW8\n" <u32 sample_rate> <u32 payload_len> <payload>
//! ```
//!
//! The payload is mono, one byte per sample, so the header also implies
//! how long the transfer should take. A transfer that runs far over that
//! duration, or that delivers fewer bytes than declared, is logged as a
//! warning and the data kept; over a flaky serial link a partial capture
//! is still usable output.

use crate::byte_source::ByteSource;
use crate::framed::read_exact;
use log::{info, warn};
use nom::number::complete::le_u32;
use nom::sequence::tuple;
use nom::IResult;
use std::borrow::Cow;
use std::fmt;
use std::io;
use std::time::Instant;

/// Start-of-frame marker the device sends before the header.
pub const MAGIC: &[u8; 5] = b"RAW8\n";

/// Command byte that asks the device to begin a capture.
pub const START_COMMAND: u8 = b'S';

/// Slack allowed between the expected and measured payload transfer time
/// before the bandwidth warning fires, in seconds.
const BANDWIDTH_TOLERANCE_SEC: f64 = 2.0;

/// A capture as the device declared and delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCapture {
    /// Sample rate declared in the header, in Hz.
    pub sample_rate: u32,
    /// Payload length declared in the header, in bytes.
    pub declared_len: u32,
    /// Unsigned 8-bit PCM samples, possibly fewer than `declared_len`.
    pub samples: Vec<u8>,
}

impl RawCapture {
    /// Whether the device delivered every byte it declared.
    pub fn is_complete(&self) -> bool {
        self.samples.len() == self.declared_len as usize
    }
}

/// Ways the handshake can fail outright. Short payloads and slow
/// transfers are warnings, not members of this enum.
#[derive(Debug)]
pub enum CaptureError {
    /// The device answered with something other than the `RAW8` marker.
    /// Carries the bytes actually received.
    BadMagic {
        /// What arrived in place of the marker.
        got: Vec<u8>,
    },
    /// Fewer than eight header bytes arrived after the marker.
    TruncatedHeader {
        /// How many header bytes arrived.
        got: usize,
    },
    /// The header declared a sample rate of zero, which has no duration
    /// and cannot be written as a waveform.
    BadHeader {
        /// Declared sample rate.
        sample_rate: u32,
        /// Declared payload length.
        payload_len: u32,
    },
    /// The transport failed outright.
    Io(io::Error),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use CaptureError as CE;
        let msg = match self {
            CE::BadMagic { got } => Cow::from(format!("bad magic, received {:02x?}", got)),
            CE::TruncatedHeader { got } => {
                Cow::from(format!("truncated header, received {} of 8 bytes", got))
            }
            CE::BadHeader {
                sample_rate,
                payload_len,
            } => Cow::from(format!(
                "unusable header: sample rate {} Hz, payload {} bytes",
                sample_rate, payload_len
            )),
            CE::Io(error) => Cow::from(format!("io error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for CaptureError {}

impl From<io::Error> for CaptureError {
    fn from(error: io::Error) -> Self {
        CaptureError::Io(error)
    }
}

fn parse_header(input: &[u8]) -> IResult<&[u8], (u32, u32)> {
    tuple((le_u32, le_u32))(input)
}

/// Drives one full capture over `source`: sends [`START_COMMAND`],
/// validates the marker, parses the header, then reads the payload,
/// timing the transfer against the duration the header implies.
///
/// Re-invoking repeats the whole handshake; there is no resume.
pub fn capture<S: ByteSource + ?Sized>(source: &mut S) -> Result<RawCapture, CaptureError> {
    info!("sending start command");
    source.write(&[START_COMMAND])?;

    let magic = read_exact(source, MAGIC.len())?;
    if magic != MAGIC {
        return Err(CaptureError::BadMagic { got: magic });
    }

    let header = read_exact(source, 8)?;
    let (sample_rate, payload_len) = match parse_header(&header) {
        Ok((_rest, fields)) => fields,
        Err(_) => return Err(CaptureError::TruncatedHeader { got: header.len() }),
    };
    if sample_rate == 0 {
        return Err(CaptureError::BadHeader {
            sample_rate,
            payload_len,
        });
    }

    let expected_sec = payload_len as f64 / sample_rate as f64;
    info!(
        "device declares {} Hz, {} bytes (~{:.2} s)",
        sample_rate, payload_len, expected_sec
    );

    let started = Instant::now();
    let payload = read_exact(source, payload_len as usize)?;
    let elapsed_sec = started.elapsed().as_secs_f64();
    info!(
        "payload received in {:.2} s (expected {:.2} s)",
        elapsed_sec, expected_sec
    );

    if bandwidth_mismatch(elapsed_sec, expected_sec) {
        warn!(
            "transfer took {:.2} s against an expected {:.2} s; the link is likely a throughput bottleneck",
            elapsed_sec, expected_sec
        );
    }
    if payload.len() < payload_len as usize {
        warn!("short payload: {}/{} bytes", payload.len(), payload_len);
    }

    Ok(RawCapture {
        sample_rate,
        declared_len: payload_len,
        samples: payload,
    })
}

/// True when the measured transfer time falls outside the accepted window
/// around the duration the header implies.
fn bandwidth_mismatch(elapsed_sec: f64, expected_sec: f64) -> bool {
    (elapsed_sec - expected_sec).abs() > BANDWIDTH_TOLERANCE_SEC
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy_device::DummyDevice;

    fn frame(sample_rate: u32, declared_len: u32, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(MAGIC);
        frame.extend_from_slice(&sample_rate.to_le_bytes());
        frame.extend_from_slice(&declared_len.to_le_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn full_frame_round_trip() {
        let payload: Vec<u8> = (0..64).collect();
        let mut device = DummyDevice::from_frame(frame(8_000, 64, &payload));

        let capture = capture(&mut device).unwrap();
        assert_eq!(capture.sample_rate, 8_000);
        assert_eq!(capture.declared_len, 64);
        assert_eq!(capture.samples, payload);
        assert!(capture.is_complete());
    }

    #[test]
    fn chunked_delivery_is_equivalent() {
        let payload: Vec<u8> = (0..100).collect();

        for chunk in [1, 3, 200] {
            let mut device =
                DummyDevice::from_frame(frame(8_000, 100, &payload)).with_chunk(chunk);
            let capture = capture(&mut device).unwrap();
            assert_eq!(capture.samples, payload, "chunk size {}", chunk);
        }
    }

    #[test]
    fn any_perturbed_magic_byte_is_rejected() {
        for position in 0..MAGIC.len() {
            let mut bytes = frame(8_000, 4, &[1, 2, 3, 4]);
            bytes[position] ^= 0x20;
            let expected = bytes[..MAGIC.len()].to_vec();

            let mut device = DummyDevice::from_frame(bytes);
            match capture(&mut device) {
                Err(CaptureError::BadMagic { got }) => {
                    assert_eq!(got, expected, "position {}", position)
                }
                other => panic!("expected BadMagic at position {}, got {:?}", position, other),
            }
        }
    }

    #[test]
    fn missing_header_bytes_are_a_truncated_header() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&[0, 1, 2, 3, 4]);

        let mut device = DummyDevice::from_frame(bytes);
        match capture(&mut device) {
            Err(CaptureError::TruncatedHeader { got }) => assert_eq!(got, 5),
            other => panic!("expected TruncatedHeader, got {:?}", other),
        }
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        let mut device = DummyDevice::from_frame(frame(0, 4, &[1, 2, 3, 4]));
        match capture(&mut device) {
            Err(CaptureError::BadHeader {
                sample_rate,
                payload_len,
            }) => {
                assert_eq!(sample_rate, 0);
                assert_eq!(payload_len, 4);
            }
            other => panic!("expected BadHeader, got {:?}", other),
        }
    }

    #[test]
    fn short_payload_is_returned_degraded() {
        let delivered: Vec<u8> = vec![128; 40];
        let mut device = DummyDevice::from_frame(frame(8_000, 100, &delivered));

        let capture = capture(&mut device).unwrap();
        assert_eq!(capture.declared_len, 100);
        assert_eq!(capture.samples.len(), 40);
        assert!(!capture.is_complete());
    }

    #[test]
    fn bandwidth_window_is_two_seconds_either_way() {
        assert!(bandwidth_mismatch(8.2, 6.0));
        assert!(bandwidth_mismatch(3.5, 6.0));
        assert!(!bandwidth_mismatch(6.5, 6.0));
        assert!(!bandwidth_mismatch(8.0, 6.0));
        assert!(!bandwidth_mismatch(5.9, 6.0));
    }
}
