//! Exact-count reads over a [`ByteSource`] that only promises bounded,
//! possibly-partial deliveries.

use crate::byte_source::ByteSource;
use std::io;

/// Upper bound on a single read request.
const READ_CHUNK: usize = 4096;

/// Accumulates up to `n` bytes from `source`, issuing repeated bounded
/// reads until `n` bytes are collected or a read returns zero bytes
/// (the source timed out or is exhausted).
///
/// A short result is not an error: the caller decides whether a truncated
/// prefix is usable. I/O failures other than timeouts, which the source
/// maps to zero-length reads, propagate.
pub fn read_exact<S: ByteSource + ?Sized>(source: &mut S, n: usize) -> io::Result<Vec<u8>> {
    // `n` usually comes straight off the wire, so only pre-reserve a
    // bounded amount.
    let mut collected = Vec::with_capacity(n.min(READ_CHUNK));
    let mut buf = [0u8; READ_CHUNK];

    while collected.len() < n {
        let want = (n - collected.len()).min(READ_CHUNK);
        let got = source.read(&mut buf[..want])?;
        if got == 0 {
            break;
        }
        collected.extend_from_slice(&buf[..got]);
    }

    Ok(collected)
}
