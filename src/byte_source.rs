//! The byte-level transport the capture protocol runs over, and its
//! implementation for real serial hardware.

use log::{debug, info};
use serial2::SerialPort;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Baud rate used for the initial open. The board resets when the port
/// opens; the switch to the capture rate happens after that reset settles.
pub const SAFE_OPEN_BAUD: u32 = 9600;

/// How long the board takes to come out of its open-triggered reset.
const RESET_SETTLE: Duration = Duration::from_secs(2);

/// Pause after a baud-rate change before trusting the line again.
const BAUD_SWITCH_SETTLE: Duration = Duration::from_millis(100);

/// Per-read timeout on the serial port.
const READ_TIMEOUT: Duration = Duration::from_secs(3);

/// A device that yields bytes on request and accepts commands.
///
/// `read` blocks up to the source's own timeout and reports a timeout as
/// `Ok(0)`, so callers can treat "nothing arrived" as a signal rather than
/// a failure. Closing or invalidating the source makes subsequent reads
/// return `Ok(0)` as well, which is the only way to abort a capture early.
pub trait ByteSource {
    /// Writes the whole buffer to the device.
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Reads up to `buf.len()` bytes, returning how many arrived. `Ok(0)`
    /// means the read timed out or the source is exhausted.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// A [`ByteSource`] backed by a [`serial2::SerialPort`].
///
/// The port is closed when the source is dropped, on every exit path.
pub struct SerialSource {
    port: SerialPort,
}

impl SerialSource {
    /// Opens `path` and brings it to `target_baud`, riding out the reset
    /// that USB-serial boards perform when the port opens: open at
    /// [`SAFE_OPEN_BAUD`], drop the modem control lines, wait for the
    /// reset, flush whatever the bootloader printed, then switch rates.
    pub fn open_stable(path: impl AsRef<Path>, target_baud: u32) -> io::Result<Self> {
        let path = path.as_ref();
        info!(
            "opening {} at {} baud",
            path.to_string_lossy(),
            SAFE_OPEN_BAUD
        );
        let mut port = SerialPort::open(path, SAFE_OPEN_BAUD)?;
        port.set_read_timeout(READ_TIMEOUT)?;

        // Not every USB bridge exposes these lines, so failures here are
        // not fatal.
        let _ = port.set_dtr(false);
        let _ = port.set_rts(false);

        spin_sleep::sleep(RESET_SETTLE);
        port.discard_input_buffer()?;

        info!("switching to {} baud", target_baud);
        let mut settings = port.get_configuration()?;
        settings.set_baud_rate(target_baud)?;
        port.set_configuration(&settings)?;
        spin_sleep::sleep(BAUD_SWITCH_SETTLE);
        port.discard_input_buffer()?;

        Ok(Self { port })
    }
}

impl ByteSource for SerialSource {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < buf.len() {
            written += self.port.write(&buf[written..])?;
        }
        self.port.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }
}

/// Picks a serial port, preferring the first whose device path contains
/// `hint` (serial2 exposes device paths only, so the hint matches against
/// the path rather than a driver description). Falls back to the first
/// port found.
pub fn pick_port(hint: &str) -> io::Result<PathBuf> {
    let ports = SerialPort::available_ports()?;
    if ports.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "no serial ports found; is the board plugged in?",
        ));
    }

    for port in &ports {
        debug!("found port {}", port.to_string_lossy());
    }

    let wanted = hint.to_uppercase();
    let hit = ports
        .iter()
        .find(|p| p.to_string_lossy().to_uppercase().contains(&wanted));
    Ok(hit.unwrap_or(&ports[0]).clone())
}
