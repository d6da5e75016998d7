use crate::{BusInfo, Result, TransportError};

/// A minimal blocking register-oriented bus to the hub.
///
/// Both operations are whole transactions: `read` either returns exactly
/// `len` bytes or fails, and `write` either transfers the full payload or
/// fails. Implementations must never return a partial buffer.
pub trait RegisterBus {
    /// Open a link by name (e.g., a serial port path, or "mock0").
    fn open(name: &str) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list available links for this backend.
    fn list() -> Result<Vec<BusInfo>>;

    /// Read exactly `len` bytes from a register.
    fn read(&mut self, register: u8, len: usize) -> Result<Vec<u8>>;

    /// Write a payload to a register.
    fn write(&mut self, register: u8, bytes: &[u8]) -> Result<()>;
}

/// Guard helper shared by backends: reject buffers shorter than requested.
pub(crate) fn check_full_read(expected: usize, buf: &[u8]) -> Result<()> {
    if buf.len() < expected {
        return Err(TransportError::ShortRead {
            expected,
            got: buf.len(),
        });
    }
    Ok(())
}
