use crate::traits::check_full_read;
use crate::{BusInfo, RegisterBus, Result, TransportError};
use serialport::{SerialPort, SerialPortType};
use std::io::{Read, Write};
use std::time::Duration;

const REQUEST_READ: u8 = b'R';
const REQUEST_WRITE: u8 = b'W';

/// The hub's framed register protocol over a serial link (USB bridge).
///
/// Each transaction starts with a 4-byte request header: opcode, register
/// address, payload length little-endian. Writes append the payload; reads
/// expect exactly the requested number of bytes back.
pub struct SerialHub {
    _port_path: String,
    port: Box<dyn SerialPort>,
}

impl SerialHub {
    pub fn open_with(path: &str, timeout_ms: u64) -> Result<Self> {
        let port = serialport::new(path, 115_200)
            .timeout(Duration::from_millis(timeout_ms))
            .open()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(SerialHub {
            _port_path: path.to_string(),
            port,
        })
    }

    fn request_header(opcode: u8, register: u8, len: usize) -> [u8; 4] {
        [opcode, register, (len & 0xFF) as u8, (len >> 8) as u8]
    }

    fn read_exact_or_timeout(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match self.port.read(&mut out[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) => {
                    let msg = e.to_string();
                    if msg.contains("timed out") {
                        // Partial data before the deadline is a short read,
                        // an empty buffer is a timeout
                        if filled > 0 {
                            break;
                        }
                        return Err(TransportError::Timeout);
                    }
                    return Err(TransportError::Io(msg));
                }
            }
        }
        check_full_read(len, &out[..filled])?;
        Ok(out)
    }
}

impl RegisterBus for SerialHub {
    fn open(path: &str) -> Result<Self>
    where
        Self: Sized,
    {
        Self::open_with(path, 200)
    }

    fn list() -> Result<Vec<BusInfo>> {
        let mut out = Vec::new();
        for p in serialport::available_ports().map_err(|e| TransportError::Io(e.to_string()))? {
            match p.port_type {
                SerialPortType::UsbPort(_u) => {
                    out.push(BusInfo {
                        name: p.port_name,
                        driver: "hub-serial".to_string(),
                    });
                }
                _ => {
                    // Still include other serial ports; user can pick
                    out.push(BusInfo {
                        name: p.port_name,
                        driver: "serial".to_string(),
                    });
                }
            }
        }
        Ok(out)
    }

    fn read(&mut self, register: u8, len: usize) -> Result<Vec<u8>> {
        let header = Self::request_header(REQUEST_READ, register, len);
        self.port
            .write_all(&header)
            .map_err(|e| TransportError::Io(e.to_string()))?;
        self.read_exact_or_timeout(len)
    }

    fn write(&mut self, register: u8, bytes: &[u8]) -> Result<()> {
        let header = Self::request_header(REQUEST_WRITE, register, bytes.len());
        let mut frame = Vec::with_capacity(4 + bytes.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(bytes);
        self.port
            .write_all(&frame)
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(())
    }
}
