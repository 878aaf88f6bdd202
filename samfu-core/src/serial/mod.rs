//! Serial port enumeration and framed, timeout-bounded I/O.
//!
//! This module knows nothing about AT commands or the Odin protocol; it only
//! exposes a [`Handle`] as a scoped resource over a physical or virtual COM
//! port. [`device::at`](crate::device::at) and [`device::odin`](crate::device::odin)
//! build their exchanges on top of it.

use std::{
    io::{self, Read, Write},
    time::{Duration, Instant},
};

use regex::Regex;
use serialport::{FlowControl, SerialPort};
use thiserror::Error;

/// A serial port observed during enumeration, not yet opened.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct DetectedDevice {
    /// The OS-level port identifier (e.g. `/dev/ttyACM0`, `COM4`).
    pub port_id: String,
    /// The human-readable description reported by the OS/driver.
    pub description: String,
    /// The USB manufacturer string, if available.
    pub manufacturer: Option<String>,
    /// The USB product string, if available.
    pub product: Option<String>,
    /// The USB vendor ID, if it could be extracted.
    pub vid: Option<u16>,
    /// The USB product ID, if it could be extracted.
    pub pid: Option<u16>,
}

/// The case-insensitive substring a port description must contain to be
/// considered a Samsung device candidate.
const CANDIDATE_SUBSTRING: &str = "samsung mobile usb modem";

/// Errors raised by port enumeration and I/O.
#[derive(Debug, Error)]
pub enum SerialError {
    /// No candidate serial port was found.
    #[error("no Samsung serial device was found")]
    NotFound,

    /// The OS/driver layer failed to enumerate or open a port.
    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),

    /// A write did not complete before the configured timeout elapsed.
    #[error("write to serial port timed out")]
    WriteTimeout,

    /// A read did not produce the minimum expected data before the configured
    /// timeout elapsed.
    #[error("read from serial port timed out")]
    ReadTimeout,

    /// Low-level I/O failure not classified as a timeout.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

type Result<T> = std::result::Result<T, SerialError>;

/// Port configuration used to open a [`Handle`].
#[derive(Clone, Copy, Debug)]
pub struct PortConfig {
    /// Baud rate. 19200 for legacy AT, 115200 for modern AT and Odin.
    pub baud_rate: u32,
    /// Hardware flow control; enabled (RTS/CTS) for Odin, disabled for AT.
    pub flow_control: FlowControl,
    /// Timeout applied to the underlying blocking reads/writes.
    pub timeout: Duration,
}

impl PortConfig {
    /// The configuration used for legacy AT exchanges.
    pub fn at_legacy() -> Self {
        Self { baud_rate: 19_200, flow_control: FlowControl::None, timeout: Duration::from_secs(2) }
    }

    /// The configuration used for modern AT exchanges.
    pub fn at_modern() -> Self {
        Self { baud_rate: 115_200, flow_control: FlowControl::None, timeout: Duration::from_secs(2) }
    }

    /// The configuration used for Odin exchanges (RTS/CTS enabled).
    pub fn odin() -> Self {
        Self { baud_rate: 115_200, flow_control: FlowControl::Hardware, timeout: Duration::from_secs(2) }
    }
}

/// Enumerates all serial ports and filters them down to Samsung device
/// candidates: those whose description contains, case-insensitively,
/// `"samsung mobile usb modem"`.
pub fn enumerate() -> Result<Vec<DetectedDevice>> {
    let vid_re = Regex::new(r"(?i)VID[_:]([0-9A-F]{4})").unwrap();
    let pid_re = Regex::new(r"(?i)PID[_:]([0-9A-F]{4})").unwrap();

    let ports = serialport::available_ports()?;
    let mut out = Vec::new();

    for port in ports {
        let (description, manufacturer, product, hwid) = match &port.port_type {
            serialport::SerialPortType::UsbPort(usb) => (
                usb.product.clone().unwrap_or_default(),
                usb.manufacturer.clone(),
                usb.product.clone(),
                format!("VID_{:04X} PID_{:04X}", usb.vid, usb.pid),
            ),
            _ => (String::new(), None, None, String::new()),
        };

        if !description.to_lowercase().contains(CANDIDATE_SUBSTRING) {
            continue;
        }

        let vid = vid_re
            .captures(&hwid)
            .and_then(|c| u16::from_str_radix(&c[1], 16).ok());
        let pid = pid_re
            .captures(&hwid)
            .and_then(|c| u16::from_str_radix(&c[1], 16).ok());

        out.push(DetectedDevice {
            port_id: port.port_name,
            description,
            manufacturer,
            product,
            vid,
            pid,
        });
    }

    Ok(out)
}

/// Returns the first candidate device, or [`SerialError::NotFound`] if none
/// is connected.
pub fn first_device() -> Result<DetectedDevice> {
    enumerate()?.into_iter().next().ok_or(SerialError::NotFound)
}

/// An open serial port. Dropping a `Handle` releases the underlying OS
/// resource on every exit path, including unwinding.
pub struct Handle {
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl Handle {
    /// Opens `port_id` with `config`.
    pub fn open(port_id: &str, config: &PortConfig) -> Result<Self> {
        let port = serialport::new(port_id, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()?;

        Ok(Self { port, timeout: config.timeout })
    }

    /// Clears both the input and output buffers.
    pub fn flush_buffers(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }

    /// Sets DTR (Data Terminal Ready) assertion.
    pub fn set_dtr(&mut self, on: bool) -> Result<()> {
        self.port.write_data_terminal_ready(on)?;
        Ok(())
    }

    /// Sets RTS (Request To Send) assertion.
    pub fn set_rts(&mut self, on: bool) -> Result<()> {
        self.port.write_request_to_send(on)?;
        Ok(())
    }

    /// Writes `data` in full, bounded by the handle's configured timeout.
    ///
    /// A timeout here is reported as [`SerialError::WriteTimeout`], distinct
    /// from a read timeout.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        match self.port.write_all(data) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Err(SerialError::WriteTimeout),
            Err(e) => Err(SerialError::Io(e)),
        }
    }

    /// Reads whatever bytes are waiting right now, without blocking past a
    /// single driver-level read call.
    pub fn read_available(&mut self) -> Result<Vec<u8>> {
        let waiting = self.port.bytes_to_read().unwrap_or(0) as usize;
        if waiting == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; waiting];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            },
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(SerialError::Io(e)),
        }
    }

    /// Reads and accumulates bytes until `timeout` elapses, returning
    /// whatever was read. Does not fail merely because nothing arrived; the
    /// caller distinguishes "empty response" from a genuine transport error.
    pub fn read_for(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];

        while Instant::now() < deadline {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(SerialError::Io(e)),
            }
        }

        Ok(out)
    }

    /// The timeout this handle was opened with.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_substring_is_case_insensitive() {
        assert!("Samsung Mobile USB Modem #7".to_lowercase().contains(CANDIDATE_SUBSTRING));
        assert!("SAMSUNG MOBILE USB MODEM".to_lowercase().contains(CANDIDATE_SUBSTRING));
    }

    #[test]
    fn vid_pid_regex_extracts_hex() {
        let vid_re = Regex::new(r"(?i)VID[_:]([0-9A-F]{4})").unwrap();
        let pid_re = Regex::new(r"(?i)PID[_:]([0-9A-F]{4})").unwrap();

        let hwid = "USB\\VID_04E8&PID_6860\\6&1A";
        let vid = vid_re.captures(hwid).map(|c| c[1].to_string());
        let pid = pid_re.captures(hwid).map(|c| c[1].to_string());

        assert_eq!(vid.as_deref(), Some("04E8"));
        assert_eq!(pid.as_deref(), Some("6860"));
    }
}
