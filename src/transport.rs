//! Byte transports the acquisition loop can poll.
//!
//! The loop only needs three things from a device: how many bytes are waiting,
//! a way to read them, and a best-effort close. Real boards are reached through
//! [`serialport`]. Tests use the scripted transport in [`crate::mock`], built
//! with the `mock` feature.

use std::io::Read;

use log::info;
use serialport::{ClearBuffer, SerialPort};

use crate::acquisition::AcquisitionConfig;
use crate::errors::Result;

/// A readable device that can report pending input without blocking.
pub trait Transport: Read + Send {
    /// Number of bytes ready to be read right now.
    fn bytes_to_read(&self) -> serialport::Result<u32>;

    /// Release the device. Callers treat failures as non-fatal.
    fn close(&mut self) -> serialport::Result<()> {
        Ok(())
    }
}

impl Transport for Box<dyn SerialPort> {
    fn bytes_to_read(&self) -> serialport::Result<u32> {
        (**self).bytes_to_read()
    }

    fn close(&mut self) -> serialport::Result<()> {
        // The handle itself is released on drop; discard whatever is still queued.
        self.clear(ClearBuffer::All)
    }
}

/// Open the configured serial port.
pub fn open_serial(config: &AcquisitionConfig) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(&config.port, config.baud_rate)
        .timeout(config.read_timeout)
        .open()?;
    info!(
        "serial port open: port={}, baud={}",
        config.port, config.baud_rate
    );
    Ok(port)
}
