//! Line framing over a polled byte transport.

use std::io::{ErrorKind, Read};

use log::{debug, warn};

use crate::errors::{AcquisitionError, Result};
use crate::transport::Transport;

/// Largest single read from the device.
const READ_CHUNK: usize = 1024;

/// Unterminated input beyond this is handed out as a line of its own.
const MAX_PENDING: usize = 4096;

/// Assembles newline-terminated text lines from a [`Transport`].
pub struct LineReader<T: Transport> {
    transport: T,
    pending: Vec<u8>,
    chunk: Box<[u8; READ_CHUNK]>,
}

impl<T: Transport> LineReader<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            pending: Vec::with_capacity(256),
            chunk: Box::new([0u8; READ_CHUNK]),
        }
    }

    /// Return the next complete line, or `None` when nothing is ready yet.
    ///
    /// Never blocks waiting for data: the device is only read when it reports
    /// pending bytes. Bytes without a terminator stay buffered for the next poll.
    /// Transport failures are returned as errors and end the session.
    pub fn try_read_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }

        let available = self.transport.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(None);
        }

        let want = available.min(READ_CHUNK);
        match self.transport.read(&mut self.chunk[..want]) {
            Ok(0) => return Ok(None),
            Ok(n) => self.pending.extend_from_slice(&self.chunk[..n]),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                return Ok(None)
            }
            // The device reported data and then failed to deliver it (unplug, EIO).
            Err(e) => return Err(AcquisitionError::Transport(serialport::Error::from(e))),
        }

        Ok(self.take_line())
    }

    /// Close the underlying device. Failures are logged and swallowed.
    pub fn close(&mut self) {
        if let Err(e) = self.transport.close() {
            warn!("ignoring error while closing transport: {e}");
        } else {
            debug!("transport closed");
        }
    }

    /// Bytes received but not yet terminated.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn take_line(&mut self) -> Option<String> {
        let end = match self.pending.iter().position(|&b| b == b'\n') {
            Some(pos) => pos + 1,
            None if self.pending.len() >= MAX_PENDING => {
                warn!(
                    "no line terminator in {} bytes, flushing as one line",
                    self.pending.len()
                );
                self.pending.len()
            }
            None => return None,
        };
        let raw: Vec<u8> = self.pending.drain(..end).collect();
        Some(decode_line(&raw))
    }
}

/// Decode one raw line as UTF-8, falling back to Latin-1, and strip surrounding
/// whitespace and terminators. Always produces a string.
pub fn decode_line(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.trim().to_owned(),
        Err(_) => raw
            .iter()
            .map(|&b| char::from(b))
            .collect::<String>()
            .trim()
            .to_owned(),
    }
}
