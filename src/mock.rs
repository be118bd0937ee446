//! Scripted in-memory transport for tests. Enabled by the `mock` feature.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::transport::Transport;

/// Scripted in-memory transport.
///
/// Each chunk becomes available on a separate poll, the way bytes trickle in
/// from a real board.
pub struct MockTransport {
    chunks: VecDeque<Vec<u8>>,
    disconnect_when_drained: bool,
    fail_close: bool,
    fail_reads: Option<io::ErrorKind>,
    closed: Arc<AtomicBool>,
    on_drained: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl MockTransport {
    pub fn new<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        Self {
            chunks: chunks
                .into_iter()
                .map(Into::into)
                .filter(|chunk: &Vec<u8>| !chunk.is_empty())
                .collect(),
            disconnect_when_drained: false,
            fail_close: false,
            fail_reads: None,
            closed: Arc::new(AtomicBool::new(false)),
            on_drained: Mutex::new(None),
        }
    }

    /// Report the device as gone once every chunk has been read.
    pub fn disconnect_when_drained(mut self) -> Self {
        self.disconnect_when_drained = true;
        self
    }

    /// Make `close()` fail.
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Make every `read()` fail with `kind` while still reporting pending bytes.
    pub fn failing_reads(mut self, kind: io::ErrorKind) -> Self {
        self.fail_reads = Some(kind);
        self
    }

    /// Run `hook` once, the first time a poll finds nothing left to read.
    pub fn on_drained(self, hook: impl FnOnce() + Send + 'static) -> Self {
        if let Ok(mut slot) = self.on_drained.lock() {
            *slot = Some(Box::new(hook));
        }
        self
    }

    /// Flag that flips to true when `close()` is called, even if it fails.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(kind) = self.fail_reads {
            return Err(io::Error::new(kind, "read failed"));
        }
        let Some(front) = self.chunks.front_mut() else {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        };
        let n = front.len().min(buf.len());
        buf[..n].copy_from_slice(&front[..n]);
        front.drain(..n);
        if front.is_empty() {
            self.chunks.pop_front();
        }
        Ok(n)
    }
}

impl Transport for MockTransport {
    fn bytes_to_read(&self) -> serialport::Result<u32> {
        match self.chunks.front() {
            Some(chunk) => Ok(chunk.len() as u32),
            None => {
                if let Some(hook) = self.on_drained.lock().ok().and_then(|mut slot| slot.take()) {
                    hook();
                }
                if self.disconnect_when_drained {
                    return Err(serialport::Error::new(
                        serialport::ErrorKind::NoDevice,
                        "device disconnected",
                    ));
                }
                Ok(0)
            }
        }
    }

    fn close(&mut self) -> serialport::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(serialport::Error::new(
                serialport::ErrorKind::Io(io::ErrorKind::BrokenPipe),
                "close failed",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_serves_chunks_in_order() {
        let mut mock = MockTransport::new(["ab", "", "cde"]);
        let mut buf = [0u8; 8];

        assert_eq!(mock.bytes_to_read().unwrap(), 2);
        assert_eq!(mock.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ab");

        assert_eq!(mock.bytes_to_read().unwrap(), 3);
        assert_eq!(mock.read(&mut buf[..1]).unwrap(), 1);
        assert_eq!(mock.bytes_to_read().unwrap(), 2);
        assert_eq!(mock.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"de");

        assert_eq!(mock.bytes_to_read().unwrap(), 0);
    }

    #[test]
    fn mock_disconnects_after_script() {
        let mock = MockTransport::new(Vec::<Vec<u8>>::new()).disconnect_when_drained();
        let err = mock.bytes_to_read().unwrap_err();
        assert_eq!(err.kind(), serialport::ErrorKind::NoDevice);
    }

    #[test]
    fn drained_hook_runs_once() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let mock = MockTransport::new(["x"]).on_drained(move || flag.store(true, Ordering::SeqCst));

        mock.bytes_to_read().unwrap();
        assert!(!fired.load(Ordering::SeqCst));

        let mut mock = mock;
        let mut buf = [0u8; 4];
        mock.read(&mut buf).unwrap();
        mock.bytes_to_read().unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn failing_reads_keep_reporting_pending_bytes() {
        let mut mock = MockTransport::new(["DATA\n"]).failing_reads(io::ErrorKind::BrokenPipe);
        assert_eq!(mock.bytes_to_read().unwrap(), 5);
        let mut buf = [0u8; 8];
        assert_eq!(mock.read(&mut buf).unwrap_err().kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(mock.bytes_to_read().unwrap(), 5);
    }

    #[test]
    fn close_is_observable_even_when_it_fails() {
        let mut mock = MockTransport::new(["x"]).failing_close();
        let closed = mock.closed_flag();
        assert!(mock.close().is_err());
        assert!(closed.load(Ordering::SeqCst));
    }
}
