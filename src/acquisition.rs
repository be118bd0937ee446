//! The collection loop: connect, poll, drain, close.
//!
//! # Timing
//!
//! The board streams one `DATA` line per reading at its own pace. The loop never
//! blocks on the device; it polls for pending bytes, handles at most one line,
//! checks the stop token and then sleeps for [`AcquisitionConfig::poll_interval`].
//! A stop request is therefore honoured within one iteration.
//!
//! Samples are timestamped on the host when classified. Any delay in the serial
//! link shows up directly in the timestamps.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use chrono::Local;
use log::{debug, info, trace, warn};
use serialport::SerialPort;

use crate::errors::Result;
use crate::frame;
use crate::reader::LineReader;
use crate::sample::{self, DEFAULT_FAULT_THRESHOLD};
use crate::session::{Session, SessionAccumulator, DEFAULT_PROGRESS_EVERY};
use crate::stop::StopToken;
use crate::transport::{self, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Baud rate the board firmware opens its serial port with.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Time the board needs after the port opens (opening resets most boards).
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Sleep between polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Read timeout handed to the serial driver.
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Port used when the operator does not name one.
#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM5";
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Readings strictly below this many volts are faults.
    pub fault_threshold: f64,
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    pub read_timeout: Duration,
    /// Appends between progress messages; zero disables them.
    pub progress_every: usize,
    /// Directory the session table is written to.
    pub output_dir: PathBuf,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            fault_threshold: DEFAULT_FAULT_THRESHOLD,
            settle_delay: SETTLE_DELAY,
            poll_interval: POLL_INTERVAL,
            read_timeout: READ_TIMEOUT,
            progress_every: DEFAULT_PROGRESS_EVERY,
            output_dir: PathBuf::from("."),
        }
    }
}

// ============================================================================
// Acquisition
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Connecting,
    Polling,
    Draining,
    Closed,
}

/// Drives one session over a [`Transport`].
///
/// # Example
/// ```ignore
/// let (handle, mut token) = stop_signal();
/// spawn_watcher(BufReader::new(io::stdin()), handle)?;
///
/// let acquisition = Acquisition::connect(AcquisitionConfig::default())?;
/// let session = acquisition.run(&mut token)?;
/// println!("{}", session.summary());
/// ```
pub struct Acquisition<T: Transport> {
    reader: LineReader<T>,
    config: AcquisitionConfig,
    state: AcquisitionState,
}

impl Acquisition<Box<dyn SerialPort>> {
    /// Open the configured serial port.
    pub fn connect(config: AcquisitionConfig) -> Result<Self> {
        debug!("connecting: port={}", config.port);
        let port = transport::open_serial(&config).inspect_err(|e| {
            warn!("connection failed: port={}, error={}", config.port, e);
        })?;
        Ok(Self::new(port, config))
    }
}

impl<T: Transport> Acquisition<T> {
    /// Wrap an already-open transport.
    pub fn new(transport: T, config: AcquisitionConfig) -> Self {
        Self {
            reader: LineReader::new(transport),
            config,
            state: AcquisitionState::Connecting,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Collect until `stop` is signaled, then close the device and return the
    /// sealed session.
    ///
    /// Lines that are not data frames and fields that are not numbers are logged
    /// and skipped. A transport failure ends the session: the device is still
    /// closed, the partial session is discarded and the error is returned.
    pub fn run(mut self, stop: &mut StopToken) -> Result<Session> {
        if !self.config.settle_delay.is_zero() {
            debug!("waiting {:?} for the board to boot", self.config.settle_delay);
            thread::sleep(self.config.settle_delay);
        }

        let mut session = SessionAccumulator::new(Local::now())
            .with_progress_every(self.config.progress_every);
        self.transition(AcquisitionState::Polling);
        info!("starting data collection");

        let outcome = self.poll_until_stopped(&mut session, stop);

        self.transition(AcquisitionState::Draining);
        self.reader.close();
        self.transition(AcquisitionState::Closed);

        match outcome {
            Ok(()) => {
                info!("collection stopped: {} data points", session.len());
                Ok(session.seal())
            }
            Err(e) => {
                warn!(
                    "session aborted, discarding {} data points: {}",
                    session.len(),
                    e
                );
                Err(e)
            }
        }
    }

    fn poll_until_stopped(
        &mut self,
        session: &mut SessionAccumulator,
        stop: &mut StopToken,
    ) -> Result<()> {
        loop {
            if let Some(line) = self.reader.try_read_line()? {
                self.handle_line(&line, session);
            }
            if stop.is_signaled() {
                return Ok(());
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    fn handle_line(&self, line: &str, session: &mut SessionAccumulator) {
        debug!("received: {line}");

        let record = match frame::parse(line) {
            Ok(record) => record,
            Err(e) => {
                trace!("skipping line: {e}");
                return;
            }
        };
        trace!("fields: {:?}", record.channels());

        let threshold = self.config.fault_threshold;
        let sample = sample::classify(record.channels(), threshold, Local::now());
        if sample.fault {
            for (channel, value) in sample.faulty_channels(threshold) {
                warn!("fault on A{channel}: {value}V < {threshold}V");
            }
        }
        session.append(sample);
    }

    fn transition(&mut self, next: AcquisitionState) {
        debug!("acquisition state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AcquisitionError;
    use crate::mock::MockTransport;
    use crate::stop::stop_signal;
    use std::io::ErrorKind;
    use std::sync::atomic::Ordering;

    fn fast_config() -> AcquisitionConfig {
        AcquisitionConfig {
            settle_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(1),
            ..AcquisitionConfig::default()
        }
    }

    #[test]
    fn default_config_matches_board_firmware() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.fault_threshold, 0.2);
        assert_eq!(config.settle_delay, Duration::from_secs(2));
        assert_eq!(config.progress_every, 10);
    }

    #[test]
    fn new_acquisition_is_connecting() {
        let acquisition = Acquisition::new(MockTransport::new(["x"]), fast_config());
        assert_eq!(acquisition.state(), AcquisitionState::Connecting);
        assert_eq!(acquisition.config().baud_rate, DEFAULT_BAUD_RATE);
    }

    #[test]
    fn collects_frames_and_skips_noise() {
        let (handle, mut token) = stop_signal();
        let transport = MockTransport::new([
            "booting...\r\n",
            "DATA,1,0.15,0.9,1,1,1\r\n",
            "JUNK,1,2,3\r\n",
            "DATA,abc,1,1,1,1,1\r\n",
            "DATA,1,2\r\n",
        ])
        .on_drained(move || handle.signal());
        let closed = transport.closed_flag();

        let session = Acquisition::new(transport, fast_config())
            .run(&mut token)
            .unwrap();

        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(session.len(), 2);
        let first = &session.samples()[0];
        assert_eq!(
            first.readings,
            [Some(1.0), Some(0.15), Some(0.9), Some(1.0), Some(1.0), Some(1.0)]
        );
        assert!(first.fault);
        let second = &session.samples()[1];
        assert_eq!(second.readings[0], None);
        assert!(!second.fault);
    }

    #[test]
    fn stop_before_any_data_yields_empty_session() {
        let (handle, mut token) = stop_signal();
        handle.signal();
        let session = Acquisition::new(MockTransport::new(Vec::<Vec<u8>>::new()), fast_config())
            .run(&mut token)
            .unwrap();
        assert!(session.is_empty());
    }

    #[test]
    fn transport_failure_aborts_after_closing() {
        let (_handle, mut token) = stop_signal();
        let transport = MockTransport::new(["DATA,1,1,1,1,1,1\n"]).disconnect_when_drained();
        let closed = transport.closed_flag();

        let err = Acquisition::new(transport, fast_config())
            .run(&mut token)
            .unwrap_err();

        assert!(matches!(err, AcquisitionError::Transport(_)));
        assert!(err.is_transport());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn failed_read_mid_session_is_a_transport_error() {
        let (_handle, mut token) = stop_signal();
        let transport =
            MockTransport::new(["DATA,1,1,1,1,1,1\n"]).failing_reads(ErrorKind::BrokenPipe);
        let closed = transport.closed_flag();

        let err = Acquisition::new(transport, fast_config())
            .run(&mut token)
            .unwrap_err();

        assert!(err.is_transport());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn signaled_stop_drains_within_one_iteration() {
        let (handle, mut token) = stop_signal();
        handle.signal();
        let transport = MockTransport::new([
            "DATA,1,1,1,1,1,1\nDATA,2,2,2,2,2,2\nDATA,3,3,3,3,3,3\n",
        ]);

        let session = Acquisition::new(transport, fast_config())
            .run(&mut token)
            .unwrap();

        assert!(session.len() <= 1, "collected {} samples", session.len());
    }

    #[test]
    fn close_failure_keeps_collected_data() {
        let (handle, mut token) = stop_signal();
        let transport = MockTransport::new(["DATA,1,1,1,1,1,1\n"])
            .failing_close()
            .on_drained(move || handle.signal());

        let session = Acquisition::new(transport, fast_config())
            .run(&mut token)
            .unwrap();
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn uses_configured_threshold() {
        let (handle, mut token) = stop_signal();
        let transport =
            MockTransport::new(["DATA,1,1,1,1,1,0.5\n"]).on_drained(move || handle.signal());
        let config = AcquisitionConfig {
            fault_threshold: 0.6,
            ..fast_config()
        };

        let session = Acquisition::new(transport, config).run(&mut token).unwrap();
        assert!(session.samples()[0].fault);
    }
}
