//! Serial voltage logger for six-channel analog boards.
//!
//! A microcontroller streams lines of the form `DATA,<v1>,...,<v6>` over a serial
//! port. This crate polls the port, turns each line into a timestamped
//! [`Sample`] flagged as faulty when any channel drops below a threshold, and
//! writes the collected [`Session`] to a CSV table once the operator stops it.
//!
//! # Flow
//!
//! 1. [`Acquisition::connect`] opens the port and waits for the board to boot.
//! 2. [`Acquisition::run`] polls until the [`StopToken`] is signaled.
//! 3. [`export_session`] writes the sealed session and returns a fault summary.
//!
//! Malformed lines and non-numeric fields are expected on a live link and are
//! only logged. Only transport failures end a session early.

pub mod acquisition;
pub mod errors;
pub mod export;
pub mod frame;
pub mod logging;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod reader;
pub mod sample;
pub mod session;
pub mod stop;
pub mod transport;

pub use acquisition::{Acquisition, AcquisitionConfig, AcquisitionState};
pub use errors::*;
pub use export::{export_session, session_file_name, write_session, ExportReport};
pub use frame::{DataRecord, CHANNELS};
pub use reader::LineReader;
pub use sample::{classify, Sample};
pub use session::{FaultSummary, Session, SessionAccumulator};
pub use stop::{spawn_watcher, stop_signal, StopHandle, StopToken};
pub use transport::Transport;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;
