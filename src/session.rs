//! Append-only sample storage for one collection run.
//!
//! A [`SessionAccumulator`] is owned by the acquisition loop while it runs.
//! [`SessionAccumulator::seal`] consumes it and yields a read-only [`Session`],
//! so nothing can be appended once collection has ended:
//!
//! ```compile_fail
//! use voltlog::{Sample, SessionAccumulator};
//!
//! let mut session = SessionAccumulator::new(chrono::Local::now()).seal();
//! let sample: Sample = unimplemented!();
//! session.append(sample);
//! ```

use std::fmt;

use chrono::{DateTime, Local};
use log::info;

use crate::sample::Sample;

/// Appends between progress messages.
pub const DEFAULT_PROGRESS_EVERY: usize = 10;

/// Growing, ordered table of samples.
#[derive(Debug)]
pub struct SessionAccumulator {
    started_at: DateTime<Local>,
    samples: Vec<Sample>,
    progress_every: usize,
}

impl SessionAccumulator {
    pub fn new(started_at: DateTime<Local>) -> Self {
        Self {
            started_at,
            samples: Vec::new(),
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }

    /// Report progress every `n` appends. Zero disables reporting.
    pub fn with_progress_every(mut self, n: usize) -> Self {
        self.progress_every = n;
        self
    }

    /// Store `sample` after all earlier ones and return the new count.
    pub fn append(&mut self, sample: Sample) -> usize {
        self.samples.push(sample);
        let count = self.samples.len();
        if self.progress_due() {
            info!("collected {count} data points so far");
        }
        count
    }

    /// True when the latest append landed on a progress boundary.
    pub fn progress_due(&self) -> bool {
        let count = self.samples.len();
        self.progress_every > 0 && count > 0 && count % self.progress_every == 0
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// End collection.
    pub fn seal(self) -> Session {
        Session {
            started_at: self.started_at,
            samples: self.samples,
        }
    }
}

/// A finished collection run, in arrival order.
#[derive(Debug, Clone)]
pub struct Session {
    started_at: DateTime<Local>,
    samples: Vec<Sample>,
}

impl Session {
    /// When collection began. Export file names derive from it.
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn summary(&self) -> FaultSummary {
        FaultSummary {
            total: self.samples.len(),
            faulty: self.samples.iter().filter(|s| s.fault).count(),
        }
    }
}

/// Count of faulty readings over a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultSummary {
    pub total: usize,
    pub faulty: usize,
}

impl FaultSummary {
    /// Percentage of faulty readings; 0 for an empty session.
    pub fn rate_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.faulty as f64 / self.total as f64 * 100.0
    }
}

impl fmt::Display for FaultSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fault summary:")?;
        writeln!(f, "- Total readings: {}", self.total)?;
        write!(
            f,
            "- Readings with faults: {} ({:.1}%)",
            self.faulty,
            self.rate_percent()
        )
    }
}
