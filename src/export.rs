//! Writes a sealed session to a CSV table.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, SecondsFormat};
use log::info;
use serde::Serialize;

use crate::errors::{AcquisitionError, Result};
use crate::sample::Sample;
use crate::session::{FaultSummary, Session};

/// What a successful export produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub summary: FaultSummary,
}

#[derive(Serialize)]
struct Row {
    timestamp: String,
    #[serde(rename = "A0")]
    a0: Option<f64>,
    #[serde(rename = "A1")]
    a1: Option<f64>,
    #[serde(rename = "A2")]
    a2: Option<f64>,
    #[serde(rename = "A3")]
    a3: Option<f64>,
    #[serde(rename = "A4")]
    a4: Option<f64>,
    #[serde(rename = "A5")]
    a5: Option<f64>,
    fault: u8,
}

impl From<&Sample> for Row {
    fn from(sample: &Sample) -> Self {
        let [a0, a1, a2, a3, a4, a5] = sample.readings;
        Row {
            timestamp: sample
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, false),
            a0,
            a1,
            a2,
            a3,
            a4,
            a5,
            fault: u8::from(sample.fault),
        }
    }
}

/// File name for a session started at `started_at`.
pub fn session_file_name(started_at: DateTime<Local>) -> String {
    format!("arduino_data_{}.csv", started_at.format("%Y%m%d_%H%M%S"))
}

/// Write the session as CSV rows (header first) to `writer`.
pub fn write_session<W: Write>(session: &Session, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for sample in session.samples() {
        csv.serialize(Row::from(sample))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write `session` into `dir` under [`session_file_name`].
///
/// An empty session produces no file and returns [`AcquisitionError::EmptySession`].
pub fn export_session(session: &Session, dir: &Path) -> Result<ExportReport> {
    if session.is_empty() {
        return Err(AcquisitionError::EmptySession);
    }

    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    let path = dir.join(session_file_name(session.started_at()));
    let file = File::create(&path)?;
    write_session(session, file)?;

    let summary = session.summary();
    info!(
        "saved {} rows to {} ({} faulty)",
        summary.total,
        path.display(),
        summary.faulty
    );
    Ok(ExportReport { path, summary })
}
