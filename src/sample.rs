//! Timestamped readings and fault classification.

use chrono::{DateTime, Local};
use log::warn;

use crate::errors::FieldError;
use crate::frame::CHANNELS;

/// Default minimum acceptable voltage. Must match the threshold on the board.
pub const DEFAULT_FAULT_THRESHOLD: f64 = 0.2;

/// One classified record.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Host wall-clock time at classification. The board sends no clock.
    pub timestamp: DateTime<Local>,
    /// Voltage per channel, `None` when the field was not numeric.
    pub readings: [Option<f64>; CHANNELS],
    /// True iff at least one present reading is below the threshold.
    pub fault: bool,
}

impl Sample {
    /// Channels whose present reading is strictly below `threshold`.
    pub fn faulty_channels(&self, threshold: f64) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.readings
            .iter()
            .enumerate()
            .filter_map(move |(channel, reading)| match reading {
                Some(value) if *value < threshold => Some((channel, *value)),
                _ => None,
            })
    }

    /// Number of channels that failed conversion.
    pub fn missing(&self) -> usize {
        self.readings.iter().filter(|r| r.is_none()).count()
    }
}

/// Convert one channel field to volts.
pub fn parse_reading(channel: usize, raw: &str) -> Result<f64, FieldError> {
    raw.trim().parse::<f64>().map_err(|_| FieldError {
        channel,
        raw: raw.to_owned(),
    })
}

/// Build a [`Sample`] from six channel fields.
///
/// Never fails: a field that is not a number is stored as missing and logged,
/// and missing channels never count towards the fault flag.
pub fn classify(fields: &[&str; CHANNELS], threshold: f64, now: DateTime<Local>) -> Sample {
    let mut readings = [None; CHANNELS];
    for (channel, raw) in fields.iter().enumerate() {
        match parse_reading(channel, raw) {
            Ok(value) => readings[channel] = Some(value),
            Err(e) => warn!("{e}"),
        }
    }

    let fault = readings.iter().flatten().any(|value| *value < threshold);

    Sample {
        timestamp: now,
        readings,
        fault,
    }
}
