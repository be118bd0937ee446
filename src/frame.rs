//! Recognition of `DATA,<v1>,...,<v6>` records.

use crate::errors::FrameError;

/// Prefix every data record starts with.
pub const FRAME_MARKER: &str = "DATA";

/// Field separator inside a record.
pub const FIELD_DELIMITER: char = ',';

/// Analog channels per record (A0..A5).
pub const CHANNELS: usize = 6;

/// Marker field plus one field per channel.
pub const MIN_FIELDS: usize = CHANNELS + 1;

/// The six channel fields of a recognised record, still as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRecord<'a> {
    channels: [&'a str; CHANNELS],
}

impl<'a> DataRecord<'a> {
    pub fn channels(&self) -> &[&'a str; CHANNELS] {
        &self.channels
    }
}

/// Split a line into a [`DataRecord`].
///
/// Purely syntactic: the line must start with [`FRAME_MARKER`] and split into at
/// least [`MIN_FIELDS`] fields. Fields past the sixth channel are ignored.
pub fn parse(line: &str) -> Result<DataRecord<'_>, FrameError> {
    if !line.starts_with(FRAME_MARKER) {
        return Err(FrameError::MissingMarker);
    }

    let mut fields = line.split(FIELD_DELIMITER).skip(1);
    let mut channels = [""; CHANNELS];
    for (found, slot) in channels.iter_mut().enumerate() {
        *slot = fields.next().ok_or(FrameError::TooFewFields {
            found: found + 1,
            required: MIN_FIELDS,
        })?;
    }

    Ok(DataRecord { channels })
}
