use std::io;
use thiserror::Error;

/// Fatal errors. Any of these ends the session.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("serial transport error: {0}")]
    Transport(#[from] serialport::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("export failed: {0}")]
    Export(#[from] csv::Error),
    #[error("no data was collected")]
    EmptySession,
}

impl AcquisitionError {
    /// True when the device itself failed (absent, busy, unplugged).
    pub fn is_transport(&self) -> bool {
        matches!(self, AcquisitionError::Transport(_))
    }
}

/// Why a line was not accepted as a data frame. Expected noise on a live link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("line does not start with the frame marker")]
    MissingMarker,
    #[error("frame has {found} fields, at least {required} required")]
    TooFewFields { found: usize, required: usize },
}

/// One channel's text could not be read as a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("conversion failed on A{channel}: {raw:?}")]
pub struct FieldError {
    pub channel: usize,
    pub raw: String,
}

pub type Result<T> = std::result::Result<T, AcquisitionError>;
