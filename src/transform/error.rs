use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Shape problems that make a raw payload unusable. A file failing validation is skipped,
/// not treated as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("no 'hourly' section in payload")]
    MissingHourly,

    #[error("no 'time' sequence in 'hourly'")]
    MissingTime,

    #[error("'time' sequence is empty")]
    EmptyTime,
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Failed to read raw file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse JSON in '{0}'")]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("Unparseable timestamp {value} at index {index}")]
    Timestamp { index: usize, value: String },

    #[error("Failed to build table for city '{city}'")]
    Frame {
        city: String,
        #[source]
        source: PolarsError,
    },

    #[error("Failed to create output directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing CSV file '{0}'")]
    WriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing CSV file '{0}'")]
    WriteCsv(PathBuf, #[source] PolarsError),

    #[error("Raw directory path is not valid UTF-8: '{0}'")]
    RawDirEncoding(PathBuf),

    #[error("Invalid raw file pattern '{0}'")]
    Pattern(String, #[source] glob::PatternError),
}
