use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("No data source: neither the store '{database}' nor the cumulative dataset '{csv}' exists")]
    DataSourceMissing { database: PathBuf, csv: PathBuf },

    #[error("Failed to read table '{table}' from store '{path}'")]
    Store {
        path: PathBuf,
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to read cumulative dataset '{0}'")]
    Csv(PathBuf, #[source] PolarsError),

    #[error("Report window of {days} days reaches past the earliest representable time")]
    InvalidWindow { days: u32 },

    #[error("Failed processing observation frame")]
    Frame(#[from] PolarsError),

    #[error("Required column '{0}' not found in the observations")]
    MissingColumn(String),

    #[error("Failed to create reports directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to render chart '{path}': {message}")]
    Render { path: PathBuf, message: String },
}
