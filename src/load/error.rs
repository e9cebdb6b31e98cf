use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cumulative dataset not found at '{0}'")]
    MissingInput(PathBuf),

    #[error("Failed to read cumulative dataset '{0}'")]
    Csv(PathBuf, #[source] PolarsError),

    #[error("Failed to read column '{column}' of the cumulative dataset")]
    Column {
        column: String,
        #[source]
        source: PolarsError,
    },

    #[error("Failed to create database directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("SQLite error while replacing table '{table}' in '{path}'")]
    Sqlite {
        path: PathBuf,
        table: String,
        #[source]
        source: rusqlite::Error,
    },
}
