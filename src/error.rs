use crate::config::ConfigError;
use crate::fetch::error::TransportError;
use crate::load::error::LoadError;
use crate::report::error::ReportError;
use crate::transform::error::NormalizeError;
use thiserror::Error;

/// Errors that stop a whole stage, as opposed to the per-item failures collected in a
/// [`BatchReport`](crate::BatchReport).
#[derive(Debug, Error)]
pub enum EtlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Report(#[from] ReportError),
}
