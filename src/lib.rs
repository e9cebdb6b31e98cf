//! Batch pipeline for hourly city weather observations.
//!
//! The pipeline runs as four independent, file-mediated stages:
//!
//! 1. [`extract`] fetches one raw JSON payload per registered [`Location`] into `data/raw/`.
//! 2. [`transform`] normalizes every raw payload into a per-file CSV and appends it to the
//!    cumulative dataset `data/processed/all_cities_hourly.csv`.
//! 3. [`load`] replaces a single SQLite table with the cumulative dataset.
//! 4. [`report`] renders per-city time-series charts for a recent window.
//!
//! Every stage takes an explicit [`PipelineConfig`]; stages never call each other in-process.

mod batch;
mod config;
mod error;
mod fetch;
mod load;
mod registry;
mod report;
mod transform;
mod utils;

pub use batch::BatchReport;
pub use config::{ConfigError, DateRange, PipelineConfig};
pub use error::EtlError;
pub use registry::{default_hourly_variables, default_locations, Location};

pub use fetch::error::TransportError;
pub use fetch::fetcher::{Fetcher, RawFile};
pub use fetch::{extract, extract_range};

pub use transform::error::{NormalizeError, ValidationError};
pub use transform::file_key::FileKey;
pub use transform::fill::{fill_gaps, fill_text_gaps};
pub use transform::normalizer::{
    normalize, normalize_observations, Normalized, NormalizedTable, Normalizer, ProcessedFile,
};
pub use transform::raw::{RawObservationSet, RawSeries};
pub use transform::{transform, TransformSummary};

pub use load::error::LoadError;
pub use load::loader::{load, LoadSummary};

pub use report::charts::{ChartFile, Metric};
pub use report::error::ReportError;
pub use report::frame::ObservationFrame;
pub use report::{report, report_at};
