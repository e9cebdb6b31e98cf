pub mod error;
pub mod fetcher;

use crate::batch::BatchReport;
use crate::config::{ConfigError, DateRange, PipelineConfig};
use crate::error::EtlError;
use error::TransportError;
use fetcher::{Fetcher, RawFile};
use log::info;

/// Extract stage: fetch every configured location for the configured (or rolling) date range.
///
/// A failure for one location is logged and recorded in the returned report; the remaining
/// locations are still fetched.
pub async fn extract(
    config: &PipelineConfig,
) -> Result<BatchReport<RawFile, TransportError>, EtlError> {
    let today = chrono::Local::now().date_naive();
    let range = config.resolve_date_range(today)?;
    extract_range(config, range).await
}

pub async fn extract_range(
    config: &PipelineConfig,
    range: DateRange,
) -> Result<BatchReport<RawFile, TransportError>, EtlError> {
    if config.locations.is_empty() {
        return Err(ConfigError::NoLocations.into());
    }
    let fetcher = Fetcher::new(config)?;

    info!(
        "Fetching weather data from {} to {} for {} locations.",
        range.start,
        range.end,
        config.locations.len()
    );
    let mut report = BatchReport::new();
    for location in &config.locations {
        let result = fetcher.fetch(location, &range).await;
        report.record(location.name.as_str(), result);
    }
    info!(
        "Extract finished: {} saved, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    Ok(report)
}
