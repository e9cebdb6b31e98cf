pub mod error;
pub mod file_key;
pub mod fill;
pub mod normalizer;
pub mod raw;

use crate::batch::BatchReport;
use crate::config::PipelineConfig;
use crate::error::EtlError;
use crate::utils::ensure_dir_exists;
use error::NormalizeError;
use log::info;
use normalizer::{Normalized, Normalizer, ProcessedFile};
use std::path::PathBuf;

#[derive(Debug)]
pub struct TransformSummary {
    pub report: BatchReport<ProcessedFile, NormalizeError>,
    pub cumulative_path: PathBuf,
}

/// Normalizes every `*.json` file in the raw directory, in file name order.
///
/// A file that fails validation is recorded as skipped, any other per-file error as failed;
/// neither stops the batch.
pub fn transform(config: &PipelineConfig) -> Result<TransformSummary, EtlError> {
    let raw_dir = config.raw_dir();
    let processed_dir = config.processed_dir();
    ensure_dir_exists(&processed_dir)
        .map_err(|e| NormalizeError::DirCreation(processed_dir.clone(), e))?;

    let raw_dir_str = raw_dir
        .to_str()
        .ok_or_else(|| NormalizeError::RawDirEncoding(raw_dir.clone()))?;
    let pattern = format!("{}/*.json", glob::Pattern::escape(raw_dir_str));
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| NormalizeError::Pattern(pattern.clone(), e))?
        .filter_map(Result::ok)
        .collect();
    paths.sort();
    info!("Found {} raw files in {}", paths.len(), raw_dir.display());

    let normalizer = Normalizer::new(config);
    let mut report = BatchReport::new();
    for path in paths {
        let id = path.display().to_string();
        match normalizer.normalize(&path) {
            Ok(Normalized::Processed(file)) => report.record(id, Ok(file)),
            Ok(Normalized::Skipped { reason, .. }) => report.skip(id, reason),
            Err(e) => report.record(id, Err(e)),
        }
    }

    info!(
        "Transform finished: {} processed, {} skipped, {} failed",
        report.succeeded.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(TransformSummary {
        report,
        cumulative_path: config.cumulative_path(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::error::Error;

    #[test]
    fn test_transform_batch_continues_past_bad_files() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        let config = PipelineConfig::builder().data_dir(tmp.path()).build();
        let raw_dir = config.raw_dir();
        std::fs::create_dir_all(&raw_dir)?;

        let good = json!({
            "hourly": {
                "time": ["2025-08-27T00:00", "2025-08-27T01:00"],
                "temperature_2m": [30.0, 31.0]
            }
        });
        std::fs::write(
            raw_dir.join("Karachi_2025-08-27_2025-08-28.json"),
            serde_json::to_vec(&good)?,
        )?;
        std::fs::write(
            raw_dir.join("Lahore_2025-08-27_2025-08-28.json"),
            serde_json::to_vec(&json!({"daily": {}}))?,
        )?;
        std::fs::write(raw_dir.join("Multan_2025-08-27_2025-08-28.json"), b"not json")?;
        std::fs::write(raw_dir.join("notes.txt"), b"ignored")?;

        let summary = transform(&config)?;
        assert_eq!(summary.report.succeeded.len(), 1);
        assert_eq!(summary.report.succeeded[0].city, "Karachi");
        assert_eq!(summary.report.skipped.len(), 1);
        assert!(summary.report.skipped[0].0.contains("Lahore"));
        assert_eq!(summary.report.failed.len(), 1);
        assert!(matches!(summary.report.failed[0].1, NormalizeError::Json(..)));
        assert_eq!(summary.report.total(), 3);

        let cumulative = std::fs::read_to_string(&summary.cumulative_path)?;
        assert_eq!(cumulative.lines().count(), 3);
        Ok(())
    }

    #[test]
    fn test_transform_empty_raw_dir() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        let config = PipelineConfig::builder().data_dir(tmp.path()).build();

        let summary = transform(&config)?;
        assert_eq!(summary.report.total(), 0);
        assert!(config.processed_dir().is_dir());
        assert!(!summary.cumulative_path.exists());
        Ok(())
    }
}
