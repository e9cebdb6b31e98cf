use crate::config::PipelineConfig;
use crate::transform::error::{NormalizeError, ValidationError};
use crate::transform::file_key::FileKey;
use crate::transform::fill::{fill_gaps, fill_text_gaps};
use crate::transform::raw::{RawObservationSet, RawSeries};
use crate::utils::{ensure_dir_exists, TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use polars::prelude::*;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub(crate) const COL_TIME: &str = "time";
pub(crate) const COL_CITY: &str = "city";
pub(crate) const COL_LATITUDE: &str = "latitude";
pub(crate) const COL_LONGITUDE: &str = "longitude";

/// Result of normalizing one raw file that produced output.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFile {
    pub source: PathBuf,
    pub output: PathBuf,
    pub city: String,
    pub rows_before_cleaning: usize,
    pub rows: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Processed(ProcessedFile),
    /// The payload failed validation; nothing was written.
    Skipped {
        source: PathBuf,
        reason: ValidationError,
    },
}

/// A cleaned table for one raw payload.
pub struct NormalizedTable {
    pub frame: DataFrame,
    pub rows_before_cleaning: usize,
    pub measurement_columns: Vec<String>,
}

/// Builds the cleaned table for one payload:
///
/// 1. one row per timestamp, with the selected measurement columns attached positionally;
/// 2. rows where every measurement is null are dropped;
/// 3. remaining gaps are filled (linear for numeric columns, forward/backward fill otherwise);
/// 4. columns are ordered `time, city, [latitude], [longitude], <measurements>`.
pub fn normalize_observations(
    raw: &RawObservationSet,
    city: &str,
) -> Result<NormalizedTable, NormalizeError> {
    let frame_err = |source: PolarsError| NormalizeError::Frame {
        city: city.to_string(),
        source,
    };
    let measurements: Vec<(&str, &RawSeries)> = raw
        .selected_columns()
        .into_iter()
        .filter_map(|name| raw.series(name).map(|series| (name, series)))
        .collect();

    let height = raw.timestamps.len();
    let mut columns: Vec<Column> = Vec::with_capacity(4 + measurements.len());
    columns.push(Series::new(COL_TIME.into(), &raw.timestamps).into());
    columns.push(Series::new(COL_CITY.into(), vec![city; height]).into());
    if let Some(latitude) = raw.latitude {
        columns.push(Series::new(COL_LATITUDE.into(), vec![latitude; height]).into());
    }
    if let Some(longitude) = raw.longitude {
        columns.push(Series::new(COL_LONGITUDE.into(), vec![longitude; height]).into());
    }
    for (name, series) in &measurements {
        columns.push(measurement_column(name, series));
    }
    let mut lazy = DataFrame::new(columns).map_err(frame_err)?.lazy();

    if !measurements.is_empty() {
        let observed: Vec<Expr> = measurements
            .iter()
            .map(|(name, _)| col(*name).is_not_null())
            .collect();
        lazy = lazy.filter(any_horizontal(observed).map_err(frame_err)?);
    }

    // Integer columns never hold nulls.
    let fills: Vec<Expr> = measurements
        .iter()
        .filter_map(|(name, series)| match series {
            RawSeries::Integer(_) => None,
            RawSeries::Float(_) => Some(fill_gaps(name)),
            RawSeries::Text(_) => Some(fill_text_gaps(name)),
        })
        .collect();
    if !fills.is_empty() {
        lazy = lazy.with_columns(fills);
    }

    let frame = lazy.collect().map_err(frame_err)?;
    let dropped = height - frame.height();
    if dropped > 0 {
        debug!("Dropped {} rows without any measurement for {}", dropped, city);
    }

    Ok(NormalizedTable {
        frame,
        rows_before_cleaning: height,
        measurement_columns: measurements.iter().map(|(n, _)| n.to_string()).collect(),
    })
}

fn measurement_column(name: &str, series: &RawSeries) -> Column {
    let series = match series {
        RawSeries::Integer(values) => Series::new(name.into(), values),
        RawSeries::Float(values) => Series::new(name.into(), values),
        RawSeries::Text(values) => Series::new(name.into(), values),
    };
    series.into()
}

/// Reads raw payload files and writes their normalized per-file and cumulative CSV output.
pub struct Normalizer {
    hourly_variables: Vec<String>,
    processed_dir: PathBuf,
    cumulative_path: PathBuf,
}

impl Normalizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            hourly_variables: config.hourly_variables.clone(),
            processed_dir: config.processed_dir(),
            cumulative_path: config.cumulative_path(),
        }
    }

    pub fn normalize(&self, raw_path: &Path) -> Result<Normalized, NormalizeError> {
        self.normalize_at(raw_path, chrono::Local::now().naive_local())
    }

    pub(crate) fn normalize_at(
        &self,
        raw_path: &Path,
        now: NaiveDateTime,
    ) -> Result<Normalized, NormalizeError> {
        info!("Processing: {}", raw_path.display());
        let key = FileKey::from_path(raw_path);

        let bytes =
            std::fs::read(raw_path).map_err(|e| NormalizeError::Read(raw_path.to_path_buf(), e))?;
        let payload: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| NormalizeError::Json(raw_path.to_path_buf(), e))?;

        let raw = match RawObservationSet::from_payload(&key.city, &self.hourly_variables, &payload)
        {
            Ok(raw) => raw,
            Err(NormalizeError::Invalid(reason)) => {
                warn!("Skipped ({}): {}", reason, raw_path.display());
                return Ok(Normalized::Skipped {
                    source: raw_path.to_path_buf(),
                    reason,
                });
            }
            Err(e) => return Err(e),
        };

        let mut table = normalize_observations(&raw, &key.city)?;

        ensure_dir_exists(&self.processed_dir)
            .map_err(|e| NormalizeError::DirCreation(self.processed_dir.clone(), e))?;
        let output = self.processed_dir.join(key.output_file_name(now));
        write_csv(&mut table.frame, &output, false)?;
        info!("Saved processed CSV: {}", output.display());

        // Never deduplicated: normalizing the same raw file twice appends its rows twice.
        let append = self.cumulative_path.exists();
        write_csv(&mut table.frame, &self.cumulative_path, append)?;
        if append {
            info!("Appended to cumulative CSV: {}", self.cumulative_path.display());
        } else {
            info!("Created cumulative CSV: {}", self.cumulative_path.display());
        }

        Ok(Normalized::Processed(ProcessedFile {
            source: raw_path.to_path_buf(),
            output,
            city: key.city,
            rows_before_cleaning: table.rows_before_cleaning,
            rows: table.frame.height(),
            columns: table
                .frame
                .get_column_names()
                .into_iter()
                .map(|c| c.to_string())
                .collect(),
        }))
    }
}

/// Normalizes one raw file with the settings in `config`.
pub fn normalize(raw_path: &Path, config: &PipelineConfig) -> Result<Normalized, NormalizeError> {
    Normalizer::new(config).normalize(raw_path)
}

/// Writes `frame` as CSV; in append mode the header is not repeated.
fn write_csv(frame: &mut DataFrame, path: &Path, append: bool) -> Result<(), NormalizeError> {
    let file = if append {
        OpenOptions::new().append(true).open(path)
    } else {
        File::create(path)
    }
    .map_err(|e| NormalizeError::WriteIo(path.to_path_buf(), e))?;

    let mut writer = BufWriter::new(file);
    CsvWriter::new(&mut writer)
        .include_header(!append)
        .with_datetime_format(Some(TIMESTAMP_FORMAT.to_string()))
        .finish(frame)
        .map_err(|e| NormalizeError::WriteCsv(path.to_path_buf(), e))?;
    writer
        .flush()
        .map_err(|e| NormalizeError::WriteIo(path.to_path_buf(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use std::error::Error;

    const FULL_HEADER: &str =
        "time,city,latitude,longitude,temperature_2m,relativehumidity_2m,precipitation,weathercode";

    fn hours(n: usize) -> Vec<String> {
        (0..n).map(|h| format!("2025-08-27T{:02}:00", h)).collect()
    }

    fn full_day(lat: f64, lon: f64, base_temp: f64) -> Value {
        json!({
            "latitude": lat,
            "longitude": lon,
            "hourly": {
                "time": hours(24),
                "temperature_2m": (0..24).map(|h| base_temp + h as f64 * 0.5).collect::<Vec<_>>(),
                "relativehumidity_2m": (0..24).map(|h| 40 + h).collect::<Vec<_>>(),
                "precipitation": vec![0.0; 24],
                "weathercode": vec![1; 24]
            }
        })
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        config: PipelineConfig,
    }

    impl Fixture {
        fn new() -> Result<Self, Box<dyn Error>> {
            let tmp = tempfile::tempdir()?;
            let config = PipelineConfig::builder().data_dir(tmp.path()).build();
            std::fs::create_dir_all(config.raw_dir())?;
            Ok(Self { _tmp: tmp, config })
        }

        fn raw(&self, name: &str, payload: &Value) -> Result<PathBuf, Box<dyn Error>> {
            let path = self.config.raw_dir().join(name);
            std::fs::write(&path, serde_json::to_vec_pretty(payload)?)?;
            Ok(path)
        }

        fn normalizer(&self) -> Normalizer {
            Normalizer::new(&self.config)
        }

        fn cumulative_lines(&self) -> Result<Vec<String>, Box<dyn Error>> {
            Ok(std::fs::read_to_string(self.config.cumulative_path())?
                .lines()
                .map(String::from)
                .collect())
        }
    }

    fn processed(result: Normalized) -> ProcessedFile {
        match result {
            Normalized::Processed(file) => file,
            other => panic!("expected processed output, got {other:?}"),
        }
    }

    /// Values of one column of a CSV file, by header name.
    fn csv_column(path: &Path, column: &str) -> Result<Vec<String>, Box<dyn Error>> {
        let text = std::fs::read_to_string(path)?;
        let mut lines = text.lines();
        let header: Vec<&str> = lines.next().ok_or("empty csv")?.split(',').collect();
        let idx = header
            .iter()
            .position(|h| *h == column)
            .ok_or("column not found")?;
        Ok(lines
            .map(|line| line.split(',').nth(idx).unwrap_or_default().to_string())
            .collect())
    }

    #[test]
    fn test_two_cities_end_to_end() -> Result<(), Box<dyn Error>> {
        let fx = Fixture::new()?;
        let karachi = fx.raw("Karachi_2025-08-27_2025-08-28.json", &full_day(24.86, 67.0, 28.0))?;
        let lahore = fx.raw("Lahore_2025-08-27_2025-08-28.json", &full_day(31.52, 74.36, 31.0))?;

        let normalizer = fx.normalizer();
        let first = processed(normalizer.normalize(&karachi)?);
        let second = processed(normalizer.normalize(&lahore)?);

        assert_eq!(first.rows, 24);
        assert_eq!(second.rows, 24);
        assert_eq!(first.columns.join(","), FULL_HEADER);
        assert_eq!(
            first.output,
            fx.config.processed_dir().join("Karachi_2025-08-27_2025-08-28.csv")
        );

        let lines = fx.cumulative_lines()?;
        assert_eq!(lines[0], FULL_HEADER);
        assert_eq!(lines.len(), 1 + 48);
        let cities: std::collections::BTreeSet<&str> = lines[1..]
            .iter()
            .filter_map(|l| l.split(',').nth(1))
            .collect();
        assert_eq!(cities.into_iter().collect::<Vec<_>>(), vec!["Karachi", "Lahore"]);
        assert!(lines[1].starts_with("2025-08-27 00:00:00,Karachi,"));
        assert!(lines[48].starts_with("2025-08-27 23:00:00,Lahore,"));
        Ok(())
    }

    #[test]
    fn test_gaps_interpolated_and_empty_rows_dropped() -> Result<(), Box<dyn Error>> {
        let fx = Fixture::new()?;
        let payload = json!({
            "hourly": {
                "time": hours(6),
                "temperature_2m": [10.0, null, null, 16.0, null, null],
                "precipitation": [null, 0.5, null, 1.0, null, 2.0],
                "weathercode": [3, 3, null, 3, 1, 2]
            }
        });
        let path = fx.raw("Multan_2025-08-27_2025-08-27.json", &payload)?;

        let file = processed(fx.normalizer().normalize(&path)?);
        assert_eq!(file.rows_before_cleaning, 6);
        // Row 2 (02:00) had no measurement at all.
        assert_eq!(file.rows, 5);
        assert_eq!(
            file.columns,
            vec!["time", "city", "temperature_2m", "precipitation", "weathercode"]
        );

        let times = csv_column(&file.output, "time")?;
        assert!(!times.contains(&"2025-08-27 02:00:00".to_string()));

        let temps: Vec<f64> = csv_column(&file.output, "temperature_2m")?
            .iter()
            .map(|v| v.parse())
            .collect::<Result<_, _>>()?;
        // Positional interpolation over the surviving rows 0,1,3,4,5.
        assert_eq!(temps, vec![10.0, 13.0, 16.0, 16.0, 16.0]);

        let precipitation: Vec<f64> = csv_column(&file.output, "precipitation")?
            .iter()
            .map(|v| v.parse())
            .collect::<Result<_, _>>()?;
        assert_eq!(precipitation, vec![0.5, 0.5, 1.0, 1.5, 2.0]);
        Ok(())
    }

    #[test]
    fn test_column_fallback_to_payload_keys() -> Result<(), Box<dyn Error>> {
        let fx = Fixture::new()?;
        let payload = json!({
            "hourly": {
                "time": hours(3),
                "windspeed_10m": [4.0, null, 6.0]
            }
        });
        let path = fx.raw("Quetta_2025-08-27_2025-08-27.json", &payload)?;

        let file = processed(fx.normalizer().normalize(&path)?);
        assert_eq!(file.columns, vec!["time", "city", "windspeed_10m"]);
        assert_eq!(file.rows, 3);
        let values: Vec<f64> = csv_column(&file.output, "windspeed_10m")?
            .iter()
            .map(|v| v.parse())
            .collect::<Result<_, _>>()?;
        assert_eq!(values, vec![4.0, 5.0, 6.0]);
        Ok(())
    }

    #[test]
    fn test_text_column_forward_backward_fill() -> Result<(), Box<dyn Error>> {
        let fx = Fixture::new()?;
        let payload = json!({
            "hourly": {
                "time": hours(3),
                "sky": [null, "clear", null],
                "temperature_2m": [20.0, 21.0, 22.0]
            }
        });
        let path = fx.raw("Quetta_2025-08-27_2025-08-27.json", &payload)?;
        let file = processed(fx.normalizer().normalize(&path)?);
        assert_eq!(file.rows, 3);
        assert_eq!(file.columns, vec!["time", "city", "temperature_2m"]);

        // "sky" only takes part when nothing requested is present.
        let payload = json!({
            "hourly": {
                "time": hours(3),
                "sky": [null, "clear", null],
                "pressure": [1000.0, 1001.0, 1002.0]
            }
        });
        let path = fx.raw("Gilgit_2025-08-27_2025-08-27.json", &payload)?;
        let file = processed(fx.normalizer().normalize(&path)?);
        assert_eq!(file.rows, 3);
        assert_eq!(csv_column(&file.output, "sky")?, vec!["clear"; 3]);
        Ok(())
    }

    #[test]
    fn test_filename_fallback_uses_timestamped_name() -> Result<(), Box<dyn Error>> {
        let fx = Fixture::new()?;
        let path = fx.raw("Karachi.json", &full_day(24.86, 67.0, 28.0))?;
        let now = NaiveDate::from_ymd_opt(2025, 8, 28)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();

        let file = processed(fx.normalizer().normalize_at(&path, now)?);
        assert_eq!(file.city, "Karachi");
        assert_eq!(
            file.output,
            fx.config.processed_dir().join("Karachi_processed_20250828093000.csv")
        );
        let text = std::fs::read_to_string(&file.output)?;
        assert_eq!(text.lines().count(), 25);
        Ok(())
    }

    #[test]
    fn test_rerun_is_idempotent_per_file_but_appends_cumulative() -> Result<(), Box<dyn Error>> {
        let fx = Fixture::new()?;
        let path = fx.raw("Lahore_2025-08-27_2025-08-28.json", &full_day(31.52, 74.36, 31.0))?;
        let normalizer = fx.normalizer();

        let first = processed(normalizer.normalize(&path)?);
        let first_bytes = std::fs::read(&first.output)?;
        let after_first = fx.cumulative_lines()?.len();

        std::fs::remove_file(&first.output)?;
        let second = processed(normalizer.normalize(&path)?);
        assert_eq!(std::fs::read(&second.output)?, first_bytes);

        let after_second = fx.cumulative_lines()?;
        assert_eq!(after_first, 25);
        assert_eq!(after_second.len(), 49);
        // Header written once.
        assert_eq!(after_second.iter().filter(|l| l.starts_with("time,")).count(), 1);
        Ok(())
    }

    #[test]
    fn test_invalid_payload_is_skipped() -> Result<(), Box<dyn Error>> {
        let fx = Fixture::new()?;
        let path = fx.raw("Islamabad_2025-08-27_2025-08-28.json", &json!({"hourly": {"time": []}}))?;

        let result = fx.normalizer().normalize(&path)?;
        assert_eq!(
            result,
            Normalized::Skipped {
                source: path,
                reason: ValidationError::EmptyTime
            }
        );
        assert!(!fx.config.cumulative_path().exists());
        Ok(())
    }

    #[test]
    fn test_malformed_json_is_error() -> Result<(), Box<dyn Error>> {
        let fx = Fixture::new()?;
        let path = fx.config.raw_dir().join("Broken_2025-08-27_2025-08-28.json");
        std::fs::write(&path, b"{\"hourly\": ")?;
        let result = fx.normalizer().normalize(&path);
        assert!(matches!(result, Err(NormalizeError::Json(..))));
        Ok(())
    }

    #[test]
    fn test_row_count_before_cleaning_matches_timestamps() -> Result<(), Box<dyn Error>> {
        let payload = full_day(24.86, 67.0, 28.0);
        let raw = RawObservationSet::from_payload(
            "Karachi",
            &crate::registry::default_hourly_variables(),
            &payload,
        )?;
        let table = normalize_observations(&raw, "Karachi")?;
        assert_eq!(table.rows_before_cleaning, 24);
        assert_eq!(table.frame.height(), 24);
        assert_eq!(
            table.measurement_columns,
            vec!["temperature_2m", "relativehumidity_2m", "precipitation", "weathercode"]
        );
        assert_eq!(table.frame.column("weathercode")?.dtype(), &DataType::Int64);
        assert_eq!(table.frame.column("temperature_2m")?.dtype(), &DataType::Float64);
        Ok(())
    }
}
