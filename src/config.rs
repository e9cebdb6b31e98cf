//! Explicit pipeline configuration.
//!
//! A [`PipelineConfig`] is built once (from defaults, a `bon` builder or a YAML file) and
//! passed by reference into every stage entry point. Nothing in the crate reads global state.

use crate::registry::{default_hourly_variables, default_locations, Location};
use bon::Builder;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CUMULATIVE_FILE_NAME: &str = "all_cities_hourly.csv";
pub const DATABASE_FILE_NAME: &str = "weather.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{0}'")]
    Parse(PathBuf, #[source] serde_yaml::Error),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Cannot go back {days} days from {today}")]
    DateOutOfRange { today: NaiveDate, days: u32 },

    #[error("No locations configured")]
    NoLocations,
}

/// Inclusive calendar date range for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// `today - days_back ..= today`
    pub fn ending_on(today: NaiveDate, days_back: u32) -> Result<Self, ConfigError> {
        let start = today
            .checked_sub_days(Days::new(u64::from(days_back)))
            .ok_or(ConfigError::DateOutOfRange {
                today,
                days: days_back,
            })?;
        Self::new(start, today)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.start, self.end)
    }
}

/// Everything the stages need to know: the location registry, the request shape and the
/// directory layout.
///
/// # Examples
///
/// ```
/// use weather_etl::{Location, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .locations(vec![Location::new("Karachi", 24.8607, 67.0011)])
///     .data_dir("/tmp/weather/data")
///     .build();
/// assert_eq!(config.table_name, "weather_data");
/// assert!(config.cumulative_path().ends_with("processed/all_cities_hourly.csv"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct PipelineConfig {
    #[builder(default = default_locations())]
    pub locations: Vec<Location>,

    #[builder(default = default_hourly_variables())]
    pub hourly_variables: Vec<String>,

    #[builder(into, default = String::from("https://api.open-meteo.com/v1/forecast"))]
    pub base_url: String,

    #[builder(into, default = String::from("Asia/Karachi"))]
    pub timezone: String,

    /// Fixed range to fetch; when absent the range ends today and spans `days_back` days.
    pub date_range: Option<DateRange>,

    #[builder(default = 1)]
    pub days_back: u32,

    #[builder(default = 10)]
    pub request_timeout_secs: u64,

    #[builder(into, default = PathBuf::from("data"))]
    pub data_dir: PathBuf,

    #[builder(into, default = PathBuf::from("reports"))]
    pub reports_dir: PathBuf,

    #[builder(into, default = String::from("weather_data"))]
    pub table_name: String,

    #[builder(default = 2)]
    pub report_window_days: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PipelineConfig {
    /// Loads a YAML config file. Keys that are absent keep their default values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config: Self = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(range) = self.date_range {
            DateRange::new(range.start, range.end)?;
        }
        Ok(())
    }

    /// The fixed range if one is configured, otherwise the `days_back` window ending on `today`.
    pub fn resolve_date_range(&self, today: NaiveDate) -> Result<DateRange, ConfigError> {
        match self.date_range {
            Some(range) => DateRange::new(range.start, range.end),
            None => DateRange::ending_on(today, self.days_back),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    pub fn cumulative_path(&self) -> PathBuf {
        self.processed_dir().join(CUMULATIVE_FILE_NAME)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE_NAME)
    }
}
