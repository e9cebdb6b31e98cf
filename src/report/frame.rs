//! Lazy access to stored observations for reporting.

use crate::config::PipelineConfig;
use crate::load::loader::{quote_identifier, read_cumulative_csv};
use crate::report::error::ReportError;
use crate::transform::normalizer::{COL_CITY, COL_TIME};
use crate::utils::TIMESTAMP_FORMAT;
use chrono::{DateTime, NaiveDateTime};
use log::{info, warn};
use polars::prelude::*;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::path::Path;

/// A wrapper around a Polars `LazyFrame` holding normalized hourly observations of any
/// number of cities.
///
/// The `time` column is a naive local datetime and `city` is a string; every other column
/// is a measurement. Filtering methods return a new frame and leave `self` untouched.
#[derive(Clone)]
pub struct ObservationFrame {
    pub frame: LazyFrame,
}

impl ObservationFrame {
    pub fn new(frame: LazyFrame) -> Self {
        Self { frame }
    }

    /// Opens the store when it exists, else the cumulative dataset.
    ///
    /// # Errors
    ///
    /// [`ReportError::DataSourceMissing`] when neither exists.
    pub fn open(config: &PipelineConfig) -> Result<Self, ReportError> {
        let database = config.database_path();
        let csv = config.cumulative_path();
        if database.exists() {
            info!("Reading observations from store {}", database.display());
            Self::from_store(&database, &config.table_name)
        } else if csv.exists() {
            info!(
                "Store {} not found, falling back to {}",
                database.display(),
                csv.display()
            );
            Self::from_csv(&csv)
        } else {
            Err(ReportError::DataSourceMissing { database, csv })
        }
    }

    pub fn from_store(path: &Path, table: &str) -> Result<Self, ReportError> {
        let store = |source: rusqlite::Error| ReportError::Store {
            path: path.to_path_buf(),
            table: table.to_string(),
            source,
        };

        let conn = Connection::open(path).map_err(store)?;
        let mut stmt = conn
            .prepare(&format!("SELECT * FROM {}", quote_identifier(table)))
            .map_err(store)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut values: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
        let mut rows = stmt.query([]).map_err(store)?;
        while let Some(row) = rows.next().map_err(store)? {
            for (idx, column) in values.iter_mut().enumerate() {
                column.push(row.get::<_, Value>(idx).map_err(store)?);
            }
        }

        let columns: Vec<Column> = names
            .iter()
            .zip(values)
            .map(|(name, column)| store_column(name, column))
            .collect();
        Self::from_frame(DataFrame::new(columns)?)
    }

    pub fn from_csv(path: &Path) -> Result<Self, ReportError> {
        let df = read_cumulative_csv(path).map_err(|e| ReportError::Csv(path.to_path_buf(), e))?;
        Self::from_frame(df)
    }

    /// Parses the textual `time` column. Rows whose timestamp cannot be parsed keep a null
    /// time and therefore never fall inside a window.
    pub fn from_frame(df: DataFrame) -> Result<Self, ReportError> {
        for required in [COL_TIME, COL_CITY] {
            if df.column(required).is_err() {
                return Err(ReportError::MissingColumn(required.to_string()));
            }
        }

        let options = StrptimeOptions {
            format: Some(TIMESTAMP_FORMAT.into()),
            strict: false,
            exact: true,
            cache: true,
        };
        let df = df
            .lazy()
            .with_columns([
                col(COL_TIME).cast(DataType::String).str().strptime(
                    DataType::Datetime(TimeUnit::Milliseconds, None),
                    options,
                    lit("raise"),
                ),
                col(COL_CITY).cast(DataType::String),
            ])
            .collect()?;

        let unparsed = df.column(COL_TIME)?.null_count();
        if unparsed > 0 {
            warn!("{} rows have no parseable time and are ignored", unparsed);
        }
        Ok(Self::new(df.lazy()))
    }

    pub fn filter(&self, predicate: Expr) -> ObservationFrame {
        ObservationFrame::new(self.frame.clone().filter(predicate))
    }

    /// Rows with `time >= cutoff`.
    pub fn since(&self, cutoff: NaiveDateTime) -> ObservationFrame {
        self.filter(col(COL_TIME).gt_eq(lit(cutoff)))
    }

    pub fn for_city(&self, city: &str) -> ObservationFrame {
        self.filter(col(COL_CITY).eq(lit(city)))
    }

    /// Sorted by `(city, time)`.
    pub fn sorted(&self) -> ObservationFrame {
        ObservationFrame::new(
            self.frame
                .clone()
                .sort([COL_CITY, COL_TIME], SortMultipleOptions::default()),
        )
    }

    /// Distinct city names, sorted.
    pub fn cities(&self) -> Result<Vec<String>, ReportError> {
        let df = self.frame.clone().select([col(COL_CITY)]).collect()?;
        let cities: BTreeSet<String> = df
            .column(COL_CITY)?
            .as_materialized_series()
            .str()?
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        Ok(cities.into_iter().collect())
    }

    /// `(time, value)` pairs of one measurement column in frame order, skipping rows where
    /// either is null. `None` when the column does not exist.
    pub fn points(&self, column: &str) -> Result<Option<Vec<(NaiveDateTime, f64)>>, ReportError> {
        let df = self.frame.clone().collect()?;
        let Ok(values) = df.column(column) else {
            return Ok(None);
        };
        let values = values.as_materialized_series().cast(&DataType::Float64)?;
        let times = df
            .column(COL_TIME)?
            .as_materialized_series()
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
            .cast(&DataType::Int64)?;

        let points = times
            .i64()?
            .into_iter()
            .zip(values.f64()?)
            .filter_map(|(time, value)| {
                let time = DateTime::from_timestamp_millis(time?)?.naive_utc();
                Some((time, value?))
            })
            .collect();
        Ok(Some(points))
    }
}

/// Builds a typed column from SQLite values: integer when every present value is an
/// integer, float when every present value is numeric, text otherwise.
fn store_column(name: &str, values: Vec<Value>) -> Column {
    let is_integer = values
        .iter()
        .all(|v| matches!(v, Value::Null | Value::Integer(_)));
    let is_numeric = values
        .iter()
        .all(|v| matches!(v, Value::Null | Value::Integer(_) | Value::Real(_)));

    let series = if is_integer {
        let column: Vec<Option<i64>> = values
            .into_iter()
            .map(|v| match v {
                Value::Integer(i) => Some(i),
                _ => None,
            })
            .collect();
        Series::new(name.into(), column)
    } else if is_numeric {
        let column: Vec<Option<f64>> = values
            .into_iter()
            .map(|v| match v {
                Value::Integer(i) => Some(i as f64),
                Value::Real(f) => Some(f),
                _ => None,
            })
            .collect();
        Series::new(name.into(), column)
    } else {
        let column: Vec<Option<String>> = values
            .into_iter()
            .map(|v| match v {
                Value::Text(s) => Some(s),
                Value::Integer(i) => Some(i.to_string()),
                Value::Real(f) => Some(f.to_string()),
                Value::Null | Value::Blob(_) => None,
            })
            .collect();
        Series::new(name.into(), column)
    };
    series.into()
}
