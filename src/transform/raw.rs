use crate::transform::error::{NormalizeError, ValidationError};
use crate::utils::parse_timestamp;
use chrono::NaiveDateTime;
use log::warn;
use serde_json::{Map, Value};

const COL_TIME: &str = "time";

/// Column names owned by the normalized table itself; never used as measurements.
pub(crate) const RESERVED_COLUMNS: [&str; 4] = ["time", "city", "latitude", "longitude"];

/// One measurement series from the `hourly` section, aligned index-for-index with the
/// timestamps (padded with nulls or truncated to the timestamp count).
#[derive(Debug, Clone, PartialEq)]
pub enum RawSeries {
    /// Every value present and a JSON integer.
    Integer(Vec<i64>),
    /// Numbers with possible nulls.
    Float(Vec<Option<f64>>),
    /// At least one non-numeric value. Numbers are kept in their JSON spelling.
    Text(Vec<Option<String>>),
}

impl RawSeries {
    fn from_json(name: &str, value: &Value, len: usize) -> Self {
        let items: &[Value] = match value {
            Value::Array(items) => items,
            _ => {
                warn!("Hourly key '{}' is not an array; treating it as all-null", name);
                &[]
            }
        };
        if items.len() > len {
            warn!(
                "Hourly key '{}' has {} values for {} timestamps; extra values ignored",
                name,
                items.len(),
                len
            );
        }
        let null = Value::Null;
        let padded: Vec<&Value> = items
            .iter()
            .chain(std::iter::repeat(&null))
            .take(len)
            .collect();

        if padded.iter().all(|v| v.is_i64()) {
            return RawSeries::Integer(padded.iter().filter_map(|v| v.as_i64()).collect());
        }
        if padded.iter().all(|v| v.is_null() || v.is_number()) {
            return RawSeries::Float(padded.iter().map(|v| v.as_f64()).collect());
        }
        RawSeries::Text(
            padded
                .iter()
                .map(|v| match v {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect(),
        )
    }
}

/// A parsed raw payload for one location and date range.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservationSet {
    pub location_name: String,
    pub requested_variables: Vec<String>,
    pub timestamps: Vec<NaiveDateTime>,
    /// Every non-time key of `hourly`, in payload order.
    pub series: Vec<(String, RawSeries)>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl RawObservationSet {
    /// Validates the payload shape and parses the hourly section.
    ///
    /// # Errors
    ///
    /// [`NormalizeError::Invalid`] when there is no `hourly` object or no non-empty `time`
    /// array, and [`NormalizeError::Timestamp`] when a timestamp cannot be parsed.
    pub fn from_payload(
        location_name: &str,
        requested_variables: &[String],
        payload: &Value,
    ) -> Result<Self, NormalizeError> {
        let root = payload.as_object().ok_or(ValidationError::NotAnObject)?;
        let hourly: &Map<String, Value> = root
            .get("hourly")
            .and_then(Value::as_object)
            .ok_or(ValidationError::MissingHourly)?;
        let times = hourly
            .get(COL_TIME)
            .and_then(Value::as_array)
            .ok_or(ValidationError::MissingTime)?;
        if times.is_empty() {
            return Err(ValidationError::EmptyTime.into());
        }

        let timestamps = times
            .iter()
            .enumerate()
            .map(|(index, value)| {
                value
                    .as_str()
                    .and_then(parse_timestamp)
                    .ok_or_else(|| NormalizeError::Timestamp {
                        index,
                        value: value.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let series = hourly
            .iter()
            .filter(|(name, _)| name.as_str() != COL_TIME)
            .map(|(name, value)| (name.clone(), RawSeries::from_json(name, value, timestamps.len())))
            .collect();

        Ok(Self {
            location_name: location_name.to_string(),
            requested_variables: requested_variables.to_vec(),
            timestamps,
            series,
            latitude: root.get("latitude").and_then(Value::as_f64),
            longitude: root.get("longitude").and_then(Value::as_f64),
        })
    }

    pub fn series(&self, name: &str) -> Option<&RawSeries> {
        self.series.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Requested variables present in the payload, in requested order. When none of them is
    /// present, every measurement key of the payload in payload order.
    pub fn selected_columns(&self) -> Vec<&str> {
        let is_measurement = |name: &str| !RESERVED_COLUMNS.contains(&name);
        let requested: Vec<&str> = self
            .requested_variables
            .iter()
            .map(String::as_str)
            .filter(|name| is_measurement(name) && self.series(name).is_some())
            .collect();
        if !requested.is_empty() {
            return requested;
        }
        self.series
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| is_measurement(name))
            .collect()
    }
}
