use crate::utils::safe_name;
use chrono::NaiveDateTime;
use std::path::Path;

const DELIMITER: char = '_';

/// `(city, start_date, end_date)` inferred from a raw file name such as
/// `Karachi_2025-08-27_2025-08-28.json`.
///
/// Names without two delimiter-separated trailing segments fall back to the whole stem as
/// the city with no dates, which switches the output to a timestamped file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileKey {
    pub city: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl FileKey {
    pub fn from_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_stem(&stem)
    }

    pub fn from_stem(stem: &str) -> Self {
        let parts: Vec<&str> = stem.rsplitn(3, DELIMITER).collect();
        match parts.as_slice() {
            [end, start, city] if !city.is_empty() => Self {
                city: city.to_string(),
                start_date: Some(start.to_string()),
                end_date: Some(end.to_string()),
            },
            _ => Self {
                city: stem.to_string(),
                start_date: None,
                end_date: None,
            },
        }
    }

    pub fn has_dates(&self) -> bool {
        self.start_date.is_some() && self.end_date.is_some()
    }

    /// Per-file output name; `now` only matters for the fallback name.
    pub fn output_file_name(&self, now: NaiveDateTime) -> String {
        let city = safe_name(&self.city);
        match (&self.start_date, &self.end_date) {
            (Some(start), Some(end)) => format!("{city}_{start}_{end}.csv"),
            _ => format!("{city}_processed_{}.csv", now.format("%Y%m%d%H%M%S")),
        }
    }
}
