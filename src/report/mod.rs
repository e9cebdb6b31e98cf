pub mod charts;
pub mod error;
pub mod frame;

use crate::config::PipelineConfig;
use crate::utils::ensure_dir_exists;
use charts::{render_chart, ChartFile, Metric};
use chrono::{Duration, NaiveDateTime};
use error::ReportError;
use frame::ObservationFrame;
use log::info;

/// Renders charts for every city with observations in the last `window_days` days.
pub fn report(config: &PipelineConfig, window_days: u32) -> Result<Vec<ChartFile>, ReportError> {
    report_at(config, window_days, chrono::Local::now().naive_local())
}

/// [`report`] with an explicit clock. Rows with `time >= now - window_days` are plotted.
///
/// A city without rows in the window is skipped with a log line, as is a metric whose
/// column is absent or empty for that city.
pub fn report_at(
    config: &PipelineConfig,
    window_days: u32,
    now: NaiveDateTime,
) -> Result<Vec<ChartFile>, ReportError> {
    let cutoff = window_start(now, window_days)?;
    let observations = ObservationFrame::open(config)?;
    let recent = recent_sorted(&observations, cutoff);

    ensure_dir_exists(&config.reports_dir)
        .map_err(|e| ReportError::DirCreation(config.reports_dir.clone(), e))?;

    let mut charts = Vec::new();
    for city in observations.cities()? {
        let city_frame = recent.for_city(&city);
        if city_frame.frame.clone().collect()?.height() == 0 {
            info!("No data for {} since {}, skipping", city, cutoff);
            continue;
        }

        for metric in Metric::ALL {
            let points = match city_frame.points(metric.column())? {
                Some(points) if !points.is_empty() => points,
                Some(_) => {
                    info!("No {} values for {}, skipping chart", metric, city);
                    continue;
                }
                None => {
                    info!("Column '{}' not present, skipping {} chart", metric.column(), metric);
                    continue;
                }
            };

            let path = config.reports_dir.join(metric.file_name(&city));
            render_chart(&path, &city, metric, &points)?;
            info!("Saved {} chart for {}: {}", metric, city, path.display());
            charts.push(ChartFile {
                city: city.clone(),
                metric,
                path,
                points: points.len(),
            });
        }
    }

    info!("Report finished: {} charts written", charts.len());
    Ok(charts)
}

fn window_start(now: NaiveDateTime, window_days: u32) -> Result<NaiveDateTime, ReportError> {
    Duration::try_days(i64::from(window_days))
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or(ReportError::InvalidWindow { days: window_days })
}

/// Rows with `time >= cutoff`, ordered by `(city, time)` so every chart runs left to right.
fn recent_sorted(observations: &ObservationFrame, cutoff: NaiveDateTime) -> ObservationFrame {
    observations.since(cutoff).sorted()
}
