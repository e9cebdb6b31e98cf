use crate::report::error::ReportError;
use chrono::{Duration, NaiveDateTime};
use plotters::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};

const CHART_SIZE: (u32, u32) = (1000, 500);
const BAR_HALF_WIDTH: f64 = 0.35;

/// A chartable measurement, with its source column and output file prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Temperature,
    Humidity,
    Precipitation,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Temperature, Metric::Humidity, Metric::Precipitation];

    pub fn column(&self) -> &'static str {
        match self {
            Metric::Temperature => "temperature_2m",
            Metric::Humidity => "relativehumidity_2m",
            Metric::Precipitation => "precipitation",
        }
    }

    fn file_prefix(&self) -> &'static str {
        match self {
            Metric::Temperature => "temp_trend",
            Metric::Humidity => "humidity_trend",
            Metric::Precipitation => "precipitation",
        }
    }

    fn axis_label(&self) -> &'static str {
        match self {
            Metric::Temperature => "Temperature (°C)",
            Metric::Humidity => "Relative humidity (%)",
            Metric::Precipitation => "Precipitation (mm)",
        }
    }

    /// `temp_trend_Karachi.svg`; spaces in the city name become `_`.
    pub fn file_name(&self, city: &str) -> String {
        format!("{}_{}.svg", self.file_prefix(), city.replace(' ', "_"))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Precipitation => "precipitation",
        };
        f.write_str(name)
    }
}

/// A chart written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartFile {
    pub city: String,
    pub metric: Metric,
    pub path: PathBuf,
    pub points: usize,
}

/// Renders `points` (time ordered, non-empty) as an SVG line chart, or a bar chart for
/// precipitation. The x axis is hours since the first point.
pub fn render_chart(
    path: &Path,
    city: &str,
    metric: Metric,
    points: &[(NaiveDateTime, f64)],
) -> Result<(), ReportError> {
    let render_err = |e: &dyn fmt::Display| ReportError::Render {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let (Some(&(start, _)), Some(&(end, _))) = (points.first(), points.last()) else {
        return Err(render_err(&"no points to plot"));
    };

    let hours = |t: NaiveDateTime| (t - start).num_minutes() as f64 / 60.0;
    let series: Vec<(f64, f64)> = points.iter().map(|&(t, v)| (hours(t), v)).collect();
    let x_range = -0.5..hours(end).max(1.0) + 0.5;
    let y_range = value_range(points.iter().map(|&(_, v)| v), metric == Metric::Precipitation);

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| render_err(&e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("{} - {}", city, metric.axis_label()), ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(|e| render_err(&e))?;

    let x_label = |x: &f64| {
        (start + Duration::minutes((x * 60.0).round() as i64))
            .format("%m-%d %H:%M")
            .to_string()
    };
    chart
        .configure_mesh()
        .x_desc("Time")
        .y_desc(metric.axis_label())
        .x_label_formatter(&x_label)
        .draw()
        .map_err(|e| render_err(&e))?;

    let drawn = match metric {
        Metric::Precipitation => chart
            .draw_series(series.iter().map(|&(x, y)| {
                Rectangle::new(
                    [(x - BAR_HALF_WIDTH, 0.0), (x + BAR_HALF_WIDTH, y)],
                    BLUE.filled(),
                )
            }))
            .map(|_| ()),
        Metric::Temperature | Metric::Humidity => chart
            .draw_series(LineSeries::new(series.iter().copied(), &RED))
            .map(|_| ()),
    };
    drawn.map_err(|e| render_err(&e))?;

    root.present().map_err(|e| render_err(&e))
}

/// Padded y range. Bar charts always include zero.
fn value_range(values: impl Iterator<Item = f64>, include_zero: bool) -> std::ops::Range<f64> {
    let (mut min, mut max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if include_zero {
        min = min.min(0.0);
        max = max.max(0.0);
    }
    let pad = if (max - min).abs() < f64::EPSILON {
        1.0
    } else {
        (max - min) * 0.05
    };
    (min - pad)..(max + pad)
}
