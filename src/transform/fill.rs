//! Gap filling for measurement columns.

use polars::prelude::*;

/// Fills nulls in `column` by linear interpolation between the nearest observed neighbours
/// (by position, rows being in time order). Leading and trailing gaps take the nearest
/// observed value. A column with no observed value stays null.
///
/// ```
/// use polars::prelude::*;
/// use weather_etl::fill_gaps;
///
/// let df = DataFrame::new(vec![
///     Series::new("t".into(), [None, Some(10.0), None, None, Some(16.0), None]).into(),
/// ])?;
/// let filled = df.lazy().select([fill_gaps("t")]).collect()?;
/// let values: Vec<Option<f64>> = filled.column("t")?.f64()?.into_iter().collect();
/// assert_eq!(
///     values,
///     vec![Some(10.0), Some(10.0), Some(12.0), Some(14.0), Some(16.0), Some(16.0)]
/// );
/// # Ok::<(), PolarsError>(())
/// ```
pub fn fill_gaps(column: &str) -> Expr {
    col(column)
        .interpolate(InterpolationMethod::Linear)
        .forward_fill(None)
        .backward_fill(None)
}

/// Forward fill, then backward fill. Used for columns that cannot be interpolated.
pub fn fill_text_gaps(column: &str) -> Expr {
    col(column).forward_fill(None).backward_fill(None)
}
