//! Shared utilities for the preprocessing pipeline and analyzers.
//!
//! This module contains the column accessors, statistics and date helpers
//! used across multiple transformers so that training and inference compute
//! exactly the same numbers.

use crate::error::{PreprocessingError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a floating point type.
#[inline]
pub fn is_float_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Check if a DataType is a date or datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _) | DataType::Date)
}

// =============================================================================
// Column Access
// =============================================================================

/// Look up a column, mapping a miss to [`PreprocessingError::ColumnNotFound`].
pub fn column_series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|col| col.as_materialized_series())
        .map_err(|_| PreprocessingError::ColumnNotFound(name.to_string()))
}

/// Check that every listed column exists in the frame.
pub fn require_columns(df: &DataFrame, columns: &[String]) -> Result<()> {
    for name in columns {
        column_series(df, name)?;
    }
    Ok(())
}

/// Names of all columns, in frame order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Extract a numeric column as `f64` values. Nulls and NaN both map to `None`.
pub fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
    if !is_numeric_dtype(series.dtype()) {
        return Err(PreprocessingError::InvalidColumnType {
            column: series.name().to_string(),
            expected: "numeric".to_string(),
            found: format!("{:?}", series.dtype()),
        });
    }

    let float_series = series.cast(&DataType::Float64)?;
    let values = float_series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

/// Extract a column as text values (categorical labels).
pub fn text_values(series: &Series) -> Result<Vec<Option<String>>> {
    let str_series = series.cast(&DataType::String)?;
    let values = str_series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    Ok(values)
}

/// Extract an integer key column (e.g. store identifiers) as `i64` values.
pub fn integer_values(series: &Series) -> Result<Vec<Option<i64>>> {
    if !is_numeric_dtype(series.dtype()) {
        return Err(PreprocessingError::InvalidColumnType {
            column: series.name().to_string(),
            expected: "integer".to_string(),
            found: format!("{:?}", series.dtype()),
        });
    }

    let int_series = series.cast(&DataType::Int64)?;
    Ok(int_series.i64()?.into_iter().collect())
}

// =============================================================================
// Statistics
// =============================================================================

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (ddof = 0).
pub fn population_std(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Quantile with linear interpolation between order statistics.
///
/// `sorted` must be ascending. Position is `(n - 1) * q`. Returns `None` for
/// an empty slice or a `q` outside `[0, 1]`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let pos = (sorted.len() - 1) as f64 * q;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Median of unsorted values.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, 0.5)
}

/// Drop missing entries from an extracted numeric column.
pub fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// =============================================================================
// Date Utilities
// =============================================================================

/// `NaiveDate::num_days_from_ce` of 1970-01-01 (the polars `Date` epoch).
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%Y%m%d"];

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a date string in one of the accepted layouts.
pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Convert a polars `Date` physical value into a `NaiveDate`.
pub fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
}

/// Convert a `NaiveDate` into a polars `Date` physical value.
pub fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Read a date-like column into `NaiveDate` values.
///
/// Accepts `Date`, `Datetime` and string columns. A non-null string that does
/// not parse is a [`PreprocessingError::DateParse`].
pub fn date_values(series: &Series) -> Result<Vec<Option<NaiveDate>>> {
    match series.dtype() {
        DataType::Date => {
            let days = series.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|d| d.and_then(date_from_epoch_days))
                .collect())
        }
        DataType::Datetime(_, _) => {
            let as_date = series.cast(&DataType::Date)?;
            date_values(&as_date)
        }
        DataType::String => {
            let column = series.name().to_string();
            series
                .str()?
                .into_iter()
                .map(|v| match v {
                    None => Ok(None),
                    Some(raw) => parse_date_str(raw).map(Some).ok_or_else(|| {
                        PreprocessingError::DateParse {
                            column: column.clone(),
                            value: raw.to_string(),
                        }
                    }),
                })
                .collect()
        }
        other => Err(PreprocessingError::InvalidColumnType {
            column: series.name().to_string(),
            expected: "date".to_string(),
            found: format!("{:?}", other),
        }),
    }
}

/// Build a polars `Date` series from `NaiveDate` values.
pub fn dates_to_series(name: &str, dates: &[Option<NaiveDate>]) -> Result<Series> {
    let days: Vec<Option<i32>> = dates.iter().map(|d| d.map(epoch_days)).collect();
    Ok(Series::new(name.into(), days).cast(&DataType::Date)?)
}

// =============================================================================
// Tests
// =============================================================================
