//! Column type coercion.
//!
//! Parses the date column into a polars `Date` and casts a list of columns
//! to one target type. Unlike a best-effort cleaner, every value that cannot
//! be converted is an error.

use super::Transformer;
use crate::config::TargetType;
use crate::error::{PreprocessingError, Result};
use crate::utils::{column_series, date_values, dates_to_series, is_numeric_dtype, text_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const NAME: &str = "TypeCoercer";

const TRUE_VALUES: [&str; 5] = ["true", "t", "yes", "y", "1"];
const FALSE_VALUES: [&str; 5] = ["false", "f", "no", "n", "0"];

/// Stateless type coercion step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeCoercer {
    date_column: Option<String>,
    columns: Vec<String>,
    target: TargetType,
}

impl TypeCoercer {
    pub fn new(date_column: Option<String>, columns: Vec<String>, target: TargetType) -> Self {
        Self {
            date_column,
            columns,
            target,
        }
    }

    /// Construct with the target type given by name (`"category"`, `"int64"`, ...).
    pub fn from_type_name(
        date_column: Option<String>,
        columns: Vec<String>,
        target: &str,
    ) -> Result<Self> {
        Ok(Self::new(date_column, columns, target.parse()?))
    }

    pub fn target(&self) -> TargetType {
        self.target
    }

    /// Cast one series to the configured target type.
    pub fn coerce_series(&self, series: &Series) -> Result<Series> {
        match self.target {
            TargetType::Category | TargetType::String => to_text(series),
            TargetType::Int32 => to_numeric(series, DataType::Int32),
            TargetType::Int64 => to_numeric(series, DataType::Int64),
            TargetType::Float64 => to_numeric(series, DataType::Float64),
            TargetType::Boolean => to_boolean(series),
        }
    }
}

fn conversion_failed(
    series: &Series,
    target: &str,
    reason: impl Into<String>,
) -> PreprocessingError {
    PreprocessingError::TypeConversionFailed {
        column: series.name().to_string(),
        target_type: target.to_string(),
        reason: reason.into(),
    }
}

fn to_text(series: &Series) -> Result<Series> {
    let values = text_values(series)?;
    Ok(Series::new(series.name().clone(), values))
}

fn to_numeric(series: &Series, target: DataType) -> Result<Series> {
    let target_name = format!("{:?}", target);

    if is_numeric_dtype(series.dtype()) || series.dtype() == &DataType::Boolean {
        return series
            .strict_cast(&target)
            .map_err(|e| conversion_failed(series, &target_name, e.to_string()));
    }

    if series.dtype() != &DataType::String {
        return Err(conversion_failed(
            series,
            &target_name,
            format!("cannot convert {:?}", series.dtype()),
        ));
    }

    let mut parsed: Vec<Option<f64>> = Vec::with_capacity(series.len());
    for opt_val in series.str()?.into_iter() {
        match opt_val.map(str::trim) {
            None | Some("") => parsed.push(None),
            Some(val) => {
                let number = val.parse::<f64>().map_err(|_| {
                    conversion_failed(series, &target_name, format!("'{}' is not a number", val))
                })?;
                parsed.push(Some(number));
            }
        }
    }

    if target != DataType::Float64
        && let Some(bad) = parsed.iter().flatten().find(|v| v.fract() != 0.0)
    {
        return Err(conversion_failed(
            series,
            &target_name,
            format!("{} is not an integer", bad),
        ));
    }

    Series::new(series.name().clone(), parsed)
        .strict_cast(&target)
        .map_err(|e| conversion_failed(series, &target_name, e.to_string()))
}

fn to_boolean(series: &Series) -> Result<Series> {
    match series.dtype() {
        DataType::Boolean => Ok(series.clone()),
        dtype if is_numeric_dtype(dtype) => {
            let float_series = series.cast(&DataType::Float64)?;
            let values: Vec<Option<bool>> = float_series
                .f64()?
                .into_iter()
                .map(|v| v.map(|x| x != 0.0))
                .collect();
            Ok(Series::new(series.name().clone(), values))
        }
        DataType::String => {
            let mut values: Vec<Option<bool>> = Vec::with_capacity(series.len());
            for opt_val in series.str()?.into_iter() {
                match opt_val {
                    None => values.push(None),
                    Some(val) => {
                        let cleaned = val.trim().to_lowercase();
                        if TRUE_VALUES.contains(&cleaned.as_str()) {
                            values.push(Some(true));
                        } else if FALSE_VALUES.contains(&cleaned.as_str()) {
                            values.push(Some(false));
                        } else {
                            return Err(conversion_failed(
                                series,
                                "Boolean",
                                format!("'{}' is not a boolean", val),
                            ));
                        }
                    }
                }
            }
            Ok(Series::new(series.name().clone(), values))
        }
        other => Err(conversion_failed(
            series,
            "Boolean",
            format!("cannot convert {:?}", other),
        )),
    }
}

impl Transformer for TypeCoercer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn fit(&mut self, _df: &DataFrame) -> Result<()> {
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();

        if let Some(date_column) = &self.date_column {
            let series = column_series(df, date_column)?;
            let parsed = dates_to_series(date_column, &date_values(series)?)?;
            debug!("Parsed '{}' from {:?} to Date", date_column, series.dtype());
            out.replace(date_column, parsed)?;
        }

        for column in &self.columns {
            let series = column_series(df, column)?;
            let coerced = self.coerce_series(series)?;
            debug!(
                "Cast '{}' from {:?} to {:?}",
                column,
                series.dtype(),
                coerced.dtype()
            );
            out.replace(column, coerced)?;
        }

        info!("Coerced {} column(s) to {}", self.columns.len(), self.target);
        Ok(out)
    }

    fn is_fitted(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn coercer(columns: &[&str], target: TargetType) -> TypeCoercer {
        TypeCoercer::new(
            Some("Date".to_string()),
            columns.iter().map(|s| s.to_string()).collect(),
            target,
        )
    }

    // ========================================================================
    // Date parsing
    // ========================================================================

    #[test]
    fn test_parses_string_dates() {
        let df = df!["Date" => ["2015-07-31", "2015-01-01"]].unwrap();

        let out = coercer(&[], TargetType::Category).transform(&df).unwrap();

        let date = out.column("Date").unwrap();
        assert_eq!(date.dtype(), &DataType::Date);
        assert_eq!(
            date_values(date.as_materialized_series()).unwrap(),
            vec![
                NaiveDate::from_ymd_opt(2015, 7, 31),
                NaiveDate::from_ymd_opt(2015, 1, 1)
            ]
        );
    }

    #[test]
    fn test_unparseable_date_is_parse_error() {
        let df = df!["Date" => ["2015-07-31", "not a date"]].unwrap();

        let err = coercer(&[], TargetType::Category).transform(&df).unwrap_err();

        assert_eq!(err.error_code(), "PARSE_ERROR");
        assert!(err.to_string().contains("not a date"));
    }

    #[test]
    fn test_null_dates_stay_null() {
        let df = df!["Date" => [Some("2015-07-31"), None]].unwrap();
        let out = coercer(&[], TargetType::Category).transform(&df).unwrap();
        assert_eq!(out.column("Date").unwrap().null_count(), 1);
    }

    #[test]
    fn test_missing_date_column() {
        let df = df!["Other" => [1]].unwrap();
        let err = coercer(&[], TargetType::Category).transform(&df).unwrap_err();
        assert!(matches!(err, PreprocessingError::ColumnNotFound(ref c) if c == "Date"));
    }

    // ========================================================================
    // Column casts
    // ========================================================================

    #[test]
    fn test_category_from_numeric_labels() {
        let df = df![
            "Date" => ["2015-07-31", "2015-07-30"],
            "StateHoliday" => [0i64, 1],
        ]
        .unwrap();

        let out = coercer(&["StateHoliday"], TargetType::Category)
            .transform(&df)
            .unwrap();

        let col = out.column("StateHoliday").unwrap();
        assert_eq!(col.dtype(), &DataType::String);
        assert_eq!(col.get(1).unwrap().get_str(), Some("1"));
    }

    #[test]
    fn test_string_to_int64() {
        let df = df![
            "Date" => ["2015-07-31", "2015-07-30", "2015-07-29"],
            "n" => [Some(" 12 "), None, Some("3.0")],
        ]
        .unwrap();

        let out = coercer(&["n"], TargetType::Int64).transform(&df).unwrap();

        let n = out.column("n").unwrap().as_materialized_series();
        let values: Vec<Option<i64>> = n.i64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(12), None, Some(3)]);
    }

    #[test]
    fn test_bad_number_is_conversion_error() {
        let df = df!["Date" => ["2015-07-31"], "n" => ["twelve"]].unwrap();
        let err = coercer(&["n"], TargetType::Float64).transform(&df).unwrap_err();
        assert!(matches!(err, PreprocessingError::TypeConversionFailed { .. }));
    }

    #[test]
    fn test_fractional_to_int_is_conversion_error() {
        let df = df!["Date" => ["2015-07-31"], "n" => ["2.5"]].unwrap();
        let err = coercer(&["n"], TargetType::Int32).transform(&df).unwrap_err();
        assert!(matches!(err, PreprocessingError::TypeConversionFailed { .. }));
    }

    #[test]
    fn test_boolean_from_strings_and_numbers() {
        let df = df![
            "Date" => ["2015-07-31", "2015-07-30"],
            "flag" => ["yes", "0"],
            "open" => [1i64, 0],
        ]
        .unwrap();

        let out = coercer(&["flag", "open"], TargetType::Boolean)
            .transform(&df)
            .unwrap();

        let bools = |name: &str| -> Vec<Option<bool>> {
            let series = out.column(name).unwrap().as_materialized_series();
            series.bool().unwrap().into_iter().collect()
        };
        let flag = bools("flag");
        let open = bools("open");
        assert_eq!(flag, vec![Some(true), Some(false)]);
        assert_eq!(open, vec![Some(true), Some(false)]);
    }

    #[test]
    fn test_unknown_target_name() {
        let err = TypeCoercer::from_type_name(None, vec![], "decimal128").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_without_date_column() {
        let df = df!["n" => [1.0, 2.0]].unwrap();
        let step = TypeCoercer::new(None, vec!["n".to_string()], TargetType::Int64);

        let out = step.transform(&df).unwrap();

        assert_eq!(out.column("n").unwrap().dtype(), &DataType::Int64);
    }
}
