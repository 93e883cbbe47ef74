//! Missing value imputation.
//!
//! Learns one fill value per selected column (mean, median, most frequent or
//! a constant) and replaces nulls, and NaN in float columns, with it.

use super::{FitState, Transformer, settings_mismatch};
use crate::config::{FillValue, ImputationStrategy};
use crate::error::{PreprocessingError, Result};
use crate::utils::{
    column_series, is_numeric_dtype, mean, median, numeric_values, present, text_values,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

const NAME: &str = "MissingValueImputer";

/// Fills missing values in a fixed set of columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValueImputer {
    columns: Vec<String>,
    strategy: ImputationStrategy,
    fill_value: Option<FillValue>,
    state: FitState<Vec<(String, FillValue)>>,
}

impl MissingValueImputer {
    /// Create an imputer for `columns`.
    ///
    /// `Constant` requires `fill_value`; the other strategies ignore it.
    pub fn new(
        columns: Vec<String>,
        strategy: ImputationStrategy,
        fill_value: Option<FillValue>,
    ) -> Result<Self> {
        if strategy == ImputationStrategy::Constant && fill_value.is_none() {
            return Err(PreprocessingError::InvalidConfig(
                "constant imputation requires a fill value".to_string(),
            ));
        }

        Ok(Self {
            columns,
            strategy,
            fill_value,
            state: FitState::Unfitted,
        })
    }

    /// Create an imputer from a strategy name such as `"most_frequent"`.
    pub fn from_strategy_name(
        columns: Vec<String>,
        strategy: &str,
        fill_value: Option<FillValue>,
    ) -> Result<Self> {
        Self::new(columns, strategy.parse()?, fill_value)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn strategy(&self) -> ImputationStrategy {
        self.strategy
    }

    /// Learned fill value for a column.
    pub fn fill_value_for(&self, column: &str) -> Option<&FillValue> {
        match &self.state {
            FitState::Fitted(values) => values.iter().find(|(c, _)| c == column).map(|(_, v)| v),
            FitState::Unfitted => None,
        }
    }

    /// Adopt the fitted values of a deserialized imputer built with the same settings.
    pub(crate) fn restore_state(&mut self, saved: MissingValueImputer) -> Result<()> {
        if saved.columns != self.columns
            || saved.strategy != self.strategy
            || saved.fill_value != self.fill_value
        {
            return Err(settings_mismatch(NAME, "columns, strategy or fill value differ"));
        }
        if let FitState::Fitted(values) = &saved.state
            && !values.iter().map(|(c, _)| c).eq(self.columns.iter())
        {
            return Err(settings_mismatch(NAME, "fill values do not cover the columns"));
        }

        self.state = saved.state;
        Ok(())
    }

    fn learn(&self, series: &Series) -> Result<FillValue> {
        let column = series.name().to_string();
        let numeric = is_numeric_dtype(series.dtype());

        match self.strategy {
            ImputationStrategy::Constant => {
                let value = self.fill_value.clone().ok_or_else(|| {
                    PreprocessingError::InvalidConfig(
                        "constant imputation requires a fill value".to_string(),
                    )
                })?;
                match (&value, numeric) {
                    (FillValue::Number(_), true) | (FillValue::Text(_), false) => Ok(value),
                    _ => Err(PreprocessingError::TypeConversionFailed {
                        column,
                        target_type: format!("{:?}", series.dtype()),
                        reason: format!("fill value {} does not match the column type", value),
                    }),
                }
            }
            ImputationStrategy::Mean | ImputationStrategy::Median if !numeric => {
                Err(PreprocessingError::TypeConversionFailed {
                    column,
                    target_type: "numeric".to_string(),
                    reason: format!(
                        "{} imputation needs a numeric column, found {:?}",
                        self.strategy,
                        series.dtype()
                    ),
                })
            }
            ImputationStrategy::Mean | ImputationStrategy::Median => {
                let values = present(&numeric_values(series)?);
                let stat = if self.strategy == ImputationStrategy::Mean {
                    mean(&values)
                } else {
                    median(&values)
                };
                stat.map(FillValue::Number)
                    .ok_or(PreprocessingError::NoValidValues(column))
            }
            ImputationStrategy::MostFrequent if numeric => {
                numeric_mode(&present(&numeric_values(series)?))
                    .map(FillValue::Number)
                    .ok_or(PreprocessingError::NoValidValues(column))
            }
            ImputationStrategy::MostFrequent => {
                let values: Vec<String> = text_values(series)?.into_iter().flatten().collect();
                text_mode(&values)
                    .map(FillValue::Text)
                    .ok_or(PreprocessingError::NoValidValues(column))
            }
        }
    }
}

/// Most frequent value; ties go to the smallest.
fn numeric_mode(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let value = sorted[i];
        let run = sorted[i..].iter().take_while(|v| **v == value).count();
        if best.is_none_or(|(_, count)| run > count) {
            best = Some((value, run));
        }
        i += run;
    }
    best.map(|(value, _)| value)
}

/// Most frequent label; ties go to the lexicographically smallest.
fn text_mode(values: &[String]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}

fn fill_numeric(series: &Series, fill_value: f64) -> Result<(Series, usize)> {
    let values = numeric_values(series)?;
    let missing = values.iter().filter(|v| v.is_none()).count();
    let filled: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(fill_value)).collect();
    Ok((Series::new(series.name().clone(), filled), missing))
}

fn fill_text(series: &Series, fill_value: &str) -> Result<(Series, usize)> {
    let values = text_values(series)?;
    let missing = values.iter().filter(|v| v.is_none()).count();
    let filled: Vec<String> = values
        .into_iter()
        .map(|v| v.unwrap_or_else(|| fill_value.to_string()))
        .collect();
    Ok((Series::new(series.name().clone(), filled), missing))
}

impl Transformer for MissingValueImputer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        let mut learned = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            let series = column_series(df, column)?;
            let value = self.learn(series)?;
            debug!(
                "Learned {} fill value for '{}': {}",
                self.strategy, column, value
            );
            learned.push((column.clone(), value));
        }

        info!(
            "Fitted {} on {} column(s) with strategy '{}'",
            NAME,
            learned.len(),
            self.strategy
        );
        self.state = FitState::Fitted(learned);
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let learned = self.state.fitted(NAME)?;
        let mut out = df.clone();

        for (column, value) in learned {
            let series = column_series(df, column)?;
            let numeric = is_numeric_dtype(series.dtype());

            let (filled, missing) = match (value, numeric) {
                (FillValue::Number(v), true) => fill_numeric(series, *v)?,
                (FillValue::Text(s), false) => fill_text(series, s)?,
                _ => {
                    return Err(PreprocessingError::TypeConversionFailed {
                        column: column.clone(),
                        target_type: format!("{:?}", series.dtype()),
                        reason: format!("learned fill value {} no longer matches", value),
                    });
                }
            };

            if missing > 0 {
                debug!("Filled {} missing value(s) in '{}' with {}", missing, column, value);
            }
            out.replace(column, filled)?;
        }

        Ok(out)
    }

    fn is_fitted(&self) -> bool {
        self.state.is_fitted()
    }
}
