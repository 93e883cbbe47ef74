//! Outlier handling for the float columns of a [`ColumnRegistry`].
//!
//! Two modes:
//! - IQR clipping: values outside `[Q1 - k*IQR, Q3 + k*IQR]` are clipped, rows kept.
//! - z-score filtering: rows where any selected column has `|z| >= threshold`
//!   are dropped.

use super::{FitState, Transformer, settings_mismatch};
use crate::config::{BoundsPolicy, OutlierMethod};
use crate::error::{PreprocessingError, Result};
use crate::schema::{ColumnRegistry, SemanticType};
use crate::utils::{column_series, mean, numeric_values, population_std, present, quantile_sorted};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const NAME: &str = "OutlierClipper";

/// Quartiles and clipping bounds of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    /// Compute bounds from the present values of a column. `None` if empty.
    pub fn from_values(values: &[f64], factor: f64) -> Option<Self> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let q1 = quantile_sorted(&sorted, 0.25)?;
        let q3 = quantile_sorted(&sorted, 0.75)?;
        let iqr = q3 - q1;

        Some(Self {
            q1,
            q3,
            lower: q1 - factor * iqr,
            upper: q3 + factor * iqr,
        })
    }

    /// Clip a value into the bounds.
    #[inline]
    pub fn clip(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }
}

/// Clips or filters outliers in the registry's float columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierClipper {
    method: OutlierMethod,
    iqr_factor: f64,
    z_threshold: f64,
    bounds_policy: BoundsPolicy,
    columns: Vec<String>,
    state: FitState<Vec<(String, IqrBounds)>>,
}

impl OutlierClipper {
    /// Select the float columns of `registry`, minus `exclude`.
    pub fn new(
        method: OutlierMethod,
        iqr_factor: f64,
        z_threshold: f64,
        bounds_policy: BoundsPolicy,
        registry: &ColumnRegistry,
        exclude: &[String],
    ) -> Result<Self> {
        if !iqr_factor.is_finite() || iqr_factor < 0.0 {
            return Err(PreprocessingError::InvalidConfig(format!(
                "IQR factor must be a non-negative number, got {}",
                iqr_factor
            )));
        }
        if !z_threshold.is_finite() || z_threshold <= 0.0 {
            return Err(PreprocessingError::InvalidConfig(format!(
                "z-score threshold must be positive, got {}",
                z_threshold
            )));
        }

        let columns = registry
            .columns_of(SemanticType::Float)
            .into_iter()
            .filter(|c| !exclude.contains(c))
            .collect();

        Ok(Self {
            method,
            iqr_factor,
            z_threshold,
            bounds_policy,
            columns,
            state: FitState::Unfitted,
        })
    }

    /// Construct from a method name (`"iqr"` or `"z_score"`) with default parameters.
    pub fn from_method_name(
        method: &str,
        registry: &ColumnRegistry,
        exclude: &[String],
    ) -> Result<Self> {
        Self::new(
            method.parse()?,
            1.5,
            3.0,
            BoundsPolicy::default(),
            registry,
            exclude,
        )
    }

    /// Candidate columns, before filtering by the frame's columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn method(&self) -> OutlierMethod {
        self.method
    }

    /// Fitted bounds for a column.
    pub fn bounds_for(&self, column: &str) -> Option<IqrBounds> {
        match &self.state {
            FitState::Fitted(bounds) => bounds.iter().find(|(c, _)| c == column).map(|(_, b)| *b),
            FitState::Unfitted => None,
        }
    }

    /// Adopt the fitted bounds of a deserialized clipper built with the same settings.
    pub(crate) fn restore_state(&mut self, saved: OutlierClipper) -> Result<()> {
        if saved.method != self.method
            || saved.iqr_factor != self.iqr_factor
            || saved.z_threshold != self.z_threshold
            || saved.bounds_policy != self.bounds_policy
            || saved.columns != self.columns
        {
            return Err(settings_mismatch(NAME, "method, parameters or columns differ"));
        }
        if let FitState::Fitted(bounds) = &saved.state {
            if let Some((column, _)) = bounds.iter().find(|(c, _)| !self.columns.contains(c)) {
                return Err(settings_mismatch(
                    NAME,
                    format!("bounds for unselected column '{}'", column),
                ));
            }
            let invalid = |b: &IqrBounds| b.lower.is_nan() || b.upper.is_nan() || b.lower > b.upper;
            if bounds.iter().any(|(_, b)| invalid(b)) {
                return Err(settings_mismatch(NAME, "invalid clipping bounds"));
            }
        }

        self.state = saved.state;
        Ok(())
    }

    fn requires_fit(&self) -> bool {
        self.method == OutlierMethod::Iqr && self.bounds_policy == BoundsPolicy::Fitted
    }

    fn present_columns<'a>(&'a self, df: &DataFrame) -> Vec<&'a str> {
        let names = df.get_column_names();
        self.columns
            .iter()
            .filter(|c| names.iter().any(|n| n.as_str() == c.as_str()))
            .map(String::as_str)
            .collect()
    }

    fn learn_bounds(&self, df: &DataFrame) -> Result<Vec<(String, IqrBounds)>> {
        let mut learned = Vec::new();

        for column in self.present_columns(df) {
            let values = present(&numeric_values(column_series(df, column)?)?);
            match IqrBounds::from_values(&values, self.iqr_factor) {
                Some(bounds) => {
                    debug!(
                        "IQR bounds for '{}': q1={}, q3={}, lower={}, upper={}",
                        column, bounds.q1, bounds.q3, bounds.lower, bounds.upper
                    );
                    learned.push((column.to_string(), bounds));
                }
                None => warn!("Column '{}' has no values; skipping IQR bounds", column),
            }
        }

        Ok(learned)
    }

    fn clip(&self, df: &DataFrame, bounds: &[(String, IqrBounds)]) -> Result<DataFrame> {
        let mut out = df.clone();
        let mut clipped_total = 0;

        for (column, b) in bounds {
            let values = numeric_values(column_series(df, column)?)?;
            let clipped_count = values
                .iter()
                .flatten()
                .filter(|v| **v < b.lower || **v > b.upper)
                .count();

            let clipped: Vec<Option<f64>> =
                values.into_iter().map(|v| v.map(|x| b.clip(x))).collect();
            out.replace(column, Series::new(column.as_str().into(), clipped))?;

            if clipped_count > 0 {
                debug!("Clipped {} value(s) in '{}'", clipped_count, column);
            }
            clipped_total += clipped_count;
        }

        debug!("Clipped {} outlier value(s) in total", clipped_total);
        Ok(out)
    }

    fn filter_z_scores(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut keep = vec![true; df.height()];

        for column in self.present_columns(df) {
            let values = numeric_values(column_series(df, column)?)?;
            let observed = present(&values);
            let mu = mean(&observed).unwrap_or(f64::NAN);
            let sigma = population_std(&observed).unwrap_or(f64::NAN);

            if sigma == 0.0 {
                warn!("Column '{}' has zero variance; every row fails the z-score test", column);
            }

            for (flag, value) in keep.iter_mut().zip(values) {
                let z = match value {
                    Some(x) => (x - mu) / sigma,
                    None => f64::NAN,
                };
                // NaN compares false, so null and zero-variance rows are dropped
                *flag = *flag && z.abs() < self.z_threshold;
            }
        }

        let mask = BooleanChunked::from_slice("mask".into(), &keep);
        let out = df.filter(&mask)?;

        let removed = df.height() - out.height();
        if removed > 0 {
            debug!(
                "Removed {} row(s) with |z| >= {}",
                removed, self.z_threshold
            );
        }
        Ok(out)
    }
}

impl Transformer for OutlierClipper {
    fn name(&self) -> &'static str {
        NAME
    }

    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        if !self.requires_fit() {
            debug!("{} in {:?} mode keeps no fitted state", NAME, self.method);
            return Ok(());
        }

        let learned = self.learn_bounds(df)?;
        info!("Fitted {} bounds for {} column(s)", NAME, learned.len());
        self.state = FitState::Fitted(learned);
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        match (self.method, self.bounds_policy) {
            (OutlierMethod::Iqr, BoundsPolicy::Fitted) => {
                let bounds = self.state.fitted(NAME)?;
                self.clip(df, bounds)
            }
            (OutlierMethod::Iqr, BoundsPolicy::PerCall) => {
                let bounds = self.learn_bounds(df)?;
                self.clip(df, &bounds)
            }
            (OutlierMethod::ZScore, _) => self.filter_z_scores(df),
        }
    }

    fn is_fitted(&self) -> bool {
        !self.requires_fit() || self.state.is_fitted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ColumnRegistry {
        ColumnRegistry::new()
            .with_column("Store", SemanticType::Float)
            .with_column("Sales", SemanticType::Float)
            .with_column("Kind", SemanticType::Categorical)
    }

    fn clipper(method: OutlierMethod, policy: BoundsPolicy) -> OutlierClipper {
        OutlierClipper::new(method, 1.5, 3.0, policy, &registry(), &["Store".to_string()]).unwrap()
    }

    fn f64_column(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    // ========================================================================
    // IQR
    // ========================================================================

    #[test]
    fn test_iqr_bounds() {
        let bounds = IqrBounds::from_values(&[1.0, 2.0, 3.0, 4.0, 100.0], 1.5).unwrap();
        assert_eq!(bounds.q1, 2.0);
        assert_eq!(bounds.q3, 4.0);
        assert_eq!(bounds.lower, -1.0);
        assert_eq!(bounds.upper, 7.0);
        assert_eq!(bounds.clip(100.0), 7.0);
        assert_eq!(bounds.clip(-5.0), -1.0);
        assert_eq!(bounds.clip(3.0), 3.0);
        assert!(IqrBounds::from_values(&[], 1.5).is_none());
    }

    #[test]
    fn test_iqr_clips_and_keeps_rows() {
        let df = df![
            "Store" => [1.0, 2.0, 3.0, 4.0, 500.0],
            "Sales" => [1.0, 2.0, 3.0, 4.0, 100.0],
        ]
        .unwrap();
        let mut step = clipper(OutlierMethod::Iqr, BoundsPolicy::Fitted);

        let out = step.fit_transform(&df).unwrap();

        assert_eq!(out.height(), 5);
        assert_eq!(f64_column(&out, "Sales")[4], Some(7.0));
        // excluded column untouched
        assert_eq!(f64_column(&out, "Store")[4], Some(500.0));
    }

    #[test]
    fn test_iqr_fitted_is_idempotent() {
        let df = df!["Sales" => [1.0, 2.0, 3.0, 4.0, 100.0, -50.0]].unwrap();
        let mut step = clipper(OutlierMethod::Iqr, BoundsPolicy::Fitted);
        step.fit(&df).unwrap();

        let once = step.transform(&df).unwrap();
        let twice = step.transform(&once).unwrap();

        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn test_iqr_fitted_requires_fit() {
        let df = df!["Sales" => [1.0, 2.0]].unwrap();
        let step = clipper(OutlierMethod::Iqr, BoundsPolicy::Fitted);
        assert!(!step.is_fitted());
        let err = step.transform(&df).unwrap_err();
        assert!(err.is_not_fitted());
    }

    #[test]
    fn test_iqr_per_call_recomputes_bounds() {
        let train = df!["Sales" => [1.0, 2.0, 3.0, 4.0, 5.0]].unwrap();
        let other = df!["Sales" => [10.0, 20.0, 30.0, 40.0, 1000.0]].unwrap();
        let mut step = clipper(OutlierMethod::Iqr, BoundsPolicy::PerCall);
        assert!(step.is_fitted());
        step.fit(&train).unwrap();

        let out = step.transform(&other).unwrap();

        // bounds from `other`: q1=20, q3=40, upper=70
        assert_eq!(f64_column(&out, "Sales")[4], Some(70.0));
        assert_eq!(step.bounds_for("Sales"), None);
    }

    #[test]
    fn test_nulls_survive_clipping() {
        let df = df!["Sales" => [Some(1.0), None, Some(3.0)]].unwrap();
        let mut step = clipper(OutlierMethod::Iqr, BoundsPolicy::Fitted);

        let out = step.fit_transform(&df).unwrap();

        assert_eq!(out.column("Sales").unwrap().null_count(), 1);
    }

    #[test]
    fn test_registry_columns_missing_from_frame_are_skipped() {
        let df = df!["Other" => [1.0, 1000.0]].unwrap();
        let mut step = clipper(OutlierMethod::Iqr, BoundsPolicy::Fitted);

        let out = step.fit_transform(&df).unwrap();

        assert!(out.equals(&df));
    }

    // ========================================================================
    // z-score
    // ========================================================================

    #[test]
    fn test_z_score_drops_outlier_rows() {
        let mut sales = vec![0.0; 19];
        sales.push(100.0);
        let df = df!["Sales" => sales].unwrap();
        let step = clipper(OutlierMethod::ZScore, BoundsPolicy::Fitted);

        let out = step.transform(&df).unwrap();

        assert_eq!(out.height(), 19);
        assert!(f64_column(&out, "Sales").iter().all(|v| *v == Some(0.0)));
    }

    #[test]
    fn test_z_score_zero_variance_drops_rows() {
        let df = df!["Sales" => [5.0, 5.0, 5.0]].unwrap();
        let step = clipper(OutlierMethod::ZScore, BoundsPolicy::Fitted);

        let out = step.transform(&df).unwrap();

        assert_eq!(out.height(), 0);
    }

    #[test]
    fn test_z_score_null_row_dropped() {
        let df = df!["Sales" => [Some(1.0), None, Some(2.0), Some(3.0)]].unwrap();
        let step = clipper(OutlierMethod::ZScore, BoundsPolicy::Fitted);

        let out = step.transform(&df).unwrap();

        assert_eq!(out.height(), 3);
    }

    // ========================================================================
    // construction
    // ========================================================================

    #[test]
    fn test_column_selection_from_registry() {
        let step = clipper(OutlierMethod::Iqr, BoundsPolicy::Fitted);
        assert_eq!(step.columns(), &["Sales".to_string()]);
    }

    #[test]
    fn test_invalid_parameters() {
        let registry = registry();
        let build = |method, factor, threshold| {
            OutlierClipper::new(method, factor, threshold, BoundsPolicy::Fitted, &registry, &[])
        };
        assert!(build(OutlierMethod::Iqr, -1.0, 3.0).is_err());
        assert!(build(OutlierMethod::ZScore, 1.5, 0.0).is_err());
        let err = OutlierClipper::from_method_name("isolation_forest", &registry, &[]).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
