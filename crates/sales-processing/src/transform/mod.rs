//! Fit/transform building blocks.
//!
//! Each transformer owns its fitted statistics in a [`FitState`] and is
//! applied in this order by the [`crate::pipeline::Pipeline`]:
//!
//! 1. [`MissingValueImputer`]
//! 2. [`OutlierClipper`]
//! 3. [`TypeCoercer`]
//! 4. [`DateFeatureExpander`]
//! 5. [`ColumnScaler`]
//!
//! Transformers never modify their input; `transform` always returns a new
//! frame.

mod dates;
mod dtypes;
mod imputer;
mod outliers;
mod scaler;

pub use dates::{DateFeatureExpander, DateFeatureNames};
pub use dtypes::TypeCoercer;
pub use imputer::MissingValueImputer;
pub use outliers::{IqrBounds, OutlierClipper};
pub use scaler::{ColumnScaler, ScaleParams};

use crate::error::{PreprocessingError, Result};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A step that learns parameters from a reference frame and applies them.
pub trait Transformer {
    /// Name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Learn parameters from `df`.
    fn fit(&mut self, df: &DataFrame) -> Result<()>;

    /// Apply the learned parameters, returning a new frame.
    fn transform(&self, df: &DataFrame) -> Result<DataFrame>;

    /// Whether `transform` can run.
    fn is_fitted(&self) -> bool;

    /// Fit on `df`, then transform it.
    fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }
}

/// Fitted-or-not state of a transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "stats", rename_all = "snake_case")]
pub enum FitState<T> {
    Unfitted,
    Fitted(T),
}

impl<T> Default for FitState<T> {
    fn default() -> Self {
        FitState::Unfitted
    }
}

/// Saved transformer settings that disagree with the pipeline configuration.
pub(crate) fn settings_mismatch(
    transformer: &str,
    detail: impl fmt::Display,
) -> PreprocessingError {
    PreprocessingError::InvalidConfig(format!(
        "saved {} does not match the configuration: {}",
        transformer, detail
    ))
}

impl<T> FitState<T> {
    /// Borrow the fitted statistics, or fail with
    /// [`PreprocessingError::NotFitted`] naming `transformer`.
    pub fn fitted(&self, transformer: &str) -> Result<&T> {
        match self {
            FitState::Fitted(stats) => Ok(stats),
            FitState::Unfitted => Err(PreprocessingError::not_fitted(transformer)),
        }
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self, FitState::Fitted(_))
    }
}
