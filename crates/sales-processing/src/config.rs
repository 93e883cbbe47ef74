//! Configuration types for the preprocessing pipeline.
//!
//! This module provides the per-step strategy enums and the pipeline
//! configuration, using the builder pattern for ergonomic setup. Every enum
//! can also be parsed from its string name; an unknown name is an
//! [`PreprocessingError::InvalidConfig`] raised at construction time.

use crate::error::PreprocessingError;
use crate::schema::ColumnRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Strategy for imputing missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImputationStrategy {
    /// Mean of non-missing values (numeric columns)
    Mean,
    /// Median of non-missing values (numeric columns)
    #[default]
    Median,
    /// Most frequent value; ties resolve to the smallest value
    MostFrequent,
    /// A caller-supplied fill value
    Constant,
}

impl ImputationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::MostFrequent => "most_frequent",
            Self::Constant => "constant",
        }
    }
}

impl FromStr for ImputationStrategy {
    type Err = PreprocessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "most_frequent" | "mode" => Ok(Self::MostFrequent),
            "constant" => Ok(Self::Constant),
            other => Err(PreprocessingError::InvalidConfig(format!(
                "unknown imputation strategy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ImputationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fill value for constant imputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for FillValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "'{}'", s),
        }
    }
}

/// Outlier handling method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    /// Clip values to `[Q1 - factor*IQR, Q3 + factor*IQR]`
    #[default]
    Iqr,
    /// Drop rows where any column's |z| reaches the threshold
    ZScore,
}

impl FromStr for OutlierMethod {
    type Err = PreprocessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iqr" => Ok(Self::Iqr),
            "z_score" | "zscore" => Ok(Self::ZScore),
            other => Err(PreprocessingError::InvalidConfig(format!(
                "unknown outlier method '{}'",
                other
            ))),
        }
    }
}

/// When IQR bounds are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoundsPolicy {
    /// Learn bounds at fit time and reuse them on every transform
    #[default]
    Fitted,
    /// Recompute quartiles from each frame passed to transform
    PerCall,
}

/// Target type for column coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// Categorical labels, stored as UTF-8 strings
    #[default]
    Category,
    String,
    Int32,
    Int64,
    Float64,
    Boolean,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::String => "string",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Boolean => "boolean",
        }
    }
}

impl FromStr for TargetType {
    type Err = PreprocessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "category" | "categorical" => Ok(Self::Category),
            "string" | "str" => Ok(Self::String),
            "int32" => Ok(Self::Int32),
            "int" | "int64" => Ok(Self::Int64),
            "float" | "float64" => Ok(Self::Float64),
            "bool" | "boolean" => Ok(Self::Boolean),
            other => Err(PreprocessingError::InvalidConfig(format!(
                "unknown target type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scaling method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    /// `(x - mean) / std`
    #[default]
    Standard,
    /// `(x - min) / (max - min)`
    MinMax,
}

impl FromStr for ScalerKind {
    type Err = PreprocessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "min_max" | "minmax" => Ok(Self::MinMax),
            other => Err(PreprocessingError::InvalidConfig(format!(
                "unknown scaler kind '{}' (expected 'standard' or 'min_max')",
                other
            ))),
        }
    }
}

/// Configuration for the preprocessing pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use sales_processing::config::{PipelineConfig, OutlierMethod, ScalerKind};
///
/// let config = PipelineConfig::builder()
///     .impute_columns(["CompetitionDistance"])
///     .outlier_method(OutlierMethod::Iqr)
///     .scaler_kind(ScalerKind::MinMax)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Columns filled by the imputer.
    /// Default: ["CompetitionDistance"]
    pub impute_columns: Vec<String>,

    /// Imputation strategy.
    /// Default: Median
    pub imputation_strategy: ImputationStrategy,

    /// Fill value, required when the strategy is `Constant`.
    pub fill_value: Option<FillValue>,

    /// Outlier handling method.
    /// Default: Iqr
    pub outlier_method: OutlierMethod,

    /// IQR multiplier for the clipping bounds.
    /// Default: 1.5
    pub iqr_factor: f64,

    /// Absolute z-score at or above which a row is dropped.
    /// Default: 3.0
    pub z_threshold: f64,

    /// Whether IQR bounds are fitted once or recomputed per transform.
    /// Default: Fitted
    pub bounds_policy: BoundsPolicy,

    /// Float columns the outlier step must leave alone (identifiers, targets).
    /// Default: ["Store"]
    pub outlier_exclude: Vec<String>,

    /// Column-type registry; the outlier step reads its float columns.
    /// Default: the store sales schema
    pub column_types: ColumnRegistry,

    /// Date column parsed by the coercer and expanded into calendar features.
    /// Default: "Date"
    pub date_column: String,

    /// Numeric day-of-week column used for the weekday/weekend flags.
    /// Default: "DayOfWeek"
    pub day_of_week_column: String,

    /// Columns cast by the coercer.
    /// Default: ["StateHoliday", "StoreType", "Assortment", "PromoInterval"]
    pub coerce_columns: Vec<String>,

    /// Target type for `coerce_columns`.
    /// Default: Category
    pub coerce_to: TargetType,

    /// Scaling method.
    /// Default: Standard
    pub scaler_kind: ScalerKind,

    /// Columns scaled by the final step.
    /// Default: ["CompetitionDistance"]
    pub scale_columns: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            impute_columns: vec!["CompetitionDistance".to_string()],
            imputation_strategy: ImputationStrategy::default(),
            fill_value: None,
            outlier_method: OutlierMethod::default(),
            iqr_factor: 1.5,
            z_threshold: 3.0,
            bounds_policy: BoundsPolicy::default(),
            outlier_exclude: vec!["Store".to_string()],
            column_types: ColumnRegistry::sales_default(),
            date_column: "Date".to_string(),
            day_of_week_column: "DayOfWeek".to_string(),
            coerce_columns: ["StateHoliday", "StoreType", "Assortment", "PromoInterval"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            coerce_to: TargetType::default(),
            scaler_kind: ScalerKind::default(),
            scale_columns: vec!["CompetitionDistance".to_string()],
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.iqr_factor.is_finite() || self.iqr_factor < 0.0 {
            return Err(ConfigValidationError::InvalidParameter {
                field: "iqr_factor".to_string(),
                value: self.iqr_factor,
            });
        }

        if !self.z_threshold.is_finite() || self.z_threshold <= 0.0 {
            return Err(ConfigValidationError::InvalidParameter {
                field: "z_threshold".to_string(),
                value: self.z_threshold,
            });
        }

        if self.imputation_strategy == ImputationStrategy::Constant && self.fill_value.is_none() {
            return Err(ConfigValidationError::MissingFillValue);
        }

        if self.date_column.trim().is_empty() {
            return Err(ConfigValidationError::EmptyColumnName("date_column"));
        }

        if self.day_of_week_column.trim().is_empty() {
            return Err(ConfigValidationError::EmptyColumnName("day_of_week_column"));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for '{field}': {value}")]
    InvalidParameter { field: String, value: f64 },

    #[error("Constant imputation requires a fill value")]
    MissingFillValue,

    #[error("Column name for '{0}' must not be empty")]
    EmptyColumnName(&'static str),
}

impl From<ConfigValidationError> for PreprocessingError {
    fn from(err: ConfigValidationError) -> Self {
        PreprocessingError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    impute_columns: Option<Vec<String>>,
    imputation_strategy: Option<ImputationStrategy>,
    fill_value: Option<FillValue>,
    outlier_method: Option<OutlierMethod>,
    iqr_factor: Option<f64>,
    z_threshold: Option<f64>,
    bounds_policy: Option<BoundsPolicy>,
    outlier_exclude: Option<Vec<String>>,
    column_types: Option<ColumnRegistry>,
    date_column: Option<String>,
    day_of_week_column: Option<String>,
    coerce_columns: Option<Vec<String>>,
    coerce_to: Option<TargetType>,
    scaler_kind: Option<ScalerKind>,
    scale_columns: Option<Vec<String>>,
}

fn owned<I, S>(columns: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    columns.into_iter().map(Into::into).collect()
}

impl PipelineConfigBuilder {
    /// Set the columns filled by the imputer.
    pub fn impute_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.impute_columns = Some(owned(columns));
        self
    }

    /// Set the imputation strategy.
    pub fn imputation_strategy(mut self, strategy: ImputationStrategy) -> Self {
        self.imputation_strategy = Some(strategy);
        self
    }

    /// Set the constant fill value.
    pub fn fill_value(mut self, value: FillValue) -> Self {
        self.fill_value = Some(value);
        self
    }

    /// Set the outlier handling method.
    pub fn outlier_method(mut self, method: OutlierMethod) -> Self {
        self.outlier_method = Some(method);
        self
    }

    /// Set the IQR multiplier.
    pub fn iqr_factor(mut self, factor: f64) -> Self {
        self.iqr_factor = Some(factor);
        self
    }

    /// Set the z-score threshold.
    pub fn z_threshold(mut self, threshold: f64) -> Self {
        self.z_threshold = Some(threshold);
        self
    }

    /// Choose fitted or per-call IQR bounds.
    pub fn bounds_policy(mut self, policy: BoundsPolicy) -> Self {
        self.bounds_policy = Some(policy);
        self
    }

    /// Set the columns excluded from outlier handling.
    pub fn outlier_exclude<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outlier_exclude = Some(owned(columns));
        self
    }

    /// Set the column-type registry.
    pub fn column_types(mut self, registry: ColumnRegistry) -> Self {
        self.column_types = Some(registry);
        self
    }

    /// Set the date column name.
    pub fn date_column(mut self, name: impl Into<String>) -> Self {
        self.date_column = Some(name.into());
        self
    }

    /// Set the day-of-week column name.
    pub fn day_of_week_column(mut self, name: impl Into<String>) -> Self {
        self.day_of_week_column = Some(name.into());
        self
    }

    /// Set the columns cast by the coercer.
    pub fn coerce_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.coerce_columns = Some(owned(columns));
        self
    }

    /// Set the coercion target type.
    pub fn coerce_to(mut self, target: TargetType) -> Self {
        self.coerce_to = Some(target);
        self
    }

    /// Set the scaling method.
    pub fn scaler_kind(mut self, kind: ScalerKind) -> Self {
        self.scaler_kind = Some(kind);
        self
    }

    /// Set the columns scaled by the final step.
    pub fn scale_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scale_columns = Some(owned(columns));
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            impute_columns: self.impute_columns.unwrap_or(defaults.impute_columns),
            imputation_strategy: self.imputation_strategy.unwrap_or_default(),
            fill_value: self.fill_value,
            outlier_method: self.outlier_method.unwrap_or_default(),
            iqr_factor: self.iqr_factor.unwrap_or(defaults.iqr_factor),
            z_threshold: self.z_threshold.unwrap_or(defaults.z_threshold),
            bounds_policy: self.bounds_policy.unwrap_or_default(),
            outlier_exclude: self.outlier_exclude.unwrap_or(defaults.outlier_exclude),
            column_types: self.column_types.unwrap_or(defaults.column_types),
            date_column: self.date_column.unwrap_or(defaults.date_column),
            day_of_week_column: self
                .day_of_week_column
                .unwrap_or(defaults.day_of_week_column),
            coerce_columns: self.coerce_columns.unwrap_or(defaults.coerce_columns),
            coerce_to: self.coerce_to.unwrap_or_default(),
            scaler_kind: self.scaler_kind.unwrap_or_default(),
            scale_columns: self.scale_columns.unwrap_or(defaults.scale_columns),
        };

        config.validate()?;
        Ok(config)
    }
}
