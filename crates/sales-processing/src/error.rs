//! Custom error types for the preprocessing pipeline and sales analytics.
//!
//! This module provides the error hierarchy using `thiserror`. Errors are
//! serializable as `{code, message}` so the CLI can emit them as JSON.
//!
//! The propagation policy differs per component: configuration and
//! not-fitted errors abort a pipeline run, while holiday lookup failures are
//! logged and passed through by the date feature step (see
//! [`crate::holidays::HolidayLookupError`]).

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the preprocessing pipeline.
#[derive(Error, Debug)]
pub enum PreprocessingError {
    /// A stateful transformer was used before `fit`.
    #[error("{transformer} has not been fitted yet; call fit() before transform()")]
    NotFitted { transformer: String },

    /// Invalid configuration provided (unknown strategy, bad threshold, ...).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A date value could not be parsed.
    #[error("Failed to parse '{value}' in column '{column}' as a date")]
    DateParse { column: String, value: String },

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Column exists but holds a type the operation cannot use.
    #[error("Column '{column}' has type {found}, expected {expected}")]
    InvalidColumnType {
        column: String,
        expected: String,
        found: String,
    },

    /// No valid values found in a column for computation.
    #[error("No valid values found in column '{0}'")]
    NoValidValues(String),

    /// Type conversion failed.
    #[error("Failed to convert column '{column}' to {target_type}: {reason}")]
    TypeConversionFailed {
        column: String,
        target_type: String,
        reason: String,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PreprocessingError>,
    },
}

impl PreprocessingError {
    /// Shorthand for [`PreprocessingError::NotFitted`].
    pub fn not_fitted(transformer: impl Into<String>) -> Self {
        Self::NotFitted {
            transformer: transformer.into(),
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PreprocessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFitted { .. } => "NOT_FITTED",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::DateParse { .. } => "PARSE_ERROR",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidColumnType { .. } => "INVALID_COLUMN_TYPE",
            Self::NoValidValues(_) => "NO_VALID_VALUES",
            Self::TypeConversionFailed { .. } => "TYPE_CONVERSION_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Strip any context layers and return the underlying error.
    pub fn root(&self) -> &PreprocessingError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error comes from using an unfitted transformer.
    pub fn is_not_fitted(&self) -> bool {
        matches!(self.root(), Self::NotFitted { .. })
    }

    /// Check if this error is a schema/validation problem with the input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.root(),
            Self::ColumnNotFound(_) | Self::InvalidColumnType { .. }
        )
    }
}

impl Serialize for PreprocessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PreprocessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for preprocessing operations.
pub type Result<T> = std::result::Result<T, PreprocessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PreprocessingError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PreprocessingError::Io(e).with_context(context))
    }
}
