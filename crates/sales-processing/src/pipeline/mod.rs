//! Preprocessing pipeline.
//!
//! [`Pipeline`] chains the five transformers in a fixed order, records the
//! output column layout at fit, and can be persisted as JSON so the exact
//! statistics learned on training data are reused at inference.
//!
//! # Example
//!
//! ```rust,ignore
//! use sales_processing::{Pipeline, PipelineConfig};
//!
//! let mut pipeline = Pipeline::from_config(&PipelineConfig::default())?;
//! let features = pipeline.fit_transform(&train)?;
//! pipeline.save_json("pipeline.json")?;
//!
//! let restored = Pipeline::load_json("pipeline.json")?;
//! let scores = restored.predict(&incoming, &model)?;
//! ```

use crate::config::PipelineConfig;
use crate::error::{PreprocessingError, Result, ResultExt};
use crate::holidays::HolidayCalendar;
use crate::transform::{
    ColumnScaler, DateFeatureExpander, MissingValueImputer, OutlierClipper, Transformer,
    TypeCoercer, settings_mismatch,
};
use crate::utils::{column_names, require_columns};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Stages of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Imputation,
    OutlierHandling,
    TypeCoercion,
    DateFeatures,
    Scaling,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 5] = [
        Self::Imputation,
        Self::OutlierHandling,
        Self::TypeCoercion,
        Self::DateFeatures,
        Self::Scaling,
    ];

    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Imputation => "Imputing Values",
            Self::OutlierHandling => "Handling Outliers",
            Self::TypeCoercion => "Coercing Types",
            Self::DateFeatures => "Expanding Dates",
            Self::Scaling => "Scaling Columns",
        }
    }
}

/// A trained model consuming the pipeline's output.
pub trait Scorer {
    /// One prediction per row of `features`.
    fn predict(&self, features: &DataFrame) -> Result<Vec<f64>>;
}

/// The fitted preprocessing chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    config: PipelineConfig,
    imputer: MissingValueImputer,
    outliers: OutlierClipper,
    coercer: TypeCoercer,
    dates: DateFeatureExpander,
    scaler: ColumnScaler,
    output_columns: Option<Vec<String>>,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Build an unfitted pipeline from a configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;

        let imputer = MissingValueImputer::new(
            config.impute_columns.clone(),
            config.imputation_strategy,
            config.fill_value.clone(),
        )?;
        let outliers = OutlierClipper::new(
            config.outlier_method,
            config.iqr_factor,
            config.z_threshold,
            config.bounds_policy,
            &config.column_types,
            &config.outlier_exclude,
        )?;
        let coercer = TypeCoercer::new(
            Some(config.date_column.clone()),
            config.coerce_columns.clone(),
            config.coerce_to,
        );
        let dates = DateFeatureExpander::new(
            config.date_column.clone(),
            config.day_of_week_column.clone(),
        );
        let scaler = ColumnScaler::new(config.scale_columns.clone(), config.scaler_kind);

        Ok(Self {
            config: config.clone(),
            imputer,
            outliers,
            coercer,
            dates,
            scaler,
            output_columns: None,
        })
    }

    /// Use another holiday calendar for the date features.
    ///
    /// The calendar is not persisted; a pipeline loaded from JSON uses the
    /// German calendar until this is called again.
    pub fn with_calendar(mut self, calendar: Arc<dyn HolidayCalendar>) -> Self {
        self.dates = self.dates.with_calendar(calendar);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Column layout recorded at fit.
    pub fn output_columns(&self) -> Option<&[String]> {
        self.output_columns.as_deref()
    }

    fn steps(&self) -> [&dyn Transformer; 5] {
        [
            &self.imputer,
            &self.outliers,
            &self.coercer,
            &self.dates,
            &self.scaler,
        ]
    }

    fn steps_mut(&mut self) -> [&mut dyn Transformer; 5] {
        [
            &mut self.imputer,
            &mut self.outliers,
            &mut self.coercer,
            &mut self.dates,
            &mut self.scaler,
        ]
    }

    fn stage_error(stage: PipelineStage, err: PreprocessingError) -> PreprocessingError {
        err.with_context(format!("{} failed", stage.display_name()))
    }

    /// Transform `df`, then score it.
    pub fn predict(&self, df: &DataFrame, scorer: &dyn Scorer) -> Result<Vec<f64>> {
        let features = self.transform(df)?;
        let predictions = scorer.predict(&features)?;

        if predictions.len() != features.height() {
            warn!(
                "Scorer returned {} prediction(s) for {} row(s)",
                predictions.len(),
                features.height()
            );
        }
        Ok(predictions)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Serialize configuration and fitted statistics.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restore a pipeline serialized with [`Pipeline::to_json`].
    ///
    /// The steps are rebuilt from the saved configuration; saved fitted
    /// statistics are only adopted when their step settings match it.
    pub fn from_json(json: &str) -> Result<Self> {
        let saved: Pipeline = serde_json::from_str(json)?;
        let mut pipeline = Self::from_config(&saved.config)?;

        pipeline.imputer.restore_state(saved.imputer)?;
        pipeline.outliers.restore_state(saved.outliers)?;
        pipeline.scaler.restore_state(saved.scaler)?;
        if saved.coercer != pipeline.coercer {
            return Err(settings_mismatch("TypeCoercer", "columns or target type differ"));
        }
        if saved.dates.date_column() != pipeline.dates.date_column()
            || saved.dates.day_of_week_column() != pipeline.dates.day_of_week_column()
        {
            return Err(settings_mismatch("DateFeatureExpander", "date columns differ"));
        }

        if let Some(columns) = saved.output_columns {
            if !pipeline.steps().iter().all(|step| step.is_fitted()) {
                return Err(PreprocessingError::InvalidConfig(
                    "saved pipeline has an output layout but unfitted steps".to_string(),
                ));
            }
            pipeline.output_columns = Some(columns);
        }
        Ok(pipeline)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)
            .context(format!("Failed to write pipeline to {}", path.display()))?;
        info!("Saved pipeline to {}", path.display());
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .context(format!("Failed to read pipeline from {}", path.display()))?;
        let pipeline = Self::from_json(&json)
            .context(format!("Invalid pipeline file {}", path.display()))?;
        info!(
            "Loaded pipeline from {} (fitted: {})",
            path.display(),
            pipeline.is_fitted()
        );
        Ok(pipeline)
    }
}

impl Transformer for Pipeline {
    fn name(&self) -> &'static str {
        "Pipeline"
    }

    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        let start_time = Instant::now();
        info!("Fitting pipeline on {} rows x {} columns", df.height(), df.width());

        // Fit a copy so a failing stage leaves the current statistics in place.
        let mut next = self.clone();
        next.output_columns = None;

        let mut current = df.clone();
        for (stage, step) in PipelineStage::ALL.into_iter().zip(next.steps_mut()) {
            debug!("Fitting stage: {}", stage.display_name());
            step.fit(&current)
                .map_err(|e| Self::stage_error(stage, e))?;
            current = step
                .transform(&current)
                .map_err(|e| Self::stage_error(stage, e))?;
        }

        let columns = column_names(&current);
        info!(
            "Pipeline fitted in {:.2?}; output has {} columns",
            start_time.elapsed(),
            columns.len()
        );
        next.output_columns = Some(columns);
        *self = next;
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let columns = self
            .output_columns
            .as_ref()
            .ok_or_else(|| PreprocessingError::not_fitted("Pipeline"))?;

        let mut current = df.clone();
        for (stage, step) in PipelineStage::ALL.into_iter().zip(self.steps()) {
            current = step
                .transform(&current)
                .map_err(|e| Self::stage_error(stage, e))?;
        }

        require_columns(&current, columns)?;
        if current.width() > columns.len() {
            debug!(
                "Dropping {} column(s) not present at fit",
                current.width() - columns.len()
            );
        }
        Ok(current.select(columns.iter().cloned())?)
    }

    fn is_fitted(&self) -> bool {
        self.output_columns.is_some()
    }
}
