//! Standard and min-max scaling.

use super::{FitState, Transformer, settings_mismatch};
use crate::config::ScalerKind;
use crate::error::{PreprocessingError, Result};
use crate::utils::{column_series, mean, numeric_values, population_std, present};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const NAME: &str = "ColumnScaler";

/// Learned parameters of one column, as `x' = (x - offset) / scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleParams {
    pub offset: f64,
    pub scale: f64,
}

impl ScaleParams {
    fn learn(kind: ScalerKind, column: &str, values: &[f64]) -> Result<Self> {
        let no_values = || PreprocessingError::NoValidValues(column.to_string());

        let (offset, scale) = match kind {
            ScalerKind::Standard => {
                let mean = mean(values).ok_or_else(no_values)?;
                let std = population_std(values).ok_or_else(no_values)?;
                (mean, std)
            }
            ScalerKind::MinMax => {
                let min = values.iter().copied().reduce(f64::min).ok_or_else(no_values)?;
                let max = values.iter().copied().reduce(f64::max).ok_or_else(no_values)?;
                (min, max - min)
            }
        };

        let scale = if scale == 0.0 {
            warn!("Column '{}' is constant; scaling with a factor of 1", column);
            1.0
        } else {
            scale
        };

        Ok(Self { offset, scale })
    }

    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.offset) / self.scale
    }
}

/// Scales selected numeric columns with statistics learned at fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScaler {
    columns: Vec<String>,
    kind: ScalerKind,
    state: FitState<Vec<(String, ScaleParams)>>,
}

impl ColumnScaler {
    pub fn new(columns: Vec<String>, kind: ScalerKind) -> Self {
        Self {
            columns,
            kind,
            state: FitState::Unfitted,
        }
    }

    /// Construct from a kind name, `"standard"` or `"min_max"`.
    pub fn from_kind(columns: Vec<String>, kind: &str) -> Result<Self> {
        Ok(Self::new(columns, kind.parse()?))
    }

    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    pub fn params_for(&self, column: &str) -> Option<ScaleParams> {
        match &self.state {
            FitState::Fitted(params) => params.iter().find(|(c, _)| c == column).map(|(_, p)| *p),
            FitState::Unfitted => None,
        }
    }

    /// Adopt the fitted parameters of a deserialized scaler built with the same settings.
    pub(crate) fn restore_state(&mut self, saved: ColumnScaler) -> Result<()> {
        if saved.columns != self.columns || saved.kind != self.kind {
            return Err(settings_mismatch(NAME, "columns or kind differ"));
        }
        if let FitState::Fitted(params) = &saved.state {
            if !params.iter().map(|(c, _)| c).eq(self.columns.iter()) {
                return Err(settings_mismatch(NAME, "parameters do not cover the columns"));
            }
            if params
                .iter()
                .any(|(_, p)| !p.offset.is_finite() || !p.scale.is_finite() || p.scale == 0.0)
            {
                return Err(settings_mismatch(NAME, "scale parameters must be finite and non-zero"));
            }
        }

        self.state = saved.state;
        Ok(())
    }
}

impl Transformer for ColumnScaler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        let mut learned = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            let values = present(&numeric_values(column_series(df, column)?)?);
            let params = ScaleParams::learn(self.kind, column, &values)?;
            debug!(
                "Scale params for '{}': offset={}, scale={}",
                column, params.offset, params.scale
            );
            learned.push((column.clone(), params));
        }

        info!("Fitted {} ({:?}) on {} column(s)", NAME, self.kind, learned.len());
        self.state = FitState::Fitted(learned);
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let learned = self.state.fitted(NAME)?;
        let mut out = df.clone();

        for (column, params) in learned {
            let scaled: Vec<Option<f64>> = numeric_values(column_series(df, column)?)?
                .into_iter()
                .map(|v| v.map(|x| params.apply(x)))
                .collect();
            out.replace(column, Series::new(column.as_str().into(), scaled))?;
        }

        Ok(out)
    }

    fn is_fitted(&self) -> bool {
        self.state.is_fitted()
    }
}
