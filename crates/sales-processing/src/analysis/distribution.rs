//! Categorical distribution comparison between two frames.

use crate::error::{PreprocessingError, Result};
use crate::utils::{
    column_series, integer_values, is_float_dtype, is_numeric_dtype, numeric_values, round_to,
    text_values,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Verdict of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    Similar,
    NotSimilar,
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Similar => f.write_str("similar"),
            Self::NotSimilar => f.write_str("not similar"),
        }
    }
}

/// Share of the leading category in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    /// Smallest category value (numeric or lexicographic order).
    pub category: String,
    /// Percentage of non-null rows holding `category`.
    pub share: f64,
}

/// Result of [`DistributionComparator::compare`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionComparison {
    pub column: String,
    pub first: CategoryShare,
    pub second: CategoryShare,
    /// `|first.share - second.share|`, rounded to two decimals.
    pub difference: f64,
    pub threshold: f64,
    pub similarity: Similarity,
}

impl DistributionComparison {
    pub fn is_similar(&self) -> bool {
        self.similarity == Similarity::Similar
    }
}

/// Compares the share of a column's first category across two frames.
///
/// The category is the first one after sorting distinct values by value,
/// not by frequency.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributionComparator;

impl DistributionComparator {
    pub fn compare(
        a: &DataFrame,
        b: &DataFrame,
        column: &str,
        threshold: f64,
    ) -> Result<DistributionComparison> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(PreprocessingError::InvalidConfig(format!(
                "similarity threshold must be a non-negative number, got {}",
                threshold
            )));
        }

        let first = leading_share(column_series(a, column)?)?;
        let second = leading_share(column_series(b, column)?)?;
        let difference = round_to((first.share - second.share).abs(), 2);
        let similarity = if difference <= threshold {
            Similarity::Similar
        } else {
            Similarity::NotSimilar
        };

        debug!(
            "'{}': {:.2}% ({}) vs {:.2}% ({}), difference {:.2} -> {}",
            column,
            first.share,
            first.category,
            second.share,
            second.category,
            difference,
            similarity
        );

        Ok(DistributionComparison {
            column: column.to_string(),
            first,
            second,
            difference,
            threshold,
            similarity,
        })
    }
}

fn share_of_min<T: Clone + PartialEq>(
    values: Vec<T>,
    cmp: impl Fn(&T, &T) -> std::cmp::Ordering,
) -> Option<(T, f64)> {
    let smallest = values.iter().min_by(|x, y| cmp(x, y))?.clone();
    let count = values.iter().filter(|v| **v == smallest).count();
    Some((smallest, count as f64 * 100.0 / values.len() as f64))
}

fn leading_share(series: &Series) -> Result<CategoryShare> {
    let no_values = || PreprocessingError::NoValidValues(series.name().to_string());
    let dtype = series.dtype();

    let (category, share) = if is_float_dtype(dtype) {
        let values: Vec<f64> = numeric_values(series)?.into_iter().flatten().collect();
        let (value, share) = share_of_min(values, f64::total_cmp).ok_or_else(no_values)?;
        (value.to_string(), share)
    } else if is_numeric_dtype(dtype) {
        let values: Vec<i64> = integer_values(series)?.into_iter().flatten().collect();
        let (value, share) = share_of_min(values, i64::cmp).ok_or_else(no_values)?;
        (value.to_string(), share)
    } else {
        let values: Vec<String> = text_values(series)?.into_iter().flatten().collect();
        share_of_min(values, String::cmp).ok_or_else(no_values)?
    };

    Ok(CategoryShare { category, share })
}
