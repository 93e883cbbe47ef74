//! Sales totals per public holiday.

use crate::error::Result;
use crate::holidays::NOT_HOLIDAY;
use crate::transform::DateFeatureNames;
use crate::utils::{column_series, numeric_values, text_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidaySales {
    pub holiday: String,
    pub total_sales: f64,
}

/// Sums sales per holiday name, skipping regular days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidaySalesAnalyzer {
    pub holiday_column: String,
    pub sales_column: String,
}

impl Default for HolidaySalesAnalyzer {
    fn default() -> Self {
        Self {
            holiday_column: DateFeatureNames::HOLIDAY_NAME.to_string(),
            sales_column: "Sales".to_string(),
        }
    }
}

impl HolidaySalesAnalyzer {
    /// Totals sorted by sales, highest first; ties by holiday name.
    pub fn analyze(&self, df: &DataFrame) -> Result<Vec<HolidaySales>> {
        let holidays = text_values(column_series(df, &self.holiday_column)?)?;
        let sales = numeric_values(column_series(df, &self.sales_column)?)?;

        let mut totals: HashMap<String, f64> = HashMap::new();
        for (holiday, amount) in holidays.into_iter().zip(sales) {
            match holiday {
                Some(name) if name != NOT_HOLIDAY => {
                    *totals.entry(name).or_insert(0.0) += amount.unwrap_or(0.0);
                }
                _ => {}
            }
        }

        let mut rows: Vec<HolidaySales> = totals
            .into_iter()
            .map(|(holiday, total_sales)| HolidaySales {
                holiday,
                total_sales,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.total_sales
                .total_cmp(&a.total_sales)
                .then_with(|| a.holiday.cmp(&b.holiday))
        });

        debug!("Sales recorded on {} distinct holiday(s)", rows.len());
        Ok(rows)
    }

    /// [`HolidaySalesAnalyzer::analyze`] as a two-column frame.
    pub fn analyze_frame(&self, df: &DataFrame) -> Result<DataFrame> {
        let rows = self.analyze(df)?;
        let names: Vec<&str> = rows.iter().map(|r| r.holiday.as_str()).collect();
        let totals: Vec<f64> = rows.iter().map(|r| r.total_sales).collect();

        Ok(DataFrame::new(vec![
            Series::new(self.holiday_column.as_str().into(), names).into(),
            Series::new(self.sales_column.as_str().into(), totals).into(),
        ])?)
    }
}
