//! Per-store promotion impact.
//!
//! For each store the analyzer sums sales on promo and non-promo days and
//! reports `ratio = no_promo * 100 / with_promo`. Division follows IEEE
//! semantics: a store without promo sales gets `+inf` (or `NaN` when it has
//! no sales at all); these sort after every finite ratio.

use crate::error::Result;
use crate::utils::{column_series, integer_values, numeric_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Ratio below which a store is considered to depend on promotions.
pub const NEED_PROMO_RATIO: f64 = 60.0;

/// Number of trailing rows reported as performing better without promo.
pub const BETTER_WITHOUT_PROMO_COUNT: usize = 5;

/// One store's promo totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorePromoImpact {
    pub store: i64,
    /// `no_promo_sales * 100 / promo_sales`.
    pub ratio: f64,
    pub no_promo_sales: f64,
    pub promo_sales: f64,
}

/// Ordering that places finite ratios first, then `+inf`, then `NaN`.
fn ratio_order(a: f64, b: f64) -> Ordering {
    a.is_nan().cmp(&b.is_nan()).then(a.total_cmp(&b))
}

/// Stores sorted ascending by ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoImpactReport {
    pub stores: Vec<StorePromoImpact>,
}

impl PromoImpactReport {
    /// Stores whose ratio is below [`NEED_PROMO_RATIO`].
    pub fn need_promo(&self) -> Vec<&StorePromoImpact> {
        self.stores
            .iter()
            .filter(|s| s.ratio < NEED_PROMO_RATIO)
            .collect()
    }

    /// The last [`BETTER_WITHOUT_PROMO_COUNT`] rows of the sorted table.
    pub fn better_without_promo(&self) -> &[StorePromoImpact] {
        let start = self.stores.len().saturating_sub(BETTER_WITHOUT_PROMO_COUNT);
        &self.stores[start..]
    }

    pub fn get(&self, store: i64) -> Option<&StorePromoImpact> {
        self.stores.iter().find(|s| s.store == store)
    }

    /// Table with columns `Store`, `ratio`, `no_promo_sales`, `promo_sales`.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let store: Vec<i64> = self.stores.iter().map(|s| s.store).collect();
        let ratio: Vec<f64> = self.stores.iter().map(|s| s.ratio).collect();
        let no_promo: Vec<f64> = self.stores.iter().map(|s| s.no_promo_sales).collect();
        let promo: Vec<f64> = self.stores.iter().map(|s| s.promo_sales).collect();

        Ok(DataFrame::new(vec![
            Series::new("Store".into(), store).into(),
            Series::new("ratio".into(), ratio).into(),
            Series::new("no_promo_sales".into(), no_promo).into(),
            Series::new("promo_sales".into(), promo).into(),
        ])?)
    }
}

/// Computes [`PromoImpactReport`]s from daily store sales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoImpactAnalyzer {
    pub store_column: String,
    pub promo_column: String,
    pub sales_column: String,
}

impl Default for PromoImpactAnalyzer {
    fn default() -> Self {
        Self {
            store_column: "Store".to_string(),
            promo_column: "Promo".to_string(),
            sales_column: "Sales".to_string(),
        }
    }
}

impl PromoImpactAnalyzer {
    pub fn analyze(&self, df: &DataFrame) -> Result<PromoImpactReport> {
        let stores = integer_values(column_series(df, &self.store_column)?)?;
        let promos = integer_values(column_series(df, &self.promo_column)?)?;
        let sales = numeric_values(column_series(df, &self.sales_column)?)?;

        // store -> (no_promo, with_promo)
        let mut totals: BTreeMap<i64, (f64, f64)> = BTreeMap::new();
        let mut skipped = 0usize;

        for ((store, promo), amount) in stores.into_iter().zip(promos).zip(sales) {
            let (Some(store), Some(promo)) = (store, promo) else {
                skipped += 1;
                continue;
            };
            let amount = amount.unwrap_or(0.0);
            match promo {
                0 => totals.entry(store).or_insert((0.0, 0.0)).0 += amount,
                1 => totals.entry(store).or_insert((0.0, 0.0)).1 += amount,
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!("Skipped {} row(s) without a store id or a 0/1 promo flag", skipped);
        }

        let mut rows: Vec<StorePromoImpact> = totals
            .into_iter()
            .map(|(store, (no_promo, with_promo))| StorePromoImpact {
                store,
                ratio: no_promo * 100.0 / with_promo,
                no_promo_sales: no_promo,
                promo_sales: with_promo,
            })
            .collect();
        rows.sort_by(|a, b| ratio_order(a.ratio, b.ratio));

        let report = PromoImpactReport { stores: rows };
        info!(
            "Promo impact for {} store(s); {} need promo",
            report.stores.len(),
            report.need_promo().len()
        );
        Ok(report)
    }
}
