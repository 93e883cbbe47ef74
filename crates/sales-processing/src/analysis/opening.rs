//! Weekday opening patterns and their weekend sales.
//!
//! A store is "open all weekdays" when it has an open row on every distinct
//! Monday to Friday date found in the frame. Weekdays come from the date
//! itself, not from the `DayOfWeek` column.

use crate::error::Result;
use crate::utils::{column_series, date_values, integer_values, numeric_values};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Weekday and weekend sales of one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreWeekSales {
    pub store: i64,
    pub weekday_sales: f64,
    pub weekend_sales: f64,
}

/// Stores split by whether they opened on every weekday, ordered by store id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayOpeningReport {
    /// Distinct Monday to Friday dates in the frame.
    pub weekday_dates: usize,
    pub open_all_weekdays: Vec<StoreWeekSales>,
    /// Stores open on at least one weekday, but not all of them.
    pub open_some_weekdays: Vec<StoreWeekSales>,
}

impl WeekdayOpeningReport {
    pub fn group(&self, all_weekdays: bool) -> &[StoreWeekSales] {
        if all_weekdays {
            &self.open_all_weekdays
        } else {
            &self.open_some_weekdays
        }
    }

    /// One group as a table with columns `Store`, `weekday_sales`, `weekend_sales`.
    pub fn group_frame(&self, all_weekdays: bool) -> Result<DataFrame> {
        let rows = self.group(all_weekdays);
        let store: Vec<i64> = rows.iter().map(|r| r.store).collect();
        let weekday: Vec<f64> = rows.iter().map(|r| r.weekday_sales).collect();
        let weekend: Vec<f64> = rows.iter().map(|r| r.weekend_sales).collect();

        Ok(DataFrame::new(vec![
            Series::new("Store".into(), store).into(),
            Series::new("weekday_sales".into(), weekday).into(),
            Series::new("weekend_sales".into(), weekend).into(),
        ])?)
    }
}

fn is_weekend(date: &NaiveDate) -> bool {
    date.weekday().number_from_monday() >= 6
}

/// Compares weekend sales of stores by their weekday opening pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayOpeningAnalyzer {
    pub store_column: String,
    pub date_column: String,
    pub open_column: String,
    pub sales_column: String,
}

impl Default for WeekdayOpeningAnalyzer {
    fn default() -> Self {
        Self {
            store_column: "Store".to_string(),
            date_column: "Date".to_string(),
            open_column: "Open".to_string(),
            sales_column: "Sales".to_string(),
        }
    }
}

impl WeekdayOpeningAnalyzer {
    pub fn analyze(&self, df: &DataFrame) -> Result<WeekdayOpeningReport> {
        let stores = integer_values(column_series(df, &self.store_column)?)?;
        let dates = date_values(column_series(df, &self.date_column)?)?;
        let open = integer_values(column_series(df, &self.open_column)?)?;
        let sales = numeric_values(column_series(df, &self.sales_column)?)?;

        let mut weekday_dates: BTreeSet<NaiveDate> = BTreeSet::new();
        let mut open_days: BTreeMap<i64, BTreeSet<NaiveDate>> = BTreeMap::new();
        // store -> (weekday, weekend)
        let mut totals: BTreeMap<i64, (f64, f64)> = BTreeMap::new();
        let mut skipped = 0usize;

        for (((store, date), open), amount) in stores.into_iter().zip(dates).zip(open).zip(sales) {
            let (Some(store), Some(date)) = (store, date) else {
                skipped += 1;
                continue;
            };

            let entry = totals.entry(store).or_insert((0.0, 0.0));
            let amount = amount.unwrap_or(0.0);
            if is_weekend(&date) {
                entry.1 += amount;
                continue;
            }

            entry.0 += amount;
            weekday_dates.insert(date);
            if open == Some(1) {
                open_days.entry(store).or_default().insert(date);
            }
        }

        if skipped > 0 {
            debug!("Skipped {} row(s) without a store id or date", skipped);
        }

        let mut report = WeekdayOpeningReport {
            weekday_dates: weekday_dates.len(),
            open_all_weekdays: Vec::new(),
            open_some_weekdays: Vec::new(),
        };
        for (store, days) in open_days {
            let (weekday_sales, weekend_sales) = totals.get(&store).copied().unwrap_or_default();
            let row = StoreWeekSales {
                store,
                weekday_sales,
                weekend_sales,
            };
            if days.len() == report.weekday_dates {
                report.open_all_weekdays.push(row);
            } else {
                report.open_some_weekdays.push(row);
            }
        }

        info!(
            "{} store(s) open on all {} weekday(s), {} on some",
            report.open_all_weekdays.len(),
            report.weekday_dates,
            report.open_some_weekdays.len()
        );
        Ok(report)
    }
}
