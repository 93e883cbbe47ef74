//! Calendar features derived from the date column.

use super::Transformer;
use crate::error::Result;
use crate::holidays::{GermanHolidays, HolidayCalendar, NOT_HOLIDAY};
use crate::utils::{column_series, date_values, integer_values, text_values};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error};

const NAME: &str = "DateFeatureExpander";

/// Names of the columns appended by [`DateFeatureExpander`].
pub struct DateFeatureNames;

impl DateFeatureNames {
    pub const QUARTER: &'static str = "quarter";
    pub const MONTH: &'static str = "month";
    pub const YEAR: &'static str = "year";
    pub const DAY_OF_YEAR: &'static str = "day_of_year";
    pub const IS_WEEKDAY: &'static str = "is_weekday";
    pub const IS_WEEKEND: &'static str = "is_weekend";
    pub const HOLIDAY_NAME: &'static str = "holiday_name";

    /// All feature columns, in the order they are appended.
    pub const ALL: [&'static str; 7] = [
        Self::QUARTER,
        Self::MONTH,
        Self::YEAR,
        Self::DAY_OF_YEAR,
        Self::IS_WEEKDAY,
        Self::IS_WEEKEND,
        Self::HOLIDAY_NAME,
    ];
}

fn default_calendar() -> Arc<dyn HolidayCalendar> {
    Arc::new(GermanHolidays)
}

/// Replaces the date column with calendar features.
///
/// The weekday/weekend flags read the numeric day-of-week column as
/// 1 = Monday … 7 = Sunday: `is_weekday = dow < 6`, `is_weekend = dow >= 6`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateFeatureExpander {
    date_column: String,
    day_of_week_column: String,
    #[serde(skip, default = "default_calendar")]
    calendar: Arc<dyn HolidayCalendar>,
}

impl DateFeatureExpander {
    /// Expander using the German public holiday calendar.
    pub fn new(date_column: impl Into<String>, day_of_week_column: impl Into<String>) -> Self {
        Self {
            date_column: date_column.into(),
            day_of_week_column: day_of_week_column.into(),
            calendar: default_calendar(),
        }
    }

    /// Swap the holiday calendar.
    pub fn with_calendar(mut self, calendar: Arc<dyn HolidayCalendar>) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn date_column(&self) -> &str {
        &self.date_column
    }

    pub fn day_of_week_column(&self) -> &str {
        &self.day_of_week_column
    }

    /// Resolve holiday names for each row.
    ///
    /// Lookup failures are fail-open: the row keeps its `prior` value and the
    /// error is logged, while every other step in the pipeline fails closed.
    fn holiday_names(
        &self,
        dates: &[Option<NaiveDate>],
        prior: Vec<Option<String>>,
    ) -> Vec<Option<String>> {
        let mut reported = BTreeSet::new();
        let mut failures = 0usize;

        let names = dates
            .iter()
            .zip(prior)
            .map(|(date, prior)| {
                let Some(date) = date else {
                    return prior;
                };
                match self.calendar.lookup(*date) {
                    Ok(Some(name)) => Some(name),
                    Ok(None) => Some(NOT_HOLIDAY.to_string()),
                    Err(e) => {
                        failures += 1;
                        if reported.insert(e.to_string()) {
                            error!("Holiday lookup failed for {}: {}", date, e);
                        }
                        prior
                    }
                }
            })
            .collect();

        if failures > 0 {
            error!(
                "Holiday lookup failed for {} row(s); kept their previous holiday_name",
                failures
            );
        }
        names
    }
}

impl Transformer for DateFeatureExpander {
    fn name(&self) -> &'static str {
        NAME
    }

    fn fit(&mut self, _df: &DataFrame) -> Result<()> {
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let dates = date_values(column_series(df, &self.date_column)?)?;
        let day_of_week = integer_values(column_series(df, &self.day_of_week_column)?)?;

        let prior = match df.column(DateFeatureNames::HOLIDAY_NAME) {
            Ok(col) => text_values(col.as_materialized_series())?,
            Err(_) => vec![None; df.height()],
        };

        let field = |f: fn(&NaiveDate) -> i32| -> Vec<Option<i32>> {
            dates.iter().map(|d| d.as_ref().map(f)).collect()
        };
        let quarter = field(|d| (d.month0() / 3 + 1) as i32);
        let month = field(|d| d.month() as i32);
        let year = field(|d| d.year());
        let day_of_year = field(|d| d.ordinal() as i32);
        let is_weekday: Vec<Option<bool>> = day_of_week.iter().map(|d| d.map(|d| d < 6)).collect();
        let is_weekend: Vec<Option<bool>> = day_of_week.iter().map(|d| d.map(|d| d >= 6)).collect();
        let holiday_name = self.holiday_names(&dates, prior);

        let mut out = df.drop(&self.date_column)?;
        out.with_column(Series::new(DateFeatureNames::QUARTER.into(), quarter))?;
        out.with_column(Series::new(DateFeatureNames::MONTH.into(), month))?;
        out.with_column(Series::new(DateFeatureNames::YEAR.into(), year))?;
        out.with_column(Series::new(DateFeatureNames::DAY_OF_YEAR.into(), day_of_year))?;
        out.with_column(Series::new(DateFeatureNames::IS_WEEKDAY.into(), is_weekday))?;
        out.with_column(Series::new(DateFeatureNames::IS_WEEKEND.into(), is_weekend))?;
        out.with_column(Series::new(DateFeatureNames::HOLIDAY_NAME.into(), holiday_name))?;

        debug!(
            "Expanded '{}' into {} calendar features",
            self.date_column,
            DateFeatureNames::ALL.len()
        );
        Ok(out)
    }

    fn is_fitted(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holidays::HolidayLookupError;
    use crate::utils::dates_to_series;

    #[derive(Debug)]
    struct BrokenCalendar;

    impl HolidayCalendar for BrokenCalendar {
        fn lookup(
            &self,
            _date: NaiveDate,
        ) -> std::result::Result<Option<String>, HolidayLookupError> {
            Err(HolidayLookupError::Unavailable("offline".to_string()))
        }
    }

    fn frame(dates: &[&str], day_of_week: &[i64]) -> DataFrame {
        let parsed: Vec<Option<NaiveDate>> = dates
            .iter()
            .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .collect();
        let mut df = df!["DayOfWeek" => day_of_week.to_vec()].unwrap();
        df.with_column(dates_to_series("Date", &parsed).unwrap()).unwrap();
        df
    }

    fn i32_at(df: &DataFrame, column: &str, idx: usize) -> Option<i32> {
        df.column(column).unwrap().as_materialized_series().i32().unwrap().get(idx)
    }

    fn bool_at(df: &DataFrame, column: &str, idx: usize) -> Option<bool> {
        df.column(column).unwrap().as_materialized_series().bool().unwrap().get(idx)
    }

    fn str_at(df: &DataFrame, column: &str, idx: usize) -> Option<String> {
        df.column(column)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .get(idx)
            .map(str::to_string)
    }

    #[test]
    fn test_regular_friday() {
        let df = frame(&["2015-07-31"], &[5]);

        let out = DateFeatureExpander::new("Date", "DayOfWeek").transform(&df).unwrap();

        assert_eq!(i32_at(&out, "quarter", 0), Some(3));
        assert_eq!(i32_at(&out, "month", 0), Some(7));
        assert_eq!(i32_at(&out, "year", 0), Some(2015));
        assert_eq!(i32_at(&out, "day_of_year", 0), Some(212));
        assert_eq!(bool_at(&out, "is_weekday", 0), Some(true));
        assert_eq!(bool_at(&out, "is_weekend", 0), Some(false));
        assert_eq!(str_at(&out, "holiday_name", 0).as_deref(), Some(NOT_HOLIDAY));
    }

    #[test]
    fn test_date_column_replaced_by_features() {
        let df = frame(&["2015-07-31"], &[5]);

        let out = DateFeatureExpander::new("Date", "DayOfWeek").transform(&df).unwrap();

        let names: Vec<String> = out.get_column_names().iter().map(|s| s.to_string()).collect();
        let mut expected = vec!["DayOfWeek".to_string()];
        expected.extend(DateFeatureNames::ALL.iter().map(|s| s.to_string()));
        assert_eq!(names, expected);
    }

    #[test]
    fn test_holidays() {
        let df = frame(&["2015-01-01", "2015-12-25"], &[4, 5]);

        let out = DateFeatureExpander::new("Date", "DayOfWeek").transform(&df).unwrap();

        assert_eq!(str_at(&out, "holiday_name", 0).as_deref(), Some("New Year's Day"));
        assert_eq!(str_at(&out, "holiday_name", 1).as_deref(), Some("Christmas Day"));
    }

    #[test]
    fn test_weekend_flags() {
        let df = frame(&["2015-08-01", "2015-08-02"], &[6, 7]);

        let out = DateFeatureExpander::new("Date", "DayOfWeek").transform(&df).unwrap();

        for idx in 0..2 {
            assert_eq!(bool_at(&out, "is_weekday", idx), Some(false));
            assert_eq!(bool_at(&out, "is_weekend", idx), Some(true));
        }
    }

    #[test]
    fn test_string_dates_accepted() {
        let df = df!["Date" => ["2015-07-31"], "DayOfWeek" => [5i64]].unwrap();
        let out = DateFeatureExpander::new("Date", "DayOfWeek").transform(&df).unwrap();
        assert_eq!(i32_at(&out, "day_of_year", 0), Some(212));
    }

    #[test]
    fn test_failed_lookup_keeps_prior_value() {
        let mut df = frame(&["2015-12-25", "2015-07-31"], &[5, 5]);
        df.with_column(Series::new(
            "holiday_name".into(),
            &[Some("Christmas Day"), None],
        ))
        .unwrap();
        let step =
            DateFeatureExpander::new("Date", "DayOfWeek").with_calendar(Arc::new(BrokenCalendar));

        let out = step.transform(&df).unwrap();

        assert_eq!(str_at(&out, "holiday_name", 0).as_deref(), Some("Christmas Day"));
        assert_eq!(str_at(&out, "holiday_name", 1), None);
        assert_eq!(i32_at(&out, "month", 1), Some(7));
    }

    #[test]
    fn test_failed_lookup_without_prior_column_is_null() {
        let df = frame(&["2015-07-31"], &[5]);
        let step =
            DateFeatureExpander::new("Date", "DayOfWeek").with_calendar(Arc::new(BrokenCalendar));

        let out = step.transform(&df).unwrap();

        assert_eq!(out.column("holiday_name").unwrap().null_count(), 1);
    }

    #[test]
    fn test_missing_day_of_week_column() {
        let df = frame(&["2015-07-31"], &[5]).drop("DayOfWeek").unwrap();
        let err = DateFeatureExpander::new("Date", "DayOfWeek").transform(&df).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_calendar_not_serialized() {
        let step = DateFeatureExpander::new("Date", "DayOfWeek");
        let json = serde_json::to_string(&step).unwrap();
        assert_eq!(json, r#"{"date_column":"Date","day_of_week_column":"DayOfWeek"}"#);
        let back: DateFeatureExpander = serde_json::from_str(&json).unwrap();
        assert_eq!(back.date_column(), "Date");
    }
}
