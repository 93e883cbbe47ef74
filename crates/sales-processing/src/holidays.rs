//! Public holiday reference calendar.
//!
//! The date feature step looks holidays up through the [`HolidayCalendar`]
//! trait so the calendar can be swapped (another country, a calendar read
//! from a file, a test double). [`GermanHolidays`] is the shipped reference:
//! nationwide German public holidays with English names.

use chrono::{Datelike, NaiveDate};
use std::fmt::Debug;
use thiserror::Error;

/// Label used for dates that are not a public holiday.
pub const NOT_HOLIDAY: &str = "Not Holiday";

/// Failure to answer a holiday lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HolidayLookupError {
    #[error("year {0} is outside the calendar's supported range")]
    UnsupportedYear(i32),

    #[error("holiday calendar unavailable: {0}")]
    Unavailable(String),
}

/// A pure date → holiday-name lookup.
pub trait HolidayCalendar: Send + Sync + Debug {
    /// Return the holiday name for `date`, or `None` when it is not a holiday.
    fn lookup(&self, date: NaiveDate) -> Result<Option<String>, HolidayLookupError>;
}

/// Nationwide public holidays in Germany.
#[derive(Debug, Clone, Copy, Default)]
pub struct GermanHolidays;

impl GermanHolidays {
    /// German Unity Day exists from 1990 on; the Easter computation is only
    /// kept to the range it has been checked for.
    pub const FIRST_YEAR: i32 = 1991;
    pub const LAST_YEAR: i32 = 2099;
}

/// Easter Sunday (anonymous Gregorian algorithm).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

impl HolidayCalendar for GermanHolidays {
    fn lookup(&self, date: NaiveDate) -> Result<Option<String>, HolidayLookupError> {
        let year = date.year();
        if !(Self::FIRST_YEAR..=Self::LAST_YEAR).contains(&year) {
            return Err(HolidayLookupError::UnsupportedYear(year));
        }

        let fixed = match (date.month(), date.day()) {
            (1, 1) => Some("New Year's Day"),
            (5, 1) => Some("Labor Day"),
            (10, 3) => Some("German Unity Day"),
            (10, 31) if year == 2017 => Some("Reformation Day"),
            (12, 25) => Some("Christmas Day"),
            (12, 26) => Some("Second Day of Christmas"),
            _ => None,
        };
        if let Some(name) = fixed {
            return Ok(Some(name.to_string()));
        }

        let easter = easter_sunday(year).ok_or(HolidayLookupError::UnsupportedYear(year))?;
        let offset = date.signed_duration_since(easter).num_days();
        let movable = match offset {
            -2 => Some("Good Friday"),
            1 => Some("Easter Monday"),
            39 => Some("Ascension Day"),
            50 => Some("Whit Monday"),
            _ => None,
        };

        Ok(movable.map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_easter_sunday_known_years() {
        assert_eq!(easter_sunday(2013), Some(ymd(2013, 3, 31)));
        assert_eq!(easter_sunday(2014), Some(ymd(2014, 4, 20)));
        assert_eq!(easter_sunday(2015), Some(ymd(2015, 4, 5)));
        assert_eq!(easter_sunday(2024), Some(ymd(2024, 3, 31)));
    }

    #[test]
    fn test_fixed_holidays() {
        let cal = GermanHolidays;
        assert_eq!(
            cal.lookup(ymd(2015, 1, 1)).unwrap().as_deref(),
            Some("New Year's Day")
        );
        assert_eq!(
            cal.lookup(ymd(2015, 12, 25)).unwrap().as_deref(),
            Some("Christmas Day")
        );
        assert_eq!(
            cal.lookup(ymd(2014, 10, 3)).unwrap().as_deref(),
            Some("German Unity Day")
        );
    }

    #[test]
    fn test_movable_holidays_2015() {
        let cal = GermanHolidays;
        assert_eq!(cal.lookup(ymd(2015, 4, 3)).unwrap().as_deref(), Some("Good Friday"));
        assert_eq!(cal.lookup(ymd(2015, 4, 6)).unwrap().as_deref(), Some("Easter Monday"));
        assert_eq!(cal.lookup(ymd(2015, 5, 14)).unwrap().as_deref(), Some("Ascension Day"));
        assert_eq!(cal.lookup(ymd(2015, 5, 25)).unwrap().as_deref(), Some("Whit Monday"));
    }

    #[test]
    fn test_reformation_day_only_in_2017() {
        let cal = GermanHolidays;
        assert_eq!(
            cal.lookup(ymd(2017, 10, 31)).unwrap().as_deref(),
            Some("Reformation Day")
        );
        assert_eq!(cal.lookup(ymd(2016, 10, 31)).unwrap(), None);
    }

    #[test]
    fn test_regular_day() {
        assert_eq!(GermanHolidays.lookup(ymd(2015, 7, 31)).unwrap(), None);
    }

    #[test]
    fn test_unsupported_year() {
        assert_eq!(
            GermanHolidays.lookup(ymd(1985, 1, 1)),
            Err(HolidayLookupError::UnsupportedYear(1985))
        );
    }
}
