//! Column schema for store sales data.
//!
//! [`ColumnRegistry`] is the explicit column-type registry injected into
//! transformers that operate on "all numeric columns", so they never depend
//! on whatever dtype a particular frame happens to carry at runtime.
//! [`SalesRecord`] is the typed input row used at inference time.

use crate::error::{PreprocessingError, Result};
use crate::utils::{dates_to_series, is_datetime_dtype, is_float_dtype, is_numeric_dtype};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Integer,
    Float,
    Categorical,
    Date,
}

impl SemanticType {
    /// Classify a polars dtype.
    pub fn from_dtype(dtype: &DataType) -> Self {
        if is_float_dtype(dtype) {
            SemanticType::Float
        } else if is_numeric_dtype(dtype) {
            SemanticType::Integer
        } else if is_datetime_dtype(dtype) {
            SemanticType::Date
        } else {
            SemanticType::Categorical
        }
    }
}

/// Ordered mapping from column name to semantic type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnRegistry {
    columns: Vec<(String, SemanticType)>,
}

static SALES_REGISTRY: Lazy<ColumnRegistry> = Lazy::new(|| {
    use SemanticType::*;
    ColumnRegistry::new()
        .with_column("Store", Integer)
        .with_column("DayOfWeek", Integer)
        .with_column("Date", Date)
        .with_column("Sales", Float)
        .with_column("Customers", Float)
        .with_column("Open", Integer)
        .with_column("Promo", Integer)
        .with_column("StateHoliday", Categorical)
        .with_column("SchoolHoliday", Integer)
        .with_column("StoreType", Categorical)
        .with_column("Assortment", Categorical)
        .with_column("CompetitionDistance", Float)
        .with_column("CompetitionOpenSinceMonth", Integer)
        .with_column("CompetitionOpenSinceYear", Integer)
        .with_column("Promo2", Integer)
        .with_column("Promo2SinceWeek", Integer)
        .with_column("Promo2SinceYear", Integer)
        .with_column("PromoInterval", Categorical)
});

impl ColumnRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry describing the store sales dataset.
    pub fn sales_default() -> Self {
        SALES_REGISTRY.clone()
    }

    /// Derive a registry from a frame's runtime dtypes.
    pub fn from_frame(df: &DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .map(|col| (col.name().to_string(), SemanticType::from_dtype(col.dtype())))
            .collect();
        Self { columns }
    }

    /// Add or replace a column entry.
    pub fn with_column(mut self, name: impl Into<String>, semantic: SemanticType) -> Self {
        let name = name.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = semantic,
            None => self.columns.push((name, semantic)),
        }
        self
    }

    /// Type of a column, if registered.
    pub fn get(&self, name: &str) -> Option<SemanticType> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }

    /// Registered columns of the given type, in registry order.
    pub fn columns_of(&self, semantic: SemanticType) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, t)| *t == semantic)
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One store-day record as submitted for prediction.
///
/// Field names serialize with the dataset's column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SalesRecord {
    pub store: i64,
    pub day_of_week: i64,
    pub date: NaiveDate,
    pub open: i64,
    pub promo: i64,
    pub state_holiday: String,
    pub school_holiday: i64,
    pub store_type: String,
    pub assortment: String,
    pub competition_distance: f64,
    pub competition_open_since_month: i64,
    pub competition_open_since_year: i64,
    pub promo2: i64,
    pub promo2_since_week: i64,
    pub promo2_since_year: i64,
    pub promo_interval: String,
}

/// Build a frame from sales records, one row per record, in dataset column order.
pub fn records_to_frame(records: &[SalesRecord]) -> Result<DataFrame> {
    if records.is_empty() {
        return Err(PreprocessingError::InvalidConfig(
            "at least one sales record is required".to_string(),
        ));
    }

    fn ints(records: &[SalesRecord], f: impl Fn(&SalesRecord) -> i64) -> Vec<i64> {
        records.iter().map(f).collect()
    }
    fn texts(records: &[SalesRecord], f: impl Fn(&SalesRecord) -> &str) -> Vec<String> {
        records.iter().map(|r| f(r).to_string()).collect()
    }

    let dates: Vec<Option<NaiveDate>> = records.iter().map(|r| Some(r.date)).collect();
    let distance: Vec<f64> = records.iter().map(|r| r.competition_distance).collect();

    let columns: Vec<Column> = vec![
        Series::new("Store".into(), ints(records, |r| r.store)).into(),
        Series::new("DayOfWeek".into(), ints(records, |r| r.day_of_week)).into(),
        dates_to_series("Date", &dates)?.into(),
        Series::new("Open".into(), ints(records, |r| r.open)).into(),
        Series::new("Promo".into(), ints(records, |r| r.promo)).into(),
        Series::new("StateHoliday".into(), texts(records, |r| r.state_holiday.as_str())).into(),
        Series::new("SchoolHoliday".into(), ints(records, |r| r.school_holiday)).into(),
        Series::new("StoreType".into(), texts(records, |r| r.store_type.as_str())).into(),
        Series::new("Assortment".into(), texts(records, |r| r.assortment.as_str())).into(),
        Series::new("CompetitionDistance".into(), distance).into(),
        Series::new(
            "CompetitionOpenSinceMonth".into(),
            ints(records, |r| r.competition_open_since_month),
        )
        .into(),
        Series::new(
            "CompetitionOpenSinceYear".into(),
            ints(records, |r| r.competition_open_since_year),
        )
        .into(),
        Series::new("Promo2".into(), ints(records, |r| r.promo2)).into(),
        Series::new("Promo2SinceWeek".into(), ints(records, |r| r.promo2_since_week)).into(),
        Series::new("Promo2SinceYear".into(), ints(records, |r| r.promo2_since_year)).into(),
        Series::new("PromoInterval".into(), texts(records, |r| r.promo_interval.as_str())).into(),
    ];

    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> SalesRecord {
        SalesRecord {
            store: 1,
            day_of_week: 5,
            date: NaiveDate::from_ymd_opt(2015, 7, 31).unwrap(),
            open: 1,
            promo: 1,
            state_holiday: "0".to_string(),
            school_holiday: 1,
            store_type: "c".to_string(),
            assortment: "a".to_string(),
            competition_distance: 1270.0,
            competition_open_since_month: 9,
            competition_open_since_year: 2008,
            promo2: 0,
            promo2_since_week: 0,
            promo2_since_year: 0,
            promo_interval: "Jan,Apr,Jul,Oct".to_string(),
        }
    }

    #[test]
    fn test_semantic_type_from_dtype() {
        assert_eq!(SemanticType::from_dtype(&DataType::Float64), SemanticType::Float);
        assert_eq!(SemanticType::from_dtype(&DataType::Int32), SemanticType::Integer);
        assert_eq!(SemanticType::from_dtype(&DataType::Date), SemanticType::Date);
        assert_eq!(
            SemanticType::from_dtype(&DataType::String),
            SemanticType::Categorical
        );
    }

    #[test]
    fn test_sales_default_float_columns() {
        let registry = ColumnRegistry::sales_default();
        assert_eq!(
            registry.columns_of(SemanticType::Float),
            vec!["Sales", "Customers", "CompetitionDistance"]
        );
        assert_eq!(registry.get("Date"), Some(SemanticType::Date));
        assert_eq!(registry.get("Unknown"), None);
    }

    #[test]
    fn test_with_column_replaces_existing() {
        let registry = ColumnRegistry::new()
            .with_column("x", SemanticType::Integer)
            .with_column("x", SemanticType::Float);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("x"), Some(SemanticType::Float));
    }

    #[test]
    fn test_from_frame() {
        let df = df![
            "id" => [1i64, 2],
            "amount" => [1.5, 2.5],
            "kind" => ["a", "b"],
        ]
        .unwrap();
        let registry = ColumnRegistry::from_frame(&df);
        assert_eq!(registry.columns_of(SemanticType::Float), vec!["amount"]);
        assert_eq!(registry.get("id"), Some(SemanticType::Integer));
        assert_eq!(registry.get("kind"), Some(SemanticType::Categorical));
    }

    #[test]
    fn test_sales_record_from_json() {
        let json = r#"{
            "Store": 1, "DayOfWeek": 5, "Date": "2015-07-31", "Open": 1, "Promo": 1,
            "StateHoliday": "0", "SchoolHoliday": 1, "StoreType": "c", "Assortment": "a",
            "CompetitionDistance": 1270.0, "CompetitionOpenSinceMonth": 9,
            "CompetitionOpenSinceYear": 2008, "Promo2": 0, "Promo2SinceWeek": 0,
            "Promo2SinceYear": 0, "PromoInterval": "Jan,Apr,Jul,Oct"
        }"#;
        let record: SalesRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record, sample_record());
    }

    #[test]
    fn test_records_to_frame() {
        let df = records_to_frame(&[sample_record()]).unwrap();
        assert_eq!(df.shape(), (1, 16));
        assert_eq!(df.column("Date").unwrap().dtype(), &DataType::Date);
        assert_eq!(
            df.get_column_names()[0].as_str(),
            "Store"
        );
    }

    #[test]
    fn test_records_to_frame_empty() {
        assert!(records_to_frame(&[]).is_err());
    }
}
