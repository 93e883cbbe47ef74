//! Integration tests for the store sales pipeline and analyses.
//!
//! These tests run the public API end to end against the CSV fixtures.

use polars::prelude::*;
use pretty_assertions::assert_eq;
use sales_processing::analysis::{
    DistributionComparator, HolidaySalesAnalyzer, PromoImpactAnalyzer, Similarity,
    StoreWeekSales, WeekdayOpeningAnalyzer,
};
use sales_processing::{
    DateFeatureExpander, OutlierMethod, Pipeline, PipelineConfig, PreprocessingError,
    SalesRecord, Scorer, Transformer, TypeCoercer, io, records_to_frame,
};
use std::path::PathBuf;
use std::sync::Mutex;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_csv(filename: &str) -> DataFrame {
    io::load_csv(fixtures_path().join(filename)).expect("Failed to read CSV fixture")
}

/// Training frame without the target columns.
fn train_features() -> DataFrame {
    load_csv("sales_train.csv")
        .drop("Sales")
        .and_then(|df| df.drop("Customers"))
        .expect("Failed to drop target columns")
}

fn fitted_pipeline() -> Pipeline {
    let mut pipeline = Pipeline::from_config(&PipelineConfig::default()).unwrap();
    pipeline.fit(&train_features()).unwrap();
    pipeline
}

fn str_values(df: &DataFrame, column: &str) -> Vec<Option<String>> {
    df.column(column)
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("sales_processing_it_{}_{}", std::process::id(), name))
}

/// Scorer that records the columns it was given.
struct RecordingScorer {
    columns: Mutex<Vec<String>>,
}

impl RecordingScorer {
    fn new() -> Self {
        Self {
            columns: Mutex::new(Vec::new()),
        }
    }
}

impl Scorer for RecordingScorer {
    fn predict(&self, features: &DataFrame) -> sales_processing::PreprocessingResult<Vec<f64>> {
        let names = features
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        *self.columns.lock().unwrap() = names;
        Ok((0..features.height()).map(|i| i as f64).collect())
    }
}

fn sample_record() -> SalesRecord {
    serde_json::from_str(
        r#"{
            "Store": 2, "DayOfWeek": 5, "Date": "2015-12-25", "Open": 0, "Promo": 0,
            "StateHoliday": "b", "SchoolHoliday": 1, "StoreType": "a", "Assortment": "a",
            "CompetitionDistance": 570.0, "CompetitionOpenSinceMonth": 11,
            "CompetitionOpenSinceYear": 2007, "Promo2": 1, "Promo2SinceWeek": 13,
            "Promo2SinceYear": 2010, "PromoInterval": "Jan,Apr,Jul,Oct"
        }"#,
    )
    .unwrap()
}

// ============================================================================
// Pipeline
// ============================================================================

#[test]
fn test_fit_records_output_layout() {
    let pipeline = fitted_pipeline();

    assert_eq!(
        pipeline.output_columns().unwrap(),
        &[
            "Store",
            "DayOfWeek",
            "Open",
            "Promo",
            "StateHoliday",
            "SchoolHoliday",
            "StoreType",
            "Assortment",
            "CompetitionDistance",
            "CompetitionOpenSinceMonth",
            "CompetitionOpenSinceYear",
            "Promo2",
            "Promo2SinceWeek",
            "Promo2SinceYear",
            "PromoInterval",
            "quarter",
            "month",
            "year",
            "day_of_year",
            "is_weekday",
            "is_weekend",
            "holiday_name",
        ]
    );
}

#[test]
fn test_transform_test_set() {
    let pipeline = fitted_pipeline();
    let test = load_csv("sales_test.csv");

    let out = pipeline.transform(&test).unwrap();

    assert_eq!(out.height(), 4);
    // Id was not seen at fit
    assert!(out.column("Id").is_err());
    assert_eq!(out.column("CompetitionDistance").unwrap().null_count(), 0);
    assert_eq!(
        str_values(&out, "holiday_name"),
        vec![
            Some("Not Holiday".to_string()),
            Some("Not Holiday".to_string()),
            Some("German Unity Day".to_string()),
            Some("Not Holiday".to_string()),
        ]
    );
}

#[test]
fn test_training_holidays() {
    let mut pipeline = Pipeline::from_config(&PipelineConfig::default()).unwrap();
    let out = pipeline.fit_transform(&train_features()).unwrap();

    let names = str_values(&out, "holiday_name");
    assert_eq!(names[0].as_deref(), Some("Not Holiday"));
    assert_eq!(names[3].as_deref(), Some("New Year's Day"));
    assert_eq!(names[7].as_deref(), Some("Christmas Day"));
    assert_eq!(names[11].as_deref(), Some("Labor Day"));
}

#[test]
fn test_imputed_value_is_training_median() {
    let mut pipeline = Pipeline::from_config(
        &PipelineConfig::builder()
            .scale_columns(Vec::<String>::new())
            .build()
            .unwrap(),
    )
    .unwrap();

    let out = pipeline.fit_transform(&train_features()).unwrap();

    let distance = out.column("CompetitionDistance").unwrap().get(8).unwrap();
    assert_eq!(distance.try_extract::<f64>().unwrap(), 920.0);
}

#[test]
fn test_saved_pipeline_matches_in_memory() {
    let pipeline = fitted_pipeline();
    let test = load_csv("sales_test.csv");
    let expected = pipeline.transform(&test).unwrap();

    let path = temp_path("pipeline.json");
    pipeline.save_json(&path).unwrap();
    let restored = Pipeline::load_json(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let actual = restored.transform(&test).unwrap();
    assert!(expected.equals_missing(&actual));
}

#[test]
fn test_predict_from_records() {
    let pipeline = fitted_pipeline();
    let frame = records_to_frame(&[sample_record()]).unwrap();
    let scorer = RecordingScorer::new();

    let predictions = pipeline.predict(&frame, &scorer).unwrap();

    assert_eq!(predictions, vec![0.0]);
    assert_eq!(
        *scorer.columns.lock().unwrap(),
        pipeline.output_columns().unwrap().to_vec()
    );
}

#[test]
fn test_transform_without_fit() {
    let pipeline = Pipeline::from_config(&PipelineConfig::default()).unwrap();
    let err = pipeline.transform(&train_features()).unwrap_err();
    assert_eq!(err.error_code(), "NOT_FITTED");
}

#[test]
fn test_missing_column_at_transform() {
    let pipeline = fitted_pipeline();
    let test = load_csv("sales_test.csv").drop("DayOfWeek").unwrap();

    let err = pipeline.transform(&test).unwrap_err();

    assert!(matches!(err.root(), PreprocessingError::ColumnNotFound(c) if c == "DayOfWeek"));
}

#[test]
fn test_z_score_config_from_json() {
    let config: PipelineConfig = serde_json::from_str(r#"{"outlier_method": "z_score"}"#).unwrap();
    assert_eq!(config.outlier_method, OutlierMethod::ZScore);
    let mut pipeline = Pipeline::from_config(&config).unwrap();

    let out = pipeline.fit_transform(&train_features()).unwrap();

    assert_eq!(out.height(), 12);
}

#[test]
fn test_write_transformed_csv() {
    let pipeline = fitted_pipeline();
    let out = pipeline.transform(&load_csv("sales_test.csv")).unwrap();

    let path = temp_path("features.csv");
    io::write_csv(&out, &path).unwrap();
    let reloaded = io::load_csv(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(reloaded.shape(), out.shape());
}

// ============================================================================
// Analyses
// ============================================================================

#[test]
fn test_compare_promo_distribution() {
    let train = load_csv("sales_train.csv");
    let test = load_csv("sales_test.csv");

    let strict = DistributionComparator::compare(&train, &test, "Promo", 5.0).unwrap();
    let loose = DistributionComparator::compare(&train, &test, "Promo", 10.0).unwrap();

    assert_eq!(strict.first.category, "0");
    assert_eq!(strict.difference, 8.33);
    assert_eq!(strict.similarity, Similarity::NotSimilar);
    assert_eq!(loose.similarity, Similarity::Similar);
}

#[test]
fn test_promo_impact_on_fixture() {
    let report = PromoImpactAnalyzer::default()
        .analyze(&load_csv("sales_train.csv"))
        .unwrap();

    let order: Vec<i64> = report.stores.iter().map(|s| s.store).collect();
    let need: Vec<i64> = report.need_promo().iter().map(|s| s.store).collect();
    assert_eq!(order, vec![2, 1, 3]);
    assert_eq!(need, vec![2, 1]);
    assert_eq!(report.get(3).unwrap().no_promo_sales, 16000.0);
    assert_eq!(report.better_without_promo().len(), 3);
}

#[test]
fn test_holiday_sales_on_fixture() {
    let train = load_csv("sales_train.csv");
    let parsed = TypeCoercer::new(Some("Date".to_string()), vec![], Default::default())
        .transform(&train)
        .unwrap();
    let expanded = DateFeatureExpander::new("Date", "DayOfWeek")
        .transform(&parsed)
        .unwrap();

    let rows = HolidaySalesAnalyzer::default().analyze(&expanded).unwrap();

    let summary: Vec<(String, f64)> = rows
        .into_iter()
        .map(|r| (r.holiday, r.total_sales))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Labor Day".to_string(), 3000.0),
            ("Christmas Day".to_string(), 0.0),
            ("New Year's Day".to_string(), 0.0),
        ]
    );
}

#[test]
fn test_weekday_opening_on_fixture() {
    let report = WeekdayOpeningAnalyzer::default()
        .analyze(&load_csv("sales_train.csv"))
        .unwrap();

    // Six distinct weekday dates, every store is open on three of them
    assert_eq!(report.weekday_dates, 6);
    assert!(report.open_all_weekdays.is_empty());
    assert_eq!(
        report.open_some_weekdays,
        vec![
            StoreWeekSales {
                store: 1,
                weekday_sales: 14283.0,
                weekend_sales: 0.0,
            },
            StoreWeekSales {
                store: 2,
                weekday_sales: 16131.0,
                weekend_sales: 0.0,
            },
            StoreWeekSales {
                store: 3,
                weekday_sales: 17314.0,
                weekend_sales: 7000.0,
            },
        ]
    );
}
