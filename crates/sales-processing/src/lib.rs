//! Store Sales Preprocessing Library
//!
//! Fit/transform preprocessing and exploratory analysis for daily store sales
//! data, built with Rust and Polars.
//!
//! # Overview
//!
//! - **Imputation**: mean, median, most frequent or constant fill per column
//! - **Outliers**: IQR clipping with fitted bounds, or z-score row filtering
//! - **Type Coercion**: date parsing and categorical/numeric casts
//! - **Date Features**: quarter, month, year, day of year, weekday flags and
//!   public holiday names
//! - **Scaling**: standard or min-max, with statistics learned at fit
//! - **Analysis**: distribution comparison between frames, per-store promo
//!   impact and sales per holiday
//!
//! Every stateful step keeps its statistics in a [`transform::FitState`], so a
//! pipeline fitted on training data applies exactly the same numbers at
//! inference, including after a JSON round trip.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sales_processing::{Pipeline, PipelineConfig, Transformer, io};
//!
//! let train = io::load_csv("train.csv")?;
//! let features = train.drop("Sales")?.drop("Customers")?;
//!
//! let mut pipeline = Pipeline::from_config(&PipelineConfig::default())?;
//! let prepared = pipeline.fit_transform(&features)?;
//! pipeline.save_json("pipeline.json")?;
//! ```
//!
//! # Analysis
//!
//! ```rust,ignore
//! use sales_processing::analysis::{DistributionComparator, PromoImpactAnalyzer};
//!
//! let promo = DistributionComparator::compare(&train, &test, "Promo", 5.0)?;
//! println!("Promo distribution is {}", promo.similarity);
//!
//! let report = PromoImpactAnalyzer::default().analyze(&train)?;
//! for store in report.need_promo() {
//!     println!("Store {} ratio {:.1}", store.store, store.ratio);
//! }
//! ```
//!
//! # Logging
//!
//! The library only emits [`tracing`] events; installing a subscriber is left
//! to the application (the `sales-processing` binary does this in `main`).

pub mod analysis;
pub mod config;
pub mod error;
pub mod holidays;
pub mod io;
pub mod pipeline;
pub mod schema;
pub mod transform;
pub mod utils;

// Re-exports for convenient access
pub use analysis::{
    DistributionComparator, DistributionComparison, HolidaySalesAnalyzer, PromoImpactAnalyzer,
    PromoImpactReport, Similarity, WeekdayOpeningAnalyzer, WeekdayOpeningReport,
};
pub use config::{
    BoundsPolicy, ConfigValidationError, FillValue, ImputationStrategy, OutlierMethod,
    PipelineConfig, PipelineConfigBuilder, ScalerKind, TargetType,
};
pub use error::{PreprocessingError, Result as PreprocessingResult, ResultExt};
pub use holidays::{GermanHolidays, HolidayCalendar, HolidayLookupError, NOT_HOLIDAY};
pub use pipeline::{Pipeline, PipelineStage, Scorer};
pub use schema::{ColumnRegistry, SalesRecord, SemanticType, records_to_frame};
pub use transform::{
    ColumnScaler, DateFeatureExpander, DateFeatureNames, FitState, MissingValueImputer,
    OutlierClipper, Transformer, TypeCoercer,
};
