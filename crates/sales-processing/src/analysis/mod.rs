//! Exploratory analyses over store sales frames.
//!
//! These are read-only: they never modify the frame and keep no fitted state.

mod distribution;
mod opening;
mod promo;
mod seasonal;

pub use distribution::{CategoryShare, DistributionComparator, DistributionComparison, Similarity};
pub use opening::{StoreWeekSales, WeekdayOpeningAnalyzer, WeekdayOpeningReport};
pub use promo::{
    BETTER_WITHOUT_PROMO_COUNT, NEED_PROMO_RATIO, PromoImpactAnalyzer, PromoImpactReport,
    StorePromoImpact,
};
pub use seasonal::{HolidaySales, HolidaySalesAnalyzer};
