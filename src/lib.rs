//! StreamHub Analytics - cohort retention and ARPU dashboards
//!
//! Loads a retention export and a revenue export, filters them by region,
//! plan and week, and derives retention curves, a cohort heatmap, ARPU by
//! plan and region, a regional summary, KPIs and short insights.

pub mod charts;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod generator;
pub mod report;
pub mod stats;

pub use dashboard::{Dashboard, DashboardView};
pub use data::{DatasetLoader, Datasets, FilterState, RawInputs, TableCache, WeekRange};
pub use error::{AnalyticsError, LoadError, Result};
