//! Statistics module - aggregations, KPIs and insights

pub mod aggregations;
mod insights;
mod kpi;
mod metric;

pub use aggregations::{
    cohort_sizes, Aggregations, ArpuByPlanRegion, ArpuCell, CohortHeatmap, RegionSummary, RetentionPoint,
};
pub use insights::{generate_insights, retention_gap, top_arpu_region, Insight, GAP_WEEK, NO_INSIGHTS_MESSAGE};
pub use kpi::KpiSummary;
pub use metric::{Metric, PLACEHOLDER};
