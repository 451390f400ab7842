//! Dashboard Module
//! One session's view: datasets plus a filter in, every derived table out.

use crate::data::{apply_filters, Datasets, FilterOptions, FilterState};
use crate::error::Result;
use crate::stats::{cohort_sizes, generate_insights, Aggregations, Insight, KpiSummary};
use serde::Serialize;
use std::sync::Arc;

/// Everything presentation needs for one filter selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub filter: FilterState,
    pub retention_rows: usize,
    pub revenue_rows: usize,
    pub cohort_sizes: Option<u64>,
    pub kpis: KpiSummary,
    pub aggregations: Aggregations,
    pub insights: Vec<Insight>,
}

impl DashboardView {
    /// True when the selection matched no rows in either table.
    pub fn is_empty_selection(&self) -> bool {
        self.retention_rows == 0 && self.revenue_rows == 0
    }
}

/// A session over one pair of parsed tables.
///
/// Holds no mutable state: each call to [`Dashboard::view`] recomputes from
/// the shared immutable tables, so sessions cannot observe each other.
#[derive(Debug, Clone)]
pub struct Dashboard {
    datasets: Arc<Datasets>,
    options: FilterOptions,
    cohort_sizes: Option<u64>,
}

impl Dashboard {
    pub fn new(datasets: Arc<Datasets>) -> Result<Self> {
        let options = FilterOptions::from_retention(&datasets.retention)?;
        let cohort_sizes = cohort_sizes(&datasets.retention);
        tracing::debug!(
            "Dashboard ready: {} regions, {} plans, weeks 0–{}",
            options.regions.len(),
            options.plans.len(),
            options.week_max
        );
        Ok(Self {
            datasets,
            options,
            cohort_sizes,
        })
    }

    pub fn datasets(&self) -> &Datasets {
        &self.datasets
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    pub fn default_filter(&self) -> FilterState {
        FilterState::from_options(&self.options)
    }

    /// Filter, aggregate and summarize for `filter`.
    pub fn view(&self, filter: &FilterState) -> Result<DashboardView> {
        let filtered = apply_filters(&self.datasets, filter)?;
        let aggregations = Aggregations::compute(&filtered)?;
        let kpis = KpiSummary::compute(&filtered, self.cohort_sizes, filter.weeks)?;
        let insights = generate_insights(&filtered.retention, &aggregations.arpu_by_plan_region, filter)?;

        Ok(DashboardView {
            filter: filter.clone(),
            retention_rows: filtered.retention.len(),
            revenue_rows: filtered.revenue.len(),
            cohort_sizes: self.cohort_sizes,
            kpis,
            aggregations,
            insights,
        })
    }
}
