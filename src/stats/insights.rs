//! Insight Engine
//! Short data-driven facts derived from the aggregation outputs.

use crate::data::{FilterState, RetentionTable};
use crate::stats::aggregations::{plan_means, week_zero_rows, ArpuByPlanRegion};
use crate::stats::Metric;
use polars::prelude::PolarsResult;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Week at which plans are compared.
pub const GAP_WEEK: u32 = 8;

/// Shown by presentation when no insight could be produced.
pub const NO_INSIGHTS_MESSAGE: &str = "Adjust filters to see data-driven insights.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Insight {
    /// Best and worst plan by mean retention at `week`. The gap may be 0.0.
    RetentionGap {
        week: u32,
        top_plan: String,
        bottom_plan: String,
        gap_pp: f64,
    },
    TopArpuRegion { region: String, arpu: f64 },
    CohortCount {
        cohorts: usize,
        regions: usize,
        plans: usize,
    },
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insight::RetentionGap {
                week,
                top_plan,
                bottom_plan,
                gap_pp,
            } => write!(
                f,
                "At Week {week}, {top_plan} retains higher than {bottom_plan} by {gap_pp:.1} pp."
            ),
            Insight::TopArpuRegion { region, arpu } => write!(
                f,
                "{region} shows the highest ARPU among selected regions at ${arpu:.2}."
            ),
            Insight::CohortCount {
                cohorts,
                regions,
                plans,
            } => write!(
                f,
                "Selection includes {cohorts} cohort-month groups at Week 0 across {regions} region(s) and {plans} plan(s)."
            ),
        }
    }
}

/// Build the ordered insight list. Each fact is independent and omitted
/// when its inputs are missing.
pub fn generate_insights(
    filtered_retention: &RetentionTable,
    arpu: &Metric<ArpuByPlanRegion>,
    state: &FilterState,
) -> PolarsResult<Vec<Insight>> {
    let mut insights = Vec::new();

    if let Some(gap) = retention_gap(filtered_retention, GAP_WEEK)? {
        insights.push(gap);
    }
    if let Some(top) = top_arpu_region(arpu) {
        insights.push(top);
    }
    insights.push(Insight::CohortCount {
        cohorts: week_zero_rows(filtered_retention)?,
        regions: state.regions.len(),
        plans: state.plans.len(),
    });

    Ok(insights)
}

/// Highest minus lowest per-plan mean at `week`; `None` when no rows exist
/// at that week. A single plan is both top and bottom with a zero gap.
pub fn retention_gap(table: &RetentionTable, week: u32) -> PolarsResult<Option<Insight>> {
    let mut means = plan_means(table, Some(week))?;
    // Descending by mean; ties broken by plan name for a stable order.
    means.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let (Some(top), Some(bottom)) = (means.first(), means.last()) else {
        return Ok(None);
    };
    Ok(Some(Insight::RetentionGap {
        week,
        top_plan: top.0.clone(),
        bottom_plan: bottom.0.clone(),
        gap_pp: top.1 - bottom.1,
    }))
}

/// Region with the highest per-region ARPU, if ARPU is available.
pub fn top_arpu_region(arpu: &Metric<ArpuByPlanRegion>) -> Option<Insight> {
    let table = arpu.available()?;
    table
        .region_means()
        .into_iter()
        .fold(None::<(String, f64)>, |best, (region, value)| match best {
            Some((_, best_value)) if best_value >= value => best,
            _ => Some((region, value)),
        })
        .map(|(region, arpu)| Insight::TopArpuRegion { region, arpu })
}
