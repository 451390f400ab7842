//! KPI Summary Module
//! Headline figures shown above the charts.

use crate::data::schema::{ARPU, REVENUE};
use crate::data::{FilteredTables, WeekRange};
use crate::stats::aggregations::plan_means;
use crate::stats::Metric;
use polars::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    /// Cohort groups across the full unfiltered dataset.
    pub total_cohort_groups: Metric<u64>,
    /// Mean over plans of each plan's mean retention.
    pub mean_retention_pct: Metric<f64>,
    pub weeks: WeekRange,
    pub avg_arpu: Metric<f64>,
    pub retained_revenue: Metric<f64>,
}

impl KpiSummary {
    pub fn compute(
        filtered: &FilteredTables,
        cohort_sizes: Option<u64>,
        weeks: WeekRange,
    ) -> PolarsResult<Self> {
        let total_cohort_groups = cohort_sizes.map_or(Metric::Unavailable, Metric::Available);

        let per_plan: Vec<f64> = plan_means(&filtered.retention, None)?
            .into_iter()
            .map(|(_, mean)| mean)
            .collect();
        let mean_retention_pct = if per_plan.is_empty() {
            Metric::NoData
        } else {
            Metric::Available(per_plan.iter().mean())
        };

        let revenue = &filtered.revenue;
        let avg_arpu = if !revenue.has_arpu() {
            Metric::Unavailable
        } else {
            let values: Vec<f64> = revenue.frame().column(ARPU)?.f64()?.into_iter().flatten().collect();
            if values.is_empty() {
                Metric::NoData
            } else {
                Metric::Available(values.iter().mean())
            }
        };
        let retained_revenue = if !revenue.has_revenue() {
            Metric::Unavailable
        } else {
            let sum: f64 = revenue.frame().column(REVENUE)?.f64()?.into_iter().flatten().sum();
            Metric::Available(sum)
        };

        Ok(Self {
            total_cohort_groups,
            mean_retention_pct,
            weeks,
            avg_arpu,
            retained_revenue,
        })
    }

    /// Label / value / caption triples in display order.
    pub fn cards(&self) -> Vec<(&'static str, String, String)> {
        vec![
            (
                "Total Cohort Groups",
                self.total_cohort_groups.display_with(|n| group_thousands(*n)),
                "Cohorts at week 0 across region × plan".to_string(),
            ),
            (
                "Mean Retention (%)",
                self.mean_retention_pct.display_with(|v| format!("{v:.2}%")),
                format!("Weeks {}–{}", self.weeks.min, self.weeks.max),
            ),
            (
                "Avg ARPU (D30 Retained)",
                self.avg_arpu.display_with(|v| format!("${v:.2}")),
                "Across selected regions & plans".to_string(),
            ),
            (
                "Revenue (Retained Users)",
                self.retained_revenue.display_with(|v| format!("${v:.0}")),
                "Sum of retained-user revenue in selection".to_string(),
            ),
        ]
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
