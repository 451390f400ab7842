//! Aggregation Engine
//! Grouped statistics over filtered retention and revenue tables.
//!
//! Every function here is pure: the same tables always give the same output
//! and an empty input gives an empty output.

use crate::data::schema::{
    region_coordinates, CohortMonth, Coordinates, ARPU, COHORT_MONTH, PLAN_TYPE, REGION,
    RETENTION_PCT, REVENUE, WEEK_NUMBER,
};
use crate::data::{FilteredTables, RetentionTable, RevenueTable};
use crate::stats::Metric;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

const MEAN: &str = "mean";
const COUNT: &str = "count";
const SUM: &str = "sum";

/// Mean retention of one plan at one week offset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionPoint {
    pub plan_type: String,
    pub week_number: u32,
    pub mean_retention_pct: f64,
}

/// Cohort × week matrix of mean retention. Missing combinations stay `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CohortHeatmap {
    /// Row labels, ascending.
    pub months: Vec<CohortMonth>,
    /// Column labels, ascending.
    pub weeks: Vec<u32>,
    /// `values[row][col]`.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CohortHeatmap {
    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn get(&self, month: CohortMonth, week: u32) -> Option<f64> {
        let row = self.months.binary_search(&month).ok()?;
        let col = self.weeks.binary_search(&week).ok()?;
        self.values[row][col]
    }

    /// Number of populated cells.
    pub fn filled_cells(&self) -> usize {
        self.values.iter().flatten().filter(|v| v.is_some()).count()
    }

    /// Min and max populated value, for colour scaling.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.values.iter().flatten().flatten().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// Mean ARPU for one (region, plan) with the number of rows behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArpuCell {
    pub region: String,
    pub plan_type: String,
    pub mean_arpu: f64,
    pub samples: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ArpuByPlanRegion {
    pub cells: Vec<ArpuCell>,
}

impl ArpuByPlanRegion {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Per-region mean ARPU, weighted by sample count so it equals the mean
    /// over the underlying revenue rows. Sorted by region.
    pub fn region_means(&self) -> Vec<(String, f64)> {
        let mut totals: BTreeMap<&str, (f64, u64)> = BTreeMap::new();
        for cell in &self.cells {
            let entry = totals.entry(cell.region.as_str()).or_insert((0.0, 0));
            entry.0 += cell.mean_arpu * cell.samples as f64;
            entry.1 += cell.samples;
        }
        totals
            .into_iter()
            .filter(|(_, (_, n))| *n > 0)
            .map(|(region, (sum, n))| (region.to_string(), sum / n as f64))
            .collect()
    }

    pub fn plans(&self) -> Vec<String> {
        let mut plans: Vec<String> = self.cells.iter().map(|c| c.plan_type.clone()).collect();
        plans.sort();
        plans.dedup();
        plans
    }

    pub fn regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = self.cells.iter().map(|c| c.region.clone()).collect();
        regions.sort();
        regions.dedup();
        regions
    }
}

/// Week-0 cohort count and retained revenue for one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSummary {
    pub region: String,
    pub cohort_count: u64,
    pub revenue_sum: f64,
    pub coordinates: Option<Coordinates>,
}

impl RegionSummary {
    /// Only regions with known coordinates can be placed on a map.
    pub fn is_mappable(&self) -> bool {
        self.coordinates.is_some()
    }
}

/// The four filtered aggregations, recomputed together on every selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregations {
    pub retention_curve: Vec<RetentionPoint>,
    pub cohort_heatmap: CohortHeatmap,
    pub arpu_by_plan_region: Metric<ArpuByPlanRegion>,
    pub region_summary: Vec<RegionSummary>,
}

impl Aggregations {
    pub fn compute(filtered: &FilteredTables) -> PolarsResult<Self> {
        Ok(Self {
            retention_curve: retention_curve(&filtered.retention)?,
            cohort_heatmap: cohort_heatmap(&filtered.retention)?,
            arpu_by_plan_region: arpu_by_plan_region(&filtered.revenue)?,
            region_summary: region_summary(&filtered.retention, &filtered.revenue)?,
        })
    }
}

/// Mean retention per (plan_type, week_number), sorted by plan then week.
pub fn retention_curve(table: &RetentionTable) -> PolarsResult<Vec<RetentionPoint>> {
    if table.is_empty() {
        return Ok(Vec::new());
    }

    let grouped = table
        .frame()
        .clone()
        .lazy()
        .group_by([col(PLAN_TYPE), col(WEEK_NUMBER)])
        .agg([col(RETENTION_PCT).mean().alias(MEAN)])
        .collect()?;

    let plans = grouped.column(PLAN_TYPE)?.str()?;
    let weeks = grouped.column(WEEK_NUMBER)?.i64()?;
    let means = grouped.column(MEAN)?.f64()?;

    let mut points: Vec<RetentionPoint> = plans
        .into_iter()
        .zip(weeks)
        .zip(means)
        .filter_map(|((plan, week), mean)| {
            Some(RetentionPoint {
                plan_type: plan?.to_string(),
                week_number: u32::try_from(week?).ok()?,
                mean_retention_pct: mean?,
            })
        })
        .collect();

    points.sort_by(|a, b| {
        a.plan_type
            .cmp(&b.plan_type)
            .then(a.week_number.cmp(&b.week_number))
    });
    Ok(points)
}

/// Mean retention per (cohort_month, week_number) reshaped into a matrix.
pub fn cohort_heatmap(table: &RetentionTable) -> PolarsResult<CohortHeatmap> {
    if table.is_empty() {
        return Ok(CohortHeatmap::default());
    }

    let grouped = table
        .frame()
        .clone()
        .lazy()
        .group_by([col(COHORT_MONTH), col(WEEK_NUMBER)])
        .agg([col(RETENTION_PCT).mean().alias(MEAN)])
        .collect()?;

    let months = grouped.column(COHORT_MONTH)?.str()?;
    let weeks = grouped.column(WEEK_NUMBER)?.i64()?;
    let means = grouped.column(MEAN)?.f64()?;

    let mut cells: BTreeMap<(CohortMonth, u32), f64> = BTreeMap::new();
    for ((month, week), mean) in months.into_iter().zip(weeks).zip(means) {
        let (Some(month), Some(week), Some(mean)) = (month, week, mean) else {
            continue;
        };
        let (Ok(month), Ok(week)) = (month.parse::<CohortMonth>(), u32::try_from(week)) else {
            continue;
        };
        cells.insert((month, week), mean);
    }

    let mut months: Vec<CohortMonth> = cells.keys().map(|(m, _)| *m).collect();
    months.dedup();
    let mut weeks: Vec<u32> = cells.keys().map(|(_, w)| *w).collect();
    weeks.sort_unstable();
    weeks.dedup();

    let values = months
        .iter()
        .map(|m| weeks.iter().map(|w| cells.get(&(*m, *w)).copied()).collect())
        .collect();

    Ok(CohortHeatmap {
        months,
        weeks,
        values,
    })
}

/// Mean ARPU per (region, plan_type). `Unavailable` when the source has no
/// ARPU column; an empty selection gives an available, empty table.
pub fn arpu_by_plan_region(table: &RevenueTable) -> PolarsResult<Metric<ArpuByPlanRegion>> {
    if !table.has_arpu() {
        return Ok(Metric::Unavailable);
    }
    if table.is_empty() {
        return Ok(Metric::Available(ArpuByPlanRegion::default()));
    }

    let grouped = table
        .frame()
        .clone()
        .lazy()
        .group_by([col(REGION), col(PLAN_TYPE)])
        .agg([
            col(ARPU).mean().alias(MEAN),
            col(ARPU).count().cast(DataType::Int64).alias(COUNT),
        ])
        .collect()?;

    let regions = grouped.column(REGION)?.str()?;
    let plans = grouped.column(PLAN_TYPE)?.str()?;
    let means = grouped.column(MEAN)?.f64()?;
    let counts = grouped.column(COUNT)?.i64()?;

    let mut cells: Vec<ArpuCell> = regions
        .into_iter()
        .zip(plans)
        .zip(means)
        .zip(counts)
        .filter_map(|(((region, plan), mean), count)| {
            Some(ArpuCell {
                region: region?.to_string(),
                plan_type: plan?.to_string(),
                mean_arpu: mean?,
                samples: u64::try_from(count?).ok()?,
            })
        })
        .collect();

    cells.sort_by(|a, b| a.region.cmp(&b.region).then(a.plan_type.cmp(&b.plan_type)));
    Ok(Metric::Available(ArpuByPlanRegion { cells }))
}

/// Week-0 cohort counts and retained revenue per region, outer-joined with
/// zero fill and annotated with static coordinates. Sorted by region.
pub fn region_summary(retention: &RetentionTable, revenue: &RevenueTable) -> PolarsResult<Vec<RegionSummary>> {
    let mut merged: BTreeMap<String, (u64, f64)> = BTreeMap::new();

    for (region, count) in week_zero_counts_by_region(retention)? {
        merged.entry(region).or_insert((0, 0.0)).0 = count;
    }
    for (region, sum) in revenue_by_region(revenue)? {
        merged.entry(region).or_insert((0, 0.0)).1 = sum;
    }

    Ok(merged
        .into_iter()
        .map(|(region, (cohort_count, revenue_sum))| RegionSummary {
            coordinates: region_coordinates(&region),
            region,
            cohort_count,
            revenue_sum,
        })
        .collect())
}

fn week_zero_counts_by_region(table: &RetentionTable) -> PolarsResult<Vec<(String, u64)>> {
    if table.is_empty() {
        return Ok(Vec::new());
    }

    let grouped = table
        .frame()
        .clone()
        .lazy()
        .filter(col(WEEK_NUMBER).eq(lit(0i64)))
        .group_by([col(REGION)])
        .agg([col(RETENTION_PCT).count().cast(DataType::Int64).alias(COUNT)])
        .collect()?;

    let regions = grouped.column(REGION)?.str()?;
    let counts = grouped.column(COUNT)?.i64()?;
    Ok(regions
        .into_iter()
        .zip(counts)
        .filter_map(|(region, count)| Some((region?.to_string(), u64::try_from(count?).ok()?)))
        .collect())
}

/// Sum of retained revenue per region; nothing when the column is absent.
fn revenue_by_region(table: &RevenueTable) -> PolarsResult<Vec<(String, f64)>> {
    if !table.has_revenue() || table.is_empty() {
        return Ok(Vec::new());
    }

    let grouped = table
        .frame()
        .clone()
        .lazy()
        .group_by([col(REGION)])
        .agg([col(REVENUE).sum().alias(SUM)])
        .collect()?;

    let regions = grouped.column(REGION)?.str()?;
    let sums = grouped.column(SUM)?.f64()?;
    Ok(regions
        .into_iter()
        .zip(sums)
        .filter_map(|(region, sum)| Some((region?.to_string(), sum.unwrap_or(0.0))))
        .collect())
}

/// Mean retention per plan, optionally restricted to one week. Sorted by plan.
pub fn plan_means(table: &RetentionTable, week: Option<u32>) -> PolarsResult<Vec<(String, f64)>> {
    if table.is_empty() {
        return Ok(Vec::new());
    }

    let mut lazy = table.frame().clone().lazy();
    if let Some(week) = week {
        lazy = lazy.filter(col(WEEK_NUMBER).eq(lit(i64::from(week))));
    }
    let grouped = lazy
        .group_by([col(PLAN_TYPE)])
        .agg([col(RETENTION_PCT).mean().alias(MEAN)])
        .collect()?;

    let plans = grouped.column(PLAN_TYPE)?.str()?;
    let means = grouped.column(MEAN)?.f64()?;
    let mut out: Vec<(String, f64)> = plans
        .into_iter()
        .zip(means)
        .filter_map(|(plan, mean)| Some((plan?.to_string(), mean?)))
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

/// Number of rows at week 0, whatever their retention value.
pub fn week_zero_rows(table: &RetentionTable) -> PolarsResult<usize> {
    if table.is_empty() {
        return Ok(0);
    }
    let rows = table
        .frame()
        .clone()
        .lazy()
        .filter(col(WEEK_NUMBER).eq(lit(0i64)))
        .collect()?;
    Ok(rows.height())
}

/// Total cohort groups across the whole unfiltered retention table: week-0
/// retention values grouped by (plan_type, region, cohort_month), summed.
///
/// Returns `None` rather than failing so callers can show a placeholder.
pub fn cohort_sizes(table: &RetentionTable) -> Option<u64> {
    match count_cohort_groups(table) {
        Ok(total) => Some(total),
        Err(e) => {
            tracing::warn!("Cohort size count unavailable: {}", e);
            None
        }
    }
}

fn count_cohort_groups(table: &RetentionTable) -> PolarsResult<u64> {
    let grouped = table
        .frame()
        .clone()
        .lazy()
        .filter(
            col(WEEK_NUMBER)
                .eq(lit(0i64))
                .and(col(PLAN_TYPE).is_not_null())
                .and(col(REGION).is_not_null())
                .and(col(COHORT_MONTH).is_not_null()),
        )
        .group_by([col(PLAN_TYPE), col(REGION), col(COHORT_MONTH)])
        .agg([col(RETENTION_PCT).count().cast(DataType::Int64).alias(COUNT)])
        .collect()?;

    let total = grouped
        .column(COUNT)?
        .i64()?
        .into_iter()
        .flatten()
        .map(|n| u64::try_from(n).unwrap_or(0))
        .sum();
    Ok(total)
}
