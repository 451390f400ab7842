//! Filter Engine
//! Region / plan / week selection over both tables.

use crate::data::schema::{PLAN_TYPE, REGION, WEEK_NUMBER};
use crate::data::table::{Datasets, RetentionTable, RevenueTable};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;

/// Default upper bound of the week slider.
pub const DEFAULT_MAX_WEEK: u32 = 12;

/// Inclusive week window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeekRange {
    pub min: u32,
    pub max: u32,
}

impl WeekRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, week: u32) -> bool {
        self.min <= week && week <= self.max
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

/// Values the selection widgets may offer, taken from the unfiltered
/// retention table only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub regions: Vec<String>,
    pub plans: Vec<String>,
    pub week_max: u32,
}

impl FilterOptions {
    pub fn from_retention(table: &RetentionTable) -> PolarsResult<Self> {
        let frame = table.frame();
        let regions = distinct_strings(frame, REGION)?;
        let plans = distinct_strings(frame, PLAN_TYPE)?;
        let week_max = frame
            .column(WEEK_NUMBER)?
            .i64()?
            .into_iter()
            .flatten()
            .max()
            .and_then(|w| u32::try_from(w).ok())
            .unwrap_or(0);

        Ok(Self {
            regions,
            plans,
            week_max,
        })
    }
}

fn distinct_strings(frame: &DataFrame, name: &str) -> PolarsResult<Vec<String>> {
    let values: BTreeSet<String> = frame
        .column(name)?
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
    Ok(values.into_iter().collect())
}

/// A complete user selection. Immutable; build a new one to change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterState {
    pub regions: BTreeSet<String>,
    pub plans: BTreeSet<String>,
    pub weeks: WeekRange,
}

impl FilterState {
    pub fn new<R, P>(regions: R, plans: P, weeks: WeekRange) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            regions: regions.into_iter().map(Into::into).collect(),
            plans: plans.into_iter().map(Into::into).collect(),
            weeks,
        }
    }

    /// Everything selected, weeks `0..=min(12, week_max)`.
    pub fn from_options(options: &FilterOptions) -> Self {
        Self::new(
            options.regions.iter().cloned(),
            options.plans.iter().cloned(),
            WeekRange::new(0, options.week_max.min(DEFAULT_MAX_WEEK)),
        )
    }

    pub fn with_regions<I, S>(self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            regions: regions.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    pub fn with_plans<I, S>(self, plans: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            plans: plans.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    pub fn with_weeks(self, weeks: WeekRange) -> Self {
        Self { weeks, ..self }
    }

    /// Row predicate for retention, mirroring the frame-level filter.
    pub fn matches_retention(&self, region: &str, plan: &str, week: u32) -> bool {
        self.regions.contains(region) && self.plans.contains(plan) && self.weeks.contains(week)
    }

    /// Row predicate for revenue (no week dimension).
    pub fn matches_revenue(&self, region: &str, plan: &str) -> bool {
        self.regions.contains(region) && self.plans.contains(plan)
    }
}

/// Both tables after a filter has been applied.
#[derive(Debug, Clone)]
pub struct FilteredTables {
    pub retention: RetentionTable,
    pub revenue: RevenueTable,
}

/// `column ∈ values` as an OR-chain of equalities; `None` for an empty set.
fn member_of(column: &str, values: &BTreeSet<String>) -> Option<Expr> {
    values
        .iter()
        .map(|v| col(column).eq(lit(v.as_str())))
        .reduce(|acc, e| acc.or(e))
}

/// Apply `state` to both tables. An empty selection yields empty tables
/// with the original schema, never an error.
pub fn apply_filters(datasets: &Datasets, state: &FilterState) -> PolarsResult<FilteredTables> {
    let keys = match (member_of(REGION, &state.regions), member_of(PLAN_TYPE, &state.plans)) {
        (Some(region), Some(plan)) => Some(region.and(plan)),
        _ => None,
    };

    let retention_frame = datasets.retention.frame();
    let revenue_frame = datasets.revenue.frame();

    let (retention, revenue) = match keys {
        Some(keys) if !state.weeks.is_empty() => {
            let weeks = col(WEEK_NUMBER)
                .gt_eq(lit(i64::from(state.weeks.min)))
                .and(col(WEEK_NUMBER).lt_eq(lit(i64::from(state.weeks.max))));

            let retention = retention_frame
                .clone()
                .lazy()
                .filter(keys.clone().and(weeks))
                .collect()?;
            let revenue = revenue_frame.clone().lazy().filter(keys).collect()?;
            (retention, revenue)
        }
        Some(keys) => {
            // Inverted week window: no retention rows, revenue is unaffected.
            let revenue = revenue_frame.clone().lazy().filter(keys).collect()?;
            (retention_frame.clear(), revenue)
        }
        None => (retention_frame.clear(), revenue_frame.clear()),
    };

    tracing::debug!(
        "Filter kept {}/{} retention rows and {}/{} revenue rows",
        retention.height(),
        retention_frame.height(),
        revenue.height(),
        revenue_frame.height()
    );

    Ok(FilteredTables {
        retention: RetentionTable::from_frame(retention),
        revenue: RevenueTable::from_frame(revenue),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::CohortMonth;
    use crate::data::table::{RetentionRecord, RevenueColumns, RevenueRecord};

    fn retention(region: &str, plan: &str, week: u32) -> RetentionRecord {
        RetentionRecord {
            cohort_month: CohortMonth::new(2024, 1).unwrap(),
            plan_type: plan.to_string(),
            region: region.to_string(),
            week_number: week,
            retention_pct: 50.0,
        }
    }

    fn revenue(region: &str, plan: &str) -> RevenueRecord {
        RevenueRecord {
            cohort_month: CohortMonth::new(2024, 1).unwrap(),
            plan_type: plan.to_string(),
            region: region.to_string(),
            arpu_retained_d30: Some(5.0),
            revenue_from_retained: Some(100.0),
        }
    }

    fn datasets() -> Datasets {
        Datasets {
            retention: RetentionTable::from_records(&[
                retention("US", "premium", 0),
                retention("US", "basic", 4),
                retention("IN", "premium", 8),
                retention("GB", "ad_supported", 13),
            ])
            .unwrap(),
            revenue: RevenueTable::from_records(
                &[revenue("US", "premium"), revenue("IN", "basic"), revenue("CA", "premium")],
                RevenueColumns::ALL,
            )
            .unwrap(),
        }
    }

    #[test]
    fn test_options_come_from_retention_only() {
        let data = datasets();
        let options = FilterOptions::from_retention(&data.retention).unwrap();
        assert_eq!(options.regions, vec!["GB", "IN", "US"]);
        assert_eq!(options.plans, vec!["ad_supported", "basic", "premium"]);
        assert_eq!(options.week_max, 13);
    }

    #[test]
    fn test_default_state_caps_weeks_at_twelve() {
        let data = datasets();
        let options = FilterOptions::from_retention(&data.retention).unwrap();
        let state = FilterState::from_options(&options);
        assert_eq!(state.weeks, WeekRange::new(0, 12));
        assert_eq!(state.regions.len(), 3);

        let short = FilterOptions {
            week_max: 5,
            ..options
        };
        assert_eq!(FilterState::from_options(&short).weeks, WeekRange::new(0, 5));
    }

    #[test]
    fn test_filter_applies_all_three_retention_predicates() {
        let data = datasets();
        let state = FilterState::new(["US", "IN"], ["premium"], WeekRange::new(0, 8));
        let filtered = apply_filters(&data, &state).unwrap();

        let kept = filtered.retention.records().unwrap();
        assert_eq!(kept.len(), 2);
        assert!(kept
            .iter()
            .all(|r| state.matches_retention(&r.region, &r.plan_type, r.week_number)));

        // Revenue ignores weeks; CA is outside the region set.
        assert_eq!(filtered.revenue.len(), 1);
    }

    #[test]
    fn test_filter_week_bounds_are_inclusive() {
        let data = datasets();
        let state = FilterState::new(["US", "IN", "GB"], ["premium", "basic"], WeekRange::new(4, 8));
        let kept = apply_filters(&data, &state).unwrap().retention.records().unwrap();
        let weeks: Vec<u32> = kept.iter().map(|r| r.week_number).collect();
        assert_eq!(weeks, vec![4, 8]);
    }

    #[test]
    fn test_empty_selection_keeps_schema() {
        let data = datasets();
        let state = FilterState::new(["FR"], ["premium"], WeekRange::new(0, 12));
        let filtered = apply_filters(&data, &state).unwrap();
        assert!(filtered.retention.is_empty());
        assert!(filtered.revenue.is_empty());
        assert!(filtered.revenue.has_arpu());

        let nothing = FilterState::new(Vec::<String>::new(), ["premium"], WeekRange::new(0, 12));
        let filtered = apply_filters(&data, &nothing).unwrap();
        assert!(filtered.retention.is_empty());
        assert_eq!(filtered.retention.frame().width(), 5);
    }

    #[test]
    fn test_inverted_week_range_only_empties_retention() {
        let data = datasets();
        let state = FilterState::new(["US"], ["premium"], WeekRange::new(9, 2));
        let filtered = apply_filters(&data, &state).unwrap();
        assert!(filtered.retention.is_empty());
        assert_eq!(filtered.revenue.len(), 1);
    }
}
