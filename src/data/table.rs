//! Typed Tables Module
//! Normalized retention and revenue frames plus their row-level views.

use crate::data::schema::{
    has_column, CohortMonth, ARPU, COHORT_MONTH, PLAN_TYPE, REGION, RETENTION_PCT, REVENUE,
    WEEK_NUMBER,
};
use polars::prelude::*;

/// One retention observation: a cohort's retention at a week offset.
#[derive(Debug, Clone, PartialEq)]
pub struct RetentionRecord {
    pub cohort_month: CohortMonth,
    pub plan_type: String,
    pub region: String,
    pub week_number: u32,
    pub retention_pct: f64,
}

/// Revenue figures for one (cohort_month, plan_type, region).
#[derive(Debug, Clone, PartialEq)]
pub struct RevenueRecord {
    pub cohort_month: CohortMonth,
    pub plan_type: String,
    pub region: String,
    pub arpu_retained_d30: Option<f64>,
    pub revenue_from_retained: Option<f64>,
}

/// Which optional revenue columns a table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevenueColumns {
    pub arpu: bool,
    pub revenue: bool,
}

impl RevenueColumns {
    pub const ALL: Self = Self {
        arpu: true,
        revenue: true,
    };
}

/// Retention table with canonical columns:
/// `cohort_month` (String, `YYYY-MM`), `region`, `plan_type` (String),
/// `week_number` (Int64), `retention_pct` (Float64).
#[derive(Debug, Clone)]
pub struct RetentionTable {
    frame: DataFrame,
}

impl RetentionTable {
    /// Wrap a frame that already carries the canonical columns and dtypes.
    pub(crate) fn from_frame(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn from_records(records: &[RetentionRecord]) -> PolarsResult<Self> {
        let frame = DataFrame::new(vec![
            Column::new(
                COHORT_MONTH.into(),
                records.iter().map(|r| r.cohort_month.to_string()).collect::<Vec<_>>(),
            ),
            Column::new(
                REGION.into(),
                records.iter().map(|r| r.region.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                PLAN_TYPE.into(),
                records.iter().map(|r| r.plan_type.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                WEEK_NUMBER.into(),
                records.iter().map(|r| i64::from(r.week_number)).collect::<Vec<_>>(),
            ),
            Column::new(
                RETENTION_PCT.into(),
                records.iter().map(|r| r.retention_pct).collect::<Vec<_>>(),
            ),
        ])?;
        Ok(Self { frame })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Complete rows as records. Rows with a null cell are skipped.
    pub fn records(&self) -> PolarsResult<Vec<RetentionRecord>> {
        let months = self.frame.column(COHORT_MONTH)?.str()?;
        let regions = self.frame.column(REGION)?.str()?;
        let plans = self.frame.column(PLAN_TYPE)?.str()?;
        let weeks = self.frame.column(WEEK_NUMBER)?.i64()?;
        let values = self.frame.column(RETENTION_PCT)?.f64()?;

        let mut records = Vec::with_capacity(self.len());
        for i in 0..self.len() {
            let (Some(month), Some(region), Some(plan), Some(week), Some(value)) = (
                months.get(i),
                regions.get(i),
                plans.get(i),
                weeks.get(i),
                values.get(i),
            ) else {
                continue;
            };
            let (Ok(cohort_month), Ok(week_number)) = (month.parse::<CohortMonth>(), u32::try_from(week)) else {
                continue;
            };
            records.push(RetentionRecord {
                cohort_month,
                plan_type: plan.to_string(),
                region: region.to_string(),
                week_number,
                retention_pct: value,
            });
        }
        Ok(records)
    }
}

/// Revenue table with canonical key columns and whichever of
/// `arpu_retained_d30` / `revenue_from_retained` (Float64) the source had.
#[derive(Debug, Clone)]
pub struct RevenueTable {
    frame: DataFrame,
}

impl RevenueTable {
    pub(crate) fn from_frame(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn from_records(records: &[RevenueRecord], columns: RevenueColumns) -> PolarsResult<Self> {
        let mut cols = vec![
            Column::new(
                COHORT_MONTH.into(),
                records.iter().map(|r| r.cohort_month.to_string()).collect::<Vec<_>>(),
            ),
            Column::new(
                REGION.into(),
                records.iter().map(|r| r.region.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                PLAN_TYPE.into(),
                records.iter().map(|r| r.plan_type.clone()).collect::<Vec<_>>(),
            ),
        ];
        if columns.arpu {
            cols.push(Column::new(
                ARPU.into(),
                records.iter().map(|r| r.arpu_retained_d30).collect::<Vec<_>>(),
            ));
        }
        if columns.revenue {
            cols.push(Column::new(
                REVENUE.into(),
                records.iter().map(|r| r.revenue_from_retained).collect::<Vec<_>>(),
            ));
        }
        Ok(Self {
            frame: DataFrame::new(cols)?,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn columns(&self) -> RevenueColumns {
        RevenueColumns {
            arpu: self.has_arpu(),
            revenue: self.has_revenue(),
        }
    }

    pub fn has_arpu(&self) -> bool {
        has_column(&self.frame, ARPU)
    }

    pub fn has_revenue(&self) -> bool {
        has_column(&self.frame, REVENUE)
    }
}

/// The pair of parsed input tables.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub retention: RetentionTable,
    pub revenue: RevenueTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(m: u32) -> CohortMonth {
        CohortMonth::new(2024, m).unwrap()
    }

    #[test]
    fn test_retention_records_survive_the_frame() {
        let records = vec![
            RetentionRecord {
                cohort_month: month(1),
                plan_type: "premium".to_string(),
                region: "US".to_string(),
                week_number: 0,
                retention_pct: 100.0,
            },
            RetentionRecord {
                cohort_month: month(2),
                plan_type: "basic".to_string(),
                region: "IN".to_string(),
                week_number: 4,
                retention_pct: 61.5,
            },
        ];
        let table = RetentionTable::from_records(&records).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records().unwrap(), records);
    }

    #[test]
    fn test_revenue_table_tracks_optional_columns() {
        let records = vec![RevenueRecord {
            cohort_month: month(1),
            plan_type: "basic".to_string(),
            region: "GB".to_string(),
            arpu_retained_d30: Some(7.5),
            revenue_from_retained: Some(1200.0),
        }];

        let full = RevenueTable::from_records(&records, RevenueColumns::ALL).unwrap();
        assert!(full.has_arpu() && full.has_revenue());

        let no_arpu = RevenueTable::from_records(
            &records,
            RevenueColumns {
                arpu: false,
                revenue: true,
            },
        )
        .unwrap();
        assert!(!no_arpu.has_arpu());
        assert!(no_arpu.has_revenue());
        assert_eq!(no_arpu.frame().width(), 4);
    }

    #[test]
    fn test_empty_tables_are_well_formed() {
        let retention = RetentionTable::from_records(&[]).unwrap();
        assert!(retention.is_empty());
        assert!(retention.records().unwrap().is_empty());

        let revenue = RevenueTable::from_records(&[], RevenueColumns::ALL).unwrap();
        assert!(revenue.is_empty());
        assert_eq!(revenue.columns(), RevenueColumns::ALL);
    }
}
