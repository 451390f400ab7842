//! Column Schema Module
//! Canonical column names, the alias table, cohort months and region metadata.

use crate::error::{LoadError, TableKind};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const COHORT_MONTH: &str = "cohort_month";
pub const REGION: &str = "region";
pub const PLAN_TYPE: &str = "plan_type";
pub const WEEK_NUMBER: &str = "week_number";
pub const RETENTION_PCT: &str = "retention_pct";
pub const ARPU: &str = "arpu_retained_d30";
pub const REVENUE: &str = "revenue_from_retained";

/// Columns every retention export must carry (after aliasing).
pub const RETENTION_REQUIRED: [&str; 5] = [COHORT_MONTH, REGION, PLAN_TYPE, WEEK_NUMBER, RETENTION_PCT];

/// Columns every revenue export must carry. ARPU and revenue are optional.
pub const REVENUE_REQUIRED: [&str; 3] = [COHORT_MONTH, REGION, PLAN_TYPE];

pub const KNOWN_PLANS: [&str; 3] = ["ad_supported", "basic", "premium"];
pub const KNOWN_REGIONS: [&str; 5] = ["US", "IN", "GB", "CA", "AU"];

/// Maps a legacy column name onto its canonical name.
#[derive(Debug, Clone, Copy)]
pub struct ColumnAlias {
    pub alias: &'static str,
    pub canonical: &'static str,
}

/// Declared aliases, applied in order. Add new back-compat names here.
pub const COLUMN_ALIASES: &[ColumnAlias] = &[ColumnAlias {
    alias: "retention",
    canonical: RETENTION_PCT,
}];

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

/// Rename aliased columns to their canonical names.
///
/// An alias is only applied when the canonical column is absent, so a file
/// carrying both keeps its canonical column untouched.
pub fn normalize_columns(df: &mut DataFrame) -> PolarsResult<()> {
    for rule in COLUMN_ALIASES {
        if !has_column(df, rule.canonical) && has_column(df, rule.alias) {
            df.rename(rule.alias, rule.canonical.into())?;
        }
    }
    Ok(())
}

/// Fail with a schema error naming every required column that is absent.
pub fn require_columns(df: &DataFrame, table: TableKind, required: &[&str]) -> Result<(), LoadError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !has_column(df, name))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(LoadError::Schema { table, missing })
    }
}

/// A calendar month. Day-of-month is discarded at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CohortMonth {
    year: i32,
    month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMonthError(pub String);

impl fmt::Display for ParseMonthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a recognised date: {:?}", self.0)
    }
}

impl std::error::Error for ParseMonthError {}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

impl CohortMonth {
    /// Returns `None` when `month` is outside 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self::from_date)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First day of the month.
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }
}

impl FromStr for CohortMonth {
    type Err = ParseMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Drop a trailing time component ("2024-01-01 00:00:00", "2024-01-01T00:00:00").
        let date_part = trimmed
            .split(|c: char| c == 'T' || c == ' ')
            .next()
            .unwrap_or(trimmed);

        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(date_part, fmt) {
                return Ok(Self::from_date(date));
            }
        }

        // Month-only exports ("2024-01").
        NaiveDate::parse_from_str(&format!("{date_part}-01"), "%Y-%m-%d")
            .map(Self::from_date)
            .map_err(|_| ParseMonthError(s.to_string()))
    }
}

impl fmt::Display for CohortMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for CohortMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

const REGION_COORDINATES: [(&str, Coordinates); 5] = [
    ("US", Coordinates { lat: 37.0902, lon: -95.7129 }),
    ("IN", Coordinates { lat: 20.5937, lon: 78.9629 }),
    ("GB", Coordinates { lat: 55.3781, lon: -3.4360 }),
    ("CA", Coordinates { lat: 56.1304, lon: -106.3468 }),
    ("AU", Coordinates { lat: -25.2744, lon: 133.7751 }),
];

/// Static centroid for a region code. Unknown codes have no coordinates.
pub fn region_coordinates(region: &str) -> Option<Coordinates> {
    REGION_COORDINATES
        .iter()
        .find(|(code, _)| *code == region)
        .map(|(_, coords)| *coords)
}
