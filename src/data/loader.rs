//! CSV Data Loader Module
//! Resolves the input sources and parses them into typed tables using Polars.

use crate::data::schema::{
    normalize_columns, require_columns, CohortMonth, ARPU, COHORT_MONTH, PLAN_TYPE, REGION,
    RETENTION_PCT, RETENTION_REQUIRED, REVENUE, REVENUE_REQUIRED, WEEK_NUMBER,
};
use crate::data::table::{Datasets, RetentionTable, RevenueTable};
use crate::error::{LoadError, TableKind};
use polars::prelude::*;
use std::io::Cursor;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Default retention export looked up in the data directory.
pub const RETENTION_FILE: &str = "retention_by_plan_region.csv";
/// Default revenue export looked up in the data directory.
pub const REVENUE_FILE: &str = "arpu_by_plan_region.csv";

/// Schema inference is disabled: every column is read as text and typed
/// cell by cell, so a malformed number is reported instead of nulled.
const TEXT_ONLY_SCHEMA: usize = 0;
const RETENTION_RANGE: RangeInclusive<f64> = 0.0..=100.0;
const NON_NEGATIVE: RangeInclusive<f64> = 0.0..=f64::MAX;

/// Where the raw bytes came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOrigin {
    Uploaded,
    DefaultFiles(PathBuf),
}

/// Raw bytes of both exports, not yet parsed.
#[derive(Debug, Clone)]
pub struct RawInputs {
    pub retention: Vec<u8>,
    pub revenue: Vec<u8>,
    pub origin: InputOrigin,
}

impl RawInputs {
    /// Pick the input pair: uploads win when both are supplied, otherwise the
    /// default files in `data_dir` are used when both exist.
    pub fn resolve(
        uploaded_retention: Option<Vec<u8>>,
        uploaded_revenue: Option<Vec<u8>>,
        data_dir: &Path,
    ) -> Result<Self, LoadError> {
        if let (Some(retention), Some(revenue)) = (uploaded_retention, uploaded_revenue) {
            tracing::debug!("Using uploaded retention and revenue data");
            return Ok(Self {
                retention,
                revenue,
                origin: InputOrigin::Uploaded,
            });
        }

        let retention_path = data_dir.join(RETENTION_FILE);
        let revenue_path = data_dir.join(REVENUE_FILE);
        if retention_path.is_file() && revenue_path.is_file() {
            tracing::debug!("Using default CSV files in {}", data_dir.display());
            return Ok(Self {
                retention: read_file(&retention_path)?,
                revenue: read_file(&revenue_path)?,
                origin: InputOrigin::DefaultFiles(data_dir.to_path_buf()),
            });
        }

        Err(LoadError::MissingInput {
            dir: data_dir.to_path_buf(),
            retention_file: RETENTION_FILE,
            revenue_file: REVENUE_FILE,
        })
    }
}

/// Read a whole file, keeping the path in the error.
pub fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses retention and revenue exports into normalized tables.
pub struct DatasetLoader;

impl DatasetLoader {
    /// Parse both exports from in-memory bytes.
    pub fn load_bytes(retention: &[u8], revenue: &[u8]) -> Result<Datasets, LoadError> {
        let retention = Self::parse_retention(retention)?;
        let revenue = Self::parse_revenue(revenue)?;
        tracing::info!(
            "Loaded {} retention rows and {} revenue rows",
            retention.len(),
            revenue.len()
        );
        Ok(Datasets { retention, revenue })
    }

    /// Parse both exports from disk.
    pub fn load_paths(retention: &Path, revenue: &Path) -> Result<Datasets, LoadError> {
        Self::load_bytes(&read_file(retention)?, &read_file(revenue)?)
    }

    pub fn parse_retention(bytes: &[u8]) -> Result<RetentionTable, LoadError> {
        let table = TableKind::Retention;
        let mut df = Self::read_csv(bytes)?;
        normalize_columns(&mut df)?;
        require_columns(&df, table, &RETENTION_REQUIRED)?;

        let frame = DataFrame::new(vec![
            Column::new(COHORT_MONTH.into(), month_values(&df, table)?),
            Column::new(REGION.into(), string_values(&df, REGION)?),
            Column::new(PLAN_TYPE.into(), string_values(&df, PLAN_TYPE)?),
            Column::new(WEEK_NUMBER.into(), week_values(&df, table)?),
            Column::new(
                RETENTION_PCT.into(),
                float_values(&df, table, RETENTION_PCT, RETENTION_RANGE)?,
            ),
        ])?;
        Ok(RetentionTable::from_frame(frame))
    }

    pub fn parse_revenue(bytes: &[u8]) -> Result<RevenueTable, LoadError> {
        let table = TableKind::Revenue;
        let mut df = Self::read_csv(bytes)?;
        normalize_columns(&mut df)?;
        require_columns(&df, table, &REVENUE_REQUIRED)?;

        let mut columns = vec![
            Column::new(COHORT_MONTH.into(), month_values(&df, table)?),
            Column::new(REGION.into(), string_values(&df, REGION)?),
            Column::new(PLAN_TYPE.into(), string_values(&df, PLAN_TYPE)?),
        ];
        for optional in [ARPU, REVENUE] {
            if df.get_column_index(optional).is_some() {
                columns.push(Column::new(
                    optional.into(),
                    float_values(&df, table, optional, NON_NEGATIVE)?,
                ));
            } else {
                tracing::warn!("Revenue data has no '{}' column; metric unavailable", optional);
            }
        }
        Ok(RevenueTable::from_frame(DataFrame::new(columns)?))
    }

    fn read_csv(bytes: &[u8]) -> Result<DataFrame, LoadError> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(TEXT_ONLY_SCHEMA))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;
        Ok(df)
    }
}

/// Trimmed string cells; blank cells become null.
fn string_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    let values = column
        .str()?
        .into_iter()
        .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
        .collect();
    Ok(values)
}

/// Cohort months normalized to `YYYY-MM` so lexical order is chronological.
fn month_values(df: &DataFrame, table: TableKind) -> Result<Vec<Option<String>>, LoadError> {
    string_values(df, COHORT_MONTH)?
        .into_iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            None => Ok(None),
            Some(raw) => match raw.parse::<CohortMonth>() {
                Ok(month) => Ok(Some(month.to_string())),
                Err(_) => Err(LoadError::InvalidValue {
                    table,
                    column: COHORT_MONTH,
                    row: i + 1,
                    value: raw,
                }),
            },
        })
        .collect()
}

/// Non-negative whole week offsets. `8` and `8.0` are accepted, `7.9` is not.
fn week_values(df: &DataFrame, table: TableKind) -> Result<Vec<Option<i64>>, LoadError> {
    numeric_cells(df, table, WEEK_NUMBER)?
        .into_iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            None => Ok(None),
            Some((_, w)) if w >= 0.0 && w.fract() == 0.0 && w <= i64::MAX as f64 => Ok(Some(w as i64)),
            Some((raw, _)) => Err(LoadError::InvalidValue {
                table,
                column: WEEK_NUMBER,
                row: i + 1,
                value: raw,
            }),
        })
        .collect()
}

/// Float cells checked against `range`. NaN is read as a missing value.
fn float_values(
    df: &DataFrame,
    table: TableKind,
    name: &'static str,
    range: RangeInclusive<f64>,
) -> Result<Vec<Option<f64>>, LoadError> {
    numeric_cells(df, table, name)?
        .into_iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            None => Ok(None),
            Some((_, v)) if v.is_nan() => Ok(None),
            Some((_, v)) if range.contains(&v) => Ok(Some(v)),
            Some((raw, _)) => Err(LoadError::InvalidValue {
                table,
                column: name,
                row: i + 1,
                value: raw,
            }),
        })
        .collect()
}

/// Parse each non-blank cell as a number, keeping the raw text for errors.
/// Blank cells stay null; anything else that is not a number is rejected.
fn numeric_cells(
    df: &DataFrame,
    table: TableKind,
    name: &'static str,
) -> Result<Vec<Option<(String, f64)>>, LoadError> {
    string_values(df, name)?
        .into_iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            None => Ok(None),
            Some(raw) => match raw.parse::<f64>() {
                Ok(v) => Ok(Some((raw, v))),
                Err(_) => Err(LoadError::InvalidValue {
                    table,
                    column: name,
                    row: i + 1,
                    value: raw,
                }),
            },
        })
        .collect()
}
