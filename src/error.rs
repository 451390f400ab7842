//! Error types shared across the loader and query pipeline.

use polars::prelude::PolarsError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which of the two input tables an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Retention,
    Revenue,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Retention => write!(f, "retention"),
            TableKind::Revenue => write!(f, "revenue"),
        }
    }
}

/// Failures while locating, reading or normalizing the input tables.
///
/// All of these are terminal for the load attempt.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Neither uploaded data nor the default files are available.
    #[error(
        "CSV files not found. Upload {retention_file} & {revenue_file}, or place them in {}",
        dir.display()
    )]
    MissingInput {
        dir: PathBuf,
        retention_file: &'static str,
        revenue_file: &'static str,
    },

    /// One or more required columns are absent after alias normalization.
    #[error("{table} table is missing required column(s): {}", missing.join(", "))]
    Schema {
        table: TableKind,
        missing: Vec<String>,
    },

    /// A cell could not be interpreted or violates a column invariant.
    #[error("{table} table: invalid value {value:?} in column '{column}' at row {row}")]
    InvalidValue {
        table: TableKind,
        column: &'static str,
        row: usize,
        value: String,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] PolarsError),
}

/// Errors surfaced by the dashboard pipeline.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A dataframe query failed while filtering or aggregating.
    #[error("Query failed: {0}")]
    Query(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
