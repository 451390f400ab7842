//! Synthetic signup generator.
//!
//! Produces a reproducible `users.csv` of subscription signups for demos and
//! for building cohort exports. All randomness comes from one seeded PCG
//! stream, so the same `(n, seed)` always yields the same file.

use crate::data::schema::{KNOWN_PLANS, KNOWN_REGIONS};
use chrono::{Days, NaiveDate};
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Signups fall in the 181 days starting here.
const SIGNUP_YEAR: i32 = 2024;
const SIGNUP_WINDOW_DAYS: u64 = 180;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub user_id: u32,
    pub signup_date: NaiveDate,
    pub plan_type: &'static str,
    pub region: &'static str,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode users CSV: {0}")]
    Csv(#[from] PolarsError),
}

/// `n` users with ids `1..=n`, uniform signup day, plan and region.
pub fn generate_users(n: u32, seed: u64) -> Vec<UserRecord> {
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let start = NaiveDate::from_ymd_opt(SIGNUP_YEAR, 1, 1).unwrap_or_default();

    (1..=n)
        .map(|user_id| {
            let offset = rng.gen_range(0..=SIGNUP_WINDOW_DAYS);
            UserRecord {
                user_id,
                signup_date: start + Days::new(offset),
                plan_type: KNOWN_PLANS[rng.gen_range(0..KNOWN_PLANS.len())],
                region: KNOWN_REGIONS[rng.gen_range(0..KNOWN_REGIONS.len())],
            }
        })
        .collect()
}

/// Columnar form with the `users.csv` header order.
pub fn users_frame(users: &[UserRecord]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Column::new("user_id".into(), users.iter().map(|u| u.user_id).collect::<Vec<_>>()),
        Column::new(
            "signup_date".into(),
            users
                .iter()
                .map(|u| u.signup_date.format("%Y-%m-%d").to_string())
                .collect::<Vec<_>>(),
        ),
        Column::new("plan_type".into(), users.iter().map(|u| u.plan_type).collect::<Vec<_>>()),
        Column::new("region".into(), users.iter().map(|u| u.region).collect::<Vec<_>>()),
    ])
}

pub fn write_users_csv(path: &Path, users: &[UserRecord]) -> Result<(), GenerateError> {
    let mut frame = users_frame(users)?;
    let mut file = File::create(path).map_err(|source| GenerateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut frame)?;
    tracing::info!("Wrote {} users to {}", users.len(), path.display());
    Ok(())
}
