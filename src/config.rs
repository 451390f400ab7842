//! CLI & Logging Module
//! Command line arguments for the `streamhub` binary and tracing setup.

use crate::data::{FilterState, WeekRange};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Command line ───────────────────────────────────────────────────────────────

/// Retention and ARPU analytics for StreamHub subscription cohorts
#[derive(Parser, Debug, Clone)]
#[command(name = "streamhub", about = "Retention and ARPU analytics for StreamHub cohorts", version)]
pub struct Cli {
    /// Logging level (error, warn, info, debug, trace or an EnvFilter directive)
    #[arg(long, global = true, env = "STREAMHUB_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load the two exports, filter, and print KPIs, insights and charts
    Report(ReportArgs),
    /// Write a synthetic users.csv of subscription signups
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Retention export to use instead of the default file (needs --revenue)
    #[arg(long)]
    pub retention: Option<PathBuf>,

    /// Revenue export to use instead of the default file (needs --retention)
    #[arg(long)]
    pub revenue: Option<PathBuf>,

    /// Directory holding the default CSV exports
    #[arg(long, default_value = ".")]
    pub data_dir: PathBuf,

    /// Region to include; repeat for several (default: all)
    #[arg(long = "region", value_name = "REGION")]
    pub regions: Vec<String>,

    /// Plan to include; repeat for several (default: all)
    #[arg(long = "plan", value_name = "PLAN")]
    pub plans: Vec<String>,

    /// Inclusive week range, e.g. 0-12 (default: 0 to min(12, last week))
    #[arg(long, value_name = "MIN-MAX", value_parser = parse_week_range)]
    pub weeks: Option<WeekRange>,

    /// Write chart PNGs into this directory
    #[arg(long)]
    pub charts_dir: Option<PathBuf>,

    /// Print the full dashboard view as JSON
    #[arg(long)]
    pub json: bool,
}

impl ReportArgs {
    /// Apply the command-line selection on top of the dataset defaults.
    pub fn filter(&self, defaults: FilterState) -> FilterState {
        let mut state = defaults;
        if !self.regions.is_empty() {
            state = state.with_regions(self.regions.iter().cloned());
        }
        if !self.plans.is_empty() {
            state = state.with_plans(self.plans.iter().cloned());
        }
        if let Some(weeks) = self.weeks {
            state = state.with_weeks(weeks);
        }
        state
    }
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Number of users to generate
    #[arg(long, default_value = "10000")]
    pub users: u32,

    /// RNG seed for reproducible output
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Output CSV path
    #[arg(long, default_value = "users.csv")]
    pub output: PathBuf,
}

/// Parse `MIN-MAX` into an inclusive week range.
pub fn parse_week_range(s: &str) -> Result<WeekRange, String> {
    let (min, max) = s
        .split_once('-')
        .ok_or_else(|| format!("expected MIN-MAX, got '{s}'"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|_| format!("'{}' is not a week number", part.trim()))
    };
    Ok(WeekRange::new(parse(min)?, parse(max)?))
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber on stderr.
///
/// Falls back to `"info"` if the level string is not a valid directive.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let lower = log_level.to_lowercase();
    let normalised = match lower.as_str() {
        "warning" => "warn",
        "critical" => "error",
        other => other,
    };

    let filter = EnvFilter::try_new(normalised).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()?;

    Ok(())
}
