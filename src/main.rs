//! StreamHub Analytics - command line entry point
//!
//! `report` loads the two exports and prints the dashboard for a selection;
//! `generate` writes a synthetic signup file.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use streamhub_analytics::charts::StaticChartRenderer;
use streamhub_analytics::config::{setup_logging, Cli, Command, GenerateArgs, ReportArgs};
use streamhub_analytics::data::read_file;
use streamhub_analytics::generator::{generate_users, write_users_csv};
use streamhub_analytics::report::{render_json, render_text};
use streamhub_analytics::{Dashboard, DatasetLoader, LoadError, RawInputs};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = setup_logging(&cli.log_level) {
        eprintln!("Logging disabled: {e}");
    }

    tracing::debug!("StreamHub Analytics v{} starting", env!("CARGO_PKG_VERSION"));

    let result = match &cli.command {
        Command::Report(args) => run_report(args),
        Command::Generate(args) => run_generate(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<LoadError>() {
            Some(load) if matches!(load, LoadError::MissingInput { .. }) => {
                eprintln!("{load}");
                ExitCode::from(2)
            }
            _ => {
                eprintln!("Error: {e:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn run_report(args: &ReportArgs) -> Result<()> {
    let uploaded_retention = args.retention.as_deref().map(read_file).transpose()?;
    let uploaded_revenue = args.revenue.as_deref().map(read_file).transpose()?;
    if uploaded_retention.is_some() != uploaded_revenue.is_some() {
        tracing::warn!("Both --retention and --revenue are needed to use uploaded files; using defaults");
    }

    let inputs = RawInputs::resolve(uploaded_retention, uploaded_revenue, &args.data_dir)?;
    let datasets = DatasetLoader::load_bytes(&inputs.retention, &inputs.revenue)?;

    let dashboard = Dashboard::new(Arc::new(datasets))?;
    let filter = args.filter(dashboard.default_filter());
    let view = dashboard.view(&filter)?;

    let charts = match &args.charts_dir {
        Some(dir) => Some(StaticChartRenderer::new(dir).render_all(&view)?),
        None => None,
    };

    if args.json {
        let json = render_json(&view, charts.as_deref()).context("Failed to encode dashboard view")?;
        println!("{json}");
    } else {
        print!("{}", render_text(&view, charts.as_deref()));
    }
    Ok(())
}

fn run_generate(args: &GenerateArgs) -> Result<()> {
    let users = generate_users(args.users, args.seed);
    write_users_csv(&args.output, &users)?;
    println!("Wrote {} users to {}", users.len(), args.output.display());
    Ok(())
}
