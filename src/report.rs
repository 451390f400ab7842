//! Plain-text dashboard report.

use crate::charts::{chart_status, ChartKind, ChartOutcome, ChartReport};
use crate::dashboard::DashboardView;
use crate::stats::NO_INSIGHTS_MESSAGE;
use serde::Serialize;
use std::fmt::{self, Write};

/// JSON document for `--json`: the view's fields plus, when charts were
/// rendered, one report per chart.
#[derive(Debug, Serialize)]
pub struct ReportJson<'a> {
    #[serde(flatten)]
    pub view: &'a DashboardView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charts: Option<&'a [ChartReport]>,
}

pub fn render_json(view: &DashboardView, charts: Option<&[ChartReport]>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ReportJson { view, charts })
}

/// Render KPIs, chart statuses and insights for one view.
///
/// `charts` holds the outcome of an actual render; without it each chart's
/// status is derived from the aggregations alone.
pub fn render_text(view: &DashboardView, charts: Option<&[ChartReport]>) -> String {
    let mut out = String::new();
    match write_report(&mut out, view, charts) {
        Ok(()) => out,
        // A String sink never fails; only a Display impl reporting an error lands here.
        Err(_) => String::new(),
    }
}

/// Write the text report into any `fmt::Write` sink.
pub fn write_report<W: Write>(
    out: &mut W,
    view: &DashboardView,
    charts: Option<&[ChartReport]>,
) -> fmt::Result {
    let filter = &view.filter;

    writeln!(out, "StreamHub 2024: Cohort Retention & ARPU")?;
    writeln!(
        out,
        "Regions: {} | Plans: {} | Weeks {}–{}",
        join_or_none(filter.regions.iter()),
        join_or_none(filter.plans.iter()),
        filter.weeks.min,
        filter.weeks.max
    )?;
    writeln!(
        out,
        "Rows in selection: {} retention, {} revenue",
        view.retention_rows, view.revenue_rows
    )?;
    writeln!(out)?;

    writeln!(out, "Key Metrics")?;
    for (label, value, caption) in view.kpis.cards() {
        writeln!(out, "  {label:<26} {value:>14}  {caption}")?;
    }
    writeln!(out)?;

    writeln!(out, "Charts")?;
    for kind in ChartKind::ALL {
        let outcome = match charts {
            Some(reports) => reports.iter().find(|r| r.chart == kind).map(|r| r.outcome.clone()),
            None => chart_status(kind, &view.aggregations),
        };
        writeln!(out, "  {:<40} {}", kind.title(), describe(outcome.as_ref()))?;
    }
    writeln!(out)?;

    writeln!(out, "Insights")?;
    if view.insights.is_empty() {
        writeln!(out, "  {NO_INSIGHTS_MESSAGE}")?;
    } else {
        for insight in &view.insights {
            writeln!(out, "  • {insight}")?;
        }
    }
    Ok(())
}

fn describe(outcome: Option<&ChartOutcome>) -> String {
    match outcome {
        None => "ready".to_string(),
        Some(ChartOutcome::Rendered(path)) => format!("written to {}", path.display()),
        Some(ChartOutcome::NoData) => "no data for the current selection".to_string(),
        Some(ChartOutcome::Unavailable) => "unavailable (column missing from input)".to_string(),
        Some(ChartOutcome::Failed(message)) => format!("failed: {message}"),
    }
}

fn join_or_none<'a>(values: impl Iterator<Item = &'a String>) -> String {
    let joined = values.map(String::as_str).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "(none)".to_string()
    } else {
        joined
    }
}
