//! Charts module - PNG rendering of the dashboard aggregations

mod plotter;
mod renderer;

pub use plotter::{ChartPlotter, PALETTE};
pub use renderer::{chart_status, ChartError, ChartKind, ChartOutcome, ChartReport, StaticChartRenderer};
