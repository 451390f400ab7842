//! Static Chart Renderer
//! Writes the four dashboard charts as PNG files.
//!
//! Charts:
//! 1. Retention curves: one line per plan over week offsets
//! 2. Cohort heatmap: cohort month × week, teal scale, blank where no data
//! 3. ARPU by plan and region: grouped bars
//! 4. Region distribution: bubbles at region centroids, size by cohort count
//!    and colour by retained revenue
//!
//! Each chart is rendered independently; a failure in one is reported and
//! does not stop the others.

use crate::charts::ChartPlotter;
use crate::dashboard::DashboardView;
use crate::stats::{Aggregations, ArpuByPlanRegion, CohortHeatmap, Metric, RegionSummary};
use plotters::prelude::*;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

type DrawResult = Result<(), Box<dyn std::error::Error>>;

const FONT: &str = "sans-serif";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    RetentionCurves,
    CohortHeatmap,
    ArpuByPlanRegion,
    RegionDistribution,
}

impl ChartKind {
    pub const ALL: [ChartKind; 4] = [
        ChartKind::RetentionCurves,
        ChartKind::CohortHeatmap,
        ChartKind::ArpuByPlanRegion,
        ChartKind::RegionDistribution,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ChartKind::RetentionCurves => "retention_curves.png",
            ChartKind::CohortHeatmap => "cohort_heatmap.png",
            ChartKind::ArpuByPlanRegion => "arpu_by_plan_region.png",
            ChartKind::RegionDistribution => "region_distribution.png",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ChartKind::RetentionCurves => "Retention Curves by Plan",
            ChartKind::CohortHeatmap => "Cohort Retention Heatmap",
            ChartKind::ArpuByPlanRegion => "ARPU (D30 Retained) by Plan and Region",
            ChartKind::RegionDistribution => "Cohorts and Retained Revenue by Region",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// What happened to one chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ChartOutcome {
    Rendered(PathBuf),
    /// The selection left nothing to draw.
    NoData,
    /// An input column the chart needs is absent.
    Unavailable,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartReport {
    pub chart: ChartKind,
    pub outcome: ChartOutcome,
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("cannot create chart directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Decide, without drawing, whether a chart has anything to show.
pub fn chart_status(kind: ChartKind, aggregations: &Aggregations) -> Option<ChartOutcome> {
    match kind {
        ChartKind::RetentionCurves if aggregations.retention_curve.is_empty() => Some(ChartOutcome::NoData),
        ChartKind::CohortHeatmap if aggregations.cohort_heatmap.is_empty() => Some(ChartOutcome::NoData),
        ChartKind::ArpuByPlanRegion => match &aggregations.arpu_by_plan_region {
            Metric::Unavailable => Some(ChartOutcome::Unavailable),
            Metric::Available(arpu) if !arpu.is_empty() => None,
            _ => Some(ChartOutcome::NoData),
        },
        ChartKind::RegionDistribution if ChartPlotter::mappable(&aggregations.region_summary).is_empty() => {
            Some(ChartOutcome::NoData)
        }
        _ => None,
    }
}

pub struct StaticChartRenderer {
    output_dir: PathBuf,
    size: (u32, u32),
}

impl StaticChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            size: (960, 540),
        }
    }

    /// Render every chart for `view`, one report per chart in display order.
    pub fn render_all(&self, view: &DashboardView) -> Result<Vec<ChartReport>, ChartError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| ChartError::OutputDir {
            path: self.output_dir.clone(),
            source,
        })?;

        let reports = ChartKind::ALL
            .into_iter()
            .map(|chart| ChartReport {
                chart,
                outcome: self.render(chart, &view.aggregations),
            })
            .collect();
        Ok(reports)
    }

    pub fn render(&self, kind: ChartKind, aggregations: &Aggregations) -> ChartOutcome {
        if let Some(outcome) = chart_status(kind, aggregations) {
            return outcome;
        }

        let path = self.output_dir.join(kind.file_name());
        let drawn = match kind {
            ChartKind::RetentionCurves => self.draw_retention_curves(&path, aggregations),
            ChartKind::CohortHeatmap => self.draw_heatmap(&path, &aggregations.cohort_heatmap),
            ChartKind::ArpuByPlanRegion => match aggregations.arpu_by_plan_region.available() {
                Some(arpu) => self.draw_arpu_bars(&path, arpu),
                None => return ChartOutcome::Unavailable,
            },
            ChartKind::RegionDistribution => self.draw_region_map(&path, &aggregations.region_summary),
        };

        match drawn {
            Ok(()) => {
                tracing::info!("Rendered {} to {}", kind, path.display());
                ChartOutcome::Rendered(path)
            }
            Err(e) => {
                tracing::warn!("Failed to render {}: {}", kind, e);
                ChartOutcome::Failed(e.to_string())
            }
        }
    }

    fn draw_retention_curves(&self, path: &Path, aggregations: &Aggregations) -> DrawResult {
        let series = ChartPlotter::curve_series(&aggregations.retention_curve);
        let max_week = series
            .iter()
            .flat_map(|(_, points)| points.iter().map(|(week, _)| *week))
            .max()
            .unwrap_or(0)
            .max(1);

        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(ChartKind::RetentionCurves.title(), (FONT, 24))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(55)
            .build_cartesian_2d(0u32..max_week, 0f64..105f64)?;
        chart
            .configure_mesh()
            .x_desc("Weeks Since Signup")
            .y_desc("Retention (%)")
            .axis_desc_style((FONT, 15))
            .draw()?;

        for (idx, (plan, points)) in series.iter().enumerate() {
            let color = ChartPlotter::series_color(idx);
            chart
                .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
                .label(plan.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            chart.draw_series(points.iter().map(|&(week, value)| Circle::new((week, value), 3, color.filled())))?;
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
        root.present()?;
        Ok(())
    }

    fn draw_heatmap(&self, path: &Path, heatmap: &CohortHeatmap) -> DrawResult {
        let Some((lo, hi)) = heatmap.value_range() else {
            return Ok(());
        };
        let cols = heatmap.weeks.len();
        let rows = heatmap.months.len();
        // Segmented axes over inclusive `0..=n-1` give one band per cell with
        // the label at its centre; `Last` is the far edge of the final band.
        let segment = |v: &SegmentValue<usize>| match v {
            SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => Some(*i),
            SegmentValue::Last => None,
        };
        let band_end = |i: usize, n: usize| {
            if i + 1 < n {
                SegmentValue::Exact(i + 1)
            } else {
                SegmentValue::Last
            }
        };
        let week_label = |x: &SegmentValue<usize>| {
            segment(x)
                .and_then(|i| heatmap.weeks.get(i))
                .map(|w| format!("W{w}"))
                .unwrap_or_default()
        };
        let month_label = |y: &SegmentValue<usize>| {
            segment(y)
                .and_then(|slot| ChartPlotter::heatmap_slot(slot, rows))
                .and_then(|i| heatmap.months.get(i))
                .map(|m| m.to_string())
                .unwrap_or_default()
        };

        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(ChartKind::CohortHeatmap.title(), (FONT, 24))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d(
                (0..cols - 1).into_segmented(),
                (0..rows - 1).into_segmented(),
            )?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(cols)
            .y_labels(rows)
            .x_label_formatter(&week_label)
            .y_label_formatter(&month_label)
            .x_desc("Week Number")
            .y_desc("Cohort Month")
            .axis_desc_style((FONT, 15))
            .draw()?;

        let cells = heatmap.values.iter().enumerate().flat_map(|(row, values)| {
            let slot = ChartPlotter::heatmap_slot(row, rows);
            values.iter().enumerate().filter_map(move |(col, value)| {
                let (value, y) = ((*value)?, slot?);
                Some(Rectangle::new(
                    [
                        (SegmentValue::Exact(col), SegmentValue::Exact(y)),
                        (band_end(col, cols), band_end(y, rows)),
                    ],
                    ChartPlotter::teal_scale(value, lo, hi).filled(),
                ))
            })
        });
        chart.draw_series(cells)?;
        root.present()?;
        Ok(())
    }

    fn draw_arpu_bars(&self, path: &Path, arpu: &ArpuByPlanRegion) -> DrawResult {
        let (plans, regions, bars) = ChartPlotter::grouped_bars(arpu);
        let y_max = bars.iter().map(|(_, _, v)| *v).fold(0.0_f64, f64::max) * 1.15;
        let y_max = if y_max > 0.0 { y_max } else { 1.0 };
        let group_width = 0.8;
        let bar_width = group_width / regions.len().max(1) as f64;
        let plan_label = |x: &f64| {
            let idx = x.round();
            if (x - idx).abs() > 1e-6 || idx < 0.0 {
                return String::new();
            }
            plans.get(idx as usize).cloned().unwrap_or_default()
        };

        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(ChartKind::ArpuByPlanRegion.title(), (FONT, 24))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(55)
            .build_cartesian_2d(-0.5f64..(plans.len() as f64 - 0.5), 0f64..y_max)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(plans.len())
            .x_label_formatter(&plan_label)
            .x_desc("Plan")
            .y_desc("ARPU ($)")
            .axis_desc_style((FONT, 15))
            .draw()?;

        for (r_idx, region) in regions.iter().enumerate() {
            let color = ChartPlotter::series_color(r_idx);
            let rects: Vec<Rectangle<(f64, f64)>> = bars
                .iter()
                .filter(|(_, r, _)| *r == r_idx)
                .map(|&(p, _, value)| {
                    let x0 = p as f64 - group_width / 2.0 + r_idx as f64 * bar_width;
                    Rectangle::new([(x0, 0.0), (x0 + bar_width * 0.9, value)], color.filled())
                })
                .collect();
            chart
                .draw_series(rects)?
                .label(region.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
        root.present()?;
        Ok(())
    }

    fn draw_region_map(&self, path: &Path, regions: &[RegionSummary]) -> DrawResult {
        let mappable = ChartPlotter::mappable(regions);
        let max_count = mappable.iter().map(|r| r.cohort_count).max().unwrap_or(0);
        let (lo, hi) = mappable.iter().fold((f64::MAX, f64::MIN), |(lo, hi), r| {
            (lo.min(r.revenue_sum), hi.max(r.revenue_sum))
        });

        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(ChartKind::RegionDistribution.title(), (FONT, 24))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(55)
            .build_cartesian_2d(-180f64..180f64, -60f64..80f64)?;
        chart
            .configure_mesh()
            .x_desc("Longitude")
            .y_desc("Latitude")
            .axis_desc_style((FONT, 15))
            .draw()?;

        for region in &mappable {
            let Some(at) = region.coordinates else {
                continue;
            };
            let color = ChartPlotter::teal_scale(region.revenue_sum, lo, hi);
            let radius = ChartPlotter::bubble_radius(region.cohort_count, max_count).round() as i32;
            chart.draw_series(std::iter::once(Circle::new((at.lon, at.lat), radius, color.mix(0.85).filled())))?;
            chart.draw_series(std::iter::once(Text::new(
                format!("{} ({})", region.region, region.cohort_count),
                (at.lon + 4.0, at.lat + 4.0),
                (FONT, 14),
            )))?;
        }

        root.present()?;
        Ok(())
    }
}
