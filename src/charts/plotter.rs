//! Chart Plotter Module
//! Colours and chart-ready series derived from the aggregation tables.

use crate::stats::{ArpuByPlanRegion, RegionSummary, RetentionPoint};
use plotters::style::RGBColor;

pub const PALETTE: [RGBColor; 10] = [
    RGBColor(52, 152, 219),  // Blue
    RGBColor(231, 76, 60),   // Red
    RGBColor(46, 204, 113),  // Green
    RGBColor(155, 89, 182),  // Purple
    RGBColor(243, 156, 18),  // Orange
    RGBColor(26, 188, 156),  // Teal
    RGBColor(233, 30, 99),   // Pink
    RGBColor(0, 188, 212),   // Cyan
    RGBColor(255, 87, 34),   // Deep Orange
    RGBColor(96, 125, 139),  // Blue Grey
];

/// Ends of the continuous teal scale used by the heatmap and region map.
const TEAL_LOW: RGBColor = RGBColor(209, 238, 234);
const TEAL_HIGH: RGBColor = RGBColor(42, 86, 116);

const MIN_BUBBLE_RADIUS: f64 = 6.0;
const MAX_BUBBLE_RADIUS: f64 = 30.0;

/// Creates chart-ready data and styling from aggregation outputs.
pub struct ChartPlotter;

impl ChartPlotter {
    pub fn series_color(index: usize) -> RGBColor {
        PALETTE[index % PALETTE.len()]
    }

    /// Map `value` in `[lo, hi]` onto the teal scale. A flat range maps to the
    /// middle of the scale.
    pub fn teal_scale(value: f64, lo: f64, hi: f64) -> RGBColor {
        let t = if hi > lo {
            ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        RGBColor(
            mix(TEAL_LOW.0, TEAL_HIGH.0),
            mix(TEAL_LOW.1, TEAL_HIGH.1),
            mix(TEAL_LOW.2, TEAL_HIGH.2),
        )
    }

    /// One line per plan, points ordered by week.
    pub fn curve_series(points: &[RetentionPoint]) -> Vec<(String, Vec<(u32, f64)>)> {
        let mut series: Vec<(String, Vec<(u32, f64)>)> = Vec::new();
        for point in points {
            match series.iter_mut().find(|(plan, _)| *plan == point.plan_type) {
                Some((_, values)) => values.push((point.week_number, point.mean_retention_pct)),
                None => series.push((
                    point.plan_type.clone(),
                    vec![(point.week_number, point.mean_retention_pct)],
                )),
            }
        }
        for (_, values) in &mut series {
            values.sort_by_key(|(week, _)| *week);
        }
        series
    }

    /// Bars of a grouped chart: `(plan_index, region_index, value)`.
    pub fn grouped_bars(arpu: &ArpuByPlanRegion) -> (Vec<String>, Vec<String>, Vec<(usize, usize, f64)>) {
        let plans = arpu.plans();
        let regions = arpu.regions();
        let bars = arpu
            .cells
            .iter()
            .filter_map(|cell| {
                let p = plans.iter().position(|p| *p == cell.plan_type)?;
                let r = regions.iter().position(|r| *r == cell.region)?;
                Some((p, r, cell.mean_arpu))
            })
            .collect();
        (plans, regions, bars)
    }

    /// Radius proportional to the square root of the cohort count, so the
    /// bubble area tracks the count.
    pub fn bubble_radius(count: u64, max_count: u64) -> f64 {
        if max_count == 0 {
            return MIN_BUBBLE_RADIUS;
        }
        let share = (count as f64 / max_count as f64).sqrt();
        MIN_BUBBLE_RADIUS + (MAX_BUBBLE_RADIUS - MIN_BUBBLE_RADIUS) * share
    }

    /// Vertical slot (0 at the bottom) of heatmap row `index`. Earliest cohort
    /// months sit at the top, as in a table. The mapping is its own inverse,
    /// so it also turns an axis slot back into a row index.
    pub fn heatmap_slot(index: usize, rows: usize) -> Option<usize> {
        rows.checked_sub(index + 1)
    }

    /// Regions that can be placed on the map.
    pub fn mappable(regions: &[RegionSummary]) -> Vec<&RegionSummary> {
        regions.iter().filter(|r| r.is_mappable()).collect()
    }
}
