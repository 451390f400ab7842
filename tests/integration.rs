//! Integration tests for StreamHub Analytics

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use streamhub_analytics::charts::{chart_status, ChartKind, ChartOutcome, StaticChartRenderer};
use streamhub_analytics::data::{
    apply_filters, region_coordinates, CohortMonth, DatasetLoader, FilterState, RawInputs, TableCache,
    WeekRange, RETENTION_FILE, REVENUE_FILE,
};
use streamhub_analytics::report::{render_json, render_text};
use streamhub_analytics::stats::aggregations::{cohort_heatmap, retention_curve};
use streamhub_analytics::stats::{Insight, Metric, RetentionPoint};
use streamhub_analytics::{Dashboard, Datasets, LoadError};
use tempfile::TempDir;

const RETENTION_CSV: &str = "\
cohort_month,region,plan_type,week_number,retention_pct
2024-01-01,US,premium,0,100.0
2024-01-01,US,premium,4,86.0
2024-01-01,US,premium,8,80.0
2024-01-01,US,basic,0,100.0
2024-01-01,US,basic,8,52.0
2024-02-01,IN,ad_supported,0,100.0
2024-02-01,IN,ad_supported,8,31.0
2024-02-01,GB,basic,0,100.0
2024-02-01,GB,basic,4,
2024-03-01,ZZ,basic,0,100.0
";

const REVENUE_CSV: &str = "\
cohort_month,region,plan_type,arpu_retained_d30,revenue_from_retained
2024-01-01,US,premium,14.0,2800.0
2024-01-01,US,basic,8.0,900.0
2024-02-01,IN,ad_supported,2.5,150.0
2024-02-01,GB,basic,7.5,400.0
";

/// Write both exports under their default names in a fresh directory.
fn data_dir(retention: &str, revenue: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(RETENTION_FILE), retention).unwrap();
    fs::write(dir.path().join(REVENUE_FILE), revenue).unwrap();
    dir
}

fn load(dir: &Path) -> Arc<Datasets> {
    let inputs = RawInputs::resolve(None, None, dir).unwrap();
    TableCache::new().get_or_load(&inputs.retention, &inputs.revenue).unwrap()
}

fn dashboard(retention: &str, revenue: &str) -> Dashboard {
    let dir = data_dir(retention, revenue);
    Dashboard::new(load(dir.path())).unwrap()
}

#[test]
fn test_single_plan_curve_and_zero_gap() {
    let retention = "\
cohort_month,region,plan_type,week_number,retention_pct
2024-01-01,US,premium,0,100.0
2024-01-01,US,premium,8,80.0
";
    let dashboard = dashboard(retention, REVENUE_CSV);
    let filter = FilterState::new(["US"], ["premium"], WeekRange::new(0, 8));
    let view = dashboard.view(&filter).unwrap();

    assert_eq!(
        view.aggregations.retention_curve,
        vec![
            RetentionPoint {
                plan_type: "premium".to_string(),
                week_number: 0,
                mean_retention_pct: 100.0,
            },
            RetentionPoint {
                plan_type: "premium".to_string(),
                week_number: 8,
                mean_retention_pct: 80.0,
            },
        ]
    );
    assert_eq!(
        view.insights[0],
        Insight::RetentionGap {
            week: 8,
            top_plan: "premium".to_string(),
            bottom_plan: "premium".to_string(),
            gap_pp: 0.0,
        }
    );
}

#[test]
fn test_missing_arpu_column_is_unavailable_not_zero() {
    let revenue = "\
cohort_month,region,plan_type,revenue_from_retained
2024-01-01,US,premium,2800.0
2024-02-01,IN,ad_supported,150.0
";
    let dashboard = dashboard(RETENTION_CSV, revenue);
    let view = dashboard.view(&dashboard.default_filter()).unwrap();

    assert_eq!(view.aggregations.arpu_by_plan_region, Metric::Unavailable);
    assert_eq!(view.kpis.avg_arpu, Metric::Unavailable);
    assert_eq!(view.kpis.retained_revenue, Metric::Available(2950.0));
    assert!(!view
        .insights
        .iter()
        .any(|i| matches!(i, Insight::TopArpuRegion { .. })));
    assert_eq!(
        chart_status(ChartKind::ArpuByPlanRegion, &view.aggregations),
        Some(ChartOutcome::Unavailable)
    );
    assert!(render_text(&view, None).contains("unavailable"));
}

#[test]
fn test_empty_selection_yields_empty_aggregations() {
    let dashboard = dashboard(RETENTION_CSV, REVENUE_CSV);
    let filter = dashboard.default_filter().with_regions(["AU"]);
    let view = dashboard.view(&filter).unwrap();

    assert!(view.is_empty_selection());
    assert!(view.aggregations.retention_curve.is_empty());
    assert!(view.aggregations.cohort_heatmap.is_empty());
    assert_eq!(
        view.aggregations.arpu_by_plan_region.available().map(|a| a.is_empty()),
        Some(true)
    );
    assert!(view.aggregations.region_summary.is_empty());
    assert_eq!(
        view.insights,
        vec![Insight::CohortCount {
            cohorts: 0,
            regions: 1,
            plans: 3,
        }]
    );

    let charts_dir = TempDir::new().unwrap();
    let out = charts_dir.path().join("charts");
    let reports = StaticChartRenderer::new(&out).render_all(&view).unwrap();
    assert!(out.is_dir());
    assert_eq!(reports.len(), 4);
    assert!(reports.iter().all(|r| r.outcome == ChartOutcome::NoData));
}

#[test]
fn test_filter_keeps_exactly_the_matching_rows() {
    let dir = data_dir(RETENTION_CSV, REVENUE_CSV);
    let datasets = load(dir.path());
    let filter = FilterState::new(["US", "GB"], ["basic"], WeekRange::new(0, 4));
    let filtered = apply_filters(&datasets, &filter).unwrap();

    let all = datasets.retention.records().unwrap();
    let kept = filtered.retention.records().unwrap();
    let expected: Vec<_> = all
        .iter()
        .filter(|r| filter.matches_retention(&r.region, &r.plan_type, r.week_number))
        .cloned()
        .collect();
    assert_eq!(kept, expected);
    assert!(kept
        .iter()
        .all(|r| r.plan_type == "basic" && r.week_number <= 4 && r.region != "IN"));
    assert_eq!(filtered.revenue.len(), 2);
}

#[test]
fn test_curve_of_curve_is_unchanged() {
    let dir = data_dir(RETENTION_CSV, REVENUE_CSV);
    let datasets = load(dir.path());
    let curve = retention_curve(&datasets.retention).unwrap();

    let month = CohortMonth::new(2024, 1).unwrap();
    let rows: Vec<_> = curve
        .iter()
        .map(|p| streamhub_analytics::data::RetentionRecord {
            cohort_month: month,
            plan_type: p.plan_type.clone(),
            region: "US".to_string(),
            week_number: p.week_number,
            retention_pct: p.mean_retention_pct,
        })
        .collect();
    let table = streamhub_analytics::data::RetentionTable::from_records(&rows).unwrap();
    assert_eq!(retention_curve(&table).unwrap(), curve);
}

#[test]
fn test_heatmap_ignores_row_order_and_keeps_gaps() {
    let mut lines: Vec<&str> = RETENTION_CSV.lines().collect();
    let header = lines.remove(0);
    lines.reverse();
    let reversed = format!("{header}\n{}\n", lines.join("\n"));

    let forward = DatasetLoader::parse_retention(RETENTION_CSV.as_bytes()).unwrap();
    let backward = DatasetLoader::parse_retention(reversed.as_bytes()).unwrap();
    let heatmap = cohort_heatmap(&forward).unwrap();
    assert_eq!(heatmap, cohort_heatmap(&backward).unwrap());

    let jan = CohortMonth::new(2024, 1).unwrap();
    let feb = CohortMonth::new(2024, 2).unwrap();
    let mar = CohortMonth::new(2024, 3).unwrap();
    assert_eq!(heatmap.months, vec![jan, feb, mar]);
    assert_eq!(heatmap.weeks, vec![0, 4, 8]);
    assert_eq!(heatmap.get(jan, 4), Some(86.0));
    assert_eq!(heatmap.get(feb, 8), Some(31.0));
    // GB week 4 is blank and nothing else lands on (Feb, 4).
    assert_eq!(heatmap.get(feb, 4), None);
    assert_eq!(heatmap.get(mar, 8), None);
}

#[test]
fn test_region_summary_outer_join() {
    let revenue = "\
cohort_month,region,plan_type,arpu_retained_d30,revenue_from_retained
2024-01-01,US,premium,14.0,2800.0
2024-01-01,CA,basic,6.0,120.0
";
    let dashboard = dashboard(RETENTION_CSV, revenue);
    let view = dashboard.view(&dashboard.default_filter()).unwrap();
    let summary = &view.aggregations.region_summary;

    let regions: BTreeSet<&str> = summary.iter().map(|r| r.region.as_str()).collect();
    assert_eq!(regions, BTreeSet::from(["GB", "IN", "US", "ZZ"]));

    let us = summary.iter().find(|r| r.region == "US").unwrap();
    assert_eq!(us.cohort_count, 2);
    assert_eq!(us.revenue_sum, 2800.0);

    // Retention-only regions get zero revenue.
    let gb = summary.iter().find(|r| r.region == "GB").unwrap();
    assert_eq!(gb.revenue_sum, 0.0);
    assert_eq!(gb.coordinates, region_coordinates("GB"));

    let zz = summary.iter().find(|r| r.region == "ZZ").unwrap();
    assert_eq!(zz.cohort_count, 1);
    assert!(zz.coordinates.is_none());
}

#[test]
fn test_revenue_only_region_joins_with_zero_count() {
    let dir = data_dir(RETENTION_CSV, REVENUE_CSV);
    let datasets = load(dir.path());
    let revenue = "\
cohort_month,region,plan_type,arpu_retained_d30,revenue_from_retained
2024-01-01,CA,basic,6.0,120.0
";
    let with_ca = Datasets {
        retention: datasets.retention.clone(),
        revenue: DatasetLoader::parse_revenue(revenue.as_bytes()).unwrap(),
    };
    let filter = FilterState::new(["CA", "US"], ["basic"], WeekRange::new(0, 12));
    let filtered = apply_filters(&with_ca, &filter).unwrap();
    let summary = streamhub_analytics::stats::aggregations::region_summary(&filtered.retention, &filtered.revenue)
        .unwrap();

    let ca = summary.iter().find(|r| r.region == "CA").unwrap();
    assert_eq!(ca.cohort_count, 0);
    assert_eq!(ca.revenue_sum, 120.0);
    assert!(ca.is_mappable());
}

#[test]
fn test_week_eight_gap_omitted_when_weeks_exclude_it() {
    let dashboard = dashboard(RETENTION_CSV, REVENUE_CSV);
    let filter = dashboard.default_filter().with_weeks(WeekRange::new(0, 4));
    let view = dashboard.view(&filter).unwrap();

    assert!(!view
        .insights
        .iter()
        .any(|i| matches!(i, Insight::RetentionGap { .. })));
    assert!(matches!(
        view.insights.first(),
        Some(Insight::TopArpuRegion { region, .. }) if region == "US"
    ));
}

#[test]
fn test_default_view_insights_in_order() {
    let dashboard = dashboard(RETENTION_CSV, REVENUE_CSV);
    let view = dashboard.view(&dashboard.default_filter()).unwrap();

    assert_eq!(view.insights.len(), 3);
    assert_eq!(
        view.insights[0],
        Insight::RetentionGap {
            week: 8,
            top_plan: "premium".to_string(),
            bottom_plan: "ad_supported".to_string(),
            gap_pp: 49.0,
        }
    );
    assert_eq!(
        view.insights[2],
        Insight::CohortCount {
            cohorts: 5,
            regions: 4,
            plans: 3,
        }
    );
    assert_eq!(view.cohort_sizes, Some(5));
}

#[test]
fn test_missing_files_are_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(RETENTION_FILE), RETENTION_CSV).unwrap();

    let err = RawInputs::resolve(None, None, dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::MissingInput { .. }));
    assert!(err.to_string().contains(REVENUE_FILE));

    // Uploads are used only as a pair.
    let err = RawInputs::resolve(Some(RETENTION_CSV.as_bytes().to_vec()), None, dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::MissingInput { .. }));
}

#[test]
fn test_legacy_retention_column_name() {
    let legacy = RETENTION_CSV.replacen("retention_pct", "retention", 1);
    let dashboard = dashboard(&legacy, REVENUE_CSV);
    let view = dashboard.view(&dashboard.default_filter()).unwrap();
    assert_eq!(view.aggregations.retention_curve.len(), 7);
}

#[test]
fn test_paths_and_bytes_parse_the_same() {
    let dir = data_dir(RETENTION_CSV, REVENUE_CSV);
    let from_paths = DatasetLoader::load_paths(
        &dir.path().join(RETENTION_FILE),
        &dir.path().join(REVENUE_FILE),
    )
    .unwrap();
    let from_bytes = DatasetLoader::load_bytes(RETENTION_CSV.as_bytes(), REVENUE_CSV.as_bytes()).unwrap();
    assert_eq!(
        from_paths.retention.records().unwrap(),
        from_bytes.retention.records().unwrap()
    );
    assert_eq!(from_paths.revenue.len(), 4);
    assert!(from_paths.revenue.has_arpu() && from_paths.revenue.has_revenue());
}

#[test]
fn test_cache_reuses_parsed_tables() {
    let mut cache = TableCache::new();
    let first = cache
        .get_or_load(RETENTION_CSV.as_bytes(), REVENUE_CSV.as_bytes())
        .unwrap();
    let second = cache
        .get_or_load(RETENTION_CSV.as_bytes(), REVENUE_CSV.as_bytes())
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!((cache.hits(), cache.misses()), (1, 1));
}

#[test]
fn test_direct_parse_matches_cached_tables() {
    let direct = Dashboard::new(Arc::new(
        DatasetLoader::load_bytes(RETENTION_CSV.as_bytes(), REVENUE_CSV.as_bytes()).unwrap(),
    ))
    .unwrap();
    let cached = dashboard(RETENTION_CSV, REVENUE_CSV);
    assert_eq!(
        direct.view(&direct.default_filter()).unwrap(),
        cached.view(&cached.default_filter()).unwrap()
    );
}

#[test]
fn test_json_view_tags_metric_status() {
    let revenue = "cohort_month,region,plan_type\n2024-01-01,US,premium\n";
    let dashboard = dashboard(RETENTION_CSV, revenue);
    let view = dashboard.view(&dashboard.default_filter()).unwrap();
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["kpis"]["avg_arpu"]["status"], "unavailable");
    assert_eq!(json["kpis"]["retained_revenue"]["status"], "unavailable");
    assert_eq!(json["aggregations"]["arpu_by_plan_region"]["status"], "unavailable");
}

#[test]
fn test_json_report_carries_rendered_chart_outcomes() {
    let dashboard = dashboard(RETENTION_CSV, REVENUE_CSV);
    let view = dashboard.view(&dashboard.default_filter().with_regions(["AU"])).unwrap();
    let charts_dir = TempDir::new().unwrap();
    let reports = StaticChartRenderer::new(charts_dir.path()).render_all(&view).unwrap();

    let json: serde_json::Value = serde_json::from_str(&render_json(&view, Some(&reports)).unwrap()).unwrap();
    let charts = json["charts"].as_array().unwrap();
    assert_eq!(charts.len(), 4);
    assert!(charts.iter().all(|c| c["outcome"]["status"] == "no_data"));
    assert_eq!(json["filter"]["regions"][0], "AU");
}

#[test]
fn test_malformed_numbers_in_export_are_rejected() {
    let retention = format!("{RETENTION_CSV}2024-03-01,ZZ,basic,4,abc\n");
    let dir = data_dir(&retention, REVENUE_CSV);
    let err = DatasetLoader::load_paths(&dir.path().join(RETENTION_FILE), &dir.path().join(REVENUE_FILE))
        .unwrap_err();
    match err {
        LoadError::InvalidValue { row, value, .. } => {
            assert_eq!(row, 11);
            assert_eq!(value, "abc");
        }
        other => panic!("expected invalid value, got {other:?}"),
    }
}
