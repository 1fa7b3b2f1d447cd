//! Plain-text rendering of pipeline reports.

use safe_route_clean::CleanReport;
use safe_route_cluster::ClusterSummary;
use safe_route_pipeline::PipelineReport;

/// One line per stage that ran, then the elapsed time.
#[must_use]
pub fn render(report: &PipelineReport) -> Vec<String> {
    let mut lines = Vec::with_capacity(3);
    if let Some(clean) = &report.clean {
        lines.push(clean_line(clean));
    }
    if let Some(clusters) = &report.clusters {
        lines.push(cluster_line(clusters));
    }
    lines.push(format!("Elapsed: {:.2}s", report.elapsed.as_secs_f64()));
    lines
}

#[must_use]
pub fn clean_line(report: &CleanReport) -> String {
    format!(
        "Cleaning: {} rows in, {} invalid coordinates, {} outside bounding box, \
         {} kept ({} unknown dates, {} defaulted severities)",
        report.initial,
        report.invalid_coordinates,
        report.out_of_bounds,
        report.remaining,
        report.unknown_dates,
        report.defaulted_severity,
    )
}

#[must_use]
pub fn cluster_line(summary: &ClusterSummary) -> String {
    format!(
        "Clustering: {} crashes in {} clusters: {} high, {} moderate, {} low risk \
         ({} empty, inertia {:.6})",
        summary.total_crashes,
        summary.clusters,
        summary.high,
        summary.moderate,
        summary.low,
        summary.empty_clusters,
        summary.inertia,
    )
}
