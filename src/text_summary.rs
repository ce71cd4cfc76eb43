//! Text output for headless runs.
//!
//! Live progress lines go to stderr, the closing block to stdout.

use crate::format::{final_summary_lines, format_clock, format_distance_km, format_pace, format_speed};
use crate::model::RunReport;
use crate::track::TrackUpdate;

/// One progress line per accepted fix.
pub(crate) fn update_line(update: &TrackUpdate) -> String {
    format!(
        "{}  {:>9}  {:>9}  {}",
        format_clock(update.summary.elapsed_seconds),
        format_speed(update.speed_mps),
        format_distance_km(update.summary.distance_km),
        format_pace(&update.summary),
    )
}

/// Final block printed once the run stopped.
pub(crate) fn build_text_summary(report: &RunReport) -> Vec<String> {
    let mut lines = final_summary_lines(&report.summary);
    lines.push(format!("Source:   {}", report.source));
    lines.push(format!(
        "Fixes:    {} accepted, {} dropped",
        report.fixes_accepted, report.fixes_dropped
    ));
    lines
}
