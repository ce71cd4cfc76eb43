//! Post-run processing.
//!
//! Freezes the accumulator's view of a stopped run into a report for presentation layers.

use crate::format;
use crate::model::RunReport;
use crate::track::TrackAccumulator;
use std::time::Instant;
use time::OffsetDateTime;

/// Per-run bookkeeping kept next to the accumulator.
#[derive(Debug, Clone)]
pub(crate) struct RunMeta {
    pub started_at: OffsetDateTime,
    pub source: String,
    pub fixes_accepted: u64,
    pub fixes_dropped: u64,
}

impl RunMeta {
    pub fn new(source: String) -> Self {
        Self {
            started_at: OffsetDateTime::now_utc(),
            source,
            fixes_accepted: 0,
            fixes_dropped: 0,
        }
    }
}

/// Build the final report of a run. `now` only matters if the run was never stopped.
pub(crate) fn build_report(acc: &TrackAccumulator, meta: &RunMeta, now: Instant) -> RunReport {
    let summary = acc.current_summary(now);
    RunReport {
        started_at: meta.started_at,
        source: meta.source.clone(),
        summary,
        distance_display: format::format_distance_km(summary.distance_km),
        time_display: format::format_clock(summary.elapsed_seconds),
        pace_display: format::format_pace(&summary),
        fixes_accepted: meta.fixes_accepted,
        fixes_dropped: meta.fixes_dropped,
        points: acc.points().to_vec(),
    }
}
