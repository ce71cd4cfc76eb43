use crate::geo::Coordinate;
use crate::model::{InfoEvent, RunEvent, RunReport};
use crate::track::RunSummary;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Recording,
    Stopped,
}

impl RunStatus {
    pub fn label(self) -> &'static str {
        match self {
            RunStatus::Idle => "Ready",
            RunStatus::Recording => "Recording",
            RunStatus::Stopped => "Finished",
        }
    }
}

pub struct UiState {
    pub tab: usize,
    pub status: RunStatus,
    pub info: String,
    pub source: String,
    pub started_at: Option<OffsetDateTime>,
    /// Why the source ended on its own, kept past the stop that follows.
    pub source_ended: Option<String>,

    pub elapsed_seconds: u64,
    pub speed_mps: f64,
    pub summary: RunSummary,

    // Map data
    pub track: Vec<Coordinate>,
    pub segments: Vec<(Coordinate, Coordinate)>,

    pub fixes: u64,
    pub dropped: u64,
    pub last_report: Option<RunReport>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            status: RunStatus::Idle,
            info: "Press s to start a run".to_string(),
            source: String::new(),
            started_at: None,
            source_ended: None,
            elapsed_seconds: 0,
            speed_mps: 0.0,
            summary: RunSummary::default(),
            track: Vec::new(),
            segments: Vec::new(),
            fixes: 0,
            dropped: 0,
            last_report: None,
        }
    }
}

impl UiState {
    /// Fold one controller event into what the screen shows.
    pub fn apply_event(&mut self, ev: RunEvent) {
        match ev {
            RunEvent::RunStarted { started_at, source } => {
                // Clear the previous run's track; the new one starts empty.
                *self = UiState {
                    tab: self.tab,
                    status: RunStatus::Recording,
                    info: "Recording...".into(),
                    source,
                    started_at: Some(started_at),
                    ..Default::default()
                };
            }
            RunEvent::TrackUpdated(update) => {
                self.track.push(update.point);
                if let Some(segment) = update.segment {
                    self.segments.push(segment);
                }
                self.summary = update.summary;
                self.speed_mps = update.speed_mps;
                self.fixes += 1;
            }
            RunEvent::Elapsed { seconds } => self.elapsed_seconds = seconds,
            RunEvent::FixDropped { .. } => self.dropped += 1,
            RunEvent::RunStopped { report } => {
                self.status = RunStatus::Stopped;
                self.summary = report.summary;
                self.elapsed_seconds = report.summary.elapsed_seconds;
                self.info = match self.source_ended.take() {
                    Some(reason) => format!("{reason}. Press s to start a new one"),
                    None => "Run finished. Press s to start a new one".into(),
                };
                self.last_report = Some(*report);
            }
            RunEvent::Info(info) => {
                if matches!(
                    info,
                    InfoEvent::SourceFinished { .. } | InfoEvent::SourceFailed(_)
                ) {
                    self.source_ended = Some(info.to_message());
                }
                self.info = info.to_message();
            }
        }
    }
}

/// Canvas bounds `([lon_min, lon_max], [lat_min, lat_max])` framing the track with a margin.
/// The spans are widened so one meter looks the same horizontally and vertically.
pub fn track_bounds(track: &[Coordinate]) -> ([f64; 2], [f64; 2]) {
    const MIN_HALF_SPAN_M: f64 = 50.0;

    let Some(first) = track.first() else {
        return ([-180.0, 180.0], [-90.0, 90.0]);
    };
    let (mut lat_min, mut lat_max) = (first.latitude, first.latitude);
    let (mut lon_min, mut lon_max) = (first.longitude, first.longitude);
    for p in track {
        lat_min = lat_min.min(p.latitude);
        lat_max = lat_max.max(p.latitude);
        lon_min = lon_min.min(p.longitude);
        lon_max = lon_max.max(p.longitude);
    }

    let center = Coordinate::new((lat_min + lat_max) / 2.0, (lon_min + lon_max) / 2.0);
    let height_m = Coordinate::new(lat_min, center.longitude)
        .distance_to(&Coordinate::new(lat_max, center.longitude));
    let width_m = Coordinate::new(center.latitude, lon_min)
        .distance_to(&Coordinate::new(center.latitude, lon_max));
    let half = (height_m.max(width_m) / 2.0 * 1.1).max(MIN_HALF_SPAN_M);

    let north_east = center.offset(half, half);
    let south_west = center.offset(-half, -half);
    (
        [south_west.longitude, north_east.longitude],
        [south_west.latitude, north_east.latitude],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackUpdate;
    use time::OffsetDateTime;

    fn update(lon: f64, segment: bool) -> RunEvent {
        let point = Coordinate::new(0.0, lon);
        RunEvent::TrackUpdated(TrackUpdate {
            point,
            segment: segment.then(|| (Coordinate::new(0.0, 0.0), point)),
            summary: RunSummary {
                elapsed_seconds: 10,
                distance_km: lon * 111.3,
                pace_min_per_km: 0.0,
            },
            speed_mps: 2.5,
        })
    }

    #[test]
    fn new_run_clears_previous_track() {
        let mut state = UiState::default();
        state.apply_event(RunEvent::RunStarted {
            started_at: OffsetDateTime::UNIX_EPOCH,
            source: "sim".into(),
        });
        state.apply_event(update(0.0, false));
        state.apply_event(update(0.01, true));
        state.apply_event(RunEvent::Info(InfoEvent::NotRunning));
        assert_eq!(state.track.len(), 2);
        assert_eq!(state.segments.len(), 1);
        assert_eq!(state.speed_mps, 2.5);
        assert_eq!(state.info, "No run in progress");

        state.tab = 1;
        state.apply_event(RunEvent::RunStarted {
            started_at: OffsetDateTime::UNIX_EPOCH,
            source: "sim".into(),
        });
        assert!(state.track.is_empty());
        assert!(state.segments.is_empty());
        assert_eq!(state.status, RunStatus::Recording);
        assert_eq!(state.tab, 1);
    }

    #[test]
    fn source_end_reason_survives_the_stop() {
        let mut state = UiState::default();
        state.apply_event(RunEvent::RunStarted {
            started_at: OffsetDateTime::UNIX_EPOCH,
            source: "NMEA run.nmea".into(),
        });
        assert_eq!(state.started_at, Some(OffsetDateTime::UNIX_EPOCH));
        state.apply_event(RunEvent::Info(InfoEvent::SourceFinished { fixes: 2 }));
        state.apply_event(RunEvent::RunStopped {
            report: Box::new(report()),
        });
        assert_eq!(state.status, RunStatus::Stopped);
        assert!(state.info.starts_with("Position source finished after 2 fix(es)"));

        // A user stop on the next run gets the plain message.
        state.apply_event(RunEvent::RunStarted {
            started_at: OffsetDateTime::UNIX_EPOCH,
            source: "NMEA run.nmea".into(),
        });
        state.apply_event(RunEvent::RunStopped {
            report: Box::new(report()),
        });
        assert!(state.info.starts_with("Run finished"));
    }

    fn report() -> RunReport {
        RunReport {
            started_at: OffsetDateTime::UNIX_EPOCH,
            source: "NMEA run.nmea".into(),
            summary: RunSummary::default(),
            distance_display: "0.00 km".into(),
            time_display: "00:00".into(),
            pace_display: "0'00\"/km".into(),
            fixes_accepted: 0,
            fixes_dropped: 0,
            points: vec![],
        }
    }

    #[test]
    fn bounds_frame_the_track() {
        let track = [Coordinate::new(52.0, 5.0), Coordinate::new(52.01, 5.02)];
        let (x, y) = track_bounds(&track);
        for p in track {
            assert!(x[0] < p.longitude && p.longitude < x[1]);
            assert!(y[0] < p.latitude && p.latitude < y[1]);
        }
    }

    #[test]
    fn single_point_gets_minimum_span() {
        let (x, y) = track_bounds(&[Coordinate::new(0.0, 0.0)]);
        assert!(x[1] - x[0] > 0.0008);
        assert!(y[1] - y[0] > 0.0008);
    }
}
