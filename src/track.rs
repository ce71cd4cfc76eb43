//! Track accumulation: distance, elapsed time and pace for one run.
//!
//! The accumulator never reads a clock itself. Callers pass `now` into every
//! time-dependent operation, which keeps it deterministic under test and lets
//! the controller decide what "now" means.

use crate::geo::Coordinate;
use crate::model::PositionSample;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Read-only view derived from the track state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub elapsed_seconds: u64,
    pub distance_km: f64,
    pub pace_min_per_km: f64,
}

impl RunSummary {
    fn compute(elapsed_seconds: u64, total_distance_m: f64) -> Self {
        let distance_km = total_distance_m / 1000.0;
        let pace_min_per_km = if distance_km > 0.0 {
            (elapsed_seconds as f64 / 60.0) / distance_km
        } else {
            0.0
        };
        Self {
            elapsed_seconds,
            distance_km,
            pace_min_per_km,
        }
    }
}

/// What presentation needs to know about one accepted sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackUpdate {
    pub point: Coordinate,
    /// Previous and new coordinate; absent for the first sample of a run.
    pub segment: Option<(Coordinate, Coordinate)>,
    pub summary: RunSummary,
    pub speed_mps: f64,
}

#[derive(Debug, Default)]
pub struct TrackAccumulator {
    points: Vec<Coordinate>,
    total_distance_m: f64,
    start_time: Option<Instant>,
    stop_time: Option<Instant>,
    running: bool,
}

impl TrackAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset everything and begin a new run at `now`.
    pub fn start(&mut self, now: Instant) {
        self.points.clear();
        self.total_distance_m = 0.0;
        self.start_time = Some(now);
        self.stop_time = None;
        self.running = true;
    }

    /// Fold one sample into the track. Samples arriving while stopped are discarded.
    ///
    /// The first sample of a run only establishes the starting position.
    pub fn add_sample(&mut self, sample: &PositionSample, now: Instant) -> Option<TrackUpdate> {
        if !self.running {
            return None;
        }

        let point = sample.coordinate();
        let segment = self.points.last().map(|prev| (*prev, point));
        if let Some((prev, next)) = segment {
            self.total_distance_m += prev.distance_to(&next);
        }
        self.points.push(point);

        Some(TrackUpdate {
            point,
            segment,
            summary: self.current_summary(now),
            speed_mps: sample.speed,
        })
    }

    /// Freeze the run and return its final summary. Stopping twice keeps the first stop time.
    pub fn stop(&mut self, now: Instant) -> RunSummary {
        if self.running {
            self.running = false;
            self.stop_time = Some(now);
        }
        self.current_summary(now)
    }

    /// Summary at `now`, or at the stop instant once the run is frozen.
    pub fn current_summary(&self, now: Instant) -> RunSummary {
        let elapsed_seconds = self.elapsed_seconds(now);
        RunSummary::compute(elapsed_seconds, self.total_distance_m)
    }

    pub fn elapsed_seconds(&self, now: Instant) -> u64 {
        let Some(start) = self.start_time else {
            return 0;
        };
        let end = self.stop_time.unwrap_or(now);
        end.saturating_duration_since(start).as_secs()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn total_distance_m(&self) -> f64 {
        self.total_distance_m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Pace;
    use std::time::Duration;
    use time::OffsetDateTime;

    fn sample(lat: f64, lon: f64) -> PositionSample {
        PositionSample::new(Coordinate::new(lat, lon), 3.0, OffsetDateTime::UNIX_EPOCH)
    }

    #[test]
    fn first_sample_contributes_no_distance() {
        let t0 = Instant::now();
        let mut acc = TrackAccumulator::new();
        acc.start(t0);
        let update = acc.add_sample(&sample(10.0, 10.0), t0).unwrap();
        assert_eq!(update.segment, None);
        assert_eq!(acc.total_distance_m(), 0.0);
        assert_eq!(acc.points().len(), 1);
    }

    #[test]
    fn equator_scenario() {
        let t0 = Instant::now();
        let mut acc = TrackAccumulator::new();
        acc.start(t0);
        acc.add_sample(&sample(0.0, 0.0), t0);
        let update = acc
            .add_sample(&sample(0.0, 0.01), t0 + Duration::from_secs(10))
            .unwrap();

        assert!((acc.total_distance_m() - 1113.0).abs() <= 1.0);
        assert_eq!(acc.points().len(), 2);
        assert_eq!(
            update.segment,
            Some((Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.01)))
        );
        assert_eq!(update.summary.elapsed_seconds, 10);

        let summary = acc.stop(t0 + Duration::from_secs(60));
        assert_eq!(summary.elapsed_seconds, 60);
        assert!((summary.distance_km - 1.113).abs() < 0.001);
        assert!((summary.pace_min_per_km - 0.899).abs() < 0.001);
        assert_eq!(Pace::from_min_per_km(summary.pace_min_per_km).to_string(), "0'53\"/km");
    }

    #[test]
    fn distance_never_decreases() {
        let t0 = Instant::now();
        let mut acc = TrackAccumulator::new();
        acc.start(t0);
        let path = [
            (0.0, 0.0),
            (0.001, 0.0),
            (0.001, 0.0),
            (0.0, 0.0),
            (-0.002, 0.003),
            (-0.002, 0.003),
        ];
        let mut previous = acc.total_distance_m();
        for (lat, lon) in path {
            acc.add_sample(&sample(lat, lon), t0);
            assert!(acc.total_distance_m() >= previous);
            previous = acc.total_distance_m();
        }
        // Duplicates are kept, not deduplicated.
        assert_eq!(acc.points().len(), path.len());
    }

    #[test]
    fn start_resets_prior_run() {
        let t0 = Instant::now();
        let mut acc = TrackAccumulator::new();
        acc.start(t0);
        acc.add_sample(&sample(0.0, 0.0), t0);
        acc.add_sample(&sample(0.0, 0.01), t0);
        acc.stop(t0 + Duration::from_secs(5));

        let t1 = t0 + Duration::from_secs(100);
        acc.start(t1);
        assert!(acc.points().is_empty());
        assert_eq!(acc.total_distance_m(), 0.0);
        assert_eq!(acc.elapsed_seconds(t1), 0);
        assert!(acc.is_running());
    }

    #[test]
    fn stopped_summary_is_frozen() {
        let t0 = Instant::now();
        let mut acc = TrackAccumulator::new();
        acc.start(t0);
        acc.add_sample(&sample(0.0, 0.0), t0);
        acc.add_sample(&sample(0.0, 0.005), t0);
        let stopped = acc.stop(t0 + Duration::from_secs(30));

        let later = acc.current_summary(t0 + Duration::from_secs(3000));
        let much_later = acc.current_summary(t0 + Duration::from_secs(30000));
        assert_eq!(stopped, later);
        assert_eq!(later, much_later);

        // A second stop does not move the stop instant.
        assert_eq!(acc.stop(t0 + Duration::from_secs(90)), stopped);
    }

    #[test]
    fn samples_after_stop_are_discarded() {
        let t0 = Instant::now();
        let mut acc = TrackAccumulator::new();
        acc.start(t0);
        acc.add_sample(&sample(0.0, 0.0), t0);
        acc.stop(t0);

        assert!(acc.add_sample(&sample(1.0, 1.0), t0).is_none());
        assert_eq!(acc.points(), &[Coordinate::new(0.0, 0.0)]);
        assert_eq!(acc.total_distance_m(), 0.0);
    }

    #[test]
    fn zero_distance_means_zero_pace() {
        let t0 = Instant::now();
        let mut acc = TrackAccumulator::new();
        acc.start(t0);
        acc.add_sample(&sample(5.0, 5.0), t0);
        let summary = acc.current_summary(t0 + Duration::from_secs(120));
        assert_eq!(summary.elapsed_seconds, 120);
        assert_eq!(summary.pace_min_per_km, 0.0);
    }

    #[test]
    fn never_started_is_all_zero() {
        let acc = TrackAccumulator::new();
        assert_eq!(acc.current_summary(Instant::now()), RunSummary::default());
        assert!(!acc.is_running());
    }

    #[test]
    fn elapsed_is_floored() {
        let t0 = Instant::now();
        let mut acc = TrackAccumulator::new();
        acc.start(t0);
        assert_eq!(acc.elapsed_seconds(t0 + Duration::from_millis(1999)), 1);
    }
}
