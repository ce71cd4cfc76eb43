use crate::geo::Coordinate;
use crate::track::{RunSummary, TrackUpdate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub source: SourceKind,
    pub mode: LocationMode,
    /// Delivery cadence of the position source.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Refresh cadence of the elapsed-time reporter.
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    /// Stop the run automatically after this long (headless modes).
    #[serde(default, with = "humantime_serde")]
    pub duration: Option<Duration>,
}

/// Where position fixes come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceKind {
    Simulated(SimulationConfig),
    Nmea(NmeaInput),
    Gpx(PathBuf),
}

impl SourceKind {
    pub fn label(&self) -> String {
        match self {
            SourceKind::Simulated(sim) => format!("simulated @ {}", sim.origin),
            SourceKind::Nmea(NmeaInput::Stdin) => "NMEA (stdin)".to_string(),
            SourceKind::Nmea(NmeaInput::File(p)) => format!("NMEA {}", p.display()),
            SourceKind::Gpx(p) => format!("GPX {}", p.display()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NmeaInput {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub origin: Coordinate,
    /// Radius of the circular loop in meters.
    pub radius_m: f64,
    /// Runner speed in m/s.
    pub speed_mps: f64,
    /// Probability in [0, 1] that a delivery is a failed fix.
    pub dropout: f64,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LocationMode {
    HighAccuracy,
    BatterySaving,
}

impl LocationMode {
    /// Expected horizontal error in meters.
    pub fn noise_m(self) -> f64 {
        match self {
            LocationMode::HighAccuracy => 1.0,
            LocationMode::BatterySaving => 15.0,
        }
    }
}

/// One location fix. Immutable once produced by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Ground speed in m/s.
    pub speed: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl PositionSample {
    pub fn new(coordinate: Coordinate, speed: f64, timestamp: OffsetDateTime) -> Self {
        Self {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            speed,
            timestamp,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Non-success statuses a source may deliver in place of a fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum SourceFailure {
    #[error("no position fix")]
    NoFix,
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error("read error: {0}")]
    Io(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Fix(PositionSample),
    Failed(SourceFailure),
}

/// Events published by the run controller for presentation layers.
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        started_at: OffsetDateTime,
        source: String,
    },
    TrackUpdated(TrackUpdate),
    Elapsed {
        seconds: u64,
    },
    FixDropped {
        failure: SourceFailure,
    },
    RunStopped {
        // Box to keep RunEvent small; the report carries the whole track.
        report: Box<RunReport>,
    },
    Info(InfoEvent),
}

/// Structured info events consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum InfoEvent {
    Message(String),
    SourceFinished { fixes: u64 },
    SourceFailed(String),
    NotRunning,
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::SourceFinished { fixes } => {
                format!("Position source finished after {fixes} fix(es)")
            }
            InfoEvent::SourceFailed(err) => format!("Position source failed: {err}"),
            InfoEvent::NotRunning => "No run in progress".to_string(),
        }
    }
}

/// Frozen result of a stopped run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub source: String,
    pub summary: RunSummary,
    pub distance_display: String,
    pub time_display: String,
    pub pace_display: String,
    pub fixes_accepted: u64,
    pub fixes_dropped: u64,
    pub points: Vec<Coordinate>,
}
