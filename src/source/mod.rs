mod gpx;
mod nmea;
mod simulate;

use crate::model::{NmeaInput, RunConfig, SourceEvent, SourceKind};
use anyhow::{Context, Result};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

#[derive(Debug, Clone)]
pub enum SourceControl {
    /// Stop delivering; the task returns at its next delivery point.
    Cancel,
}

/// Counters returned when a source task finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub fixes: u64,
    pub failures: u64,
}

/// Shared plumbing handed to every source implementation.
pub(crate) struct SourceParams<'a> {
    pub interval: Duration,
    pub mode: crate::model::LocationMode,
    pub event_tx: &'a mpsc::UnboundedSender<SourceEvent>,
    pub cancel: Arc<AtomicBool>,
}

impl SourceParams<'_> {
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Deliver one event. Returns false once the receiving side is gone.
    pub fn emit(&self, ev: SourceEvent, stats: &mut SourceStats) -> bool {
        match ev {
            SourceEvent::Fix(_) => stats.fixes += 1,
            SourceEvent::Failed(_) => stats.failures += 1,
        }
        self.event_tx.send(ev).is_ok()
    }

    /// Ticker at the delivery cadence. The first tick completes immediately.
    pub fn pacer(&self) -> Interval {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }
}

type SharedLines<R> = tokio::sync::Mutex<Lines<R>>;

/// Process-wide stdin reader. Runs take turns on it, and `next_line` is cancel safe,
/// so input read while an aborted run was waiting goes to the next run.
fn shared_stdin() -> &'static SharedLines<BufReader<Stdin>> {
    static STDIN: OnceLock<SharedLines<BufReader<Stdin>>> = OnceLock::new();
    STDIN.get_or_init(|| tokio::sync::Mutex::new(BufReader::new(tokio::io::stdin()).lines()))
}

pub struct LocationSource {
    cfg: RunConfig,
}

impl LocationSource {
    pub fn new(cfg: RunConfig) -> Self {
        Self { cfg }
    }

    pub async fn run(
        self,
        event_tx: mpsc::UnboundedSender<SourceEvent>,
        mut control_rx: mpsc::UnboundedReceiver<SourceControl>,
    ) -> Result<SourceStats> {
        let cancel = Arc::new(AtomicBool::new(false));

        let cancel2 = cancel.clone();
        let control_handle = tokio::spawn(async move {
            while let Some(msg) = control_rx.recv().await {
                match msg {
                    SourceControl::Cancel => {
                        cancel2.store(true, Ordering::Relaxed);
                        break;
                    }
                }
            }
        });

        let params = SourceParams {
            interval: self.cfg.interval,
            mode: self.cfg.mode,
            event_tx: &event_tx,
            cancel,
        };

        tracing::info!(
            source = %self.cfg.source.label(),
            interval = ?self.cfg.interval,
            mode = ?self.cfg.mode,
            "position source started"
        );

        let res: Result<SourceStats> = async {
            match &self.cfg.source {
                SourceKind::Simulated(sim) => simulate::run_simulated(sim, params).await,
                SourceKind::Nmea(NmeaInput::Stdin) => {
                    let mut lines = shared_stdin().lock().await;
                    nmea::run_nmea(&mut *lines, false, params).await
                }
                SourceKind::Nmea(NmeaInput::File(path)) => {
                    let file = tokio::fs::File::open(path)
                        .await
                        .with_context(|| format!("open NMEA file {}", path.display()))?;
                    let mut lines = BufReader::new(file).lines();
                    nmea::run_nmea(&mut lines, true, params).await
                }
                SourceKind::Gpx(path) => {
                    let path = path.clone();
                    let samples = tokio::task::spawn_blocking(move || gpx::load_gpx(&path))
                        .await
                        .context("GPX loader task failed")??;
                    gpx::replay(samples, params).await
                }
            }
        }
        .await;

        control_handle.abort();

        if let Ok(stats) = &res {
            tracing::info!(
                fixes = stats.fixes,
                failures = stats.failures,
                "position source finished"
            );
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::model::{LocationMode, SimulationConfig};

    fn sim_config() -> RunConfig {
        RunConfig {
            source: SourceKind::Simulated(SimulationConfig {
                origin: Coordinate::new(0.0, 0.0),
                radius_m: 200.0,
                speed_mps: 3.0,
                dropout: 0.0,
                seed: Some(7),
            }),
            mode: LocationMode::HighAccuracy,
            interval: Duration::from_secs(2),
            tick_interval: Duration::from_secs(1),
            duration: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_the_source_task() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(LocationSource::new(sim_config()).run(event_tx, ctrl_rx));

        // First fix arrives immediately.
        assert!(matches!(event_rx.recv().await, Some(SourceEvent::Fix(_))));

        ctrl_tx.send(SourceControl::Cancel).unwrap();
        let stats = handle.await.unwrap().unwrap();
        assert!(stats.fixes >= 1);
        assert_eq!(stats.failures, 0);
    }

    fn params(event_tx: &mpsc::UnboundedSender<SourceEvent>) -> SourceParams<'_> {
        SourceParams {
            interval: Duration::from_secs(2),
            mode: LocationMode::HighAccuracy,
            event_tx,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    #[tokio::test]
    async fn shared_reader_survives_an_aborted_run() {
        use tokio::io::AsyncWriteExt;

        let (mut writer, reader) = tokio::io::duplex(256);
        let shared: Arc<SharedLines<_>> =
            Arc::new(tokio::sync::Mutex::new(BufReader::new(reader).lines()));

        let first_lines = shared.clone();
        let first = tokio::spawn(async move {
            let (event_tx, _event_rx) = mpsc::unbounded_channel();
            let mut lines = first_lines.lock().await;
            nmea::run_nmea(&mut *lines, false, params(&event_tx)).await
        });
        tokio::task::yield_now().await;
        first.abort();
        assert!(first.await.is_err());

        writer
            .write_all(
                b"$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230324,003.1,W*61\n",
            )
            .await
            .unwrap();
        drop(writer);

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut lines = shared.lock().await;
        let stats = nmea::run_nmea(&mut *lines, false, params(&event_tx))
            .await
            .unwrap();
        assert_eq!(stats.fixes, 1);
        assert!(matches!(event_rx.recv().await, Some(SourceEvent::Fix(_))));
    }

    #[tokio::test]
    async fn missing_nmea_file_is_an_error() {
        let mut cfg = sim_config();
        cfg.source = SourceKind::Nmea(NmeaInput::File("/nonexistent/run.nmea".into()));
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let (_ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();
        let err = LocationSource::new(cfg)
            .run(event_tx, ctrl_rx)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("open NMEA file"));
    }
}
