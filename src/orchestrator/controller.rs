//! Run lifecycle controller.
//!
//! Sole owner of the track accumulator. Position fixes, timer ticks and UI commands are
//! serialized through one select loop, and results go out as `RunEvent`s.

use super::post_process::{build_report, RunMeta};
use super::timer::RunTimer;
use crate::model::{InfoEvent, RunConfig, RunEvent, SourceEvent};
use crate::source::{LocationSource, SourceControl, SourceStats};
use crate::track::TrackAccumulator;
use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers to control the run.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Start,
    Stop,
    Toggle,
    Quit,
}

/// Handle to the position source of the active run. Each run gets fresh channels,
/// so nothing from a previous run can reach the accumulator.
struct RunCtx {
    ctrl_tx: UnboundedSender<SourceControl>,
    source_rx: UnboundedReceiver<SourceEvent>,
    handle: Option<tokio::task::JoinHandle<Result<SourceStats>>>,
}

/// Current instant on tokio's clock so paused-time tests see consistent elapsed times.
fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

async fn next_source_event(run_ctx: &mut Option<RunCtx>) -> Option<SourceEvent> {
    match run_ctx {
        Some(ctx) => ctx.source_rx.recv().await,
        None => futures::future::pending().await,
    }
}

async fn wait_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => futures::future::pending().await,
    }
}

struct RunController {
    cfg: RunConfig,
    acc: TrackAccumulator,
    meta: Option<RunMeta>,
    timer: RunTimer,
    deadline: Option<tokio::time::Instant>,
    run_ctx: Option<RunCtx>,
    event_tx: UnboundedSender<RunEvent>,
}

impl RunController {
    fn new(cfg: RunConfig, event_tx: UnboundedSender<RunEvent>) -> Self {
        let timer = RunTimer::new(cfg.tick_interval);
        Self {
            cfg,
            acc: TrackAccumulator::new(),
            meta: None,
            timer,
            deadline: None,
            run_ctx: None,
            event_tx,
        }
    }

    fn emit(&self, ev: RunEvent) {
        let _ = self.event_tx.send(ev);
    }

    fn start(&mut self) {
        if self.acc.is_running() {
            self.emit(RunEvent::Info(InfoEvent::Message(
                "Run already in progress".into(),
            )));
            return;
        }
        self.shutdown_source();

        self.acc.start(now());
        let meta = RunMeta::new(self.cfg.source.label());
        let started_at = meta.started_at;
        self.meta = Some(meta);

        let (source_tx, source_rx) = mpsc::unbounded_channel::<SourceEvent>();
        let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel::<SourceControl>();
        let source = LocationSource::new(self.cfg.clone());
        let handle = tokio::spawn(async move { source.run(source_tx, ctrl_rx).await });
        self.run_ctx = Some(RunCtx {
            ctrl_tx,
            source_rx,
            handle: Some(handle),
        });

        self.timer.arm();
        self.deadline = self
            .cfg
            .duration
            .map(|d| tokio::time::Instant::now() + d);

        tracing::info!(source = %self.cfg.source.label(), "run started");
        self.emit(RunEvent::RunStarted {
            started_at,
            source: self.cfg.source.label(),
        });
    }

    /// Freeze state first, then cut the source, then the timer.
    fn stop(&mut self) {
        if !self.acc.is_running() {
            self.emit(RunEvent::Info(InfoEvent::NotRunning));
            return;
        }
        let at = now();
        let summary = self.acc.stop(at);
        self.shutdown_source();
        self.timer.disarm();
        self.deadline = None;

        tracing::info!(
            elapsed_seconds = summary.elapsed_seconds,
            distance_km = summary.distance_km,
            pace_min_per_km = summary.pace_min_per_km,
            "run stopped"
        );

        if let Some(meta) = self.meta.as_ref() {
            let report = build_report(&self.acc, meta, at);
            self.emit(RunEvent::RunStopped {
                report: Box::new(report),
            });
        }
    }

    fn shutdown_source(&mut self) {
        if let Some(ctx) = self.run_ctx.take() {
            let _ = ctx.ctrl_tx.send(SourceControl::Cancel);
            if let Some(handle) = ctx.handle {
                handle.abort();
            }
        }
    }

    fn on_source_event(&mut self, ev: SourceEvent) {
        if !self.acc.is_running() {
            return;
        }
        match ev {
            SourceEvent::Fix(sample) => {
                if let Some(update) = self.acc.add_sample(&sample, now()) {
                    if let Some(meta) = self.meta.as_mut() {
                        meta.fixes_accepted += 1;
                    }
                    tracing::trace!(
                        lat = sample.latitude,
                        lon = sample.longitude,
                        distance_m = self.acc.total_distance_m(),
                        "fix accepted"
                    );
                    self.emit(RunEvent::TrackUpdated(update));
                }
            }
            SourceEvent::Failed(failure) => {
                if let Some(meta) = self.meta.as_mut() {
                    meta.fixes_dropped += 1;
                }
                tracing::debug!(%failure, "dropping failed fix");
                self.emit(RunEvent::FixDropped { failure });
            }
        }
    }

    /// The source closed its channel: it finished or failed. Either way the run ends.
    async fn on_source_closed(&mut self) {
        let Some(mut ctx) = self.run_ctx.take() else {
            return;
        };
        if let Some(handle) = ctx.handle.take() {
            match handle.await {
                Ok(Ok(stats)) => {
                    self.emit(RunEvent::Info(InfoEvent::SourceFinished { fixes: stats.fixes }));
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %format!("{e:#}"), "position source failed");
                    self.emit(RunEvent::Info(InfoEvent::SourceFailed(format!("{e:#}"))));
                }
                Err(e) => {
                    self.emit(RunEvent::Info(InfoEvent::SourceFailed(format!(
                        "source task join failed: {e}"
                    ))));
                }
            }
        }
        if self.acc.is_running() {
            self.stop();
        }
    }

    fn on_tick(&mut self) {
        // A tick racing with stop must not publish or re-arm.
        if !self.acc.is_running() {
            self.timer.disarm();
            return;
        }
        self.emit(RunEvent::Elapsed {
            seconds: self.acc.elapsed_seconds(now()),
        });
    }

    async fn run(mut self, start_on_launch: bool, mut cmd_rx: UnboundedReceiver<UiCommand>) -> Result<()> {
        if start_on_launch {
            self.start();
        }

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(UiCommand::Start) => self.start(),
                        Some(UiCommand::Stop) => self.stop(),
                        Some(UiCommand::Toggle) => {
                            if self.acc.is_running() {
                                self.stop();
                            } else {
                                self.start();
                            }
                        }
                        Some(UiCommand::Quit) | None => {
                            if self.acc.is_running() {
                                self.stop();
                            }
                            self.shutdown_source();
                            break;
                        }
                    }
                }
                ev = next_source_event(&mut self.run_ctx) => {
                    match ev {
                        Some(ev) => self.on_source_event(ev),
                        None => self.on_source_closed().await,
                    }
                }
                _ = self.timer.tick() => self.on_tick(),
                _ = wait_deadline(self.deadline) => {
                    tracing::info!("run duration reached");
                    self.deadline = None;
                    self.stop();
                }
            }
        }

        Ok(())
    }
}

/// Drive runs from UI commands until `Quit` or until the command channel closes.
pub(crate) async fn run_controller(
    cfg: RunConfig,
    start_on_launch: bool,
    event_tx: UnboundedSender<RunEvent>,
    cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    RunController::new(cfg, event_tx)
        .run(start_on_launch, cmd_rx)
        .await
}
