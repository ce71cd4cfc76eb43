use crate::geo::Coordinate;
use crate::model::{
    InfoEvent, LocationMode, NmeaInput, RunConfig, RunEvent, RunReport, SimulationConfig,
    SourceKind,
};
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "run-tracker",
    version,
    about = "GPS running tracker: distance, time and pace with an optional TUI"
)]
pub struct Cli {
    /// Print the run report as JSON when the run stops (no TUI)
    #[arg(long, conflicts_with = "text")]
    pub json: bool,

    /// Print one line per fix and a summary when the run stops (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Read NMEA 0183 sentences from a file, or `-` for stdin
    #[arg(long, value_name = "PATH|-", conflicts_with = "gpx")]
    pub nmea: Option<String>,

    /// Replay the track points of a GPX file
    #[arg(long, value_name = "PATH")]
    pub gpx: Option<PathBuf>,

    /// Center of the simulated loop as `LAT,LON`
    #[arg(long, default_value = "0,0", allow_hyphen_values = true)]
    pub origin: String,

    /// Radius of the simulated loop in meters
    #[arg(long, default_value_t = 200.0)]
    pub radius: f64,

    /// Simulated running speed in m/s
    #[arg(long, default_value_t = 3.0)]
    pub speed: f64,

    /// Probability in [0, 1] that a simulated fix fails
    #[arg(long, default_value_t = 0.0)]
    pub dropout: f64,

    /// Seed for a reproducible simulation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Location accuracy mode
    #[arg(long, value_enum, default_value_t = LocationMode::HighAccuracy)]
    pub mode: LocationMode,

    /// Interval between position fixes
    #[arg(long, default_value = "2s")]
    pub interval: humantime::Duration,

    /// Refresh interval of the elapsed time display
    #[arg(long, default_value = "1s")]
    pub tick: humantime::Duration,

    /// Stop the run automatically after this long
    #[arg(long)]
    pub duration: Option<humantime::Duration>,

    /// Use --start-on-launch false to wait for a keypress in the TUI
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub start_on_launch: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to this file (the only log output in TUI mode)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn is_headless(&self) -> bool {
        self.json || self.text || !cfg!(feature = "tui")
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if !args.is_headless() {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
    }

    run_headless(args).await
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<RunConfig> {
    let interval = Duration::from(args.interval);
    let tick_interval = Duration::from(args.tick);
    if interval.is_zero() {
        anyhow::bail!("--interval must be greater than zero");
    }
    if tick_interval.is_zero() {
        anyhow::bail!("--tick must be greater than zero");
    }

    let source = if let Some(nmea) = args.nmea.as_deref() {
        if nmea == "-" {
            SourceKind::Nmea(NmeaInput::Stdin)
        } else {
            let path = PathBuf::from(nmea);
            std::fs::metadata(&path)
                .with_context(|| format!("open NMEA file {}", path.display()))?;
            SourceKind::Nmea(NmeaInput::File(path))
        }
    } else if let Some(path) = args.gpx.as_ref() {
        std::fs::metadata(path).with_context(|| format!("open GPX file {}", path.display()))?;
        SourceKind::Gpx(path.clone())
    } else {
        let origin: Coordinate = args
            .origin
            .parse()
            .with_context(|| format!("invalid --origin {:?}", args.origin))?;
        if !(0.0..=1.0).contains(&args.dropout) {
            anyhow::bail!("--dropout must be within [0, 1], got {}", args.dropout);
        }
        if !(args.speed.is_finite() && args.speed > 0.0) {
            anyhow::bail!("--speed must be a positive number, got {}", args.speed);
        }
        if !(args.radius.is_finite() && args.radius > 0.0) {
            anyhow::bail!("--radius must be a positive number, got {}", args.radius);
        }
        SourceKind::Simulated(SimulationConfig {
            origin,
            radius_m: args.radius,
            speed_mps: args.speed,
            dropout: args.dropout,
            seed: args.seed,
        })
    };

    Ok(RunConfig {
        source,
        mode: args.mode,
        interval,
        tick_interval,
        duration: args.duration.map(Duration::from),
    })
}

/// Headless run for `--text` and `--json`: records until Ctrl-C, `--duration`
/// or the end of the input, then prints the result.
async fn run_headless(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<RunEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let controller =
        tokio::spawn(async move { orchestrator::run_controller(cfg, false, evt_tx, cmd_rx).await });
    let _ = cmd_tx.send(UiCommand::Start);

    let ctrl_c_tx = cmd_tx.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping run");
            let _ = ctrl_c_tx.send(UiCommand::Stop);
        }
    });

    let mut report: Option<RunReport> = None;
    let mut source_error: Option<String> = None;

    while let Some(ev) = evt_rx.recv().await {
        match ev {
            RunEvent::RunStarted { started_at, source } => {
                if args.text {
                    let _ = out_tx.send(OutputLine::Stderr(format!(
                        "== Recording: {source} (started {}) ==",
                        crate::format::format_start_time(started_at)
                    )));
                }
            }
            RunEvent::TrackUpdated(update) => {
                if args.text {
                    let _ = out_tx.send(OutputLine::Stderr(crate::text_summary::update_line(
                        &update,
                    )));
                }
            }
            RunEvent::Elapsed { .. } => {}
            RunEvent::FixDropped { failure } => {
                tracing::debug!(%failure, "fix dropped");
            }
            RunEvent::Info(info) => {
                if let InfoEvent::SourceFailed(msg) = &info {
                    source_error = Some(msg.clone());
                }
                let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
            }
            RunEvent::RunStopped { report: r } => {
                report = Some(*r);
                let _ = cmd_tx.send(UiCommand::Quit);
            }
        }
    }

    ctrl_c.abort();
    controller.await.context("run controller task failed")??;

    let report = match (report, source_error) {
        (_, Some(err)) => {
            drop(out_tx);
            let _ = out_handle.await;
            return Err(anyhow::anyhow!("position source failed: {err}"));
        }
        (Some(r), None) => r,
        (None, None) => anyhow::bail!("run ended without a report"),
    };

    if args.json {
        let out = serde_json::to_string_pretty(&report)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        for line in crate::text_summary::build_text_summary(&report) {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["run-tracker"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn defaults_build_a_simulated_run() {
        let cfg = build_config(&parse(&["--text"])).unwrap();
        assert_eq!(cfg.interval, Duration::from_secs(2));
        assert_eq!(cfg.tick_interval, Duration::from_secs(1));
        assert!(cfg.duration.is_none());
        match cfg.source {
            SourceKind::Simulated(sim) => {
                assert_eq!(sim.origin, Coordinate::new(0.0, 0.0));
                assert_eq!(sim.radius_m, 200.0);
                assert_eq!(sim.speed_mps, 3.0);
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn parses_origin_and_durations() {
        let cfg = build_config(&parse(&[
            "--json",
            "--origin",
            "-33.86,151.2",
            "--interval",
            "500ms",
            "--duration",
            "30m",
            "--mode",
            "battery-saving",
        ]))
        .unwrap();
        assert_eq!(cfg.interval, Duration::from_millis(500));
        assert_eq!(cfg.duration, Some(Duration::from_secs(1800)));
        assert_eq!(cfg.mode, LocationMode::BatterySaving);
        let SourceKind::Simulated(sim) = cfg.source else {
            panic!("expected simulated source");
        };
        assert_eq!(sim.origin, Coordinate::new(-33.86, 151.2));
    }

    #[test]
    fn nmea_dash_means_stdin() {
        let cfg = build_config(&parse(&["--nmea", "-"])).unwrap();
        assert!(matches!(cfg.source, SourceKind::Nmea(NmeaInput::Stdin)));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(build_config(&parse(&["--dropout", "1.5"])).is_err());
        assert!(build_config(&parse(&["--speed", "0"])).is_err());
        assert!(build_config(&parse(&["--origin", "95,0"])).is_err());
        assert!(build_config(&parse(&["--interval", "0s"])).is_err());
        assert!(build_config(&parse(&["--gpx", "/definitely/missing.gpx"])).is_err());
    }

    #[test]
    fn json_and_text_conflict() {
        let res = Cli::try_parse_from(["run-tracker", "--json", "--text"]);
        assert!(res.is_err());
    }
}
