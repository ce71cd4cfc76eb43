mod help;
mod map;
mod state;

use crate::cli::{build_config, Cli};
use crate::format::{
    final_summary_lines, format_clock, format_distance_km, format_pace, format_speed,
    format_start_time,
};
use crate::model::RunEvent;
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Terminal,
};
use state::{RunStatus, UiState};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const TAB_COUNT: usize = 2;

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;

    let (event_tx, event_rx) = mpsc::unbounded_channel::<RunEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(event_rx, cmd_tx));

    let res = orchestrator::run_controller(cfg, args.start_on_launch, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    mut event_rx: UnboundedReceiver<RunEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only.
    let mut state = UiState::default();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('s')) | (_, KeyCode::Char(' ')) => {
                        state.info = match state.status {
                            RunStatus::Recording => "Stopping…".into(),
                            _ => "Starting…".into(),
                        };
                        let _ = cmd_tx.send(UiCommand::Toggle);
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % TAB_COUNT;
                    }
                    (_, KeyCode::BackTab) => {
                        state.tab = (state.tab + TAB_COUNT - 1) % TAB_COUNT;
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = 1;
                    }
                    (_, KeyCode::Esc) => {
                        state.tab = 0;
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Run"), Line::from("Help")])
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("run-tracker"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_run(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }
}

fn draw_run(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(36)].as_ref())
        .split(area);

    map::draw_map(cols[0], f, state);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(11), Constraint::Min(0)].as_ref())
        .split(cols[1]);

    draw_stats(side[0], f, state);
    draw_status(side[1], f, state);
}

fn stat_line(label: &'static str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:<10}"), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn draw_stats(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let status_color = match state.status {
        RunStatus::Idle => Color::Gray,
        RunStatus::Recording => Color::Green,
        RunStatus::Stopped => Color::Cyan,
    };
    let lines = vec![
        stat_line("Status", state.status.label().to_string(), status_color),
        stat_line(
            "Started",
            state
                .started_at
                .map(format_start_time)
                .unwrap_or_else(|| "-".into()),
            Color::Gray,
        ),
        stat_line("Time", format_clock(state.elapsed_seconds), Color::White),
        stat_line("Speed", format_speed(state.speed_mps), Color::White),
        stat_line(
            "Distance",
            format_distance_km(state.summary.distance_km),
            Color::White,
        ),
        stat_line("Pace", format_pace(&state.summary), Color::White),
        Line::from(""),
        stat_line(
            "Fixes",
            format!("{} ({} dropped)", state.fixes, state.dropped),
            Color::Gray,
        ),
    ];
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Run"));
    f.render_widget(p, area);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines = Vec::new();
    if !state.source.is_empty() {
        lines.push(Line::from(vec![
            Span::styled("Source: ", Style::default().fg(Color::Gray)),
            Span::raw(state.source.clone()),
        ]));
    }
    lines.push(Line::from(state.info.clone()));

    if let Some(report) = &state.last_report {
        lines.push(Line::from(""));
        for (i, text) in final_summary_lines(&report.summary).into_iter().enumerate() {
            let style = if i == 0 {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(text, style)));
        }
    }

    let mut keys = vec![Line::from(""), Line::from("Keys:")];
    keys.extend(help::shortcut_lines().into_iter().take(3));
    lines.extend(keys);

    let p = Paragraph::new(lines)
        .wrap(ratatui::widgets::Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}
