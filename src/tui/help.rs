use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(action),
    ])
}

pub fn shortcut_lines() -> Vec<Line<'static>> {
    vec![
        key_line("s", 11, "Start / stop run"),
        key_line("space", 7, "Start / stop run"),
        key_line("q", 11, "Quit (stops an active run)"),
        key_line("tab", 9, "Switch tabs"),
        key_line("?", 11, "Show this help"),
    ]
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let mut lines = vec![Line::from("Keybinds:")];
    lines.extend(shortcut_lines());
    lines.extend(vec![
        Line::from(""),
        Line::from("Display:"),
        Line::from("  Time      elapsed since start, refreshed every second"),
        Line::from("  Speed     ground speed reported with the latest fix"),
        Line::from("  Distance  sum of great-circle steps between fixes"),
        Line::from("  Pace      minutes per kilometer over the whole run"),
        Line::from(""),
        Line::from(vec![
            Span::raw("Fixes without a valid position are dropped and counted as "),
            Span::styled("dropped", Style::default().fg(Color::Yellow)),
            Span::raw("."),
        ]),
    ]);

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
