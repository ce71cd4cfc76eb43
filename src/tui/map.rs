use ratatui::{
    layout::Rect,
    style::Color,
    symbols::Marker,
    text::{Line, Span},
    widgets::canvas::{Canvas, Line as CanvasLine, Points},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::state::{track_bounds, UiState};

/// Helper function to draw a line on a canvas
pub fn draw_line(
    ctx: &mut ratatui::widgets::canvas::Context,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    color: Color,
) {
    ctx.draw(&CanvasLine {
        x1,
        y1,
        x2,
        y2,
        color,
    });
}

/// Track map: every recorded segment in red, the latest fix highlighted.
pub fn draw_map(area: Rect, f: &mut Frame, state: &UiState) {
    let title = Line::from(vec![
        Span::raw("Track ("),
        Span::raw(format!("{} points", state.track.len())),
        Span::raw(")"),
    ]);

    let Some(current) = state.track.last() else {
        let empty = Paragraph::new("Waiting for the first position fix...")
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(empty, area);
        return;
    };

    let (x_bounds, y_bounds) = track_bounds(&state.track);
    let start = state.track[0];
    let current_xy = [(current.longitude, current.latitude)];
    let start_xy = [(start.longitude, start.latitude)];

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .marker(Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            for (from, to) in &state.segments {
                draw_line(
                    ctx,
                    from.longitude,
                    from.latitude,
                    to.longitude,
                    to.latitude,
                    Color::Red,
                );
            }
            ctx.layer();
            ctx.draw(&Points {
                coords: &start_xy,
                color: Color::Green,
            });
            ctx.draw(&Points {
                coords: &current_xy,
                color: Color::Yellow,
            });
        });
    f.render_widget(canvas, area);
}
