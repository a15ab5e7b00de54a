//! Oscilloscope-style waveform panel.

use crate::visualizer::{waveform_points, Visualizer};
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::symbols::Marker;
use ratatui::widgets::canvas::{Canvas, Line as CanvasLine};
use ratatui::widgets::{Block, Borders};
use ratatui::Frame;

/// Renders the latest visualizer frame as a connected line.
pub fn render_waveform(frame: &mut Frame, area: Rect, visualizer: &Visualizer) {
    let title = if visualizer.is_active() {
        " Waveform "
    } else {
        " Waveform (idle) "
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if visualizer.is_active() {
            Color::Green
        } else {
            Color::Gray
        }));

    let inner = block.inner(area);
    let width = inner.width.max(1) as f64;
    let height = inner.height.max(1) as f64;
    let points = waveform_points(visualizer.frame(), width, height);

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([0.0, width])
        .y_bounds([0.0, height])
        .paint(move |ctx| {
            for pair in points.windows(2) {
                let ((x1, y1), (x2, y2)) = (pair[0], pair[1]);
                ctx.draw(&CanvasLine {
                    x1,
                    y1,
                    x2,
                    y2,
                    color: Color::Cyan,
                });
            }
        });

    frame.render_widget(canvas, area);
}
