//! Terminal user interface.
//!
//! One screen: the loaded inputs, the Start control, the status line and,
//! in file mode, the waveform. The file browser draws on top.

mod dialogs;
mod waveform;

use crate::app::{App, Mode};
use crate::midi::note_to_name;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

pub use dialogs::render_file_browser;
pub use waveform::render_waveform;

/// Renders the complete UI.
pub fn render(frame: &mut Frame, app: &App) {
    let size = frame.area();

    let mut constraints = vec![
        Constraint::Length(5), // Inputs
        Constraint::Length(3), // Transport
    ];
    if app.mode() == Mode::File {
        constraints.push(Constraint::Min(6)); // Waveform
    } else {
        constraints.push(Constraint::Min(0));
    }
    constraints.push(Constraint::Length(1)); // Key help

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(size);

    render_inputs(frame, chunks[0], app);
    render_transport(frame, chunks[1], app);
    if app.mode() == Mode::File {
        render_waveform(frame, chunks[2], &app.visualizer);
    }
    render_key_help(frame, chunks[3], app);

    render_file_browser(frame, app);
}

fn label(text: &str) -> Span<'_> {
    Span::styled(text, Style::default().fg(Color::DarkGray))
}

fn missing(text: String) -> Span<'static> {
    Span::styled(
        text,
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )
}

/// Lists the loaded SoundFont and MIDI file, and what the note mode plays.
fn render_inputs(frame: &mut Frame, area: Rect, app: &App) {
    let title = match app.mode() {
        Mode::Note => " sfplayer: note ",
        Mode::File => " sfplayer: MIDI file ",
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let soundfont = match (app.soundfont(), &app.config().soundfont_url) {
        (Some(buffer), _) => Span::styled(
            format!("{} ({} KiB)", buffer.name(), buffer.len() / 1024),
            Style::default().fg(Color::Green),
        ),
        (None, Some(url)) if app.mode() == Mode::Note => missing(format!("fetch {}", url)),
        _ => missing("(none)".to_string()),
    };

    let mut lines = vec![Line::from(vec![label("SoundFont: "), soundfont])];

    match app.mode() {
        Mode::File => {
            let midi = match app.midi() {
                Some(clip) => Span::styled(
                    format!("{} ({})", clip.name(), clip.summary().describe()),
                    Style::default().fg(Color::Green),
                ),
                None => missing("(none)".to_string()),
            };
            lines.push(Line::from(vec![label("MIDI file: "), midi]));
        }
        Mode::Note => {
            let config = app.config();
            lines.push(Line::from(vec![
                label("Note:      "),
                Span::styled(
                    format!(
                        "{} vel {} for {} ms, channel {}, bank {}, preset {}",
                        note_to_name(config.note),
                        config.velocity,
                        config.note_hold_ms,
                        config.channel,
                        config.bank,
                        config.preset
                    ),
                    Style::default().fg(Color::White),
                ),
            ]));
        }
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Start control, phase and status line.
fn render_transport(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Transport ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(12), // Start control
            Constraint::Length(11), // Phase
            Constraint::Min(20),    // Status
        ])
        .split(inner);

    let start = if app.ui().start_enabled {
        Span::styled(
            " [ Start ] ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(" [ Start ] ", Style::default().fg(Color::DarkGray))
    };
    frame.render_widget(Paragraph::new(Line::from(start)), chunks[0]);

    let phase = app.phase();
    let phase_color = if phase.is_in_flight() {
        Color::Yellow
    } else if phase == crate::session::Phase::Failed {
        Color::Red
    } else {
        Color::Blue
    };
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            format!(" {} ", phase.label()),
            Style::default().fg(phase_color).add_modifier(Modifier::BOLD),
        ))),
        chunks[1],
    );

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            label("Status: "),
            Span::styled(
                app.ui().status.as_str(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::ITALIC),
            ),
        ])),
        chunks[2],
    );
}

fn render_key_help(frame: &mut Frame, area: Rect, app: &App) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let text = |t: &'static str| Span::styled(t, Style::default().fg(Color::DarkGray));

    let mut spans = vec![key("[Enter]"), text(" Start  "), key("[s]"), text(" SoundFont  ")];
    if app.mode() == Mode::File {
        spans.push(key("[m]"));
        spans.push(text(" MIDI file  "));
    }
    spans.push(key("[q]"));
    spans.push(text(" Quit"));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Helper function to center a rectangle within another rectangle.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
