//! File browser overlay.

use super::centered_rect;
use crate::app::{App, FileTarget};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph};
use ratatui::Frame;
use std::path::Path;

/// Shortens a path from the left so it fits in `max_width` characters.
fn truncate_path(path_str: &str, max_width: usize) -> String {
    let len = path_str.chars().count();
    if len > max_width {
        let keep = max_width.saturating_sub(3);
        let tail: String = path_str.chars().skip(len - keep).collect();
        format!("...{}", tail)
    } else {
        path_str.to_string()
    }
}

/// Extracts the display name from a path, returning "?" if extraction fails.
#[inline]
fn path_display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("?")
        .to_string()
}

/// Renders the file browser overlay, if open.
pub fn render_file_browser(frame: &mut Frame, app: &App) {
    let Some(browser) = &app.browser else {
        return;
    };

    let area = centered_rect(65, 75, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(browser.target.title())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Current path
            Constraint::Length(1), // Separator
            Constraint::Min(5),    // File list
            Constraint::Length(1), // Instructions
        ])
        .split(inner);

    let path_str = browser.current_dir.display().to_string();
    let max_width = chunks[0].width.saturating_sub(2) as usize;
    frame.render_widget(
        Paragraph::new(Span::styled(
            truncate_path(&path_str, max_width),
            Style::default().fg(Color::Cyan),
        )),
        chunks[0],
    );

    let (file_icon, empty_message) = match browser.target {
        FileTarget::SoundFont => ("[SF2]", "No SoundFont files found in this directory"),
        FileTarget::Midi => ("[MID]", "No MIDI files found in this directory"),
    };

    let visible_height = chunks[2].height as usize;
    browser.set_page(visible_height);
    let start_idx = browser.visible_start().min(browser.entries.len());
    let end_idx = (start_idx + visible_height).min(browser.entries.len());

    let items: Vec<ListItem> = if browser.entries.is_empty() {
        vec![ListItem::new(Line::from(Span::styled(
            empty_message,
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )))]
    } else {
        browser.entries[start_idx..end_idx]
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let is_selected = start_idx + i == browser.selected;

                let (icon, name, style) = if path == Path::new("..") {
                    (
                        "[..]",
                        "Parent Directory".to_string(),
                        Style::default().fg(Color::Blue),
                    )
                } else if path.is_dir() {
                    (
                        "[D]",
                        path_display_name(path),
                        Style::default().fg(Color::Blue),
                    )
                } else {
                    (
                        file_icon,
                        path_display_name(path),
                        Style::default().fg(Color::Green),
                    )
                };

                let display_style = if is_selected {
                    style.add_modifier(Modifier::REVERSED)
                } else {
                    style
                };

                ListItem::new(Line::from(vec![
                    Span::styled(format!("{} ", icon), Style::default().fg(Color::DarkGray)),
                    Span::styled(name, display_style),
                ]))
            })
            .collect()
    };

    frame.render_widget(List::new(items), chunks[2]);

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("[Up/Down]", Style::default().fg(Color::Yellow)),
            Span::styled(" Navigate  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[Enter]", Style::default().fg(Color::Yellow)),
            Span::styled(" Select  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[Esc]", Style::default().fg(Color::Yellow)),
            Span::styled(" Cancel", Style::default().fg(Color::DarkGray)),
        ])),
        chunks[3],
    );
}
