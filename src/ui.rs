use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::app::{App, AppState};
use crate::clock::Clock;
use crate::editor::Mode;
use crate::grid::{Coordinate, FILLER};
use crate::util::format_secs;

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;

/// How an empty cell is drawn.
const FILLER_GLYPH: &str = "·";

impl<C: Clock + Clone> Widget for &App<C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Drilling => render_drill(self, area, buf),
            AppState::Results => render_results(self, area, buf),
        }
    }
}

fn render_drill<C: Clock + Clone>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let marker_style = Style::default()
        .patch(bold_style)
        .fg(Color::Black)
        .bg(Color::Yellow);
    let cursor_style = Style::default().add_modifier(Modifier::REVERSED);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(area);

    let (completed, total, keys) = app
        .session()
        .map(|s| (s.stats().completed, s.stats().total, s.stats().key_count))
        .unwrap_or_default();
    let mode = match app.editor.mode() {
        Mode::Normal => "NORMAL",
        Mode::Insert => "INSERT",
    };
    let kind = app
        .current_kind()
        .map(|kind| format!("   [{kind}]"))
        .unwrap_or_default();
    let header = Paragraph::new(Span::styled(
        format!(
            "{completed}/{total} done{kind}   {}   {keys} keys   -- {mode} --",
            format_secs(app.elapsed_secs())
        ),
        bold_style,
    ))
    .alignment(Alignment::Center);
    header.render(chunks[0], buf);

    let marker = app.marker();
    let cursor = app.grid.cursor();
    let lines: Vec<Line> = app
        .grid
        .lines()
        .iter()
        .enumerate()
        .map(|(r, text)| {
            let row = r + 1;
            let mut spans: Vec<Span> = text
                .chars()
                .enumerate()
                .map(|(c, ch)| {
                    let at = Coordinate::new(row, c + 1);
                    let glyph = if ch == FILLER {
                        FILLER_GLYPH.to_string()
                    } else {
                        ch.to_string()
                    };
                    let style = if at == cursor {
                        cursor_style
                    } else if Some(at) == marker {
                        marker_style
                    } else if ch == FILLER {
                        dim_style
                    } else {
                        Style::default()
                    };
                    Span::styled(glyph, style)
                })
                .collect();
            // cursor past the end of the line, e.g. while appending
            if cursor.row == row && cursor.col > text.chars().count() {
                spans.push(Span::styled(" ", cursor_style));
            }
            Line::from(spans)
        })
        .collect();

    let board = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("gridrill"));
    board.render(chunks[1], buf);

    let status = app.message.clone().unwrap_or_else(|| {
        if marker.is_some() {
            "find the highlighted marker".to_string()
        } else {
            String::new()
        }
    });
    Paragraph::new(vec![
        Line::from(Span::styled(status, Style::default().fg(Color::Cyan))),
        Line::from(Span::styled(
            "(q) give up / (ctrl-c) quit",
            Style::default().add_modifier(Modifier::ITALIC),
        )),
    ])
    .wrap(Wrap { trim: true })
    .render(chunks[2], buf);
}

fn render_results<C: Clock + Clone>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let Some(result) = &app.result else {
        return;
    };

    let headline = if result.is_complete() {
        Span::styled("all done", bold_style.fg(Color::Green))
    } else if result.aborted {
        Span::styled("stopped", bold_style.fg(Color::Red))
    } else {
        Span::styled("finished", bold_style.fg(Color::Yellow))
    };

    let mut lines = vec![
        Line::from(headline),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "{}/{} assignments   {}   {} keys   {:.0} keys/min",
                result.completed,
                result.total,
                format_secs(result.elapsed_seconds),
                result.key_count,
                result.keys_per_minute
            ),
            bold_style,
        )),
    ];
    if let Some(avg) = result.avg_secs_per_assignment {
        lines.push(Line::from(format!(
            "{} per assignment (sd {:.2}s)",
            format_secs(avg),
            result.std_dev_secs.unwrap_or_default()
        )));
    }
    if result.skipped > 0 {
        lines.push(Line::from(format!("{} skipped", result.skipped)));
    }
    if let Some(best) = app.best_time {
        lines.push(Line::from(Span::styled(
            format!("previous best: {}", format_secs(best)),
            Style::default().fg(Color::Cyan),
        )));
    }
    if let Some(message) = &app.message {
        lines.push(Line::from(message.as_str()));
    }
    if !app.recent.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("recent runs", italic_style)));
        for entry in &app.recent {
            let style = if entry.aborted {
                Style::default().add_modifier(Modifier::DIM)
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(
                format!(
                    "{}   {}/{}   {}",
                    entry.finished_at.format("%Y-%m-%d %H:%M"),
                    entry.completed,
                    entry.total,
                    format_secs(entry.elapsed_seconds)
                ),
                style,
            )));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("(r)etry / (q)uit", italic_style)));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Min(lines.len() as u16),
            Constraint::Percentage(30),
        ])
        .split(area);

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);
}
