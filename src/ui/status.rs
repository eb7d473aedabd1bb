use crate::app::{App, Focus, InputMode};
use crate::navigation::NoticeLevel;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

fn hints(focus: Focus) -> &'static str {
    match focus {
        Focus::Tables => "Enter open · type to filter · ? help",
        Focus::Diagram => "arrows pan · +/- zoom · 0 fit · n next · Enter open · / search",
        Focus::Board => "Enter expand · Space mark · d/p drag-drop · x detach · c save · ? help",
    }
}

pub fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(36)])
        .split(area);

    let left = match app.state.input {
        InputMode::Normal => match &app.state.status {
            Some(status) => {
                let color = match status.level {
                    NoticeLevel::Success => Color::Green,
                    NoticeLevel::Warning => Color::Yellow,
                    NoticeLevel::Error => Color::Red,
                };
                // one line only; multi-line notices are joined
                Line::from(Span::styled(
                    status.text.replace('\n', " · "),
                    Style::default().fg(color),
                ))
            }
            None => Line::from(Span::styled(hints(app.state.focus), Style::default().fg(Color::DarkGray))),
        },
        mode => {
            let label = match mode {
                InputMode::Search => "Search tables: ",
                InputMode::ColumnFilter => "Filter column: ",
                InputMode::DotPath => "Path to dot (empty = PATH): ",
                InputMode::Normal => "",
            };
            Line::from(vec![
                Span::styled(label, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
                Span::raw(app.state.input_buffer.clone()),
                Span::styled("▏", Style::default().fg(Color::Cyan)),
            ])
        }
    };
    frame.render_widget(Paragraph::new(left), chunks[0]);

    let engine = match app.session.engine.dot_path() {
        Some(path) => format!("dot: {}", path.display()),
        None => "dot: not found".to_string(),
    };
    let mut right = vec![Span::styled(engine, Style::default().fg(Color::DarkGray))];
    if !app.session.search().is_empty() {
        right.insert(
            0,
            Span::styled(
                format!("[{}] ", app.session.search()),
                Style::default().fg(Color::Cyan),
            ),
        );
    }
    frame.render_widget(
        Paragraph::new(Line::from(right)).alignment(ratatui::layout::Alignment::Right),
        chunks[1],
    );
}
