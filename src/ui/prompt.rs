use super::help::centered_rect;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

/// A modal question drawn over the last frame
#[derive(Debug, Clone)]
pub enum Modal<'a> {
    Confirm {
        title: &'a str,
        lines: &'a [String],
        scroll: usize,
    },
    YesNo {
        title: &'a str,
        question: &'a str,
    },
    Choice {
        title: &'a str,
        prompt: &'a str,
        options: &'a [String],
        selected: usize,
    },
    Record {
        title: String,
        rows: Vec<(String, String)>,
        scroll: usize,
    },
}

fn key_hint(keys: &[(&str, &str)]) -> Line<'static> {
    let mut spans = Vec::new();
    for (key, action) in keys {
        spans.push(Span::styled(
            format!("[{}]", key),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(format!(" {}  ", action)));
    }
    Line::from(spans)
}

fn frame_block(frame: &mut Frame, area: Rect, title: &str) -> Rect {
    frame.render_widget(Clear, area);
    let block = Block::default()
        .title(format!(" {} ", title))
        .title_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    inner
}

/// Body area plus a one-line footer for key hints
fn split_footer(area: Rect) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);
    (chunks[0], chunks[1])
}

pub fn render_modal(frame: &mut Frame, area: Rect, modal: &Modal) {
    match modal {
        Modal::Confirm { title, lines, scroll } => {
            let inner = frame_block(frame, centered_rect(70, 60, area), title);
            let (body, footer) = split_footer(inner);
            let text: Vec<Line> = lines
                .iter()
                .skip(*scroll)
                .map(|l| Line::from(l.as_str()))
                .collect();
            frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), body);
            frame.render_widget(
                Paragraph::new(key_hint(&[("y/Enter", "Apply"), ("n/Esc", "Cancel"), ("↑↓", "Scroll")])),
                footer,
            );
        }
        Modal::YesNo { title, question } => {
            let inner = frame_block(frame, centered_rect(50, 30, area), title);
            let (body, footer) = split_footer(inner);
            frame.render_widget(Paragraph::new(*question).wrap(Wrap { trim: true }), body);
            frame.render_widget(Paragraph::new(key_hint(&[("y", "Yes"), ("n/Esc", "No")])), footer);
        }
        Modal::Choice {
            title,
            prompt,
            options,
            selected,
        } => {
            let inner = frame_block(frame, centered_rect(70, 50, area), title);
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(2), Constraint::Min(0), Constraint::Length(1)])
                .split(inner);
            frame.render_widget(Paragraph::new(*prompt), chunks[0]);

            let items: Vec<ListItem> = options
                .iter()
                .enumerate()
                .map(|(i, o)| ListItem::new(format!("{}. {}", i + 1, o)))
                .collect();
            let mut state = ListState::default();
            state.select(Some(*selected));
            let list = List::new(items)
                .highlight_style(
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol("> ");
            frame.render_stateful_widget(list, chunks[1], &mut state);
            frame.render_widget(
                Paragraph::new(key_hint(&[("Enter", "Choose"), ("Esc", "Cancel")])),
                chunks[2],
            );
        }
        Modal::Record { title, rows, scroll } => {
            let inner = frame_block(frame, centered_rect(60, 70, area), title);
            let (body, footer) = split_footer(inner);
            let width = rows.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
            let text: Vec<Line> = rows
                .iter()
                .skip(*scroll)
                .map(|(k, v)| {
                    Line::from(vec![
                        Span::styled(format!("{:width$}", k, width = width), Style::default().fg(Color::Cyan)),
                        Span::raw("  "),
                        Span::raw(v.clone()),
                    ])
                })
                .collect();
            frame.render_widget(Paragraph::new(text), body);
            frame.render_widget(Paragraph::new(key_hint(&[("Enter/Esc", "Close")])), footer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn rendered(modal: &Modal) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal
            .draw(|f| render_modal(f, f.size(), modal))
            .unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(80)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn confirm_lists_the_changes() {
        let lines = vec!["a : parent_id  NULL → 5".to_string()];
        let screen = rendered(&Modal::Confirm {
            title: "Confirm",
            lines: &lines,
            scroll: 0,
        });
        assert!(screen.contains("parent_id  NULL → 5"));
        assert!(screen.contains("[y/Enter]"));
    }

    #[test]
    fn choice_numbers_its_options() {
        let options = vec!["l  ⟦ a[id->fk_a] + b[id->fk_b] ⟧".to_string(), "l2".to_string()];
        let screen = rendered(&Modal::Choice {
            title: "Pick",
            prompt: "Several link tables join these two layers:",
            options: &options,
            selected: 1,
        });
        assert!(screen.contains("2. l2"));
        assert!(screen.contains("Several link tables"));
    }
}
