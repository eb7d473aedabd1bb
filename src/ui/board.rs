use crate::app::{App, Focus};
use crate::navigation::{Expansion, NodeKind};
use crate::session::BoardColumn;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

/// Narrowest column before the board scrolls sideways
const MIN_COLUMN_WIDTH: u16 = 24;

/// First column shown and the areas of the visible columns
pub fn column_areas(area: Rect, count: usize, active: usize) -> (usize, Vec<Rect>) {
    if count == 0 {
        return (0, Vec::new());
    }
    let fit = ((area.width / MIN_COLUMN_WIDTH) as usize).clamp(1, count);
    let first = active.saturating_sub(fit - 1).min(count - fit);
    let constraints = vec![Constraint::Ratio(1, fit as u32); fit];
    let areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area)
        .to_vec();
    (first, areas)
}

pub fn render_board(frame: &mut Frame, area: Rect, app: &App) {
    let focused = app.state.focus == Focus::Board;
    let columns = app.session.columns();
    if columns.is_empty() {
        let block = Block::default()
            .title(" Board ")
            .borders(Borders::ALL)
            .border_style(if focused {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            });
        let hint = Paragraph::new("Open a table with Enter in the Tables pane or double-click a box in the diagram.")
            .style(Style::default().fg(Color::Gray))
            .wrap(ratatui::widgets::Wrap { trim: true })
            .block(block);
        frame.render_widget(hint, area);
        return;
    }

    let (first, areas) = column_areas(area, columns.len(), app.state.active_column);
    for (offset, rect) in areas.into_iter().enumerate() {
        let index = first + offset;
        if let Some(column) = columns.get(index) {
            render_column(frame, rect, app, index, column, focused);
        }
    }
}

fn render_column(frame: &mut Frame, area: Rect, app: &App, index: usize, column: &BoardColumn, focused: bool) {
    let active = index == app.state.active_column;
    let host = app.session.host();
    let layer_id = column.layer_id();

    let mut title = column.title(app.session.snapshot());
    if host.is_editable(layer_id) {
        title.push_str(" ✎");
    }
    if host.is_modified(layer_id) {
        title.push('*');
    }
    if !column.tree.filter().is_empty() {
        title.push_str(&format!(" /{}", column.tree.filter()));
    }

    let border_style = if app.state.carrying == Some(index) {
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
    } else if active && focused {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };

    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(border_style);

    let items: Vec<ListItem> = column
        .rows()
        .into_iter()
        .filter_map(|(id, depth)| {
            let node = column.tree.node(id)?;
            let indent = "  ".repeat(depth);
            let marker = match &node.kind {
                NodeKind::RelationGroup { expansion, .. } => {
                    if node.open {
                        "▾ "
                    } else if *expansion == Expansion::Unexpanded || !node.children.is_empty() {
                        "▸ "
                    } else {
                        "  "
                    }
                }
                NodeKind::TopRecord { .. } if !node.children.is_empty() => {
                    if node.open {
                        "▾ "
                    } else {
                        "▸ "
                    }
                }
                _ => "  ",
            };
            let style = match &node.kind {
                NodeKind::RelationGroup { .. } => Style::default().fg(Color::Cyan),
                NodeKind::ChildRecord { .. } => Style::default().fg(Color::White),
                NodeKind::TopRecord { .. } => Style::default().add_modifier(Modifier::BOLD),
            };
            let mark = if column.marked.contains(&id) { "● " } else { "" };
            Some(ListItem::new(Line::from(vec![
                Span::raw(indent),
                Span::styled(marker, Style::default().fg(Color::DarkGray)),
                Span::styled(mark, Style::default().fg(Color::Magenta)),
                Span::styled(node.label.clone(), style),
            ])))
        })
        .collect();

    let mut list_state = ListState::default();
    if !items.is_empty() {
        list_state.select(Some(column.cursor));
    }
    let highlight = if active {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::REVERSED)
    };

    let list = List::new(items)
        .block(block)
        .highlight_style(highlight)
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut list_state);
}
