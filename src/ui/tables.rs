use crate::app::{App, Focus};
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};
use std::collections::HashSet;

pub fn render_tables(frame: &mut Frame, area: Rect, app: &App) {
    let on_board: HashSet<String> = app.session.displayed_layers();
    let snapshot = app.session.snapshot();
    let filtered = app.state.filtered_tables();

    let rows: Vec<Row> = filtered
        .iter()
        .map(|table| {
            let mut name = vec![Span::raw(table.name.clone())];
            if table.is_link {
                name.push(Span::styled(" ⇄", Style::default().fg(Color::LightRed)));
            }
            let name_style = if on_board.contains(&table.id) {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let relations = snapshot.incoming(&table.id).count() + snapshot.outgoing(&table.id).count();
            let count = table.rows.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string());
            Row::new(vec![
                Cell::from(Line::from(name)).style(name_style),
                Cell::from(relations.to_string()),
                Cell::from(count),
            ])
        })
        .collect();

    let title = if app.state.table_filter.is_empty() {
        format!(" Tables ({}) ", app.state.tables.len())
    } else {
        format!(" Tables ({} / {}) ", filtered.len(), app.state.tables.len())
    };

    let focused = app.state.focus == Focus::Tables;
    let border_style = if focused {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);

    let mut table_state = TableState::default();
    if !filtered.is_empty() {
        table_state.select(Some(app.state.selected_table_index));
    }

    let widths = [Constraint::Min(8), Constraint::Length(3), Constraint::Length(7)];
    let header = Row::new(vec!["Table", "Rel", "Rows"]).style(Style::default().fg(Color::DarkGray));
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(table, area, &mut table_state);

    if !app.state.table_filter.is_empty() && area.height > 2 {
        let filter = Line::from(Span::styled(
            format!("/{}", app.state.table_filter),
            Style::default().fg(Color::Cyan),
        ));
        frame.render_widget(
            filter,
            Rect::new(area.x + 1, area.bottom() - 1, area.width.saturating_sub(2), 1),
        );
    }
}
