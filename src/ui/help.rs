use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

const SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "Everywhere:",
        &[
            ("Tab / Shift+Tab", "Switch between panes"),
            ("R", "Re-read tables and relations (not in Tables)"),
            ("G", "Set the Graphviz 'dot' path (not in Tables)"),
            ("S / D / J / C", "Export SVG / draw.io / JSON report / CSV (not in Tables)"),
            ("Esc", "Clear the message, drop carried rows"),
            ("?", "Show this help"),
            ("q", "Quit application"),
        ],
    ),
    (
        "Tables:",
        &[
            ("Up / Down", "Navigate table list"),
            ("Enter", "Open the table as a board column"),
            ("type / Backspace", "Filter tables, / or Esc clears"),
            ("click / wheel", "Select"),
        ],
    ),
    (
        "Diagram:",
        &[
            ("Arrows / drag", "Pan"),
            ("+ / - / wheel", "Zoom"),
            ("0", "Fit the whole graph"),
            ("n", "Centre on the next table"),
            ("Enter / double-click", "Open the table in the middle / under the mouse"),
            ("drag a box", "Move it"),
            ("e / right-click", "Show the fields of a relation"),
            ("/", "Search tables by name (limits the diagram)"),
        ],
    ),
    (
        "Board:",
        &[
            ("Left / Right", "Switch column"),
            ("Up / Down", "Move in the column"),
            ("Enter", "Expand or collapse"),
            ("Space", "Mark a row"),
            ("d then p", "Pick up the marked rows, drop them on the current row"),
            ("x", "Detach the related row (clear its key or delete the link)"),
            ("E", "Toggle edit mode of the column's table"),
            ("c / u", "Save / discard pending changes"),
            ("i", "Cycle the label field"),
            ("* / _", "Expand / collapse all"),
            ("/", "Filter the column"),
            ("F", "Only show relations to tables on the board"),
            ("L", "Cycle the row limit"),
            ("w", "Close the column"),
        ],
    ),
];

pub fn render_help(frame: &mut Frame, area: Rect) {
    // Create a centered modal
    let popup_area = centered_rect(70, 90, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title("Help (Press ? or Esc to close)")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let mut lines = vec![Line::from(Span::styled(
        "relx - Relations Explorer",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ))];

    for (heading, keys) in SECTIONS {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            *heading,
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        for (key, action) in keys.iter() {
            lines.push(Line::from(vec![
                Span::styled(format!("  {}", key), Style::default().fg(Color::Cyan)),
                Span::raw(format!("  {}", action)),
            ]));
        }
    }

    let para = Paragraph::new(lines)
        .block(Block::default())
        .wrap(Wrap { trim: true });

    frame.render_widget(para, inner);
}

pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(ratatui::layout::Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
