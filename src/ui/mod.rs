mod board;
mod diagram;
mod help;
mod prompt;
mod status;
mod tables;

use crate::app::{App, Focus};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders},
    Frame,
};

pub use board::{column_areas, render_board};
pub use diagram::{cell_to_view, render_diagram, view_size, CELL_HEIGHT, CELL_WIDTH};
pub use help::render_help;
pub use prompt::{render_modal, Modal};
pub use status::render_status;
pub use tables::render_tables;

/// Screen areas of the three panes and the status bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneAreas {
    pub tables: Rect,
    pub diagram: Rect,
    pub board: Rect,
    pub status: Rect,
}

impl PaneAreas {
    /// Drawing area of the diagram inside its border
    pub fn diagram_inner(&self) -> Rect {
        Block::default().borders(Borders::ALL).inner(self.diagram)
    }
}

pub fn pane_areas(size: Rect) -> PaneAreas {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(size);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20), // Tables
            Constraint::Percentage(45), // Diagram
            Constraint::Percentage(35), // Board
        ])
        .split(vertical[0]);

    PaneAreas {
        tables: horizontal[0],
        diagram: horizontal[1],
        board: horizontal[2],
        status: vertical[1],
    }
}

/// Render the main UI
pub fn render(frame: &mut Frame, app: &App) {
    let size = frame.size();
    let areas = pane_areas(size);

    render_tables(frame, areas.tables, app);

    let diagram_style = if app.state.focus == Focus::Diagram {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let block = Block::default()
        .title(" Diagram ")
        .borders(Borders::ALL)
        .border_style(diagram_style);
    render_diagram(frame, areas.diagram, app, block);

    render_board(frame, areas.board, app);
    render_status(frame, areas.status, app);

    if app.state.show_help {
        render_help(frame, size);
    }
}
