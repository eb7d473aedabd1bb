use crate::navigation::NoticeLevel;
use crate::types::RelationsSnapshot;
use std::time::Instant;

/// Which pane currently has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Tables,
    Diagram,
    Board,
}

/// What the status-bar text field is editing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
    ColumnFilter,
    DotPath,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub level: NoticeLevel,
    pub text: String,
}

/// Row of the tables pane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub id: String,
    pub name: String,
    pub is_link: bool,
    pub rows: Option<u64>,
}

/// A mouse press in the diagram, kept while the button is down
#[derive(Debug, Clone)]
pub struct DiagramDrag {
    pub last: (u16, u16),
    /// Node being moved and the press offset from its centre, in scene units
    pub node: Option<(String, f64, f64)>,
}

#[derive(Debug, Clone, Copy)]
pub struct LastClick {
    pub at: Instant,
    pub cell: (u16, u16),
}

/// Application state
#[derive(Debug)]
pub struct AppState {
    // Tables pane
    pub tables: Vec<TableEntry>,
    pub selected_table_index: usize,
    pub table_filter: String,

    // Diagram pane
    pub node_cursor: usize,
    pub selected_edge: Option<usize>,
    pub drag: Option<DiagramDrag>,
    pub last_click: Option<LastClick>,
    pub fit_pending: bool,

    // Board pane
    pub active_column: usize,
    /// Column whose selected rows are being carried to another column
    pub carrying: Option<usize>,

    // UI state
    pub focus: Focus,
    pub show_help: bool,
    pub input: InputMode,
    pub input_buffer: String,
    pub status: Option<StatusMessage>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            selected_table_index: 0,
            table_filter: String::new(),
            node_cursor: 0,
            selected_edge: None,
            drag: None,
            last_click: None,
            fit_pending: true,
            active_column: 0,
            carrying: None,
            focus: Focus::Tables,
            show_help: false,
            input: InputMode::Normal,
            input_buffer: String::new(),
            status: None,
        }
    }

    /// Reload the table list, ordered by name (case-insensitive)
    pub fn set_tables(&mut self, snapshot: &RelationsSnapshot, count: impl Fn(&str) -> Option<u64>) {
        let mut tables: Vec<TableEntry> = snapshot
            .layers
            .values()
            .map(|l| TableEntry {
                id: l.id.clone(),
                name: l.name.clone(),
                is_link: l.is_link_table,
                rows: count(&l.id),
            })
            .collect();
        tables.sort_by_key(|t| t.name.to_lowercase());
        self.tables = tables;
        let len = self.filtered_tables().len();
        self.selected_table_index = self.selected_table_index.min(len.saturating_sub(1));
    }

    /// Get filtered tables
    pub fn filtered_tables(&self) -> Vec<&TableEntry> {
        if self.table_filter.is_empty() {
            self.tables.iter().collect()
        } else {
            let filter = self.table_filter.to_lowercase();
            self.tables
                .iter()
                .filter(|t| t.name.to_lowercase().contains(&filter))
                .collect()
        }
    }

    /// Id of the selected table
    pub fn selected_table(&self) -> Option<&str> {
        self.filtered_tables()
            .get(self.selected_table_index)
            .map(|t| t.id.as_str())
    }

    /// Move selection up
    pub fn move_up(&mut self) {
        let filtered_len = self.filtered_tables().len();
        if filtered_len > 0 {
            self.selected_table_index = (self.selected_table_index + filtered_len - 1) % filtered_len;
        }
    }

    /// Move selection down
    pub fn move_down(&mut self) {
        let filtered_len = self.filtered_tables().len();
        if filtered_len > 0 {
            self.selected_table_index = (self.selected_table_index + 1) % filtered_len;
        }
    }

    pub fn next_pane(&mut self) {
        self.focus = match self.focus {
            Focus::Tables => Focus::Diagram,
            Focus::Diagram => Focus::Board,
            Focus::Board => Focus::Tables,
        };
    }

    pub fn prev_pane(&mut self) {
        self.focus = match self.focus {
            Focus::Tables => Focus::Board,
            Focus::Diagram => Focus::Tables,
            Focus::Board => Focus::Diagram,
        };
    }

    pub fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            level,
            text: text.into(),
        });
    }

    pub fn start_input(&mut self, mode: InputMode, initial: &str) {
        self.input = mode;
        self.input_buffer = initial.to_string();
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
