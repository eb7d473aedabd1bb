mod prompt;
mod state;

use crate::export::ExportFormat;
use crate::navigation::{DisplayField, NodeKind, NoticeLevel, Prompter};
use crate::scene::{Point, SceneEvent};
use crate::session::ExplorerSession;
use crate::settings::Settings;
use crate::ui::{self, CELL_HEIGHT, CELL_WIDTH};
use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{backend::Backend, buffer::Buffer, layout::Rect, Terminal};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub use prompt::TerminalPrompter;
pub use state::{AppState, DiagramDrag, Focus, InputMode, LastClick};

/// Row limits cycled with `L`; 0 shows every row
const ROW_LIMITS: [usize; 5] = [0, 50, 100, 500, 1000];
const DOUBLE_CLICK: Duration = Duration::from_millis(400);
/// Arrow-key pan distance, in cells
const PAN_CELLS: f64 = 4.0;
const ZOOM_STEP: f64 = 1.25;

/// Next label setting after `current`: auto, id, then each field in order
fn next_display(current: &DisplayField, fields: &[String]) -> DisplayField {
    match current {
        DisplayField::Auto => DisplayField::Id,
        DisplayField::Id => fields
            .first()
            .map(|f| DisplayField::Field(f.clone()))
            .unwrap_or(DisplayField::Auto),
        DisplayField::Field(name) => match fields.iter().position(|f| f == name) {
            Some(i) if i + 1 < fields.len() => DisplayField::Field(fields[i + 1].clone()),
            _ => DisplayField::Auto,
        },
    }
}

fn describe_display(display: &DisplayField) -> String {
    match display {
        DisplayField::Auto => "first non-empty field".to_string(),
        DisplayField::Id => "record id".to_string(),
        DisplayField::Field(name) => format!("field '{}'", name),
    }
}

fn next_limit(current: usize) -> usize {
    let pos = ROW_LIMITS.iter().position(|&l| l == current);
    match pos {
        Some(i) => ROW_LIMITS[(i + 1) % ROW_LIMITS.len()],
        None => ROW_LIMITS[0],
    }
}

fn contains(area: Rect, col: u16, row: u16) -> bool {
    col >= area.x && col < area.right() && row >= area.y && row < area.bottom()
}

/// Main application controller
pub struct App {
    pub session: ExplorerSession,
    pub state: AppState,
    settings: Settings,
    settings_path: Option<PathBuf>,
    should_quit: bool,
    /// Last drawn frame, shown behind modal prompts
    background: Buffer,
    size: Rect,
}

impl App {
    pub fn new(session: ExplorerSession, settings: Settings, settings_path: Option<PathBuf>) -> Self {
        Self {
            session,
            state: AppState::new(),
            settings,
            settings_path,
            should_quit: false,
            background: Buffer::default(),
            size: Rect::default(),
        }
    }

    /// Check if application should quit
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Reload the tables pane from the current snapshot
    pub fn load_tables(&mut self) {
        let host = self.session.host();
        self.state
            .set_tables(self.session.snapshot(), |id| host.feature_count(id).ok());
        let count = self.session.columns().len();
        self.state.active_column = self.state.active_column.min(count.saturating_sub(1));
        if self.state.carrying.map_or(false, |c| c >= count) {
            self.state.carrying = None;
        }
    }

    /// Keep the last frame for drawing prompts over it
    pub fn remember_frame(&mut self, buffer: &Buffer) {
        self.background = buffer.clone();
    }

    /// Match the diagram viewport to the terminal size before drawing
    pub fn sync_view(&mut self, size: Rect) {
        self.size = size;
        let inner = ui::pane_areas(size).diagram_inner();
        let (width, height) = ui::view_size(inner);
        if self.state.fit_pending {
            self.session.scene.fit_view(width, height);
            self.state.fit_pending = false;
        } else {
            self.session.scene.resize_view(width, height);
        }
    }

    pub fn handle_event<B: Backend>(&mut self, event: Event, terminal: &mut Terminal<B>) -> Result<()> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key_event(key, terminal),
            Event::Mouse(mouse) => {
                self.handle_mouse_event(mouse);
                Ok(())
            }
            // Resize is picked up by sync_view on the next frame
            _ => Ok(()),
        }
    }

    fn notify_error(&mut self, context: &str, error: anyhow::Error) {
        warn!(error = %format!("{:#}", error), "{}", context);
        self.state
            .notify(NoticeLevel::Error, format!("{}: {:#}", context, error));
    }

    /// Run `f` with a prompter drawing over the last frame, then surface its
    /// notices and refresh the tables pane
    fn with_prompter<B: Backend, R>(
        &mut self,
        terminal: &mut Terminal<B>,
        f: impl FnOnce(&mut ExplorerSession, &mut dyn Prompter) -> R,
    ) -> R {
        let background = std::mem::take(&mut self.background);
        let (result, notices) = {
            let mut prompter = TerminalPrompter::new(terminal, &background);
            let result = f(&mut self.session, &mut prompter);
            (result, std::mem::take(&mut prompter.notices))
        };
        self.background = background;
        for (level, text) in notices {
            debug!(?level, %text, "notice");
            self.state.notify(level, text);
        }
        self.load_tables();
        result
    }

    /// Handle a key event
    pub fn handle_key_event<B: Backend>(&mut self, event: KeyEvent, terminal: &mut Terminal<B>) -> Result<()> {
        if self.state.input != InputMode::Normal {
            self.handle_input_key(event);
            return Ok(());
        }

        if self.state.show_help {
            if matches!(event.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                self.state.show_help = false;
            }
            return Ok(());
        }

        let plain = event.modifiers.is_empty() || event.modifiers == KeyModifiers::SHIFT;
        match event.code {
            KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
                return Ok(());
            }
            KeyCode::Char('q') if event.modifiers.is_empty() => {
                self.should_quit = true;
                return Ok(());
            }
            KeyCode::Char('?') if plain => {
                self.state.show_help = true;
                return Ok(());
            }
            KeyCode::Tab => {
                self.state.next_pane();
                return Ok(());
            }
            KeyCode::BackTab => {
                self.state.prev_pane();
                return Ok(());
            }
            KeyCode::Esc => {
                self.state.status = None;
                self.state.carrying = None;
                self.state.selected_edge = None;
                if self.state.focus == Focus::Tables {
                    self.state.table_filter.clear();
                }
                return Ok(());
            }
            _ => {}
        }

        let focus = self.state.focus;
        match focus {
            Focus::Tables => {
                self.handle_tables_key(event);
                Ok(())
            }
            Focus::Diagram | Focus::Board if self.handle_global_key(event) => Ok(()),
            Focus::Diagram => {
                self.handle_diagram_key(event);
                Ok(())
            }
            Focus::Board => {
                self.handle_board_key(event, terminal);
                Ok(())
            }
        }
    }

    /// Keys shared by the diagram and the board; the tables pane types them
    /// into its filter instead
    fn handle_global_key(&mut self, event: KeyEvent) -> bool {
        match event.code {
            KeyCode::Char('R') => {
                match self.session.refresh() {
                    Ok(()) => {
                        self.load_tables();
                        self.state.selected_edge = None;
                        self.state.fit_pending = true;
                        self.state.notify(NoticeLevel::Success, "Relationships reloaded.");
                    }
                    Err(e) => self.notify_error("Refresh failed", e),
                }
            }
            KeyCode::Char('G') => {
                let current = self
                    .settings
                    .dot_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                self.state.start_input(InputMode::DotPath, &current);
            }
            KeyCode::Char('S') => self.export(ExportFormat::Svg),
            KeyCode::Char('D') => self.export(ExportFormat::Drawio),
            KeyCode::Char('J') => self.export(ExportFormat::Json),
            KeyCode::Char('C') => self.export(ExportFormat::Csv),
            _ => return false,
        }
        true
    }

    fn export(&mut self, format: ExportFormat) {
        let path = PathBuf::from(format!("relations.{}", format.extension()));
        match self.session.export(format, &path, None) {
            Ok(()) => {
                info!(path = %path.display(), ?format, "exported");
                self.state
                    .notify(NoticeLevel::Success, format!("Exported to {}", path.display()));
            }
            Err(e) => self.notify_error("Export failed", e),
        }
    }

    fn handle_input_key(&mut self, event: KeyEvent) {
        match event.code {
            KeyCode::Esc => {
                self.state.input = InputMode::Normal;
                self.state.input_buffer.clear();
            }
            KeyCode::Enter => {
                let mode = self.state.input;
                let text = std::mem::take(&mut self.state.input_buffer);
                self.state.input = InputMode::Normal;
                self.apply_input(mode, text.trim());
            }
            KeyCode::Backspace => {
                self.state.input_buffer.pop();
            }
            KeyCode::Char(c) if !event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.state.input_buffer.push(c);
            }
            _ => {}
        }
    }

    fn apply_input(&mut self, mode: InputMode, text: &str) {
        match mode {
            InputMode::Search => {
                self.session.set_search(text);
                self.state.selected_edge = None;
                self.state.fit_pending = true;
            }
            InputMode::ColumnFilter => {
                let index = self.state.active_column;
                self.session.set_column_filter(index, text);
            }
            InputMode::DotPath => self.set_dot_path(text),
            InputMode::Normal => {}
        }
    }

    fn set_dot_path(&mut self, text: &str) {
        let path = (!text.is_empty()).then(|| PathBuf::from(text));
        self.settings.set_dot_path(path);
        if let Some(settings_path) = &self.settings_path {
            if let Err(e) = self.settings.save(settings_path) {
                self.notify_error("Could not save settings", e);
                return;
            }
        }
        self.session.engine.set_configured(self.settings.dot_path.clone());
        self.session.refresh_diagram();
        self.state.fit_pending = true;
        let message = match self.session.engine.dot_path() {
            Some(path) => format!("Using Graphviz at {}", path.display()),
            None => "Graphviz 'dot' not found.".to_string(),
        };
        self.state.notify(NoticeLevel::Success, message);
    }

    fn open_column(&mut self, layer_id: &str) {
        match self.session.add_column(layer_id) {
            Ok(index) => {
                self.state.active_column = index;
                self.state.focus = Focus::Board;
                self.load_tables();
            }
            Err(e) => self.notify_error("Could not open the table", e),
        }
    }

    fn handle_tables_key(&mut self, event: KeyEvent) {
        match event.code {
            KeyCode::Up => self.state.move_up(),
            KeyCode::Down => self.state.move_down(),
            KeyCode::Enter => {
                if let Some(id) = self.state.selected_table().map(str::to_string) {
                    self.open_column(&id);
                }
            }
            KeyCode::Char('/') => {
                self.state.table_filter.clear();
                self.state.selected_table_index = 0;
            }
            KeyCode::Char(c) if !event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.state.table_filter.push(c);
                self.state.selected_table_index = 0;
            }
            KeyCode::Backspace => {
                self.state.table_filter.pop();
                self.state.selected_table_index = 0;
            }
            _ => {}
        }
    }

    /// Scroll the view so that `target` sits in its middle
    fn center_on(&mut self, target: Point) {
        let viewport = *self.session.scene.viewport();
        self.session.scene.pan(
            (viewport.center.x - target.x) * viewport.scale,
            (viewport.center.y - target.y) * viewport.scale,
        );
    }

    fn handle_diagram_key(&mut self, event: KeyEvent) {
        let scene = &mut self.session.scene;
        match event.code {
            KeyCode::Left => scene.pan(PAN_CELLS * CELL_WIDTH, 0.0),
            KeyCode::Right => scene.pan(-PAN_CELLS * CELL_WIDTH, 0.0),
            KeyCode::Up => scene.pan(0.0, PAN_CELLS * CELL_HEIGHT),
            KeyCode::Down => scene.pan(0.0, -PAN_CELLS * CELL_HEIGHT),
            KeyCode::Char('+') | KeyCode::Char('=') => scene.zoom(ZOOM_STEP),
            KeyCode::Char('-') => scene.zoom(1.0 / ZOOM_STEP),
            KeyCode::Char('0') => self.state.fit_pending = true,
            KeyCode::Char('n') => {
                let count = scene.nodes().len();
                if count == 0 {
                    return;
                }
                self.state.node_cursor = (self.state.node_cursor + 1) % count;
                let node = &scene.nodes()[self.state.node_cursor];
                let (center, label) = (node.center, node.label.clone());
                self.center_on(center);
                self.state.notify(NoticeLevel::Success, label);
            }
            KeyCode::Enter => {
                let viewport = *scene.viewport();
                let middle = Point::new(viewport.width / 2.0, viewport.height / 2.0);
                if let Some(id) = scene.node_at_view(middle).map(|n| n.id.clone()) {
                    self.open_column(&id);
                }
            }
            KeyCode::Char('e') => {
                let count = scene.edges().len();
                if count == 0 {
                    return;
                }
                let next = self.state.selected_edge.map_or(0, |i| (i + 1) % count);
                self.state.selected_edge = Some(next);
                if let Some(text) = scene.edge_tooltip(next) {
                    self.state.notify(NoticeLevel::Success, text);
                }
            }
            KeyCode::Char('/') => {
                let current = self.session.search().to_string();
                self.state.start_input(InputMode::Search, &current);
            }
            _ => {}
        }
    }

    fn cycle_label(&mut self) -> Result<()> {
        let index = self.state.active_column;
        let Some(column) = self.session.columns().get(index) else {
            return Ok(());
        };
        let column_layer = column.layer_id().to_string();
        let child_layer = column
            .current()
            .and_then(|id| column.tree.node(id))
            .and_then(|node| match &node.kind {
                NodeKind::ChildRecord { layer_id, .. } if *layer_id != column_layer => Some(layer_id.clone()),
                _ => None,
            });

        let (layer, next) = match &child_layer {
            Some(layer) => {
                let fields = self.session.host().fields(layer)?;
                (layer.clone(), next_display(column.tree.labels.child_display(layer), &fields))
            }
            None => {
                let fields = self.session.host().fields(&column_layer)?;
                (column_layer.clone(), next_display(&column.tree.labels.display, &fields))
            }
        };

        if child_layer.is_some() {
            self.session.set_child_display(index, &layer, next.clone())?;
        } else {
            self.session.set_display(index, next.clone())?;
        }
        let name = self.session.snapshot().layer_name(&layer).to_string();
        self.state.notify(
            NoticeLevel::Success,
            format!("{} rows labelled by {}", name, describe_display(&next)),
        );
        Ok(())
    }

    fn handle_board_key<B: Backend>(&mut self, event: KeyEvent, terminal: &mut Terminal<B>) {
        let count = self.session.columns().len();
        let index = self.state.active_column;
        match event.code {
            KeyCode::Left => self.state.active_column = index.saturating_sub(1),
            KeyCode::Right => self.state.active_column = (index + 1).min(count.saturating_sub(1)),
            KeyCode::Up | KeyCode::Down | KeyCode::PageUp | KeyCode::PageDown => {
                if let Some(column) = self.session.column_mut(index) {
                    let delta = match event.code {
                        KeyCode::Up => -1,
                        KeyCode::Down => 1,
                        KeyCode::PageUp => -10,
                        _ => 10,
                    };
                    column.move_cursor(delta);
                }
            }
            KeyCode::Enter => self.session.toggle_current(index),
            KeyCode::Char(' ') => {
                if let Some(column) = self.session.column_mut(index) {
                    column.toggle_mark();
                }
            }
            KeyCode::Char('*') => self.session.expand_all(index),
            KeyCode::Char('_') => self.session.collapse_all(index),
            KeyCode::Char('d') => {
                let rows = self
                    .session
                    .columns()
                    .get(index)
                    .map_or(0, |c| c.selected_rows().len());
                if rows == 0 {
                    self.state
                        .notify(NoticeLevel::Warning, "Select the rows to drag first.");
                } else {
                    self.state.carrying = Some(index);
                    self.state.notify(
                        NoticeLevel::Success,
                        format!("Carrying {} row(s). Go to the target row and press p.", rows),
                    );
                }
            }
            KeyCode::Char('p') => {
                let Some(from) = self.state.carrying.take() else {
                    self.state
                        .notify(NoticeLevel::Warning, "Pick rows up with d first.");
                    return;
                };
                let outcome = self.with_prompter(terminal, |session, prompter| session.drop_rows(prompter, from, index));
                info!(?outcome, "drop finished");
            }
            KeyCode::Char('x') => {
                let outcome = self.with_prompter(terminal, |session, prompter| session.detach_current(prompter, index));
                info!(?outcome, "detach finished");
            }
            KeyCode::Char('E') => {
                self.with_prompter(terminal, |session, prompter| session.toggle_editing(prompter, index));
            }
            KeyCode::Char('c') => {
                self.with_prompter(terminal, |session, prompter| session.commit_column(prompter, index));
            }
            KeyCode::Char('u') => {
                self.with_prompter(terminal, |session, prompter| session.rollback_column(prompter, index));
            }
            KeyCode::Char('i') => {
                if let Err(e) = self.cycle_label() {
                    self.notify_error("Could not change labels", e);
                }
            }
            KeyCode::Char('/') if count > 0 => {
                let current = self
                    .session
                    .columns()
                    .get(index)
                    .map(|c| c.tree.filter().to_string())
                    .unwrap_or_default();
                self.state.start_input(InputMode::ColumnFilter, &current);
            }
            KeyCode::Char('F') => {
                let on = !self.session.child_filter();
                match self.session.set_child_filter(on) {
                    Ok(()) => {
                        let text = if on {
                            "Only relations to tables on the board are shown."
                        } else {
                            "All relations are shown."
                        };
                        self.state.notify(NoticeLevel::Success, text);
                    }
                    Err(e) => self.notify_error("Could not filter relations", e),
                }
            }
            KeyCode::Char('L') => {
                let limit = next_limit(self.session.max_count());
                match self.session.set_max_count(limit) {
                    Ok(()) => {
                        let text = match limit {
                            0 => "Showing every row.".to_string(),
                            n => format!("Showing at most {} rows per column.", n),
                        };
                        self.state.notify(NoticeLevel::Success, text);
                    }
                    Err(e) => self.notify_error("Could not reload rows", e),
                }
            }
            KeyCode::Char('w') if count > 0 => {
                if let Err(e) = self.session.remove_column(index) {
                    self.notify_error("Could not close the column", e);
                }
                self.load_tables();
            }
            _ => {}
        }
    }

    fn handle_mouse_event(&mut self, mouse: MouseEvent) {
        let areas = ui::pane_areas(self.size);
        let inner = areas.diagram_inner();
        let (col, row) = (mouse.column, mouse.row);
        let in_diagram = contains(inner, col, row);

        match mouse.kind {
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
                let delta = if mouse.kind == MouseEventKind::ScrollUp { 1 } else { -1 };
                if in_diagram {
                    self.session.scene.wheel(delta);
                } else if contains(areas.board, col, row) {
                    let index = self.state.active_column;
                    if let Some(column) = self.session.column_mut(index) {
                        column.move_cursor(-delta as isize);
                    }
                } else if contains(areas.tables, col, row) {
                    if delta > 0 {
                        self.state.move_up();
                    } else {
                        self.state.move_down();
                    }
                }
            }
            MouseEventKind::Down(MouseButton::Left) => {
                if in_diagram {
                    self.state.focus = Focus::Diagram;
                    self.diagram_press(inner, col, row);
                } else if contains(areas.tables, col, row) {
                    self.state.focus = Focus::Tables;
                    // border and header rows come first
                    let offset = row.saturating_sub(areas.tables.y + 2) as usize;
                    if offset < self.state.filtered_tables().len() {
                        self.state.selected_table_index = offset;
                    }
                } else if contains(areas.board, col, row) {
                    self.state.focus = Focus::Board;
                    self.board_press(areas.board, col, row);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => self.diagram_drag(inner, col, row),
            MouseEventKind::Up(MouseButton::Left) => self.state.drag = None,
            MouseEventKind::Down(MouseButton::Right) if in_diagram => {
                let scene = &self.session.scene;
                let p = scene.view_to_scene(ui::cell_to_view(inner, col, row));
                let tolerance = CELL_WIDTH / scene.viewport().scale;
                self.state.selected_edge = scene.edge_at(p, tolerance);
                if let Some(index) = self.state.selected_edge {
                    let text = scene.edge_context_lines(index).join("\n");
                    self.state.notify(NoticeLevel::Success, text);
                }
            }
            _ => {}
        }
    }

    fn diagram_press(&mut self, inner: Rect, col: u16, row: u16) {
        let now = Instant::now();
        let double = self
            .state
            .last_click
            .map_or(false, |c| c.cell == (col, row) && now.duration_since(c.at) <= DOUBLE_CLICK);
        let view = ui::cell_to_view(inner, col, row);

        if double {
            self.state.last_click = None;
            self.state.drag = None;
            self.session.scene.double_click(view);
            for event in self.session.scene.take_events() {
                let SceneEvent::NodeActivated(id) = event;
                self.open_column(&id);
            }
            return;
        }

        self.state.last_click = Some(LastClick { at: now, cell: (col, row) });
        let p = self.session.scene.view_to_scene(view);
        let node = self
            .session
            .scene
            .node_at(p)
            .map(|n| (n.id.clone(), n.center.x - p.x, n.center.y - p.y));
        self.state.drag = Some(DiagramDrag { last: (col, row), node });
    }

    fn diagram_drag(&mut self, inner: Rect, col: u16, row: u16) {
        let Some(drag) = self.state.drag.as_mut() else {
            return;
        };
        let (dx, dy) = (col as f64 - drag.last.0 as f64, row as f64 - drag.last.1 as f64);
        drag.last = (col, row);
        match &drag.node {
            Some((id, ox, oy)) => {
                let p = self.session.scene.view_to_scene(ui::cell_to_view(inner, col, row));
                self.session.scene.move_node(id, Point::new(p.x + ox, p.y + oy));
            }
            None => self.session.scene.pan(dx * CELL_WIDTH, dy * CELL_HEIGHT),
        }
    }

    fn board_press(&mut self, board: Rect, col: u16, row: u16) {
        let count = self.session.columns().len();
        let (first, areas) = ui::column_areas(board, count, self.state.active_column);
        let Some(offset) = areas.iter().position(|a| contains(*a, col, row)) else {
            return;
        };
        let index = first + offset;
        self.state.active_column = index;
        let line = row.saturating_sub(areas[offset].y + 1) as usize;
        if let Some(column) = self.session.column_mut(index) {
            if line < column.rows().len() {
                column.cursor = line;
            }
        }
    }
}

/// Export without a TUI, guessing the format from the file name
pub fn export_to(session: &mut ExplorerSession, path: &Path, format: Option<ExportFormat>, root: Option<&str>) -> Result<ExportFormat> {
    let format = match format.or_else(|| ExportFormat::from_path(path)) {
        Some(f) => f,
        None => anyhow::bail!("Cannot tell the export format of {}; pass --format", path.display()),
    };
    session.export(format, path, root)?;
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutEngine;
    use crate::relations::fixtures::{self, PARENT_CHILD};
    use pretty_assertions::assert_eq;
    use ratatui::backend::TestBackend;

    fn app() -> (App, Terminal<TestBackend>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let engine = LayoutEngine::new(Some(dir.path().join("missing-dot")));
        let session = ExplorerSession::new(Box::new(fixtures::host(PARENT_CHILD)), engine, 0).unwrap();
        let mut app = App::new(session, Settings::default(), Some(dir.path().join("settings.json")));
        app.load_tables();
        let terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        (app, terminal, dir)
    }

    fn press(app: &mut App, terminal: &mut Terminal<TestBackend>, code: KeyCode) {
        app.handle_key_event(KeyEvent::new(code, KeyModifiers::NONE), terminal)
            .unwrap();
    }

    fn type_text(app: &mut App, terminal: &mut Terminal<TestBackend>, text: &str) {
        for c in text.chars() {
            press(app, terminal, KeyCode::Char(c));
        }
    }

    #[test]
    fn labels_cycle_through_fields() {
        let fields = vec!["id".to_string(), "name".to_string()];
        let mut display = DisplayField::Auto;
        let mut seen = Vec::new();
        for _ in 0..5 {
            display = next_display(&display, &fields);
            seen.push(display.clone());
        }
        assert_eq!(
            seen,
            vec![
                DisplayField::Id,
                DisplayField::Field("id".into()),
                DisplayField::Field("name".into()),
                DisplayField::Auto,
                DisplayField::Id,
            ]
        );
    }

    #[test]
    fn limits_wrap_around() {
        assert_eq!(next_limit(0), 50);
        assert_eq!(next_limit(1000), 0);
        assert_eq!(next_limit(7), 0);
    }

    #[test]
    fn typing_filters_tables_and_enter_opens_a_column() {
        let (mut app, mut terminal, _dir) = app();
        type_text(&mut app, &mut terminal, "chi");
        assert_eq!(app.state.selected_table(), Some("child"));

        press(&mut app, &mut terminal, KeyCode::Enter);
        assert_eq!(app.session.columns().len(), 1);
        assert_eq!(app.state.focus, Focus::Board);
        assert_eq!(app.state.active_column, 0);

        // q quits even from the filter
        app.state.focus = Focus::Tables;
        press(&mut app, &mut terminal, KeyCode::Char('q'));
        assert!(app.should_quit());
    }

    #[test]
    fn board_keys_change_limit_and_close_columns() {
        let (mut app, mut terminal, _dir) = app();
        app.open_column("parent");
        press(&mut app, &mut terminal, KeyCode::Char('L'));
        assert_eq!(app.session.max_count(), 50);

        press(&mut app, &mut terminal, KeyCode::Char('w'));
        assert!(app.session.columns().is_empty());
    }

    #[test]
    fn diagram_search_goes_through_the_input_line() {
        let (mut app, mut terminal, _dir) = app();
        app.state.focus = Focus::Diagram;
        press(&mut app, &mut terminal, KeyCode::Char('/'));
        assert_eq!(app.state.input, InputMode::Search);
        type_text(&mut app, &mut terminal, "par");
        press(&mut app, &mut terminal, KeyCode::Enter);
        assert_eq!(app.state.input, InputMode::Normal);
        assert_eq!(app.session.search(), "par");
    }

    #[test]
    fn dot_path_is_saved_to_settings() {
        let (mut app, mut terminal, dir) = app();
        app.state.focus = Focus::Board;
        press(&mut app, &mut terminal, KeyCode::Char('G'));
        assert_eq!(app.state.input, InputMode::DotPath);
        let dot = dir.path().join("other-dot");
        type_text(&mut app, &mut terminal, &dot.display().to_string());
        press(&mut app, &mut terminal, KeyCode::Enter);

        let saved = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(saved.dot_path, Some(dot.clone()));
        assert_eq!(app.session.engine.dot_path(), Some(dot.as_path()));
    }

    #[test]
    fn export_needs_a_known_extension() {
        let (mut app, _terminal, dir) = app();
        let err = export_to(&mut app.session, &dir.path().join("out.txt"), None, None).unwrap_err();
        assert!(err.to_string().contains("--format"));

        let path = dir.path().join("rel.csv");
        let format = export_to(&mut app.session, &path, None, None).unwrap();
        assert_eq!(format, ExportFormat::Csv);
        assert!(path.exists());
    }
}
