//! The explorer session: the live snapshot, its diagram and the board of
//! relation-tree columns, rebuilt together on refresh.

use crate::export::{export_drawio, export_relations_csv, export_report, write_svg, ExportFormat};
use crate::host::Host;
use crate::layout::LayoutEngine;
use crate::navigation::{
    DetachOutcome, DisplayField, DropOutcome, DropPayload, DropTarget, EditContext, NodeId,
    NodeKind, NoticeLevel, Prompter, RelationTree, RowRef, TreeOptions,
};
use crate::relations::capture;
use crate::scene::{GraphScene, SceneMeta};
use crate::types::{Record, RelationsSnapshot};
use anyhow::{anyhow, Context, Result};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Default nesting depth of the JSON report
pub const REPORT_DEPTH: usize = 2;

/// One column of the board: a relation tree plus its cursor and marks
#[derive(Debug, Clone)]
pub struct BoardColumn {
    pub tree: RelationTree,
    /// 1-based number among the columns showing the same layer
    pub instance: usize,
    pub total: u64,
    pub cursor: usize,
    pub marked: BTreeSet<NodeId>,
}

impl BoardColumn {
    fn new(layer_id: &str, instance: usize) -> Self {
        Self {
            tree: RelationTree::new(layer_id),
            instance,
            total: 0,
            cursor: 0,
            marked: BTreeSet::new(),
        }
    }

    pub fn layer_id(&self) -> &str {
        self.tree.layer_id()
    }

    pub fn title(&self, snapshot: &RelationsSnapshot) -> String {
        self.tree.title(snapshot, self.instance, self.total)
    }

    pub fn rows(&self) -> Vec<(NodeId, usize)> {
        self.tree.visible_rows()
    }

    /// Node under the cursor
    pub fn current(&self) -> Option<NodeId> {
        self.rows().get(self.cursor).map(|(id, _)| *id)
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.rows().len();
        if len == 0 {
            self.cursor = 0;
            return;
        }
        let next = self.cursor as isize + delta;
        self.cursor = next.clamp(0, len as isize - 1) as usize;
    }

    fn clamp_cursor(&mut self) {
        let len = self.rows().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    /// Mark or unmark the row under the cursor; groups cannot be marked
    pub fn toggle_mark(&mut self) {
        let Some(id) = self.current() else {
            return;
        };
        if self.tree.node(id).map_or(true, |n| n.is_group()) {
            return;
        }
        if !self.marked.remove(&id) {
            self.marked.insert(id);
        }
    }

    fn row_ref(&self, id: NodeId) -> Option<RowRef> {
        let (layer_id, record) = self.tree.node(id)?.row()?;
        Some(RowRef {
            layer_id: layer_id.to_string(),
            id: record.id,
        })
    }

    /// Marked rows, or the row under the cursor when nothing is marked
    pub fn selected_rows(&self) -> Vec<RowRef> {
        if self.marked.is_empty() {
            return self.current().and_then(|id| self.row_ref(id)).into_iter().collect();
        }
        self.marked.iter().filter_map(|&id| self.row_ref(id)).collect()
    }

    /// Drag payload for the selected rows of a single layer
    pub fn drag_payload(&self) -> Option<DropPayload> {
        let rows = self.selected_rows();
        let layer = rows.first()?.layer_id.clone();
        let fids = rows
            .iter()
            .filter(|r| r.layer_id == layer)
            .map(|r| r.id)
            .collect();
        Some(DropPayload::new(layer, fids))
    }

    /// This column as a drop target: the cursor row plus the marked rows
    pub fn drop_target(&self) -> DropTarget {
        DropTarget {
            layer_id: self.layer_id().to_string(),
            row: self.current().and_then(|id| self.row_ref(id)),
            selection: self.marked.iter().filter_map(|&id| self.row_ref(id)).collect(),
        }
    }
}

fn label_for(columns: &[BoardColumn], layer_id: &str, record: &Record) -> String {
    columns
        .iter()
        .find(|c| c.layer_id() == layer_id)
        .map(|c| c.tree.labels.format(record))
        .unwrap_or_else(|| record.default_label())
}

/// Everything the explorer shows, owned in one place
pub struct ExplorerSession {
    host: Box<dyn Host>,
    snapshot: RelationsSnapshot,
    pub scene: GraphScene,
    pub engine: LayoutEngine,
    columns: Vec<BoardColumn>,
    search: String,
    max_count: usize,
    child_filter: bool,
    diagram_error: Option<String>,
}

impl ExplorerSession {
    /// Capture the host and lay out the first diagram
    pub fn new(host: Box<dyn Host>, engine: LayoutEngine, max_count: usize) -> Result<Self> {
        let mut session = Self {
            host,
            snapshot: RelationsSnapshot::default(),
            scene: GraphScene::new(),
            engine,
            columns: Vec::new(),
            search: String::new(),
            max_count,
            child_filter: false,
            diagram_error: None,
        };
        session.refresh()?;
        Ok(session)
    }

    pub fn host(&self) -> &dyn Host {
        &*self.host
    }

    pub fn snapshot(&self) -> &RelationsSnapshot {
        &self.snapshot
    }

    pub fn columns(&self) -> &[BoardColumn] {
        &self.columns
    }

    pub fn column_mut(&mut self, index: usize) -> Option<&mut BoardColumn> {
        self.columns.get_mut(index)
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn child_filter(&self) -> bool {
        self.child_filter
    }

    /// Why the diagram is empty, when the layout engine failed
    pub fn diagram_error(&self) -> Option<&str> {
        self.diagram_error.as_deref()
    }

    /// Re-read the relationship registry, then rebuild columns and diagram
    pub fn refresh(&mut self) -> Result<()> {
        self.snapshot = capture(&*self.host).context("Failed to read the relationships")?;
        let snapshot = &self.snapshot;
        self.columns.retain(|c| snapshot.layer(c.layer_id()).is_some());
        info!(
            layers = self.snapshot.layers.len(),
            relations = self.snapshot.edges.len(),
            "captured relationships"
        );
        self.rebuild_columns()?;
        self.refresh_diagram();
        Ok(())
    }

    /// Layers shown on the board
    pub fn displayed_layers(&self) -> HashSet<String> {
        self.columns.iter().map(|c| c.layer_id().to_string()).collect()
    }

    /// Layers the diagram is restricted to: search matches, else the board's
    /// layers; empty means the whole graph
    pub fn focus_ids(&self) -> HashSet<String> {
        let found = self.snapshot.search(&self.search);
        if found.is_empty() {
            self.displayed_layers()
        } else {
            found
        }
    }

    fn scene_meta(&self, selected_ids: HashSet<String>) -> SceneMeta {
        SceneMeta {
            selected_ids,
            link_ids: self.snapshot.link_table_ids(),
            edge_pairs: self.snapshot.edge_pairs_map(),
            labels: self.snapshot.labels(),
        }
    }

    /// Lay the snapshot out again and rebuild the scene
    pub fn refresh_diagram(&mut self) {
        let highlight = self.displayed_layers();
        let focus = self.focus_ids();
        let plain = self.engine.render_plain(&self.snapshot, &highlight, &focus);
        if plain.is_empty() {
            let mut text = "Could not build the diagram. Check Graphviz (the 'dot' binary).".to_string();
            if !self.engine.last_error().is_empty() {
                text.push_str("\n\nGraphviz details:\n");
                text.push_str(self.engine.last_error());
            }
            self.scene.clear();
            self.diagram_error = Some(text);
            return;
        }
        let meta = self.scene_meta(highlight);
        self.scene.set_graph(&plain, &meta);
        self.diagram_error = None;
    }

    pub fn set_search(&mut self, text: &str) {
        if self.search != text {
            self.search = text.to_string();
            self.refresh_diagram();
        }
    }

    fn tree_options(&self) -> TreeOptions {
        TreeOptions {
            max_count: self.max_count,
            child_filter: self.child_filter,
            displayed_layers: self.displayed_layers(),
        }
    }

    fn rebuild_column(host: &dyn Host, snapshot: &RelationsSnapshot, options: &TreeOptions, column: &mut BoardColumn) -> Result<()> {
        let layer_id = column.layer_id().to_string();
        column
            .tree
            .rebuild(host, snapshot, options)
            .with_context(|| format!("Failed to read rows of {}", snapshot.layer_name(&layer_id)))?;
        column.total = host.feature_count(&layer_id).unwrap_or(0);
        column.marked.clear();
        column.clamp_cursor();
        Ok(())
    }

    /// Re-read the rows of every column, keeping expanded groups open
    pub fn rebuild_columns(&mut self) -> Result<()> {
        let options = self.tree_options();
        for column in &mut self.columns {
            Self::rebuild_column(&*self.host, &self.snapshot, &options, column)?;
        }
        Ok(())
    }

    /// Rebuild after an edit; failures only get logged
    fn reload_rows(&mut self) {
        if let Err(e) = self.rebuild_columns() {
            warn!(error = %e, "reloading board rows failed");
        }
    }

    /// Open a column for `layer_id`; returns its index
    pub fn add_column(&mut self, layer_id: &str) -> Result<usize> {
        if self.snapshot.layer(layer_id).is_none() {
            return Err(anyhow!("Unknown layer: {}", layer_id));
        }
        let instance = self.columns.iter().filter(|c| c.layer_id() == layer_id).count() + 1;
        self.columns.push(BoardColumn::new(layer_id, instance));
        // the child filter depends on the set of displayed layers
        self.rebuild_columns()?;
        self.refresh_diagram();
        info!(layer = layer_id, instance, "added board column");
        Ok(self.columns.len() - 1)
    }

    pub fn remove_column(&mut self, index: usize) -> Result<()> {
        if index >= self.columns.len() {
            return Ok(());
        }
        self.columns.remove(index);
        self.rebuild_columns()?;
        self.refresh_diagram();
        Ok(())
    }

    pub fn set_max_count(&mut self, max_count: usize) -> Result<()> {
        self.max_count = max_count;
        self.rebuild_columns()
    }

    pub fn set_child_filter(&mut self, on: bool) -> Result<()> {
        self.child_filter = on;
        self.rebuild_columns()
    }

    /// Expand or collapse the group under the cursor
    pub fn toggle_current(&mut self, index: usize) {
        let Some(column) = self.columns.get_mut(index) else {
            return;
        };
        if let Some(id) = column.current() {
            column.tree.toggle(&*self.host, &self.snapshot, id);
        }
        column.clamp_cursor();
    }

    pub fn expand_all(&mut self, index: usize) {
        if let Some(column) = self.columns.get_mut(index) {
            column.tree.expand_all();
        }
    }

    pub fn collapse_all(&mut self, index: usize) {
        if let Some(column) = self.columns.get_mut(index) {
            column.tree.collapse_all();
            column.clamp_cursor();
        }
    }

    pub fn set_column_filter(&mut self, index: usize, text: &str) {
        if let Some(column) = self.columns.get_mut(index) {
            column.tree.set_filter(text);
            column.cursor = 0;
            column.marked.clear();
        }
    }

    /// Change how a column labels its own rows
    pub fn set_display(&mut self, index: usize, display: DisplayField) -> Result<()> {
        let Some(column) = self.columns.get_mut(index) else {
            return Ok(());
        };
        column.tree.labels.display = display;
        let options = self.tree_options();
        if let Some(column) = self.columns.get_mut(index) {
            Self::rebuild_column(&*self.host, &self.snapshot, &options, column)?;
        }
        Ok(())
    }

    /// Change how a column labels rows of a related layer
    pub fn set_child_display(&mut self, index: usize, layer_id: &str, display: DisplayField) -> Result<bool> {
        let fields = self.host.fields(layer_id)?;
        let Some(column) = self.columns.get_mut(index) else {
            return Ok(false);
        };
        if !column.tree.labels.set_child_display(layer_id, &fields, display) {
            return Ok(false);
        }
        let options = self.tree_options();
        if let Some(column) = self.columns.get_mut(index) {
            Self::rebuild_column(&*self.host, &self.snapshot, &options, column)?;
        }
        Ok(true)
    }

    /// Row label as a column showing `layer_id` would render it
    pub fn label_for(&self, layer_id: &str, record: &Record) -> String {
        label_for(&self.columns, layer_id, record)
    }

    fn edit<R>(&mut self, prompter: &mut dyn Prompter, run: impl FnOnce(&mut EditContext<'_>) -> R) -> R {
        let columns = &self.columns;
        let labels = |layer_id: &str, record: &Record| label_for(columns, layer_id, record);
        let mut ctx = EditContext {
            host: &mut *self.host,
            snapshot: &self.snapshot,
            prompter,
            labels: &labels,
        };
        run(&mut ctx)
    }

    /// Drop the selected rows of column `from` onto column `to`
    pub fn drop_rows(&mut self, prompter: &mut dyn Prompter, from: usize, to: usize) -> DropOutcome {
        let payload = self
            .columns
            .get(from)
            .and_then(BoardColumn::drag_payload)
            .and_then(|p| p.to_json().ok());
        let Some(payload) = payload else {
            prompter.notify(NoticeLevel::Warning, "Select the rows to drag first.");
            return DropOutcome::Rejected("nothing to drag".to_string());
        };
        let Some(target) = self.columns.get(to).map(BoardColumn::drop_target) else {
            return DropOutcome::Rejected("no target column".to_string());
        };
        self.handle_drop(prompter, &payload, &target)
    }

    /// Apply a drop payload and reload the rows it touched
    pub fn handle_drop(&mut self, prompter: &mut dyn Prompter, payload: &str, target: &DropTarget) -> DropOutcome {
        let outcome = self.edit(prompter, |ctx| ctx.handle_drop(payload, target));
        if !matches!(outcome, DropOutcome::Rejected(_) | DropOutcome::Cancelled) {
            self.reload_rows();
        }
        outcome
    }

    /// Detach the related row under the cursor of a column
    pub fn detach_current(&mut self, prompter: &mut dyn Prompter, index: usize) -> DetachOutcome {
        let child = self
            .columns
            .get(index)
            .and_then(|c| c.current().and_then(|id| c.tree.node(id)))
            .and_then(|node| match &node.kind {
                NodeKind::ChildRecord {
                    layer_id,
                    relation_id,
                    record,
                } => Some((layer_id.clone(), relation_id.clone(), record.id)),
                _ => None,
            });
        let Some((layer_id, relation_id, record_id)) = child else {
            let message = "Select a related row to detach.";
            prompter.notify(NoticeLevel::Warning, message);
            return DetachOutcome::Rejected(message.to_string());
        };

        let outcome = self.edit(prompter, |ctx| ctx.detach(&layer_id, &relation_id, record_id));
        if matches!(outcome, DetachOutcome::Done { .. }) {
            self.reload_rows();
        }
        outcome
    }

    fn column_layer(&self, index: usize) -> Option<String> {
        self.columns.get(index).map(|c| c.layer_id().to_string())
    }

    pub fn commit_column(&mut self, prompter: &mut dyn Prompter, index: usize) -> bool {
        let Some(layer_id) = self.column_layer(index) else {
            return false;
        };
        let done = self.edit(prompter, |ctx| ctx.commit_layer(&layer_id));
        self.reload_rows();
        done
    }

    pub fn rollback_column(&mut self, prompter: &mut dyn Prompter, index: usize) -> bool {
        let Some(layer_id) = self.column_layer(index) else {
            return false;
        };
        let done = self.edit(prompter, |ctx| ctx.rollback_layer(&layer_id));
        self.reload_rows();
        done
    }

    pub fn toggle_editing(&mut self, prompter: &mut dyn Prompter, index: usize) -> bool {
        let Some(layer_id) = self.column_layer(index) else {
            return false;
        };
        let done = self.edit(prompter, |ctx| ctx.toggle_editing(&layer_id));
        self.reload_rows();
        done
    }

    /// Resolve a layer given by id or by name (case-insensitive)
    pub fn resolve_layer(&self, name: &str) -> Option<String> {
        if self.snapshot.layer(name).is_some() {
            return Some(name.to_string());
        }
        self.snapshot
            .layers
            .values()
            .find(|l| l.name.eq_ignore_ascii_case(name))
            .map(|l| l.id.clone())
    }

    /// Write one export. The JSON report starts at `root_layer`, or at the
    /// first board column when none is given.
    pub fn export(&mut self, format: ExportFormat, output_path: &Path, root_layer: Option<&str>) -> Result<()> {
        match format {
            ExportFormat::Svg => {
                let highlight = self.displayed_layers();
                write_svg(&mut self.engine, &self.snapshot, &highlight, &highlight, output_path)
            }
            ExportFormat::Drawio => {
                let positions = (!self.scene.is_empty()).then(|| self.scene.node_positions());
                export_drawio(&self.snapshot, positions.as_ref(), output_path)
            }
            ExportFormat::Csv => export_relations_csv(&self.snapshot, output_path),
            ExportFormat::Json => {
                let root = match root_layer {
                    Some(name) => self
                        .resolve_layer(name)
                        .ok_or_else(|| anyhow!("Unknown layer: {}", name))?,
                    None => self
                        .column_layer(0)
                        .ok_or_else(|| anyhow!("The JSON report needs a root layer"))?,
                };
                let limit = (self.max_count > 0).then_some(self.max_count);
                export_report(&*self.host, &self.snapshot, &root, limit, REPORT_DEPTH, output_path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::fixtures::{self, JUNCTION, PARENT_CHILD};
    use crate::types::{RecordId, Value};
    use pretty_assertions::assert_eq;

    /// Says yes to everything
    struct Agree {
        notices: Vec<String>,
    }

    impl Prompter for Agree {
        fn confirm_changes(&mut self, _title: &str, _lines: &[String]) -> bool {
            true
        }
        fn ask_yes_no(&mut self, _title: &str, _question: &str) -> bool {
            true
        }
        fn choose(&mut self, _title: &str, _prompt: &str, _options: &[String]) -> Option<usize> {
            Some(0)
        }
        fn open_record_form(&mut self, _layer_name: &str, _record: &Record) {}
        fn notify(&mut self, _level: NoticeLevel, message: &str) {
            self.notices.push(message.to_string());
        }
    }

    fn session(sql: &str) -> (ExplorerSession, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let engine = LayoutEngine::new(Some(dir.path().join("missing-dot")));
        let session = ExplorerSession::new(Box::new(fixtures::host(sql)), engine, 0).unwrap();
        (session, dir)
    }

    fn cursor_to(session: &mut ExplorerSession, index: usize, label: &str) {
        let column = session.column_mut(index).unwrap();
        let pos = column
            .rows()
            .iter()
            .position(|(id, _)| column.tree.node(*id).unwrap().label == label)
            .unwrap();
        column.cursor = pos;
    }

    #[test]
    fn missing_engine_reports_a_diagram_error() {
        let (session, _dir) = session(PARENT_CHILD);
        let error = session.diagram_error().unwrap();
        assert!(error.contains("Graphviz"));
        assert!(error.contains("missing-dot"));
        assert!(session.scene.is_empty());
        assert_eq!(session.snapshot().edges.len(), 1);
    }

    #[test]
    fn columns_number_their_instances() {
        let (mut session, _dir) = session(PARENT_CHILD);
        session.add_column("parent").unwrap();
        session.add_column("parent").unwrap();
        let titles: Vec<String> = session
            .columns()
            .iter()
            .map(|c| c.title(session.snapshot()))
            .collect();
        assert_eq!(titles, vec!["parent #1 (shows 2 / 2)", "parent #2 (shows 2 / 2)"]);
        assert!(session.add_column("nope").is_err());
    }

    #[test]
    fn focus_prefers_search_matches() {
        let (mut session, _dir) = session(PARENT_CHILD);
        assert!(session.focus_ids().is_empty());

        session.add_column("child").unwrap();
        assert_eq!(session.focus_ids(), HashSet::from(["child".to_string()]));

        session.set_search("PAR");
        assert_eq!(session.focus_ids(), HashSet::from(["parent".to_string()]));

        session.set_search("zzz");
        assert_eq!(session.focus_ids(), HashSet::from(["child".to_string()]));
    }

    #[test]
    fn dropping_between_columns_writes_and_reloads() {
        let (mut session, _dir) = session(PARENT_CHILD);
        session.add_column("parent").unwrap();
        session.add_column("child").unwrap();
        cursor_to(&mut session, 0, "6");
        cursor_to(&mut session, 1, "1");

        let mut prompter = Agree { notices: Vec::new() };
        let outcome = session.drop_rows(&mut prompter, 0, 1);
        assert!(matches!(outcome, DropOutcome::LinkedTarget { .. }));

        let child = session.host().record("child", RecordId(1)).unwrap().unwrap();
        assert_eq!(child.get("parent_id"), Some(&Value::Integer(6)));
        assert!(session.host().is_modified("child"));

        assert!(session.commit_column(&mut prompter, 1));
        assert!(!session.host().is_modified("child"));
    }

    #[test]
    fn detach_needs_a_related_row() {
        let (mut session, _dir) = session(PARENT_CHILD);
        session.add_column("parent").unwrap();
        let mut prompter = Agree { notices: Vec::new() };

        assert!(matches!(
            session.detach_current(&mut prompter, 0),
            DetachOutcome::Rejected(_)
        ));

        // open row 5 -> child group, then pick its first child
        cursor_to(&mut session, 0, "5");
        session.toggle_current(0);
        session.column_mut(0).unwrap().move_cursor(1);
        session.toggle_current(0);
        session.column_mut(0).unwrap().move_cursor(1);

        let outcome = session.detach_current(&mut prompter, 0);
        assert!(matches!(outcome, DetachOutcome::Done { committed: true, .. }));
        let child = session.host().record("child", RecordId(2)).unwrap().unwrap();
        assert_eq!(child.get("parent_id"), Some(&Value::Null));
    }

    #[test]
    fn junction_drop_through_the_board() {
        let (mut session, _dir) = session(JUNCTION);
        session.add_column("a").unwrap();
        session.add_column("b").unwrap();
        cursor_to(&mut session, 0, "2");
        cursor_to(&mut session, 1, "20");

        let mut prompter = Agree { notices: Vec::new() };
        let outcome = session.drop_rows(&mut prompter, 0, 1);
        assert!(matches!(outcome, DropOutcome::JunctionRows { ref created, .. } if created.len() == 1));
        assert_eq!(session.host().records("l", None).unwrap().len(), 2);
    }

    #[test]
    fn exports_write_files() {
        let (mut session, dir) = session(PARENT_CHILD);

        let csv = dir.path().join("relations.csv");
        session.export(ExportFormat::Csv, &csv, None).unwrap();
        assert!(std::fs::read_to_string(&csv).unwrap().contains("parent_id"));

        let drawio = dir.path().join("model.drawio");
        session.export(ExportFormat::Drawio, &drawio, None).unwrap();
        assert!(std::fs::read_to_string(&drawio).unwrap().starts_with("<mxfile"));

        let json = dir.path().join("report.json");
        assert!(session.export(ExportFormat::Json, &json, None).is_err());
        session.export(ExportFormat::Json, &json, Some("PARENT")).unwrap();
        assert!(json.exists());

        let svg = dir.path().join("graph.svg");
        assert!(session.export(ExportFormat::Svg, &svg, None).is_err());
    }
}
