use super::labels::LabelFormat;
use crate::host::{Host, HostResult};
use crate::relations::children_for_relation;
use crate::types::{Record, RecordId, RelationsSnapshot};
use std::collections::HashSet;
use tracing::debug;

pub type NodeId = usize;

/// Whether a relation group has fetched its child rows yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    Unexpanded,
    Expanded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    TopRecord {
        layer_id: String,
        record: Record,
    },
    RelationGroup {
        child_layer_id: String,
        relation_id: String,
        parent: Record,
        expansion: Expansion,
    },
    ChildRecord {
        layer_id: String,
        relation_id: String,
        record: Record,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub label: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Shown expanded in the view
    pub open: bool,
}

impl TreeNode {
    /// Layer and record of a row node
    pub fn row(&self) -> Option<(&str, &Record)> {
        match &self.kind {
            NodeKind::TopRecord { layer_id, record } | NodeKind::ChildRecord { layer_id, record, .. } => {
                Some((layer_id.as_str(), record))
            }
            NodeKind::RelationGroup { .. } => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::RelationGroup { .. })
    }
}

/// Identity of a node that survives rebuilds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Top(RecordId),
    Group(String, RecordId),
    Child(String, RecordId, String, RecordId),
}

#[derive(Debug, Clone, Default)]
pub struct TreeOptions {
    /// Top-level row limit, 0 for none
    pub max_count: usize,
    /// Only show groups whose child layer is in `displayed_layers`
    pub child_filter: bool,
    pub displayed_layers: HashSet<String>,
}

/// Rows of one layer with lazily loaded related rows below them
#[derive(Debug, Clone)]
pub struct RelationTree {
    layer_id: String,
    pub labels: LabelFormat,
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
    open_keys: HashSet<NodeKey>,
    filter: String,
}

impl RelationTree {
    pub fn new(layer_id: impl Into<String>) -> Self {
        Self {
            layer_id: layer_id.into(),
            labels: LabelFormat::default(),
            nodes: Vec::new(),
            roots: Vec::new(),
            open_keys: HashSet::new(),
            filter: String::new(),
        }
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of top-level rows loaded
    pub fn shown(&self) -> usize {
        self.roots.len()
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn set_filter(&mut self, text: &str) {
        self.filter = text.to_string();
    }

    fn key(&self, id: NodeId) -> Option<NodeKey> {
        let node = self.nodes.get(id)?;
        Some(match &node.kind {
            NodeKind::TopRecord { record, .. } => NodeKey::Top(record.id),
            NodeKind::RelationGroup {
                relation_id,
                parent,
                ..
            } => NodeKey::Group(relation_id.clone(), parent.id),
            NodeKind::ChildRecord {
                layer_id,
                relation_id,
                record,
            } => {
                let group = node.parent.and_then(|g| self.nodes.get(g));
                let top = match group.map(|g| &g.kind) {
                    Some(NodeKind::RelationGroup { parent, .. }) => parent.id,
                    _ => RecordId(0),
                };
                NodeKey::Child(layer_id.clone(), record.id, relation_id.clone(), top)
            }
        })
    }

    fn push(&mut self, label: String, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            label,
            kind,
            parent,
            children: Vec::new(),
            open: false,
        });
        match parent {
            Some(p) => self.nodes[p].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Reload the top rows and their relation groups, then reopen whatever
    /// was open before
    pub fn rebuild(&mut self, host: &dyn Host, snapshot: &RelationsSnapshot, options: &TreeOptions) -> HostResult<()> {
        self.nodes.clear();
        self.roots.clear();

        let layer_id = self.layer_id.clone();
        let limit = (options.max_count > 0).then_some(options.max_count);
        let records = host.records(&layer_id, limit)?;

        for record in records {
            let label = self.row_label(&layer_id, &record);
            let top = self.push(
                label,
                NodeKind::TopRecord {
                    layer_id: layer_id.clone(),
                    record: record.clone(),
                },
                None,
            );

            for edge in snapshot.outgoing(&layer_id) {
                if options.child_filter && !options.displayed_layers.contains(&edge.child_layer_id) {
                    continue;
                }
                self.push(
                    format!("→ {}", snapshot.layer_name(&edge.child_layer_id)),
                    NodeKind::RelationGroup {
                        child_layer_id: edge.child_layer_id.clone(),
                        relation_id: edge.id.clone(),
                        parent: record.clone(),
                        expansion: Expansion::Unexpanded,
                    },
                    Some(top),
                );
            }
        }

        self.restore_open_state(host, snapshot);
        debug!(layer = %self.layer_id, rows = self.roots.len(), "relation tree rebuilt");
        Ok(())
    }

    fn restore_open_state(&mut self, host: &dyn Host, snapshot: &RelationsSnapshot) {
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let reopen = self.key(id).map(|k| self.open_keys.contains(&k)).unwrap_or(false);
            if reopen {
                self.load_group(host, snapshot, id);
                self.nodes[id].open = true;
            }
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
    }

    fn row_label(&self, layer_id: &str, record: &Record) -> String {
        let label = self.labels.format_for_layer(layer_id, record);
        if label.is_empty() {
            record.id.to_string()
        } else {
            label
        }
    }

    /// Fetch the child rows of a group the first time it is expanded
    fn load_group(&mut self, host: &dyn Host, snapshot: &RelationsSnapshot, id: NodeId) {
        let (child_layer_id, relation_id, parent) = match &self.nodes[id].kind {
            NodeKind::RelationGroup {
                expansion: Expansion::Unexpanded,
                child_layer_id,
                relation_id,
                parent,
            } => (child_layer_id.clone(), relation_id.clone(), parent.clone()),
            _ => return,
        };

        if let Some(edge) = snapshot.edge(&relation_id) {
            for child in children_for_relation(host, &parent, edge) {
                let label = self.row_label(&child_layer_id, &child);
                self.push(
                    label,
                    NodeKind::ChildRecord {
                        layer_id: child_layer_id.clone(),
                        relation_id: relation_id.clone(),
                        record: child,
                    },
                    Some(id),
                );
            }
        }

        if let NodeKind::RelationGroup { expansion, .. } = &mut self.nodes[id].kind {
            *expansion = Expansion::Expanded;
        }
    }

    pub fn expand(&mut self, host: &dyn Host, snapshot: &RelationsSnapshot, id: NodeId) {
        if id >= self.nodes.len() {
            return;
        }
        self.load_group(host, snapshot, id);
        self.nodes[id].open = true;
        if let Some(k) = self.key(id) {
            self.open_keys.insert(k);
        }
    }

    pub fn collapse(&mut self, id: NodeId) {
        if id >= self.nodes.len() {
            return;
        }
        self.nodes[id].open = false;
        if let Some(k) = self.key(id) {
            self.open_keys.remove(&k);
        }
    }

    pub fn toggle(&mut self, host: &dyn Host, snapshot: &RelationsSnapshot, id: NodeId) {
        match self.nodes.get(id) {
            Some(node) if node.open => self.collapse(id),
            Some(_) => self.expand(host, snapshot, id),
            None => {}
        }
    }

    pub fn collapse_all(&mut self) {
        for node in &mut self.nodes {
            node.open = false;
        }
        self.open_keys.clear();
    }

    /// Open every top row and every group that already holds its rows
    pub fn expand_all(&mut self) {
        for id in 0..self.nodes.len() {
            let expandable = match &self.nodes[id].kind {
                NodeKind::TopRecord { .. } => true,
                NodeKind::RelationGroup { expansion, .. } => *expansion == Expansion::Expanded,
                NodeKind::ChildRecord { .. } => false,
            };
            if expandable {
                self.nodes[id].open = true;
                if let Some(k) = self.key(id) {
                    self.open_keys.insert(k);
                }
            }
        }
    }

    fn matches_filter(&self, top: NodeId) -> bool {
        if self.filter.is_empty() {
            return true;
        }
        self.nodes[top]
            .label
            .to_lowercase()
            .contains(&self.filter.to_lowercase())
    }

    /// Nodes as displayed, depth first, with their depth
    pub fn visible_rows(&self) -> Vec<(NodeId, usize)> {
        let mut out = Vec::new();
        for &root in &self.roots {
            if !self.matches_filter(root) {
                continue;
            }
            let mut stack = vec![(root, 0)];
            while let Some((id, depth)) = stack.pop() {
                out.push((id, depth));
                let node = &self.nodes[id];
                if node.open {
                    stack.extend(node.children.iter().rev().map(|&c| (c, depth + 1)));
                }
            }
        }
        out
    }

    /// Open every node, loading all groups, and render the rows as
    /// indented text
    pub fn outline(&mut self, host: &dyn Host, snapshot: &RelationsSnapshot) -> Vec<String> {
        // groups only gain children, so one pass over the original ids is enough
        for id in 0..self.nodes.len() {
            if !matches!(self.nodes[id].kind, NodeKind::ChildRecord { .. }) {
                self.expand(host, snapshot, id);
            }
        }
        self.visible_rows()
            .into_iter()
            .map(|(id, depth)| format!("{}{}", "  ".repeat(depth), self.nodes[id].label))
            .collect()
    }

    /// `Name #k (shows n / total)`
    pub fn title(&self, snapshot: &RelationsSnapshot, instance: usize, total: u64) -> String {
        format!(
            "{} #{} (shows {} / {})",
            snapshot.layer_name(&self.layer_id),
            instance,
            self.shown(),
            total
        )
    }
}
