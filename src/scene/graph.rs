use super::geometry::{anchor_towards, arrowhead, Cubic, Point, Rect};
use crate::layout::parse_plain;
use crate::types::snapshot::EdgePairsMap;
use crate::types::FieldPair;
use std::collections::{HashMap, HashSet};

/// Lateral separation between bidirectional and parallel edges
const EDGE_OFFSET: f64 = 18.0;
const SELF_LOOP_BULGE: f64 = 40.0;
const MIN_NODE_WIDTH: f64 = 80.0;
const MIN_NODE_HEIGHT: f64 = 36.0;
/// Fixed label metrics standing in for a font
const CHAR_ADVANCE: f64 = 7.0;
const LINE_HEIGHT: f64 = 16.0;
const FIT_MARGIN: f64 = 60.0;
const ZOOM_STEP: f64 = 1.15;

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub id: String,
    pub label: String,
    pub center: Point,
    pub width: f64,
    pub height: f64,
    pub is_link: bool,
    pub selected: bool,
}

impl SceneNode {
    fn new(id: String, label: String, center: Point, layout_w: f64, layout_h: f64) -> Self {
        let text_w = label.chars().count() as f64 * CHAR_ADVANCE + 16.0;
        let text_h = LINE_HEIGHT + 12.0;
        Self {
            width: layout_w.max(text_w).max(MIN_NODE_WIDTH),
            height: layout_h.max(text_h).max(MIN_NODE_HEIGHT),
            id,
            label,
            center,
            is_link: false,
            selected: false,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::centered(self.center, self.width, self.height)
    }

    pub fn top_left(&self) -> Point {
        let r = self.rect();
        Point::new(r.x, r.y)
    }

    fn anchor_towards(&self, other: Point) -> Point {
        anchor_towards(self.center, self.width / 2.0, self.height / 2.0, other)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneEdge {
    pub tail: String,
    pub head: String,
    pub offset: f64,
    pub pairs: Vec<FieldPair>,
    pub highlight: bool,
    pub curve: Cubic,
    pub arrow: [Point; 3],
}

/// Presentation data handed to [`GraphScene::set_graph`]
#[derive(Debug, Clone, Default)]
pub struct SceneMeta {
    pub selected_ids: HashSet<String>,
    pub link_ids: HashSet<String>,
    pub edge_pairs: EdgePairsMap,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    NodeActivated(String),
}

/// Maps scene coordinates onto a view of `width` × `height` units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Scene point shown at the middle of the view
    pub center: Point,
    pub scale: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: Point::default(),
            scale: 1.0,
            width: 0.0,
            height: 0.0,
        }
    }
}

impl Viewport {
    pub fn view_to_scene(&self, p: Point) -> Point {
        Point::new(
            self.center.x + (p.x - self.width / 2.0) / self.scale,
            self.center.y + (p.y - self.height / 2.0) / self.scale,
        )
    }

    pub fn scene_to_view(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.center.x) * self.scale + self.width / 2.0,
            (p.y - self.center.y) * self.scale + self.height / 2.0,
        )
    }

    /// The scene rectangle currently visible
    pub fn visible(&self) -> Rect {
        Rect::centered(self.center, self.width / self.scale, self.height / self.scale)
    }
}

fn route(src: &SceneNode, dst: &SceneNode, offset: f64) -> Cubic {
    if src.id == dst.id {
        let (c, w, h) = (src.center, src.width, src.height);
        return Cubic {
            start: Point::new(c.x + w / 2.0, c.y),
            c1: Point::new(c.x + w / 2.0 + SELF_LOOP_BULGE, c.y - h / 2.0 - SELF_LOOP_BULGE),
            c2: Point::new(c.x - w / 2.0 - SELF_LOOP_BULGE, c.y - h / 2.0 - SELF_LOOP_BULGE),
            end: Point::new(c.x - w / 2.0, c.y),
        };
    }

    let a = src.anchor_towards(dst.center);
    let b = dst.anchor_towards(src.center);
    let mid = Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
    let (c1, c2) = if (b.x - a.x).abs() >= (b.y - a.y).abs() {
        (Point::new(mid.x, a.y - offset), Point::new(mid.x, b.y + offset))
    } else {
        (Point::new(a.x + offset, mid.y), Point::new(b.x - offset, mid.y))
    };
    Cubic {
        start: a,
        c1,
        c2,
        end: b,
    }
}

/// The interactive diagram: laid-out nodes, routed edges, viewport
#[derive(Debug, Clone, Default)]
pub struct GraphScene {
    nodes: Vec<SceneNode>,
    edges: Vec<SceneEdge>,
    viewport: Viewport,
    events: Vec<SceneEvent>,
}

impl GraphScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[SceneEdge] {
        &self.edges
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&SceneNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    /// Rebuild from `dot -Tplain` output, then fit the view
    pub fn set_graph(&mut self, plain_text: &str, meta: &SceneMeta) {
        self.clear();
        let layout = parse_plain(plain_text);

        for raw in layout.nodes {
            let label = meta
                .labels
                .get(&raw.id)
                .cloned()
                .unwrap_or_else(|| raw.id.clone());
            let mut node = SceneNode::new(
                raw.id,
                label,
                Point::new(raw.x, raw.y),
                raw.width,
                raw.height,
            );
            node.is_link = meta.link_ids.contains(&node.id);
            node.selected = meta.selected_ids.contains(&node.id);
            match self.nodes.iter_mut().find(|n| n.id == node.id) {
                Some(existing) => *existing = node,
                None => self.nodes.push(node),
            }
        }

        let raw_edges: Vec<(String, String)> = layout
            .edges
            .into_iter()
            .map(|e| (e.tail, e.head))
            .collect();
        let directed: HashSet<(&str, &str)> = raw_edges
            .iter()
            .map(|(t, h)| (t.as_str(), h.as_str()))
            .collect();
        let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
        for (t, h) in &raw_edges {
            *counts.entry((t.as_str(), h.as_str())).or_default() += 1;
        }

        let mut seen: HashMap<(&str, &str), usize> = HashMap::new();
        let mut edges = Vec::new();
        for (tail, head) in &raw_edges {
            let (Some(src), Some(dst)) = (self.node(tail), self.node(head)) else {
                continue;
            };
            let key = (tail.as_str(), head.as_str());
            let occurrence = *seen.get(&key).unwrap_or(&0);
            seen.insert(key, occurrence + 1);
            let n = counts[&key];

            let mut offset = 0.0;
            if tail != head && directed.contains(&(head.as_str(), tail.as_str())) {
                offset = if tail < head { EDGE_OFFSET } else { -EDGE_OFFSET };
            }
            if n > 1 && tail != head {
                offset += (occurrence as f64 - (n - 1) as f64 / 2.0) * EDGE_OFFSET;
            }

            let pairs = meta
                .edge_pairs
                .get(&(tail.clone(), head.clone()))
                .and_then(|lists| lists.get(occurrence).or_else(|| lists.last()))
                .cloned()
                .unwrap_or_default();

            let curve = route(src, dst, offset);
            edges.push(SceneEdge {
                tail: tail.clone(),
                head: head.clone(),
                offset,
                pairs,
                highlight: meta.selected_ids.contains(tail) || meta.selected_ids.contains(head),
                arrow: arrowhead(&curve),
                curve,
            });
        }
        self.edges = edges;

        if self.viewport.width > 0.0 && self.viewport.height > 0.0 {
            self.fit_view(self.viewport.width, self.viewport.height);
        }
    }

    /// Bounding box of every node and edge curve
    pub fn bounds(&self) -> Option<Rect> {
        let mut rects = self
            .nodes
            .iter()
            .map(SceneNode::rect)
            .chain(self.edges.iter().map(|e| e.curve.bounds()));
        let first = rects.next()?;
        Some(rects.fold(first, |acc, r| acc.union(&r)))
    }

    /// Show the whole graph plus a margin in a view of the given size
    pub fn fit_view(&mut self, width: f64, height: f64) {
        self.viewport.width = width;
        self.viewport.height = height;
        let Some(bounds) = self.bounds() else {
            return;
        };
        let rect = bounds.expanded(FIT_MARGIN);
        self.viewport.center = rect.center();
        if width > 0.0 && height > 0.0 {
            self.viewport.scale = (width / rect.width).min(height / rect.height);
        }
    }

    /// Resize the view without changing what sits at its middle
    pub fn resize_view(&mut self, width: f64, height: f64) {
        self.viewport.width = width;
        self.viewport.height = height;
    }

    /// Scroll by a distance given in view units
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.viewport.center.x -= dx / self.viewport.scale;
        self.viewport.center.y -= dy / self.viewport.scale;
    }

    pub fn zoom(&mut self, factor: f64) {
        if factor > 0.0 {
            self.viewport.scale = (self.viewport.scale * factor).clamp(0.01, 100.0);
        }
    }

    /// One wheel notch: positive zooms in
    pub fn wheel(&mut self, delta: i32) {
        match delta.signum() {
            1 => self.zoom(ZOOM_STEP),
            -1 => self.zoom(1.0 / ZOOM_STEP),
            _ => {}
        }
    }

    pub fn view_to_scene(&self, p: Point) -> Point {
        self.viewport.view_to_scene(p)
    }

    pub fn scene_to_view(&self, p: Point) -> Point {
        self.viewport.scene_to_view(p)
    }

    /// Topmost node under a scene point
    pub fn node_at(&self, p: Point) -> Option<&SceneNode> {
        self.nodes.iter().rev().find(|n| n.rect().contains(p))
    }

    pub fn node_at_view(&self, p: Point) -> Option<&SceneNode> {
        self.node_at(self.view_to_scene(p))
    }

    /// Activate the node under a view point, if any
    pub fn double_click(&mut self, p: Point) -> Option<String> {
        let id = self.node_at_view(p)?.id.clone();
        self.events.push(SceneEvent::NodeActivated(id.clone()));
        Some(id)
    }

    pub fn take_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    /// Move a node's centre and re-route its edges
    pub fn move_node(&mut self, id: &str, center: Point) -> bool {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        node.center = center;

        let nodes = &self.nodes;
        for edge in self.edges.iter_mut().filter(|e| e.tail == id || e.head == id) {
            let src = nodes.iter().find(|n| n.id == edge.tail);
            let dst = nodes.iter().find(|n| n.id == edge.head);
            if let (Some(src), Some(dst)) = (src, dst) {
                edge.curve = route(src, dst, edge.offset);
                edge.arrow = arrowhead(&edge.curve);
            }
        }
        true
    }

    /// Top-left corner of every node, keyed by id
    pub fn node_positions(&self) -> HashMap<String, Point> {
        self.nodes
            .iter()
            .map(|n| (n.id.clone(), n.top_left()))
            .collect()
    }

    fn edge_labels(&self, edge: &SceneEdge) -> (String, String) {
        let label = |id: &str| {
            self.node(id)
                .map(|n| n.label.clone())
                .unwrap_or_else(|| id.to_string())
        };
        (label(&edge.tail), label(&edge.head))
    }

    /// `Src.pk → Dst.fk` per pair, or `Src → Dst` without field details
    pub fn edge_tooltip(&self, index: usize) -> Option<String> {
        let edge = self.edges.get(index)?;
        let (src, dst) = self.edge_labels(edge);
        if edge.pairs.is_empty() {
            return Some(format!("{} → {}", src, dst));
        }
        Some(pair_lines(&src, &dst, &edge.pairs).join("\n"))
    }

    /// Entries of the edge context menu
    pub fn edge_context_lines(&self, index: usize) -> Vec<String> {
        let Some(edge) = self.edges.get(index) else {
            return Vec::new();
        };
        if edge.pairs.is_empty() {
            return vec!["No field details available".to_string()];
        }
        let (src, dst) = self.edge_labels(edge);
        pair_lines(&src, &dst, &edge.pairs)
    }

    /// Index of the edge whose curve passes within `tolerance` of a scene point
    pub fn edge_at(&self, p: Point, tolerance: f64) -> Option<usize> {
        self.edges.iter().position(|e| {
            e.curve
                .sample(24)
                .iter()
                .any(|q| q.distance(p) <= tolerance)
        })
    }
}

fn pair_lines(src: &str, dst: &str, pairs: &[FieldPair]) -> Vec<String> {
    pairs
        .iter()
        .map(|p| {
            if p.child_field.is_empty() {
                format!("{}.{}", src, p.parent_field)
            } else {
                format!("{}.{} → {}.{}", src, p.parent_field, dst, p.child_field)
            }
        })
        .collect()
}
