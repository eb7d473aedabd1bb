use super::write_file;
use crate::scene::Point;
use crate::types::{LayerNode, RelationsSnapshot};
use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

const HEADER_HEIGHT: u32 = 28;
const ROW_HEIGHT: u32 = 22;
const TAG_WIDTH: u32 = 56;
const BOX_WIDTH: u32 = 280;

const GRID_ORIGIN: (f64, f64) = (40.0, 40.0);
const GRID_PITCH: (f64, f64) = (300.0, 170.0);
const GRID_COLUMNS: usize = 4;

const BORDER: &str = "#424242";
const GRID_LINE: &str = "#BDBDBD";
const HEADER_BG: &str = "#FFFFFF";
const LINK_HEADER_BG: &str = "#FFE0B2";
const TEXT: &str = "#111111";
const BODY_BG: &str = "#FFFFFF";
const EDGE_STYLE: &str = "edgeStyle=orthogonalEdgeStyle;endArrow=block;endFill=1;\
strokeColor=#616161;rounded=0;orthogonalLoop=1;jettySize=auto;html=1;\
labelBackgroundColor=#FFFFFF;fontSize=11;";

/// Escape for HTML label text
fn esc(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape for a double-quoted XML attribute
fn attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\n', "&#xa;")
}

fn grid_position(index: usize) -> Point {
    let row = index / GRID_COLUMNS;
    let col = index % GRID_COLUMNS;
    Point::new(
        GRID_ORIGIN.0 + col as f64 * GRID_PITCH.0,
        GRID_ORIGIN.1 + row as f64 * GRID_PITCH.1,
    )
}

/// Key rows of one table box: sorted referenced fields, then referencing
/// fields in the order relations first use them
#[derive(Debug, Default)]
struct KeyRows {
    pk: BTreeSet<String>,
    fk: Vec<String>,
}

impl KeyRows {
    fn rows(&self) -> Vec<(String, String)> {
        let mut rows: Vec<(String, String)> = self
            .pk
            .iter()
            .map(|f| ("PK".to_string(), f.clone()))
            .collect();
        rows.extend(
            self.fk
                .iter()
                .enumerate()
                .map(|(i, f)| (format!("FK{}", i + 1), f.clone())),
        );
        rows
    }
}

fn gather_keys(snapshot: &RelationsSnapshot) -> HashMap<&str, KeyRows> {
    let mut keys: HashMap<&str, KeyRows> = snapshot
        .layers
        .keys()
        .map(|id| (id.as_str(), KeyRows::default()))
        .collect();
    for edge in &snapshot.edges {
        for pair in &edge.pairs {
            if let Some(k) = keys.get_mut(edge.parent_layer_id.as_str()) {
                k.pk.insert(pair.parent_field.clone());
            }
            if let Some(k) = keys.get_mut(edge.child_layer_id.as_str()) {
                if !k.fk.contains(&pair.child_field) {
                    k.fk.push(pair.child_field.clone());
                }
            }
        }
    }
    keys
}

fn write_table(
    out: &mut String,
    cell_id: &mut u32,
    node: &LayerNode,
    keys: &KeyRows,
    at: Point,
) -> Result<String> {
    let mut rows = keys.rows();
    rows.push((String::new(), "…".to_string()));
    let height = HEADER_HEIGHT + rows.len() as u32 * ROW_HEIGHT;
    let header_bg = if node.is_link_table {
        LINK_HEADER_BG
    } else {
        HEADER_BG
    };

    let swim_id = format!("s_{}", *cell_id);
    *cell_id += 1;
    writeln!(
        out,
        "        <mxCell id=\"{id}\" value=\"{value}\" style=\"shape=swimlane;collapsible=1;fold=0;rounded=1;html=1;\
strokeColor={BORDER};fillColor={header_bg};fontColor={TEXT};swimlaneFillColor={BODY_BG};\
startSize={HEADER_HEIGHT};fontStyle=1;fontSize=12;\" vertex=\"1\" parent=\"1\">\n\
          <mxGeometry x=\"{x}\" y=\"{y}\" width=\"{BOX_WIDTH}\" height=\"{height}\" as=\"geometry\"/>\n\
        </mxCell>",
        id = swim_id,
        value = attr(&esc(&node.name)),
        x = at.x as i64,
        y = at.y as i64,
    )?;

    for (i, (tag, field)) in rows.iter().enumerate() {
        let y = HEADER_HEIGHT + i as u32 * ROW_HEIGHT;
        let text = if field == "…" {
            field.clone()
        } else {
            format!("<span style=\"text-decoration:underline\">{}</span>", esc(field))
        };

        writeln!(
            out,
            "        <mxCell id=\"l_{id}\" value=\"{tag}\" style=\"shape=rectangle;html=1;rounded=0;\
strokeColor={GRID_LINE};fillColor={BODY_BG};align=center;verticalAlign=middle;fontSize=11;fontStyle=0;\" \
vertex=\"1\" parent=\"{swim_id}\">\n\
          <mxGeometry x=\"0\" y=\"{y}\" width=\"{TAG_WIDTH}\" height=\"{ROW_HEIGHT}\" as=\"geometry\"/>\n\
        </mxCell>",
            id = *cell_id,
            tag = attr(tag),
        )?;
        *cell_id += 1;

        writeln!(
            out,
            "        <mxCell id=\"r_{id}\" value=\"{text}\" style=\"shape=rectangle;html=1;rounded=0;\
strokeColor={GRID_LINE};fillColor={BODY_BG};align=left;verticalAlign=middle;spacingLeft=8;fontSize=11;\" \
vertex=\"1\" parent=\"{swim_id}\">\n\
          <mxGeometry x=\"{TAG_WIDTH}\" y=\"{y}\" width=\"{w}\" height=\"{ROW_HEIGHT}\" as=\"geometry\"/>\n\
        </mxCell>",
            id = *cell_id,
            text = attr(&text),
            w = BOX_WIDTH - TAG_WIDTH,
        )?;
        *cell_id += 1;
    }

    Ok(swim_id)
}

/// Build a draw.io document with one collapsible box per layer.
///
/// Layers found in `positions` are placed there (top-left corner); the others
/// fill a grid in case-insensitive name order.
pub fn build_drawio(
    snapshot: &RelationsSnapshot,
    positions: Option<&HashMap<String, Point>>,
) -> Result<String> {
    let keys = gather_keys(snapshot);

    let mut layers: Vec<&LayerNode> = snapshot.layers.values().collect();
    layers.sort_by_key(|n| n.name.to_lowercase());

    let mut placed: HashMap<&str, Point> = HashMap::new();
    let mut grid_index = 0;
    for node in &layers {
        let at = match positions.and_then(|p| p.get(&node.id)) {
            Some(p) => *p,
            None => {
                grid_index += 1;
                grid_position(grid_index - 1)
            }
        };
        placed.insert(node.id.as_str(), at);
    }

    let mut out = String::from(
        "<mxfile host=\"app.diagrams.net\">\n\
  <diagram id=\"relx-relations\" name=\"Relations\">\n\
    <mxGraphModel dx=\"1280\" dy=\"720\" grid=\"1\" gridSize=\"10\" guides=\"1\" tooltips=\"1\" \
connect=\"1\" arrows=\"1\" fold=\"1\" page=\"1\" pageScale=\"1\" pageWidth=\"1654\" pageHeight=\"1169\">\n\
      <root>\n\
        <mxCell id=\"0\"/>\n\
        <mxCell id=\"1\" parent=\"0\"/>\n",
    );

    let mut cell_id = 2;
    let mut cell_of: HashMap<&str, String> = HashMap::new();
    for node in &layers {
        let k = &keys[node.id.as_str()];
        let swim_id = write_table(&mut out, &mut cell_id, node, k, placed[node.id.as_str()])?;
        cell_of.insert(node.id.as_str(), swim_id);
    }

    for edge in &snapshot.edges {
        let (Some(source), Some(target)) = (
            cell_of.get(edge.parent_layer_id.as_str()),
            cell_of.get(edge.child_layer_id.as_str()),
        ) else {
            continue;
        };
        let parent = snapshot.layer_name(&edge.parent_layer_id);
        let child = snapshot.layer_name(&edge.child_layer_id);
        let label = edge
            .pairs
            .iter()
            .map(|p| format!("{}.{} → {}.{}", parent, p.parent_field, child, p.child_field))
            .collect::<Vec<_>>()
            .join("\n");

        writeln!(
            out,
            "        <mxCell id=\"e_{id}\" value=\"{label}\" style=\"{EDGE_STYLE}\" edge=\"1\" parent=\"1\" \
source=\"{source}\" target=\"{target}\">\n\
          <mxGeometry relative=\"1\" as=\"geometry\"/>\n\
        </mxCell>",
            id = cell_id,
            label = attr(&label),
        )?;
        cell_id += 1;
    }

    out.push_str(
        "      </root>\n\
    </mxGraphModel>\n\
  </diagram>\n\
</mxfile>\n",
    );
    Ok(out)
}

pub fn export_drawio(
    snapshot: &RelationsSnapshot,
    positions: Option<&HashMap<String, Point>>,
    output_path: &Path,
) -> Result<()> {
    write_file(output_path, build_drawio(snapshot, positions)?.as_bytes())?;
    info!(path = %output_path.display(), layers = snapshot.layers.len(), "exported draw.io diagram");
    Ok(())
}
