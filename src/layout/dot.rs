use crate::types::{LayerNode, RelationEdge, RelationsSnapshot};
use std::collections::HashSet;

/// Escape text for a double-quoted DOT string
fn esc(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', " ")
}

fn node_stmt(node: &LayerNode, highlight: &HashSet<String>) -> String {
    let mut stmt = format!(
        "\"{}\" [label=\"{}\", shape=box",
        esc(&node.id),
        esc(&node.name)
    );
    if node.is_link_table {
        stmt.push_str(", style=filled, fillcolor=\"#FFE0B2\"");
    }
    if highlight.contains(&node.id) {
        stmt.push_str(", penwidth=2");
    }
    stmt.push(']');
    stmt
}

fn edge_stmt(edge: &RelationEdge) -> String {
    let label = edge
        .pairs
        .iter()
        .map(|p| format!("{} → {}", esc(&p.parent_field), esc(&p.child_field)))
        .collect::<Vec<_>>()
        .join("\\n");
    let attrs = if label.is_empty() {
        String::new()
    } else {
        format!(" [label=\"{}\"]", label)
    };
    format!(
        "\"{}\" -> \"{}\"{};",
        esc(&edge.parent_layer_id),
        esc(&edge.child_layer_id),
        attrs
    )
}

/// Describe the snapshot as a DOT digraph.
///
/// With a non-empty `focus`, only relations touching a focus layer are kept,
/// along with the focus layers and the other end of every kept relation.
pub fn build_dot(
    snapshot: &RelationsSnapshot,
    highlight: &HashSet<String>,
    focus: &HashSet<String>,
) -> String {
    let (keep_nodes, keep_edges): (HashSet<&str>, Vec<&RelationEdge>) = if focus.is_empty() {
        (
            snapshot.layers.keys().map(String::as_str).collect(),
            snapshot.edges.iter().collect(),
        )
    } else {
        let mut nodes: HashSet<&str> = focus.iter().map(String::as_str).collect();
        let mut edges = Vec::new();
        for edge in &snapshot.edges {
            if focus.iter().any(|id| edge.connects(id)) {
                nodes.insert(&edge.parent_layer_id);
                nodes.insert(&edge.child_layer_id);
                edges.push(edge);
            }
        }
        (nodes, edges)
    };

    let mut lines = vec![
        "digraph relations {".to_string(),
        "  rankdir=LR;".to_string(),
        "  graph [splines=true, overlap=false];".to_string(),
        "  node [fontname=\"Helvetica\", fontsize=10];".to_string(),
        "  edge [fontname=\"Helvetica\", fontsize=9];".to_string(),
    ];
    for (id, node) in &snapshot.layers {
        if keep_nodes.contains(id.as_str()) {
            lines.push(format!("  {}", node_stmt(node, highlight)));
        }
    }
    for edge in keep_edges {
        lines.push(format!("  {}", edge_stmt(edge)));
    }
    lines.push("}".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldPair;

    fn snapshot(layers: &[&str], edges: &[(&str, &str)]) -> RelationsSnapshot {
        let mut snap = RelationsSnapshot::default();
        for id in layers {
            snap.layers.insert(id.to_string(), LayerNode::new(*id, id.to_uppercase()));
        }
        for (i, (p, c)) in edges.iter().enumerate() {
            snap.edges.push(RelationEdge {
                id: format!("r{}", i),
                parent_layer_id: p.to_string(),
                child_layer_id: c.to_string(),
                pairs: vec![FieldPair::new("id", format!("{}_id", p))],
            });
        }
        snap
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn focus_keeps_the_neighbourhood_only() {
        let snap = snapshot(
            &["x", "y", "v", "z", "w"],
            &[("x", "y"), ("v", "x"), ("z", "w"), ("y", "z")],
        );
        let dot = build_dot(&snap, &HashSet::new(), &set(&["x"]));

        assert!(dot.contains("\"x\" [label=\"X\""));
        assert!(dot.contains("\"y\" [label=\"Y\""));
        assert!(dot.contains("\"v\" [label=\"V\""));
        assert!(!dot.contains("\"z\" [label"));
        assert!(!dot.contains("\"w\" [label"));
        assert!(dot.contains("\"x\" -> \"y\""));
        assert!(dot.contains("\"v\" -> \"x\""));
        assert!(!dot.contains("\"z\" -> \"w\""));
        assert!(!dot.contains("\"y\" -> \"z\""));
    }

    #[test]
    fn empty_focus_keeps_everything() {
        let snap = snapshot(&["a", "b", "c"], &[("a", "b")]);
        let dot = build_dot(&snap, &HashSet::new(), &HashSet::new());
        assert!(dot.starts_with("digraph relations {\n  rankdir=LR;"));
        assert!(dot.contains("\"c\" [label=\"C\", shape=box]"));
        assert!(dot.contains("\"a\" -> \"b\" [label=\"id → a_id\"];"));
        assert!(dot.ends_with('}'));
    }

    #[test]
    fn link_tables_and_highlights_are_styled() {
        let mut snap = snapshot(&["l", "a"], &[]);
        snap.layers.get_mut("l").unwrap().is_link_table = true;
        let dot = build_dot(&snap, &set(&["a"]), &HashSet::new());
        assert!(dot.contains("\"l\" [label=\"L\", shape=box, style=filled, fillcolor=\"#FFE0B2\"]"));
        assert!(dot.contains("\"a\" [label=\"A\", shape=box, penwidth=2]"));
    }

    #[test]
    fn multiple_pairs_are_joined_with_dot_newlines() {
        let mut snap = snapshot(&["a", "b"], &[("a", "b")]);
        snap.edges[0].pairs.push(FieldPair::new("k2", "a_k2"));
        let dot = build_dot(&snap, &HashSet::new(), &HashSet::new());
        assert!(dot.contains("[label=\"id → a_id\\nk2 → a_k2\"]"));
    }

    #[test]
    fn escapes_quotes_backslashes_and_newlines() {
        assert_eq!(esc("a\"b\\c\nd"), "a\\\"b\\\\c d");
    }
}
