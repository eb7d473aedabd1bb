use crate::host::{Host, HostResult};
use crate::types::{FieldPair, LayerNode, RelationEdge, RelationsSnapshot};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Read the host's layers and relations into a fresh snapshot.
///
/// Relations whose parent or child layer is missing are skipped, as are
/// relations left without any field pair.
pub fn capture(host: &dyn Host) -> HostResult<RelationsSnapshot> {
    let mut layers = BTreeMap::new();
    for layer in host.layers()? {
        layers.insert(layer.id.clone(), LayerNode::new(layer.id, layer.name));
    }

    let mut edges = Vec::new();
    for rel in host.relations()? {
        if !layers.contains_key(&rel.parent_layer_id) || !layers.contains_key(&rel.child_layer_id) {
            debug!(
                relation = %rel.id,
                parent = %rel.parent_layer_id,
                child = %rel.child_layer_id,
                "skipping relation with a missing layer"
            );
            continue;
        }

        let child_fields = host.fields(&rel.child_layer_id).unwrap_or_default();
        let pairs = normalize_pairs(&rel.field_pairs, &child_fields);
        if pairs.is_empty() {
            debug!(relation = %rel.id, "skipping relation without field pairs");
            continue;
        }

        edges.push(RelationEdge {
            id: rel.id,
            parent_layer_id: rel.parent_layer_id,
            child_layer_id: rel.child_layer_id,
            pairs,
        });
    }

    detect_link_tables(host, &mut layers, &edges);

    info!(
        layers = layers.len(),
        relations = edges.len(),
        "captured relationship snapshot"
    );
    Ok(RelationsSnapshot { layers, edges })
}

/// Put raw field pairs into (parent_field, child_field) order.
///
/// A pair whose second member is a child field is kept; one whose first
/// member is a child field is swapped; anything else is kept as given.
pub fn normalize_pairs(raw: &[(String, String)], child_fields: &[String]) -> Vec<FieldPair> {
    let is_child_field = |name: &str| child_fields.iter().any(|f| f == name);
    raw.iter()
        .map(|(a, b)| {
            if is_child_field(b) {
                FieldPair::new(a.clone(), b.clone())
            } else if is_child_field(a) {
                FieldPair::new(b.clone(), a.clone())
            } else {
                FieldPair::new(a.clone(), b.clone())
            }
        })
        .collect()
}

/// Flag junction tables.
///
/// A layer qualifies when it is the child of at least two relations and its
/// primary-key attribute indexes are a non-empty subset of the indexes of the
/// child-side fields those relations reference.
pub fn detect_link_tables(
    host: &dyn Host,
    layers: &mut BTreeMap<String, LayerNode>,
    edges: &[RelationEdge],
) {
    let mut by_child: BTreeMap<&str, Vec<&RelationEdge>> = BTreeMap::new();
    for edge in edges {
        by_child.entry(edge.child_layer_id.as_str()).or_default().push(edge);
    }

    for (child_id, incoming) in by_child {
        if incoming.len() < 2 {
            continue;
        }

        let pk: BTreeSet<usize> = match host.primary_key_indexes(child_id) {
            Ok(indexes) => indexes.into_iter().collect(),
            Err(_) => continue,
        };
        if pk.is_empty() {
            continue;
        }

        let fields = host.fields(child_id).unwrap_or_default();
        let fk: BTreeSet<usize> = incoming
            .iter()
            .flat_map(|e| e.pairs.iter())
            .filter_map(|p| fields.iter().position(|f| *f == p.child_field))
            .collect();

        if pk.is_subset(&fk) {
            if let Some(node) = layers.get_mut(child_id) {
                debug!(layer = child_id, "detected link table");
                node.is_link_table = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::fixtures::{self, JUNCTION, PARENT_CHILD};
    use pretty_assertions::assert_eq;

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn edges_only_reference_captured_layers() {
        let host = fixtures::host(
            "PRAGMA foreign_keys = OFF;
             CREATE TABLE p (id INTEGER PRIMARY KEY);
             CREATE TABLE c (id INTEGER PRIMARY KEY, p_id INTEGER REFERENCES p (id), gone_id INTEGER REFERENCES gone (id));",
        );
        let snap = capture(&host).unwrap();
        assert_eq!(snap.edges.len(), 1);
        for e in &snap.edges {
            assert!(snap.layers.contains_key(&e.parent_layer_id));
            assert!(snap.layers.contains_key(&e.child_layer_id));
        }
    }

    #[test]
    fn empty_project_gives_empty_snapshot() {
        let host = fixtures::host("");
        let snap = capture(&host).unwrap();
        assert!(snap.is_empty());
        assert!(snap.edges.is_empty());
    }

    #[test]
    fn pairs_are_oriented_parent_then_child() {
        let child = vec![s("id"), s("parent_id")];
        let raw = vec![(s("parent_id"), s("pid")), (s("pk"), s("parent_id")), (s("x"), s("y"))];
        assert_eq!(
            normalize_pairs(&raw, &child),
            vec![
                FieldPair::new("pid", "parent_id"),
                FieldPair::new("pk", "parent_id"),
                FieldPair::new("x", "y"),
            ]
        );
    }

    #[test]
    fn parent_child_capture() {
        let host = fixtures::host(PARENT_CHILD);
        let snap = capture(&host).unwrap();
        assert_eq!(snap.edges.len(), 1);
        let edge = &snap.edges[0];
        assert_eq!(edge.parent_layer_id, "parent");
        assert_eq!(edge.child_layer_id, "child");
        assert_eq!(edge.pairs, vec![FieldPair::new("id", "parent_id")]);
        assert!(!snap.layers["child"].is_link_table);
    }

    #[test]
    fn junction_with_key_covered_by_foreign_keys_is_a_link_table() {
        let host = fixtures::host(JUNCTION);
        let snap = capture(&host).unwrap();
        assert!(snap.layers["l"].is_link_table);
        assert!(!snap.layers["a"].is_link_table);
    }

    #[test]
    fn single_incoming_relation_is_not_a_link_table() {
        let host = fixtures::host(
            "CREATE TABLE a (id INTEGER PRIMARY KEY);
             CREATE TABLE l (fk_a INTEGER REFERENCES a (id), x INTEGER, PRIMARY KEY (fk_a));",
        );
        let snap = capture(&host).unwrap();
        assert!(!snap.layers["l"].is_link_table);
    }

    #[test]
    fn surrogate_key_outside_foreign_keys_is_not_a_link_table() {
        let host = fixtures::host(
            "CREATE TABLE a (id INTEGER PRIMARY KEY);
             CREATE TABLE b (id INTEGER PRIMARY KEY);
             CREATE TABLE l (id INTEGER PRIMARY KEY, fk_a INTEGER REFERENCES a (id), fk_b INTEGER REFERENCES b (id));",
        );
        let snap = capture(&host).unwrap();
        assert!(!snap.layers["l"].is_link_table);
    }

    #[test]
    fn table_without_declared_key_is_not_a_link_table() {
        let host = fixtures::host(
            "CREATE TABLE a (id INTEGER PRIMARY KEY);
             CREATE TABLE b (id INTEGER PRIMARY KEY);
             CREATE TABLE l (fk_a INTEGER REFERENCES a (id), fk_b INTEGER REFERENCES b (id));",
        );
        let snap = capture(&host).unwrap();
        assert!(!snap.layers["l"].is_link_table);
    }

    #[test]
    fn reflexive_junction_is_detected() {
        let host = fixtures::host(
            "CREATE TABLE person (id INTEGER PRIMARY KEY);
             CREATE TABLE friendship (
                 a_id INTEGER REFERENCES person (id),
                 b_id INTEGER REFERENCES person (id),
                 PRIMARY KEY (a_id, b_id)
             );",
        );
        let snap = capture(&host).unwrap();
        assert_eq!(snap.incoming("friendship").count(), 2);
        assert!(snap.layers["friendship"].is_link_table);
    }
}
