use crate::host::{Host, HostError, HostResult};
use crate::types::{Record, RelationEdge, RelationsSnapshot, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// The relation with `parent_id` as parent and `child_id` as child, if any
pub fn find_direct_relation<'a>(
    snapshot: &'a RelationsSnapshot,
    parent_id: &str,
    child_id: &str,
) -> Option<&'a RelationEdge> {
    snapshot
        .edges
        .iter()
        .find(|e| e.parent_layer_id == parent_id && e.child_layer_id == child_id)
}

/// A junction layer joining two layers through a pair of its relations
#[derive(Debug, Clone, PartialEq)]
pub struct JunctionCandidate {
    pub link_layer_id: String,
    /// Relation whose parent is the drop source layer
    pub source_relation: RelationEdge,
    /// Relation whose parent is the drop target layer
    pub target_relation: RelationEdge,
}

impl JunctionCandidate {
    /// `L  ⟦ P1[pk->fk, …] + P2[pk->fk, …] ⟧`
    pub fn label(&self, snapshot: &RelationsSnapshot) -> String {
        let side = |edge: &RelationEdge| {
            let pairs = edge
                .pairs
                .iter()
                .map(|p| format!("{}->{}", p.parent_field, p.child_field))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}[{}]", snapshot.layer_name(&edge.parent_layer_id), pairs)
        };
        format!(
            "{}  ⟦ {} + {} ⟧",
            snapshot.layer_name(&self.link_layer_id),
            side(&self.source_relation),
            side(&self.target_relation)
        )
    }

    /// Values for a new junction row joining `source` and `target`
    pub fn prefilled_values(&self, source: &Record, target: &Record) -> HostResult<Vec<(String, Value)>> {
        let mut values = Vec::new();
        for (edge, record) in [(&self.source_relation, source), (&self.target_relation, target)] {
            for pair in &edge.pairs {
                let value = record
                    .get(&pair.parent_field)
                    .ok_or_else(|| HostError::FieldNotFound {
                        layer: edge.parent_layer_id.clone(),
                        field: pair.parent_field.clone(),
                    })?;
                values.push((pair.child_field.clone(), value.clone()));
            }
        }
        Ok(values)
    }
}

/// Junction layers joining `source_id` and `target_id`.
///
/// A layer qualifies through any two of its incoming relations whose parents
/// are the two layers, in either order. When both ids are the same layer,
/// both relations must point at it. Each (layer, relation, relation) triple
/// is reported once.
pub fn find_link_tables_between(
    snapshot: &RelationsSnapshot,
    source_id: &str,
    target_id: &str,
) -> Vec<JunctionCandidate> {
    let mut by_child: BTreeMap<&str, Vec<&RelationEdge>> = BTreeMap::new();
    for edge in &snapshot.edges {
        by_child.entry(edge.child_layer_id.as_str()).or_default().push(edge);
    }

    let mut out = Vec::new();
    for (link_id, incoming) in by_child {
        for (i, r1) in incoming.iter().enumerate() {
            for r2 in &incoming[i + 1..] {
                let (p1, p2) = (r1.parent_layer_id.as_str(), r2.parent_layer_id.as_str());
                let joins = (p1 == source_id && p2 == target_id)
                    || (p1 == target_id && p2 == source_id);
                if !joins {
                    continue;
                }
                let (source_relation, target_relation) = if p1 == source_id {
                    (*r1, *r2)
                } else {
                    (*r2, *r1)
                };
                out.push(JunctionCandidate {
                    link_layer_id: link_id.to_string(),
                    source_relation: source_relation.clone(),
                    target_relation: target_relation.clone(),
                });
            }
        }
    }
    out
}

/// Rows of the relation's child layer whose foreign key matches `parent`.
///
/// Every pair must match; a missing field or a NULL on either side excludes
/// the row.
pub fn children_for_relation(host: &dyn Host, parent: &Record, edge: &RelationEdge) -> Vec<Record> {
    let rows = match host.records(&edge.child_layer_id, None) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(layer = %edge.child_layer_id, error = %e, "could not read child rows");
            return Vec::new();
        }
    };

    rows.into_iter()
        .filter(|child| {
            edge.pairs.iter().all(|p| {
                match (parent.get(&p.parent_field), child.get(&p.child_field)) {
                    (Some(pv), Some(cv)) => pv.key_eq(cv),
                    _ => false,
                }
            })
        })
        .collect()
}
