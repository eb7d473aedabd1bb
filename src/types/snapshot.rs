use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A (parent_field, child_field) foreign-key column mapping
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "PairShape")]
pub struct FieldPair {
    pub parent_field: String,
    pub child_field: String,
}

impl FieldPair {
    pub fn new(parent_field: impl Into<String>, child_field: impl Into<String>) -> Self {
        Self {
            parent_field: parent_field.into(),
            child_field: child_field.into(),
        }
    }
}

/// Field-pair metadata as it may arrive from older producers: a bare field
/// name, a `[pk, fk]` pair, a wider tuple ending in `pk, fk`, or the
/// canonical object form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PairShape {
    Scalar(String),
    Tuple(Vec<String>),
    Named {
        parent_field: String,
        child_field: String,
    },
}

impl From<PairShape> for FieldPair {
    fn from(shape: PairShape) -> Self {
        match shape {
            PairShape::Named {
                parent_field,
                child_field,
            } => FieldPair::new(parent_field, child_field),
            PairShape::Scalar(s) => FieldPair::new(s, ""),
            PairShape::Tuple(mut items) => match items.len() {
                0 => FieldPair::new("", ""),
                1 => FieldPair::new(items.remove(0), ""),
                2 | 3 => {
                    let pk = items.remove(0);
                    let fk = items.remove(0);
                    FieldPair::new(pk, fk)
                }
                n => {
                    let fk = items.remove(n - 1);
                    let pk = items.remove(n - 2);
                    FieldPair::new(pk, fk)
                }
            },
        }
    }
}

/// Identifies a data table/layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerNode {
    pub id: String,
    pub name: String,
    pub is_link_table: bool,
    pub editable_extra_fields: BTreeSet<String>,
}

impl LayerNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_link_table: false,
            editable_extra_fields: BTreeSet::new(),
        }
    }
}

/// A directed parent → child relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEdge {
    pub id: String,
    pub parent_layer_id: String,
    pub child_layer_id: String,
    pub pairs: Vec<FieldPair>,
}

impl RelationEdge {
    pub fn connects(&self, layer_id: &str) -> bool {
        self.parent_layer_id == layer_id || self.child_layer_id == layer_id
    }
}

/// Per-occurrence pair lists keyed by (parent, child) layer ids
pub type EdgePairsMap = HashMap<(String, String), Vec<Vec<FieldPair>>>;

/// The layers and relationships of a project at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationsSnapshot {
    pub layers: BTreeMap<String, LayerNode>,
    pub edges: Vec<RelationEdge>,
}

impl RelationsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, id: &str) -> Option<&LayerNode> {
        self.layers.get(id)
    }

    /// Display name of a layer, falling back to its id
    pub fn layer_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.layers.get(id).map(|l| l.name.as_str()).unwrap_or(id)
    }

    pub fn edge(&self, id: &str) -> Option<&RelationEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn link_table_ids(&self) -> HashSet<String> {
        self.layers
            .values()
            .filter(|l| l.is_link_table)
            .map(|l| l.id.clone())
            .collect()
    }

    pub fn labels(&self) -> HashMap<String, String> {
        self.layers
            .values()
            .map(|l| (l.id.clone(), l.name.clone()))
            .collect()
    }

    /// Relations where `layer_id` is the referenced (parent) side
    pub fn outgoing<'a>(&'a self, layer_id: &'a str) -> impl Iterator<Item = &'a RelationEdge> + 'a {
        self.edges.iter().filter(move |e| e.parent_layer_id == layer_id)
    }

    /// Relations where `layer_id` is the referencing (child) side
    pub fn incoming<'a>(&'a self, layer_id: &'a str) -> impl Iterator<Item = &'a RelationEdge> + 'a {
        self.edges.iter().filter(move |e| e.child_layer_id == layer_id)
    }

    /// Field pairs of every relation, one list per occurrence of a layer pair
    pub fn edge_pairs_map(&self) -> EdgePairsMap {
        let mut map = EdgePairsMap::new();
        for e in &self.edges {
            map.entry((e.parent_layer_id.clone(), e.child_layer_id.clone()))
                .or_default()
                .push(e.pairs.clone());
        }
        map
    }

    /// Ids of layers whose name contains `query` (case-insensitive)
    pub fn search(&self, query: &str) -> HashSet<String> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return HashSet::new();
        }
        self.layers
            .values()
            .filter(|l| l.name.to_lowercase().contains(&q))
            .map(|l| l.id.clone())
            .collect()
    }
}
