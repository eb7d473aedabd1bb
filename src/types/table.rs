use serde::{Deserialize, Serialize};

/// A layer as enumerated by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub id: String,
    pub name: String,
}

/// A relationship as registered in the host.
///
/// `field_pairs` keeps the host's raw orientation, which is not guaranteed to
/// be (parent, child); the snapshot builder canonicalizes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationInfo {
    pub id: String,
    pub parent_layer_id: String,
    pub child_layer_id: String,
    pub field_pairs: Vec<(String, String)>,
}

/// Information about a table column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    /// 1-based position inside the primary key, 0 when not part of it
    pub pk_position: u32,
}

impl ColumnInfo {
    pub fn is_primary_key(&self) -> bool {
        self.pk_position > 0
    }
}

/// Information about a foreign key constraint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub id: i32,
    pub seq: i32,
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    /// `None` when the constraint references the parent's primary key implicitly
    pub to_column: Option<String>,
}
