//! Host data-layer interface consumed by the explorer, and its SQLite backend.

mod error;
mod schema;
mod sqlite;

use crate::types::{LayerInfo, Record, RecordId, RelationInfo, Value};
use thiserror::Error;

pub use error::format_sql_error;
pub use sqlite::SqliteHost;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Database file not found: {0}")]
    NotFound(String),
    #[error("Invalid SQLite file: {0}")]
    InvalidFile(String),
    #[error("Layer not found: {0}")]
    LayerNotFound(String),
    #[error("Field '{field}' not found in layer '{layer}'")]
    FieldNotFound { layer: String, field: String },
    #[error("Record {id} not found in layer '{layer}'")]
    RecordNotFound { layer: String, id: RecordId },
    #[error("Layer '{0}' is not in edit mode")]
    NotEditable(String),
    #[error("Database is opened in read-only mode. Use --read-write to enable editing.")]
    ReadOnly,
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl HostError {
    /// Message suitable for direct display in the status bar
    pub fn user_message(&self) -> String {
        match self {
            HostError::Sqlite(e) => format_sql_error(e, ""),
            other => other.to_string(),
        }
    }
}

pub type HostResult<T> = std::result::Result<T, HostError>;

/// The project/layer registry and editing primitives the explorer works on.
///
/// Layer ids are stable strings; record reads overlay any pending edits of an
/// open edit session, and nothing reaches storage before [`Host::commit`].
pub trait Host {
    fn layers(&self) -> HostResult<Vec<LayerInfo>>;
    fn relations(&self) -> HostResult<Vec<RelationInfo>>;

    /// Field names of a layer in schema order
    fn fields(&self, layer_id: &str) -> HostResult<Vec<String>>;
    /// Indexes (into [`Host::fields`]) of the primary-key attributes
    fn primary_key_indexes(&self, layer_id: &str) -> HostResult<Vec<usize>>;

    fn is_editable(&self, layer_id: &str) -> bool;
    fn is_modified(&self, layer_id: &str) -> bool;
    fn start_editing(&mut self, layer_id: &str) -> HostResult<()>;
    /// Persist pending edits and leave the edit session
    fn commit(&mut self, layer_id: &str) -> HostResult<()>;
    /// Drop pending edits and leave the edit session
    fn rollback(&mut self, layer_id: &str) -> HostResult<()>;

    fn records(&self, layer_id: &str, limit: Option<usize>) -> HostResult<Vec<Record>>;
    fn record(&self, layer_id: &str, id: RecordId) -> HostResult<Option<Record>>;
    fn feature_count(&self, layer_id: &str) -> HostResult<u64>;

    fn add_record(&mut self, layer_id: &str, values: &[(String, Value)]) -> HostResult<RecordId>;
    fn delete_record(&mut self, layer_id: &str, id: RecordId) -> HostResult<()>;
    fn set_value(
        &mut self,
        layer_id: &str,
        id: RecordId,
        field: &str,
        value: Value,
    ) -> HostResult<()>;

    /// Index of a field by name
    fn field_index(&self, layer_id: &str, field: &str) -> HostResult<Option<usize>> {
        Ok(self.fields(layer_id)?.iter().position(|f| f == field))
    }
}
