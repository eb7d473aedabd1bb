use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Host-assigned record identifier.
///
/// Committed SQLite rows use their ROWID; records added inside an edit
/// session get negative ids until commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of a layer, with its values in schema order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: Vec<String>,
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(id: RecordId, fields: Vec<String>, values: Vec<Value>) -> Self {
        Self { id, fields, values }
    }

    /// Value of a field by name, `None` when the field is not in the schema
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .position(|f| f == field)
            .and_then(|i| self.values.get(i))
    }

    /// First non-null value, or the record id
    pub fn default_label(&self) -> String {
        self.values
            .iter()
            .find(|v| !v.is_null())
            .map(|v| v.display(60))
            .unwrap_or_else(|| self.id.to_string())
    }
}
