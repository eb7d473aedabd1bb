use rusqlite::types::{ToSqlOutput, Value as SqliteValue, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

/// Display-friendly value representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<SqliteValue> for Value {
    fn from(v: SqliteValue) -> Self {
        match v {
            SqliteValue::Null => Value::Null,
            SqliteValue::Integer(i) => Value::Integer(i),
            SqliteValue::Real(r) => Value::Real(r),
            SqliteValue::Text(t) => Value::Text(t),
            SqliteValue::Blob(b) => Value::Blob(b),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Value::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl Value {
    /// Format value for display, truncating long text/blob
    pub fn display(&self, max_len: usize) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(r) => {
                // Format with reasonable precision
                if r.fract() == 0.0 {
                    format!("{:.0}", r)
                } else {
                    format!("{:.6}", r)
                }
            }
            Value::Text(t) => {
                if t.chars().count() > max_len {
                    let kept: String = t.chars().take(max_len.saturating_sub(3)).collect();
                    format!("{}...", kept)
                } else {
                    t.clone()
                }
            }
            Value::Blob(b) => {
                if b.len() > max_len {
                    format!("<BLOB {} bytes>...", b.len())
                } else {
                    format!("<BLOB {} bytes>", b.len())
                }
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// NULL and the empty string both render as `NULL` in change previews
    pub fn is_null_or_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(t) => t.is_empty(),
            _ => false,
        }
    }

    /// Short rendering used in confirmation lines (`parent_id  NULL → 5`)
    pub fn preview(&self) -> String {
        if self.is_null_or_empty() {
            "NULL".to_string()
        } else {
            self.display(80)
        }
    }

    /// Equality used when matching foreign keys against keys.
    ///
    /// Integers and reals compare numerically, NULL never matches anything.
    pub fn key_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Integer(a), Value::Real(b)) | (Value::Real(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (a, b) => a == b,
        }
    }
}
