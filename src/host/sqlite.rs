use super::schema::{get_columns, get_foreign_keys, get_table_row_count, get_tables, quote_ident};
use super::{Host, HostError, HostResult};
use crate::types::{ColumnInfo, LayerInfo, Record, RecordId, RelationInfo, Value};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// Pending changes of one layer's edit session
#[derive(Debug, Default)]
struct EditBuffer {
    changed: BTreeMap<i64, BTreeMap<String, Value>>,
    added: Vec<(i64, Vec<Value>)>,
    deleted: BTreeSet<i64>,
}

impl EditBuffer {
    fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.deleted.is_empty()
    }

    fn is_added(&self, id: i64) -> bool {
        self.added.iter().any(|(tid, _)| *tid == id)
    }

    fn overlay(&self, record: &mut Record) {
        if let Some(changes) = self.changed.get(&record.id.0) {
            for (field, value) in changes {
                if let Some(i) = record.fields.iter().position(|f| f == field) {
                    record.values[i] = value.clone();
                }
            }
        }
    }
}

/// A SQLite database seen as a project: tables are layers, foreign-key
/// constraints are relations, ROWID identifies records.
///
/// Edits are buffered per table and only written on commit, inside one
/// transaction. Tables declared `WITHOUT ROWID` cannot be browsed.
pub struct SqliteHost {
    conn: Connection,
    read_only: bool,
    buffers: HashMap<String, EditBuffer>,
    next_temp_id: i64,
}

impl SqliteHost {
    /// Open a database file
    pub fn open<P: AsRef<Path>>(path: P, read_only: bool) -> HostResult<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        // Validate file exists
        if !path.as_ref().exists() {
            return Err(HostError::NotFound(path_str));
        }

        let flags = if read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };

        let conn = Connection::open_with_flags(path.as_ref(), flags)?;

        // SQLite only notices a foreign file on first read
        if let Err(e) = conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        }) {
            let msg = e.to_string();
            if msg.contains("not a database") || msg.contains("file is encrypted") {
                return Err(HostError::InvalidFile(path_str));
            }
            return Err(e.into());
        }

        info!(path = %path_str, read_only, "opened database");
        Self::from_connection(conn, read_only)
    }

    /// Wrap an already opened connection
    pub fn from_connection(conn: Connection, read_only: bool) -> HostResult<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Ok(Self {
            conn,
            read_only,
            buffers: HashMap::new(),
            next_temp_id: 0,
        })
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn columns(&self, layer_id: &str) -> HostResult<Vec<ColumnInfo>> {
        let columns = get_columns(&self.conn, layer_id)?;
        if columns.is_empty() {
            return Err(HostError::LayerNotFound(layer_id.to_string()));
        }
        Ok(columns)
    }

    fn pk_column_names(&self, layer_id: &str) -> HostResult<Vec<String>> {
        let mut pk: Vec<ColumnInfo> = self
            .columns(layer_id)?
            .into_iter()
            .filter(|c| c.is_primary_key())
            .collect();
        pk.sort_by_key(|c| c.pk_position);
        Ok(pk.into_iter().map(|c| c.name).collect())
    }

    fn require_editing(&self, layer_id: &str) -> HostResult<()> {
        if self.buffers.contains_key(layer_id) {
            Ok(())
        } else {
            Err(HostError::NotEditable(layer_id.to_string()))
        }
    }

    /// Whether `id` names a row added in this edit session rather than a stored one
    fn is_pending(&self, layer_id: &str, id: RecordId) -> bool {
        self.buffers
            .get(layer_id)
            .map(|b| b.is_added(id.0))
            .unwrap_or(false)
    }

    /// Temporary ids count down from below every stored rowid, so they never
    /// shadow a row the table already has
    fn allocate_temp_id(&mut self, layer_id: &str) -> HostResult<i64> {
        let sql = format!("SELECT MIN(rowid) FROM {}", quote_ident(layer_id));
        let lowest: Option<i64> = self.conn.query_row(&sql, [], |row| row.get(0))?;
        let floor = lowest.map_or(self.next_temp_id, |min| min.min(self.next_temp_id));
        self.next_temp_id = floor - 1;
        Ok(self.next_temp_id)
    }

    fn stored_record(&self, layer_id: &str, fields: &[String], id: i64) -> HostResult<Option<Record>> {
        let sql = format!("SELECT rowid, * FROM {} WHERE rowid = ?1", quote_ident(layer_id));
        let row = self
            .conn
            .query_row(&sql, [id], |row| read_row(row, fields.len()))
            .optional()?;
        Ok(row.map(|(id, values)| Record::new(RecordId(id), fields.to_vec(), values)))
    }

    fn apply_buffer(&mut self, layer_id: &str, buffer: &EditBuffer) -> HostResult<()> {
        let fields = self.fields(layer_id)?;
        let table = quote_ident(layer_id);
        let tx = self.conn.transaction()?;

        for id in &buffer.deleted {
            tx.execute(&format!("DELETE FROM {} WHERE rowid = ?1", table), [id])?;
        }

        for (id, changes) in &buffer.changed {
            for (field, value) in changes {
                tx.execute(
                    &format!("UPDATE {} SET {} = ?1 WHERE rowid = ?2", table, quote_ident(field)),
                    params![value, id],
                )?;
            }
        }

        for (_, values) in &buffer.added {
            // Leave NULL columns out so defaults and rowid aliases apply
            let (cols, vals): (Vec<&String>, Vec<&Value>) = fields
                .iter()
                .zip(values.iter())
                .filter(|(_, v)| !v.is_null())
                .unzip();
            if cols.is_empty() {
                tx.execute(&format!("INSERT INTO {} DEFAULT VALUES", table), [])?;
            } else {
                let col_list = cols
                    .iter()
                    .map(|c| quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                let placeholders = (1..=cols.len())
                    .map(|i| format!("?{}", i))
                    .collect::<Vec<_>>()
                    .join(", ");
                tx.execute(
                    &format!("INSERT INTO {} ({}) VALUES ({})", table, col_list, placeholders),
                    params_from_iter(vals.iter()),
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

fn read_row(row: &rusqlite::Row<'_>, width: usize) -> rusqlite::Result<(i64, Vec<Value>)> {
    let id: i64 = row.get(0)?;
    let mut values = Vec::with_capacity(width);
    for i in 0..width {
        let value: rusqlite::types::Value = row.get(i + 1)?;
        values.push(Value::from(value));
    }
    Ok((id, values))
}

impl Host for SqliteHost {
    fn layers(&self) -> HostResult<Vec<LayerInfo>> {
        Ok(get_tables(&self.conn)?
            .into_iter()
            .map(|name| LayerInfo {
                id: name.clone(),
                name,
            })
            .collect())
    }

    fn relations(&self) -> HostResult<Vec<RelationInfo>> {
        let tables = get_tables(&self.conn)?;
        let mut relations = Vec::new();

        for child in &tables {
            let mut constraints: BTreeMap<i32, Vec<_>> = BTreeMap::new();
            for fk in get_foreign_keys(&self.conn, child)? {
                constraints.entry(fk.id).or_default().push(fk);
            }

            for (fk_id, columns) in constraints {
                // Table names are case-insensitive in SQLite
                let declared = &columns[0].to_table;
                let parent = tables
                    .iter()
                    .find(|t| t.eq_ignore_ascii_case(declared))
                    .cloned()
                    .unwrap_or_else(|| declared.clone());

                let implicit_pk = if columns.iter().any(|c| c.to_column.is_none()) {
                    self.pk_column_names(&parent).unwrap_or_default()
                } else {
                    Vec::new()
                };

                let field_pairs = columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        let parent_field = c
                            .to_column
                            .clone()
                            .or_else(|| implicit_pk.get(i).cloned())
                            .unwrap_or_default();
                        (parent_field, c.from_column.clone())
                    })
                    .collect();

                relations.push(RelationInfo {
                    id: format!("{}#{}", child, fk_id),
                    parent_layer_id: parent,
                    child_layer_id: child.clone(),
                    field_pairs,
                });
            }
        }

        debug!(count = relations.len(), "read foreign-key relations");
        Ok(relations)
    }

    fn fields(&self, layer_id: &str) -> HostResult<Vec<String>> {
        Ok(self.columns(layer_id)?.into_iter().map(|c| c.name).collect())
    }

    fn primary_key_indexes(&self, layer_id: &str) -> HostResult<Vec<usize>> {
        Ok(self
            .columns(layer_id)?
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_primary_key())
            .map(|(i, _)| i)
            .collect())
    }

    fn is_editable(&self, layer_id: &str) -> bool {
        self.buffers.contains_key(layer_id)
    }

    fn is_modified(&self, layer_id: &str) -> bool {
        self.buffers
            .get(layer_id)
            .map(|b| !b.is_empty())
            .unwrap_or(false)
    }

    fn start_editing(&mut self, layer_id: &str) -> HostResult<()> {
        if self.read_only {
            return Err(HostError::ReadOnly);
        }
        self.columns(layer_id)?;
        self.buffers.entry(layer_id.to_string()).or_default();
        debug!(layer = layer_id, "edit session started");
        Ok(())
    }

    fn commit(&mut self, layer_id: &str) -> HostResult<()> {
        let buffer = self
            .buffers
            .remove(layer_id)
            .ok_or_else(|| HostError::NotEditable(layer_id.to_string()))?;

        match self.apply_buffer(layer_id, &buffer) {
            Ok(()) => {
                info!(
                    layer = layer_id,
                    changed = buffer.changed.len(),
                    added = buffer.added.len(),
                    deleted = buffer.deleted.len(),
                    "committed edits"
                );
                Ok(())
            }
            Err(e) => {
                // Stay in the edit session so the user can fix and retry
                self.buffers.insert(layer_id.to_string(), buffer);
                Err(e)
            }
        }
    }

    fn rollback(&mut self, layer_id: &str) -> HostResult<()> {
        self.buffers
            .remove(layer_id)
            .map(|_| debug!(layer = layer_id, "edits rolled back"))
            .ok_or_else(|| HostError::NotEditable(layer_id.to_string()))
    }

    fn records(&self, layer_id: &str, limit: Option<usize>) -> HostResult<Vec<Record>> {
        let fields = self.fields(layer_id)?;
        let buffer = self.buffers.get(layer_id);

        let mut sql = format!("SELECT rowid, * FROM {} ORDER BY rowid", quote_ident(layer_id));
        if let Some(n) = limit {
            let hidden = buffer.map(|b| b.deleted.len()).unwrap_or(0);
            sql.push_str(&format!(" LIMIT {}", n + hidden));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| read_row(row, fields.len()))?;

        let mut records = Vec::new();
        for row in rows {
            let (id, values) = row?;
            if buffer.map(|b| b.deleted.contains(&id)).unwrap_or(false) {
                continue;
            }
            let mut record = Record::new(RecordId(id), fields.clone(), values);
            if let Some(b) = buffer {
                b.overlay(&mut record);
            }
            records.push(record);
        }

        if let Some(b) = buffer {
            for (id, values) in &b.added {
                records.push(Record::new(RecordId(*id), fields.clone(), values.clone()));
            }
        }

        if let Some(n) = limit {
            records.truncate(n);
        }
        Ok(records)
    }

    fn record(&self, layer_id: &str, id: RecordId) -> HostResult<Option<Record>> {
        let fields = self.fields(layer_id)?;
        let buffer = self.buffers.get(layer_id);

        if self.is_pending(layer_id, id) {
            return Ok(buffer.and_then(|b| {
                b.added
                    .iter()
                    .find(|(tid, _)| *tid == id.0)
                    .map(|(_, values)| Record::new(id, fields.clone(), values.clone()))
            }));
        }

        if buffer.map(|b| b.deleted.contains(&id.0)).unwrap_or(false) {
            return Ok(None);
        }

        let mut record = self.stored_record(layer_id, &fields, id.0)?;
        if let (Some(r), Some(b)) = (record.as_mut(), buffer) {
            b.overlay(r);
        }
        Ok(record)
    }

    fn feature_count(&self, layer_id: &str) -> HostResult<u64> {
        let stored = get_table_row_count(&self.conn, layer_id)?;
        Ok(match self.buffers.get(layer_id) {
            Some(b) => (stored + b.added.len() as u64).saturating_sub(b.deleted.len() as u64),
            None => stored,
        })
    }

    fn add_record(&mut self, layer_id: &str, values: &[(String, Value)]) -> HostResult<RecordId> {
        self.require_editing(layer_id)?;
        let fields = self.fields(layer_id)?;

        let mut row = vec![Value::Null; fields.len()];
        for (field, value) in values {
            let i = fields
                .iter()
                .position(|f| f == field)
                .ok_or_else(|| HostError::FieldNotFound {
                    layer: layer_id.to_string(),
                    field: field.clone(),
                })?;
            row[i] = value.clone();
        }

        let id = self.allocate_temp_id(layer_id)?;
        if let Some(b) = self.buffers.get_mut(layer_id) {
            b.added.push((id, row));
        }
        Ok(RecordId(id))
    }

    fn delete_record(&mut self, layer_id: &str, id: RecordId) -> HostResult<()> {
        self.require_editing(layer_id)?;
        if self.record(layer_id, id)?.is_none() {
            return Err(HostError::RecordNotFound {
                layer: layer_id.to_string(),
                id,
            });
        }

        let pending = self.is_pending(layer_id, id);
        if let Some(b) = self.buffers.get_mut(layer_id) {
            if pending {
                b.added.retain(|(tid, _)| *tid != id.0);
            } else {
                b.changed.remove(&id.0);
                b.deleted.insert(id.0);
            }
        }
        Ok(())
    }

    fn set_value(
        &mut self,
        layer_id: &str,
        id: RecordId,
        field: &str,
        value: Value,
    ) -> HostResult<()> {
        self.require_editing(layer_id)?;
        let index = self
            .field_index(layer_id, field)?
            .ok_or_else(|| HostError::FieldNotFound {
                layer: layer_id.to_string(),
                field: field.to_string(),
            })?;
        if self.record(layer_id, id)?.is_none() {
            return Err(HostError::RecordNotFound {
                layer: layer_id.to_string(),
                id,
            });
        }

        let pending = self.is_pending(layer_id, id);
        if let Some(b) = self.buffers.get_mut(layer_id) {
            if pending {
                if let Some((_, values)) = b.added.iter_mut().find(|(tid, _)| *tid == id.0) {
                    values[index] = value;
                }
            } else {
                b.changed
                    .entry(id.0)
                    .or_default()
                    .insert(field.to_string(), value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn host() -> SqliteHost {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY, name TEXT);
             CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES parent (id), label TEXT);
             INSERT INTO parent (id, name) VALUES (5, 'five'), (6, 'six');
             INSERT INTO child (id, parent_id, label) VALUES (1, NULL, 'a'), (2, 5, 'b');",
        )
        .unwrap();
        SqliteHost::from_connection(conn, false).unwrap()
    }

    #[test]
    fn relations_are_reported_parent_field_first() {
        let host = host();
        let rels = host.relations().unwrap();
        assert_eq!(
            rels,
            vec![RelationInfo {
                id: "child#0".into(),
                parent_layer_id: "parent".into(),
                child_layer_id: "child".into(),
                field_pairs: vec![("id".into(), "parent_id".into())],
            }]
        );
        assert_eq!(host.primary_key_indexes("child").unwrap(), vec![0]);
    }

    #[test]
    fn writes_require_an_edit_session() {
        let mut host = host();
        let err = host
            .set_value("child", RecordId(1), "parent_id", Value::Integer(5))
            .unwrap_err();
        assert!(matches!(err, HostError::NotEditable(_)));
    }

    #[test]
    fn pending_edits_are_visible_and_commit_persists_them() {
        let mut host = host();
        host.start_editing("child").unwrap();
        host.set_value("child", RecordId(1), "parent_id", Value::Integer(6))
            .unwrap();
        assert!(host.is_modified("child"));

        let rec = host.record("child", RecordId(1)).unwrap().unwrap();
        assert_eq!(rec.get("parent_id"), Some(&Value::Integer(6)));

        // Nothing stored yet
        let stored: Option<i64> = host
            .connection()
            .query_row("SELECT parent_id FROM child WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stored, None);

        host.commit("child").unwrap();
        assert!(!host.is_editable("child"));
        let stored: Option<i64> = host
            .connection()
            .query_row("SELECT parent_id FROM child WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stored, Some(6));
    }

    #[test]
    fn rollback_discards_added_and_deleted_rows() {
        let mut host = host();
        host.start_editing("child").unwrap();
        let new_id = host
            .add_record("child", &[("label".into(), Value::Text("c".into()))])
            .unwrap();
        assert!(new_id.0 < 0);
        host.delete_record("child", RecordId(2)).unwrap();

        let labels: Vec<String> = host
            .records("child", None)
            .unwrap()
            .iter()
            .map(|r| r.get("label").unwrap().display(10))
            .collect();
        assert_eq!(labels, vec!["a", "c"]);
        assert_eq!(host.feature_count("child").unwrap(), 2);

        host.rollback("child").unwrap();
        assert_eq!(host.records("child", None).unwrap().len(), 2);
    }

    #[test]
    fn added_records_are_inserted_on_commit() {
        let mut host = host();
        host.start_editing("child").unwrap();
        host.add_record(
            "child",
            &[
                ("parent_id".into(), Value::Integer(6)),
                ("label".into(), Value::Text("new".into())),
            ],
        )
        .unwrap();
        host.commit("child").unwrap();

        let records = host.records("child", None).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.id.0 > 0));
    }

    #[test]
    fn failed_commit_keeps_the_session_open() {
        let mut host = host();
        host.start_editing("child").unwrap();
        host.set_value("child", RecordId(1), "parent_id", Value::Integer(999))
            .unwrap();
        assert!(host.commit("child").is_err());
        assert!(host.is_editable("child"));
        assert!(host.is_modified("child"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut host = host();
        host.start_editing("child").unwrap();
        let err = host
            .add_record("child", &[("nope".into(), Value::Integer(1))])
            .unwrap_err();
        assert!(matches!(err, HostError::FieldNotFound { .. }));
    }

    #[test]
    fn limit_counts_visible_rows_only() {
        let mut host = host();
        host.start_editing("child").unwrap();
        host.delete_record("child", RecordId(1)).unwrap();
        let records = host.records("child", Some(1)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, RecordId(2));
    }

    #[test]
    fn negative_rowids_are_stored_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES parent (id));
             INSERT INTO parent (id) VALUES (-5);
             INSERT INTO child (id, parent_id) VALUES (-1, -5);",
        )
        .unwrap();
        let mut host = SqliteHost::from_connection(conn, false).unwrap();

        let stored = host.record("child", RecordId(-1)).unwrap().unwrap();
        assert_eq!(stored.get("parent_id"), Some(&Value::Integer(-5)));

        host.start_editing("child").unwrap();
        let new_id = host.add_record("child", &[]).unwrap();
        assert!(new_id.0 < -1);

        // Detach the stored row; the added one stays untouched
        host.set_value("child", RecordId(-1), "parent_id", Value::Null)
            .unwrap();
        host.set_value("child", new_id, "parent_id", Value::Integer(-5))
            .unwrap();
        host.commit("child").unwrap();

        let detached: Option<i64> = host
            .connection()
            .query_row("SELECT parent_id FROM child WHERE id = -1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(detached, None);
        let attached: i64 = host
            .connection()
            .query_row("SELECT COUNT(*) FROM child WHERE parent_id = -5", [], |r| r.get(0))
            .unwrap();
        assert_eq!(attached, 1);
    }

    #[test]
    fn read_only_hosts_refuse_edit_sessions() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);")
            .unwrap();
        let mut host = SqliteHost::from_connection(conn, true).unwrap();
        assert!(matches!(host.start_editing("t"), Err(HostError::ReadOnly)));
    }
}
