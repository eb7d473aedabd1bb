use crate::types::{ColumnInfo, ForeignKeyInfo};
use rusqlite::Connection;

/// Quote an identifier for interpolation into SQL text
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Names of all user tables, sorted
pub fn get_tables(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;

    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(tables
        .into_iter()
        .filter(|t| !t.starts_with("sqlite_"))
        .collect())
}

/// Row count of a table
pub fn get_table_row_count(conn: &Connection, table_name: &str) -> rusqlite::Result<u64> {
    let query = format!("SELECT COUNT(*) FROM {}", quote_ident(table_name));
    let count: i64 = conn.query_row(&query, [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Get columns for a table
pub fn get_columns(conn: &Connection, table_name: &str) -> rusqlite::Result<Vec<ColumnInfo>> {
    // Use PRAGMA table_info for reliable column information
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table_name)))?;

    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                data_type: row.get(2)?,
                not_null: row.get(3)?,
                default_value: row.get(4)?,
                pk_position: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(columns)
}

/// Get foreign keys declared on a table, ordered by constraint then column
pub fn get_foreign_keys(
    conn: &Connection,
    table_name: &str,
) -> rusqlite::Result<Vec<ForeignKeyInfo>> {
    let mut stmt = conn.prepare(&format!(
        "PRAGMA foreign_key_list({})",
        quote_ident(table_name)
    ))?;

    let mut fks = stmt
        .query_map([], |row| {
            Ok(ForeignKeyInfo {
                id: row.get(0)?,
                seq: row.get(1)?,
                from_table: table_name.to_string(),
                to_table: row.get(2)?,
                from_column: row.get(3)?,
                to_column: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    fks.sort_by_key(|fk| (fk.id, fk.seq));
    Ok(fks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_composite_foreign_keys_in_order() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE p (a INTEGER, b INTEGER, PRIMARY KEY (a, b));
             CREATE TABLE c (id INTEGER PRIMARY KEY, pa INTEGER, pb INTEGER,
                             FOREIGN KEY (pa, pb) REFERENCES p (a, b));",
        )
        .unwrap();

        assert_eq!(get_tables(&conn).unwrap(), vec!["c", "p"]);

        let fks = get_foreign_keys(&conn, "c").unwrap();
        assert_eq!(fks.len(), 2);
        assert_eq!(fks[0].from_column, "pa");
        assert_eq!(fks[0].to_column.as_deref(), Some("a"));
        assert_eq!(fks[1].from_column, "pb");

        let cols = get_columns(&conn, "p").unwrap();
        assert_eq!(cols[0].pk_position, 1);
        assert_eq!(cols[1].pk_position, 2);
    }

    #[test]
    fn implicit_parent_columns_are_none() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE p (id INTEGER PRIMARY KEY);
             CREATE TABLE c (pid INTEGER REFERENCES p);",
        )
        .unwrap();
        let fks = get_foreign_keys(&conn, "c").unwrap();
        assert_eq!(fks[0].to_column, None);
    }
}
