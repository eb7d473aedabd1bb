/// User-friendly SQL error formatting
pub fn format_sql_error(error: &rusqlite::Error, statement: &str) -> String {
    match error {
        rusqlite::Error::SqliteFailure(err, Some(msg)) => {
            format_sqlite_error(err.extended_code, msg, statement)
        }
        rusqlite::Error::SqliteFailure(err, None) => {
            format!("SQL error (code {}): SQLite error", err.code as i32)
        }
        rusqlite::Error::InvalidColumnName(name) => {
            format!("Unknown column: '{}'\n\nHint: press 'r' to re-analyse the relations", name)
        }
        rusqlite::Error::InvalidColumnType(_, expected, actual) => {
            format!("Type mismatch: expected {}, got {}", expected, actual)
        }
        rusqlite::Error::QueryReturnedNoRows => "Query returned no rows".to_string(),
        _ => with_statement(format!("SQL error: {}", error), statement),
    }
}

fn format_sqlite_error(code: i32, message: &str, statement: &str) -> String {
    // Primary result code lives in the low byte of the extended code
    let text = match code & 0xff {
        1 => {
            if message.contains("no such table") {
                format!("Table not found: {}", tail(message))
            } else if message.contains("no such column") {
                format!("Column not found: {}", tail(message))
            } else {
                format!("SQL error: {}", message)
            }
        }
        5 => "Database is locked\n\nAnother process is using the database. Try again in a moment."
            .to_string(),
        8 => "Database is opened in read-only mode. Use --read-write to enable editing."
            .to_string(),
        19 => format!("Constraint violation: {}", message),
        _ => format!("SQL error (code {}): {}", code, message),
    };
    with_statement(text, statement)
}

fn tail(message: &str) -> &str {
    message
        .find(": ")
        .map(|start| &message[start + 2..])
        .unwrap_or(message)
}

fn with_statement(text: String, statement: &str) -> String {
    if statement.is_empty() {
        text
    } else {
        format!("{}\n\nStatement: {}", text, truncate_statement(statement))
    }
}

fn truncate_statement(statement: &str) -> String {
    if statement.chars().count() > 100 {
        let kept: String = statement.chars().take(97).collect();
        format!("{}...", kept)
    } else {
        statement.to_string()
    }
}
