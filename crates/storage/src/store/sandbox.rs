#![forbid(unsafe_code)]

use super::*;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number as JsonNumber, Value as JsonValue};

const MAX_STATEMENT_LEN: usize = 100_000;
const MAX_QUERY_ROWS: usize = 10_000;

/// Keywords that must not appear anywhere in a sandbox read statement.
/// Word-boundary matching over the uppercased text; a best-effort guard
/// against read statements smuggling side effects, not a SQL parser.
const MUTATION_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "INSERT", "UPDATE", "CREATE", "ALTER", "PRAGMA",
];

fn contains_keyword(upper: &str, keyword: &str) -> bool {
    let bytes = upper.as_bytes();
    let mut from = 0;
    while let Some(found) = upper[from..].find(keyword) {
        let start = from + found;
        let end = start + keyword.len();
        let boundary_before = start == 0 || !is_word_byte(bytes[start - 1]);
        let boundary_after = end == upper.len() || !is_word_byte(bytes[end]);
        if boundary_before && boundary_after {
            return true;
        }
        from = start + 1;
    }
    false
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn normalize_statement(raw: &str) -> Result<&str, StoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidInput("statement must not be empty"));
    }
    if trimmed.len() > MAX_STATEMENT_LEN {
        return Err(StoreError::InvalidInput("statement is too long"));
    }
    Ok(trimmed)
}

fn guard_query_statement(statement: &str) -> Result<(), StoreError> {
    let upper = statement.to_ascii_uppercase();
    if !upper.starts_with("SELECT") || upper.as_bytes().get(6).copied().is_some_and(is_word_byte) {
        return Err(StoreError::ForbiddenStatement("query must be a SELECT"));
    }
    for keyword in MUTATION_KEYWORDS {
        if contains_keyword(&upper, keyword) {
            return Err(StoreError::ForbiddenStatement(
                "query must not contain mutation keywords",
            ));
        }
    }
    Ok(())
}

fn guard_execute_statement(statement: &str) -> Result<(), StoreError> {
    let upper = statement.to_ascii_uppercase();
    if contains_keyword(&upper, "PRAGMA") {
        return Err(StoreError::ForbiddenStatement(
            "pragma statements are not allowed",
        ));
    }
    if contains_keyword(&upper, "DROP") || contains_keyword(&upper, "ALTER") {
        for table in RESERVED_TABLES {
            if contains_keyword(&upper, &table.to_ascii_uppercase()) {
                return Err(StoreError::ForbiddenStatement(
                    "system tables must not be dropped or altered",
                ));
            }
        }
    }
    Ok(())
}

fn bind_params(params: &[JsonValue]) -> Result<Vec<SqlValue>, StoreError> {
    let mut out = Vec::with_capacity(params.len());
    for value in params {
        out.push(match value {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(b) => SqlValue::Integer(*b as i64),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    SqlValue::Real(f)
                } else {
                    return Err(StoreError::InvalidInput("param number is out of range"));
                }
            }
            JsonValue::String(s) => SqlValue::Text(s.clone()),
            JsonValue::Array(_) | JsonValue::Object(_) => {
                return Err(StoreError::InvalidInput("params must be scalar values"));
            }
        });
    }
    Ok(out)
}

fn column_to_json(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(i) => JsonValue::Number(i.into()),
        ValueRef::Real(f) => JsonNumber::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ValueRef::Text(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).into_owned()),
        // Blobs have no JSON shape; surface them as lossy text.
        ValueRef::Blob(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

impl SqliteStore {
    /// Read-only ad-hoc access. The statement is validated before it is
    /// prepared; a rejected statement never touches the engine.
    pub fn sql_query(
        &self,
        statement: &str,
        params: &[JsonValue],
    ) -> Result<SqlQueryResult, StoreError> {
        let statement = normalize_statement(statement)?;
        guard_query_statement(statement)?;
        let bound = bind_params(params)?;

        let mut stmt = self.conn.prepare(statement)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        let column_count = columns.len();

        let mut rows = Vec::new();
        let mut raw_rows = stmt.query(rusqlite::params_from_iter(bound))?;
        while let Some(row) = raw_rows.next()? {
            if rows.len() >= MAX_QUERY_ROWS {
                return Err(StoreError::InvalidInput("query returned too many rows"));
            }
            let mut out = Vec::with_capacity(column_count);
            for index in 0..column_count {
                out.push(column_to_json(row.get_ref(index)?));
            }
            rows.push(out);
        }

        let row_count = rows.len();
        Ok(SqlQueryResult {
            columns,
            rows,
            row_count,
        })
    }

    /// Ad-hoc DDL/DML over user tables. System tables can be read and
    /// even updated, but never dropped or altered.
    pub fn sql_execute(
        &mut self,
        statement: &str,
        params: &[JsonValue],
    ) -> Result<SqlExecuteResult, StoreError> {
        let statement = normalize_statement(statement)?;
        guard_execute_statement(statement)?;
        let bound = bind_params(params)?;

        let rows_affected = self
            .conn
            .execute(statement, rusqlite::params_from_iter(bound))?;

        Ok(SqlExecuteResult {
            success: true,
            rows_affected,
        })
    }

    pub fn sql_schema(&self) -> Result<Vec<TableSchema>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT name, COALESCE(sql, '')
            FROM sqlite_master
            WHERE type='table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TableSchema {
                name: row.get(0)?,
                definition: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
