#![forbid(unsafe_code)]

use super::*;
use rusqlite::OptionalExtension;
use serde_json::Value as JsonValue;

const MAX_RECORD_KEY_LEN: usize = 256;
const MAX_RECORD_VALUE_LEN: usize = 256_000;
const MAX_RECORD_LIST_LIMIT: usize = 200;

fn normalize_record_key(raw: &str) -> Result<String, StoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(StoreError::InvalidInput("record key must not be empty"));
    }
    if raw.len() > MAX_RECORD_KEY_LEN {
        return Err(StoreError::InvalidInput("record key is too long"));
    }
    Ok(raw.to_string())
}

fn decode_record_value(raw: &str) -> Result<JsonValue, StoreError> {
    serde_json::from_str(raw)
        .map_err(|_| StoreError::InvalidInput("stored record value is not valid json"))
}

impl SqliteStore {
    /// Upsert. `created_at_ms` survives updates so the row's age stays
    /// visible, same as lease rows do elsewhere.
    pub fn record_put(&mut self, request: RecordPutRequest) -> Result<RecordRow, StoreError> {
        let key = normalize_record_key(&request.key)?;
        let value_json = request.value.to_string();
        if value_json.len() > MAX_RECORD_VALUE_LEN {
            return Err(StoreError::InvalidInput("record value is too large"));
        }
        let meta_json = request.metadata.as_ref().map(|m| m.to_string());
        let now_ms = now_ms();

        let tx = self.conn.transaction()?;

        let existing_created: Option<i64> = tx
            .query_row(
                "SELECT created_at_ms FROM records WHERE key=?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        let created_at_ms = existing_created.unwrap_or(now_ms);

        tx.execute(
            r#"
            INSERT INTO records(key, value_json, meta_json, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(key) DO UPDATE SET
              value_json=excluded.value_json,
              meta_json=excluded.meta_json,
              updated_at_ms=excluded.updated_at_ms
            "#,
            params![key, value_json, meta_json, created_at_ms, now_ms],
        )?;

        tx.commit()?;
        Ok(RecordRow {
            key,
            value: request.value,
            metadata: request.metadata,
            created_at_ms,
            updated_at_ms: now_ms,
        })
    }

    pub fn record_get(&self, key: &str) -> Result<Option<RecordRow>, StoreError> {
        let key = normalize_record_key(key)?;
        let row: Option<(String, Option<String>, i64, i64)> = self
            .conn
            .query_row(
                r#"
                SELECT value_json, meta_json, created_at_ms, updated_at_ms
                FROM records
                WHERE key=?1
                "#,
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((value_json, meta_json, created_at_ms, updated_at_ms)) = row else {
            return Ok(None);
        };
        Ok(Some(RecordRow {
            key,
            value: decode_record_value(&value_json)?,
            metadata: meta_json.as_deref().map(decode_record_value).transpose()?,
            created_at_ms,
            updated_at_ms,
        }))
    }

    pub fn record_delete(&mut self, key: &str) -> Result<bool, StoreError> {
        let key = normalize_record_key(key)?;
        let deleted = self
            .conn
            .execute("DELETE FROM records WHERE key=?1", params![key])?;
        Ok(deleted > 0)
    }

    pub fn record_list(&self, request: RecordListRequest) -> Result<Vec<RecordRow>, StoreError> {
        let limit = request.limit.clamp(1, MAX_RECORD_LIST_LIMIT);
        let mut stmt = self.conn.prepare(
            r#"
            SELECT key, value_json, meta_json, created_at_ms, updated_at_ms
            FROM records
            ORDER BY key ASC
            LIMIT ?1 OFFSET ?2
            "#,
        )?;

        let mut out = Vec::new();
        let mut rows = stmt.query(params![limit as i64, request.offset as i64])?;
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let value_json: String = row.get(1)?;
            let meta_json: Option<String> = row.get(2)?;
            out.push(RecordRow {
                key,
                value: decode_record_value(&value_json)?,
                metadata: meta_json.as_deref().map(decode_record_value).transpose()?,
                created_at_ms: row.get(3)?,
                updated_at_ms: row.get(4)?,
            });
        }
        Ok(out)
    }
}
