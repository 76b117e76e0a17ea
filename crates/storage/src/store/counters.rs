#![forbid(unsafe_code)]

use super::*;
use rusqlite::OptionalExtension;

const MAX_COUNTER_NAME_LEN: usize = 128;

fn normalize_counter_name(raw: &str) -> Result<String, StoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(StoreError::InvalidInput("counter name must not be empty"));
    }
    if raw.len() > MAX_COUNTER_NAME_LEN {
        return Err(StoreError::InvalidInput("counter name is too long"));
    }
    Ok(raw.to_string())
}

fn validate_bounds(min: Option<i64>, max: Option<i64>) -> Result<(), StoreError> {
    if let (Some(min), Some(max)) = (min, max)
        && min > max
    {
        return Err(StoreError::InvalidInput("counter min must be <= max"));
    }
    Ok(())
}

fn clamp_into_bounds(raw: i64, min: Option<i64>, max: Option<i64>) -> (i64, bool) {
    let mut value = raw;
    if let Some(max) = max {
        value = value.min(max);
    }
    if let Some(min) = min {
        value = value.max(min);
    }
    (value, value != raw)
}

fn read_counter_row(row: &rusqlite::Row<'_>) -> Result<CounterRow, rusqlite::Error> {
    Ok(CounterRow {
        name: row.get(0)?,
        value: row.get(1)?,
        min_value: row.get(2)?,
        max_value: row.get(3)?,
        created_at_ms: row.get(4)?,
        updated_at_ms: row.get(5)?,
    })
}

impl SqliteStore {
    /// Bounded atomic add. Creates the counter (previous value 0) on
    /// first use. Bounds given in the request are written through to
    /// the stored row; absent bounds inherit whatever is stored.
    pub fn counter_increment(
        &mut self,
        request: CounterAdjustRequest,
    ) -> Result<CounterAdjustResult, StoreError> {
        let name = normalize_counter_name(&request.name)?;
        validate_bounds(request.min_value, request.max_value)?;
        let now_ms = now_ms();

        let tx = self.conn.transaction()?;

        let existing: Option<(i64, Option<i64>, Option<i64>)> = tx
            .query_row(
                "SELECT value, min_value, max_value FROM counters WHERE name=?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let (previous_value, stored_min, stored_max) = existing.unwrap_or((0, None, None));
        let min_value = request.min_value.or(stored_min);
        let max_value = request.max_value.or(stored_max);
        validate_bounds(min_value, max_value)?;

        let raw = previous_value.saturating_add(request.step);
        let (value, capped) = clamp_into_bounds(raw, min_value, max_value);

        tx.execute(
            r#"
            INSERT INTO counters(name, value, min_value, max_value, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(name) DO UPDATE SET
              value=excluded.value,
              min_value=excluded.min_value,
              max_value=excluded.max_value,
              updated_at_ms=excluded.updated_at_ms
            "#,
            params![name, value, min_value, max_value, now_ms],
        )?;

        tx.commit()?;
        Ok(CounterAdjustResult {
            value,
            previous_value,
            capped,
        })
    }

    pub fn counter_decrement(
        &mut self,
        request: CounterAdjustRequest,
    ) -> Result<CounterAdjustResult, StoreError> {
        self.counter_increment(CounterAdjustRequest {
            step: request.step.checked_neg().unwrap_or(i64::MAX),
            ..request
        })
    }

    pub fn counter_get(&self, name: &str) -> Result<Option<CounterRow>, StoreError> {
        let name = normalize_counter_name(name)?;
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT name, value, min_value, max_value, created_at_ms, updated_at_ms
                FROM counters
                WHERE name=?1
                "#,
                params![name],
                read_counter_row,
            )
            .optional()?)
    }

    /// Unconditional set. Bounds are ignored on purpose so operators can
    /// always get a counter back into range.
    pub fn counter_reset(
        &mut self,
        request: CounterResetRequest,
    ) -> Result<CounterResetResult, StoreError> {
        let name = normalize_counter_name(&request.name)?;
        let now_ms = now_ms();

        let tx = self.conn.transaction()?;

        let previous_value: i64 = tx
            .query_row(
                "SELECT value FROM counters WHERE name=?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);

        tx.execute(
            r#"
            INSERT INTO counters(name, value, min_value, max_value, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, NULL, NULL, ?3, ?3)
            ON CONFLICT(name) DO UPDATE SET
              value=excluded.value,
              updated_at_ms=excluded.updated_at_ms
            "#,
            params![name, request.reset_to, now_ms],
        )?;

        tx.commit()?;
        Ok(CounterResetResult {
            value: request.reset_to,
            previous_value,
        })
    }

    pub fn counter_list(&self) -> Result<Vec<CounterRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT name, value, min_value, max_value, created_at_ms, updated_at_ms
            FROM counters
            ORDER BY name ASC
            "#,
        )?;
        let rows = stmt.query_map([], read_counter_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn counter_delete(&mut self, name: &str) -> Result<bool, StoreError> {
        let name = normalize_counter_name(name)?;
        let deleted = self
            .conn
            .execute("DELETE FROM counters WHERE name=?1", params![name])?;
        Ok(deleted > 0)
    }
}
