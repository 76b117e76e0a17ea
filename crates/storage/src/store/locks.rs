#![forbid(unsafe_code)]

use super::*;
use rusqlite::OptionalExtension;
use uuid::Uuid;

const MAX_LOCK_NAME_LEN: usize = 128;
const MAX_LOCK_TTL_SECONDS: u64 = 86_400; // 24 hours

fn normalize_lock_name(raw: &str) -> Result<String, StoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(StoreError::InvalidInput("lock name must not be empty"));
    }
    if raw.len() > MAX_LOCK_NAME_LEN {
        return Err(StoreError::InvalidInput("lock name is too long"));
    }
    Ok(raw.to_string())
}

fn normalize_lock_token(raw: &str) -> Result<String, StoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(StoreError::InvalidInput("lock token must not be empty"));
    }
    Ok(raw.to_string())
}

fn validate_ttl(ttl_seconds: u64) -> Result<(), StoreError> {
    if ttl_seconds > MAX_LOCK_TTL_SECONDS {
        return Err(StoreError::InvalidInput("lock ttl is too long"));
    }
    Ok(())
}

impl SqliteStore {
    /// TTL mutual exclusion. The returned token is the only proof of
    /// ownership; an expired row counts as absent and is overwritten.
    pub fn lock_acquire(
        &mut self,
        name: &str,
        ttl_seconds: u64,
    ) -> Result<LockAcquireResult, StoreError> {
        let name = normalize_lock_name(name)?;
        validate_ttl(ttl_seconds)?;
        let now_ms = now_ms();
        let expires_at_ms = now_ms.saturating_add(secs_to_ms(ttl_seconds));

        let tx = self.conn.transaction()?;

        let held: Option<i64> = tx
            .query_row(
                "SELECT expires_at_ms FROM locks WHERE name=?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        if held.is_some_and(|expires| expires > now_ms) {
            tx.commit()?;
            return Ok(LockAcquireResult {
                acquired: false,
                token: None,
                expires_at_ms: None,
            });
        }

        let token = Uuid::new_v4().to_string();
        tx.execute(
            r#"
            INSERT INTO locks(name, token, expires_at_ms, created_at_ms)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(name) DO UPDATE SET
              token=excluded.token,
              expires_at_ms=excluded.expires_at_ms,
              created_at_ms=excluded.created_at_ms
            "#,
            params![name, token, expires_at_ms, now_ms],
        )?;

        tx.commit()?;
        Ok(LockAcquireResult {
            acquired: true,
            token: Some(token),
            expires_at_ms: Some(expires_at_ms),
        })
    }

    pub fn lock_check(&self, name: &str) -> Result<LockCheckResult, StoreError> {
        let name = normalize_lock_name(name)?;
        let now_ms = now_ms();

        let expires: Option<i64> = self
            .conn
            .query_row(
                "SELECT expires_at_ms FROM locks WHERE name=?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        match expires {
            Some(expires_at_ms) if expires_at_ms > now_ms => Ok(LockCheckResult {
                locked: true,
                expires_at_ms: Some(expires_at_ms),
            }),
            _ => Ok(LockCheckResult {
                locked: false,
                expires_at_ms: None,
            }),
        }
    }

    /// Renews a live lease. A mismatched token or lapsed lease leaves the
    /// row untouched.
    pub fn lock_extend(&mut self, request: LockExtendRequest) -> Result<LockExtendResult, StoreError> {
        let name = normalize_lock_name(&request.name)?;
        let token = normalize_lock_token(&request.token)?;
        validate_ttl(request.ttl_seconds)?;
        let now_ms = now_ms();
        let expires_at_ms = now_ms.saturating_add(secs_to_ms(request.ttl_seconds));

        let extended = self.conn.execute(
            r#"
            UPDATE locks
            SET expires_at_ms=?3
            WHERE name=?1 AND token=?2 AND expires_at_ms > ?4
            "#,
            params![name, token, expires_at_ms, now_ms],
        )?;

        if extended == 1 {
            Ok(LockExtendResult {
                extended: true,
                expires_at_ms: Some(expires_at_ms),
            })
        } else {
            Ok(LockExtendResult {
                extended: false,
                expires_at_ms: None,
            })
        }
    }

    /// Deletes the row when the token matches. Matching an expired row
    /// still deletes it: the lock is gone either way, and idempotent
    /// cleanup keeps callers simple.
    pub fn lock_release(&mut self, name: &str, token: &str) -> Result<LockReleaseResult, StoreError> {
        let name = normalize_lock_name(name)?;
        let token = normalize_lock_token(token)?;

        let released = self.conn.execute(
            "DELETE FROM locks WHERE name=?1 AND token=?2",
            params![name, token],
        )?;

        Ok(LockReleaseResult {
            released: released == 1,
        })
    }

    pub fn lock_list(&self) -> Result<Vec<LockRow>, StoreError> {
        let now_ms = now_ms();
        let mut stmt = self.conn.prepare(
            r#"
            SELECT name, expires_at_ms, created_at_ms
            FROM locks
            WHERE expires_at_ms > ?1
            ORDER BY name ASC
            "#,
        )?;
        let rows = stmt.query_map(params![now_ms], |row| {
            Ok(LockRow {
                name: row.get(0)?,
                expires_at_ms: row.get(1)?,
                created_at_ms: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
