#![forbid(unsafe_code)]

use super::*;
use rusqlite::OptionalExtension;
use sc_core::model::JobState;
use serde_json::Value as JsonValue;

const MAX_QUEUE_NAME_LEN: usize = 128;
const MAX_ERROR_LEN: usize = 2_000;
const MAX_PAYLOAD_LEN: usize = 256_000;
const MAX_VISIBILITY_SECONDS: u64 = 86_400; // 24 hours

/// Retry policy: a job gets MAX_ATTEMPTS deliveries in total. Each
/// failed attempt delays redelivery exponentially, starting at
/// BACKOFF_BASE_MS and capped at BACKOFF_MAX_MS.
pub const MAX_ATTEMPTS: i64 = 3;
pub const BACKOFF_BASE_MS: i64 = 5_000;
pub const BACKOFF_MAX_MS: i64 = 300_000;

fn normalize_queue_name(raw: &str) -> Result<String, StoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(StoreError::InvalidInput("queue name must not be empty"));
    }
    if raw.len() > MAX_QUEUE_NAME_LEN {
        return Err(StoreError::InvalidInput("queue name is too long"));
    }
    Ok(raw.to_string())
}

fn normalize_error_message(raw: &str) -> String {
    raw.trim().chars().take(MAX_ERROR_LEN).collect()
}

fn retry_backoff_ms(attempt: i64) -> i64 {
    let shift = attempt.saturating_sub(1).clamp(0, 16) as u32;
    BACKOFF_BASE_MS
        .saturating_mul(1i64 << shift)
        .min(BACKOFF_MAX_MS)
}

impl SqliteStore {
    pub fn queue_push(&mut self, request: QueuePushRequest) -> Result<QueuePushResult, StoreError> {
        let queue = normalize_queue_name(&request.queue)?;
        let payload_json = request.payload.to_string();
        if payload_json.len() > MAX_PAYLOAD_LEN {
            return Err(StoreError::InvalidInput("job payload is too large"));
        }
        let now_ms = now_ms();

        let tx = self.conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO jobs(queue, payload_json, priority, state, attempt, visible_at_ms, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
            "#,
            params![
                queue,
                payload_json,
                request.priority,
                JobState::Pending.as_str(),
                now_ms
            ],
        )?;
        let job_id = tx.last_insert_rowid();

        // Generation order within the queue. Jobs are never deleted, so
        // the count of ids up to ours is stable.
        let position: i64 = tx.query_row(
            "SELECT COUNT(*) FROM jobs WHERE queue=?1 AND id<=?2",
            params![queue, job_id],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(QueuePushResult { job_id, position })
    }

    /// Leases the most urgent eligible job: highest priority first, then
    /// oldest id. Eligible means a pending job whose visibility delay has
    /// passed, or a processing job whose lease lapsed (crash recovery —
    /// the job is simply redelivered, attempt count intact and growing).
    pub fn queue_pop(&mut self, request: QueuePopRequest) -> Result<Option<PoppedJob>, StoreError> {
        let queue = normalize_queue_name(&request.queue)?;
        if request.visibility_seconds > MAX_VISIBILITY_SECONDS {
            return Err(StoreError::InvalidInput("visibility timeout is too long"));
        }
        let now_ms = now_ms();
        let visible_at_ms = now_ms.saturating_add(secs_to_ms(request.visibility_seconds));

        let tx = self.conn.transaction()?;

        let candidate: Option<(i64, String, i64)> = tx
            .query_row(
                r#"
                SELECT id, payload_json, attempt
                FROM jobs
                WHERE queue=?1
                  AND state IN (?2, ?3)
                  AND visible_at_ms <= ?4
                ORDER BY priority DESC, id ASC
                LIMIT 1
                "#,
                params![
                    queue,
                    JobState::Pending.as_str(),
                    JobState::Processing.as_str(),
                    now_ms
                ],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((job_id, payload_json, attempt)) = candidate else {
            tx.commit()?;
            return Ok(None);
        };

        let next_attempt = attempt + 1;
        tx.execute(
            r#"
            UPDATE jobs
            SET state=?2, attempt=?3, visible_at_ms=?4
            WHERE id=?1
            "#,
            params![job_id, JobState::Processing.as_str(), next_attempt, visible_at_ms],
        )?;

        tx.commit()?;

        let payload: JsonValue = serde_json::from_str(&payload_json)
            .map_err(|_| StoreError::InvalidInput("stored job payload is not valid json"))?;

        Ok(Some(PoppedJob {
            job_id,
            payload,
            attempt: next_attempt,
        }))
    }

    /// Terminal success. A lapsed lease does not block completion: the
    /// original worker finishing late still wins if nobody re-popped and
    /// finished first (at-least-once delivery, consumers are idempotent).
    pub fn queue_complete(&mut self, job_id: i64) -> Result<QueueCompleteResult, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        let state = job_state_tx(&tx, job_id)?;
        if state != JobState::Processing {
            tx.commit()?;
            return Ok(QueueCompleteResult { completed: false });
        }

        tx.execute(
            r#"
            UPDATE jobs
            SET state=?2, completed_at_ms=?3
            WHERE id=?1 AND state=?4
            "#,
            params![
                job_id,
                JobState::Completed.as_str(),
                now_ms,
                JobState::Processing.as_str()
            ],
        )?;

        tx.commit()?;
        Ok(QueueCompleteResult { completed: true })
    }

    /// Failed attempt. Under the attempt budget the job goes back to
    /// pending with an exponential redelivery delay; over budget it is
    /// terminally failed. Terminal jobs report `failed=false`.
    pub fn queue_fail(&mut self, request: QueueFailRequest) -> Result<QueueFailResult, StoreError> {
        let error = normalize_error_message(&request.error);
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        let job_id = request.job_id;
        let (state, attempt) = job_state_attempt_tx(&tx, job_id)?;
        if state != JobState::Processing {
            tx.commit()?;
            return Ok(QueueFailResult {
                failed: false,
                will_retry: false,
            });
        }

        let will_retry = attempt < MAX_ATTEMPTS;
        if will_retry {
            let visible_at_ms = now_ms.saturating_add(retry_backoff_ms(attempt));
            tx.execute(
                r#"
                UPDATE jobs
                SET state=?2, visible_at_ms=?3, last_error=?4
                WHERE id=?1
                "#,
                params![job_id, JobState::Pending.as_str(), visible_at_ms, error],
            )?;
        } else {
            tx.execute(
                r#"
                UPDATE jobs
                SET state=?2, last_error=?3, completed_at_ms=?4
                WHERE id=?1
                "#,
                params![job_id, JobState::Failed.as_str(), error, now_ms],
            )?;
        }

        tx.commit()?;
        Ok(QueueFailResult {
            failed: true,
            will_retry,
        })
    }

    /// Counts by state. A processing job whose lease already lapsed is
    /// redeliverable, so it is reported under `pending`; `processing`
    /// only counts live leases.
    pub fn queue_status(&self, queue: &str) -> Result<QueueStatus, StoreError> {
        let queue = normalize_queue_name(queue)?;
        let now_ms = now_ms();

        let mut stmt = self.conn.prepare(
            r#"
            SELECT
              COALESCE(SUM(CASE WHEN state='pending'
                                  OR (state='processing' AND visible_at_ms <= ?2)
                           THEN 1 ELSE 0 END), 0) AS pending,
              COALESCE(SUM(CASE WHEN state='processing' AND visible_at_ms > ?2
                           THEN 1 ELSE 0 END), 0) AS processing,
              COALESCE(SUM(CASE WHEN state='completed' THEN 1 ELSE 0 END), 0) AS completed,
              COALESCE(SUM(CASE WHEN state='failed' THEN 1 ELSE 0 END), 0) AS failed
            FROM jobs
            WHERE queue=?1
            "#,
        )?;
        let (pending, processing, completed, failed) =
            stmt.query_row(params![queue, now_ms], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?;

        Ok(QueueStatus {
            pending: pending.max(0) as u64,
            processing: processing.max(0) as u64,
            completed: completed.max(0) as u64,
            failed: failed.max(0) as u64,
        })
    }
}

fn job_state_tx(tx: &rusqlite::Transaction<'_>, job_id: i64) -> Result<JobState, StoreError> {
    let (state, _) = job_state_attempt_tx(tx, job_id)?;
    Ok(state)
}

fn job_state_attempt_tx(
    tx: &rusqlite::Transaction<'_>,
    job_id: i64,
) -> Result<(JobState, i64), StoreError> {
    let row: Option<(String, i64)> = tx
        .query_row(
            "SELECT state, attempt FROM jobs WHERE id=?1",
            params![job_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((state, attempt)) = row else {
        return Err(StoreError::UnknownJob { job_id });
    };
    let state = JobState::parse(&state)
        .ok_or(StoreError::InvalidInput("stored job state is invalid"))?;
    Ok((state, attempt))
}
