#![forbid(unsafe_code)]

mod counters;
mod error;
mod locks;
mod queue;
mod records;
mod sandbox;
mod types;

pub use error::StoreError;
pub use queue::{BACKOFF_BASE_MS, BACKOFF_MAX_MS, MAX_ATTEMPTS};
pub use types::*;

use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub(crate) const SCHEMA_VERSION: &str = "v1";
const DB_FILE_NAME: &str = "statecell.db";

/// Tables owned by the store itself. The sandbox refuses to DROP or
/// ALTER any of these.
pub const RESERVED_TABLES: &[&str] = &["counters", "jobs", "locks", "records", "meta"];

/// Embedded store for a single owner identity. The caller (the actor
/// layer) guarantees exclusive, serialized access; nothing in here
/// needs its own locking.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE_NAME);
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;

        install_schema(&conn)?;

        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
          name TEXT PRIMARY KEY,
          value INTEGER NOT NULL,
          min_value INTEGER,
          max_value INTEGER,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS jobs (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          queue TEXT NOT NULL,
          payload_json TEXT NOT NULL,
          priority INTEGER NOT NULL,
          state TEXT NOT NULL,
          attempt INTEGER NOT NULL,
          visible_at_ms INTEGER NOT NULL,
          last_error TEXT,
          created_at_ms INTEGER NOT NULL,
          completed_at_ms INTEGER
        );

        CREATE TABLE IF NOT EXISTS locks (
          name TEXT PRIMARY KEY,
          token TEXT NOT NULL,
          expires_at_ms INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS records (
          key TEXT PRIMARY KEY,
          value_json TEXT NOT NULL,
          meta_json TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_queue_state
          ON jobs(queue, state, priority, id);
        CREATE INDEX IF NOT EXISTS idx_jobs_visible
          ON jobs(queue, visible_at_ms);
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", SCHEMA_VERSION],
    )?;
    Ok(())
}

pub(crate) fn now_ms() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_millis() as i64
}

pub(crate) fn secs_to_ms(seconds: u64) -> i64 {
    seconds.saturating_mul(1_000).min(i64::MAX as u64) as i64
}
