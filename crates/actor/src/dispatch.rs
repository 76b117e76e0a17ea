#![forbid(unsafe_code)]

use crate::OwnerHandle;
use sc_storage::{
    CounterAdjustRequest, CounterResetRequest, LockExtendRequest, QueueFailRequest,
    QueuePopRequest, QueuePushRequest, RecordListRequest, RecordPutRequest, SqliteStore,
    StoreError,
};
use serde_json::{Map as JsonMap, Value, json};
use tracing::debug;

/// Every operation name the actor surface understands.
pub const OPERATIONS: &[&str] = &[
    "counterIncrement",
    "counterDecrement",
    "counterGet",
    "counterReset",
    "counterList",
    "counterDelete",
    "queuePush",
    "queuePop",
    "queueComplete",
    "queueFail",
    "queueStatus",
    "lockAcquire",
    "lockCheck",
    "lockExtend",
    "lockRelease",
    "lockList",
    "sqlQuery",
    "sqlExecute",
    "sqlSchema",
    "recordPut",
    "recordGet",
    "recordDelete",
    "recordList",
];

#[derive(Debug)]
pub enum DispatchError {
    UnknownOperation(String),
    InvalidArgs(&'static str),
    NotFound(&'static str),
    Store(StoreError),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownOperation(op) => write!(f, "unknown operation: {op}"),
            Self::InvalidArgs(message) => write!(f, "invalid arguments: {message}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<StoreError> for DispatchError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl OwnerHandle {
    /// Routes a named operation to its typed store method. Argument
    /// parsing happens before the store lock does any work; unknown
    /// operations and malformed arguments never touch storage.
    pub fn dispatch(&self, op: &str, args: &Value) -> Result<Value, DispatchError> {
        let empty = JsonMap::new();
        let args = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(DispatchError::InvalidArgs("arguments must be an object")),
        };

        let result = self.dispatch_inner(op, args);
        if let Err(err) = &result {
            debug!(owner = self.owner().as_str(), op, error = %err, "dispatch rejected");
        }
        result
    }

    fn dispatch_inner(&self, op: &str, args: &JsonMap<String, Value>) -> Result<Value, DispatchError> {
        let mut guard = self.store();
        let store = &mut *guard;
        match op {
            "counterIncrement" => counter_adjust(store, args, false),
            "counterDecrement" => counter_adjust(store, args, true),
            "counterGet" => counter_get(store, args),
            "counterReset" => counter_reset(store, args),
            "counterList" => counter_list(store),
            "counterDelete" => counter_delete(store, args),
            "queuePush" => queue_push(store, args),
            "queuePop" => queue_pop(store, args),
            "queueComplete" => queue_complete(store, args),
            "queueFail" => queue_fail(store, args),
            "queueStatus" => queue_status(store, args),
            "lockAcquire" => lock_acquire(store, args),
            "lockCheck" => lock_check(store, args),
            "lockExtend" => lock_extend(store, args),
            "lockRelease" => lock_release(store, args),
            "lockList" => lock_list(store),
            "sqlQuery" => sql_query(store, args),
            "sqlExecute" => sql_execute(store, args),
            "sqlSchema" => sql_schema(store),
            "recordPut" => record_put(store, args),
            "recordGet" => record_get(store, args),
            "recordDelete" => record_delete(store, args),
            "recordList" => record_list(store, args),
            _ => Err(DispatchError::UnknownOperation(op.to_string())),
        }
    }
}

fn require_str<'a>(
    args: &'a JsonMap<String, Value>,
    key: &str,
    message: &'static str,
) -> Result<&'a str, DispatchError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or(DispatchError::InvalidArgs(message))
}

fn require_i64(
    args: &JsonMap<String, Value>,
    key: &str,
    message: &'static str,
) -> Result<i64, DispatchError> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or(DispatchError::InvalidArgs(message))
}

fn opt_i64(
    args: &JsonMap<String, Value>,
    key: &str,
    message: &'static str,
) -> Result<Option<i64>, DispatchError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or(DispatchError::InvalidArgs(message)),
    }
}

fn require_u64(
    args: &JsonMap<String, Value>,
    key: &str,
    message: &'static str,
) -> Result<u64, DispatchError> {
    args.get(key)
        .and_then(Value::as_u64)
        .ok_or(DispatchError::InvalidArgs(message))
}

fn opt_u64(
    args: &JsonMap<String, Value>,
    key: &str,
    message: &'static str,
) -> Result<Option<u64>, DispatchError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or(DispatchError::InvalidArgs(message)),
    }
}

fn sql_params(args: &JsonMap<String, Value>) -> Result<Vec<Value>, DispatchError> {
    match args.get("params") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(values)) => Ok(values.clone()),
        Some(_) => Err(DispatchError::InvalidArgs("params must be an array")),
    }
}

fn counter_adjust(
    store: &mut SqliteStore,
    args: &JsonMap<String, Value>,
    negate: bool,
) -> Result<Value, DispatchError> {
    let request = CounterAdjustRequest {
        name: require_str(args, "name", "name is required")?.to_string(),
        step: opt_i64(args, "step", "step must be an integer")?.unwrap_or(1),
        min_value: opt_i64(args, "min", "min must be an integer")?,
        max_value: opt_i64(args, "max", "max must be an integer")?,
    };
    let result = if negate {
        store.counter_decrement(request)?
    } else {
        store.counter_increment(request)?
    };
    Ok(json!({
        "value": result.value,
        "previousValue": result.previous_value,
        "capped": result.capped,
    }))
}

fn counter_get(store: &mut SqliteStore, args: &JsonMap<String, Value>) -> Result<Value, DispatchError> {
    let name = require_str(args, "name", "name is required")?;
    let row = store
        .counter_get(name)?
        .ok_or(DispatchError::NotFound("counter"))?;
    Ok(json!({
        "name": row.name,
        "value": row.value,
        "min": row.min_value,
        "max": row.max_value,
        "createdAt": row.created_at_ms,
        "updatedAt": row.updated_at_ms,
    }))
}

fn counter_reset(
    store: &mut SqliteStore,
    args: &JsonMap<String, Value>,
) -> Result<Value, DispatchError> {
    let result = store.counter_reset(CounterResetRequest {
        name: require_str(args, "name", "name is required")?.to_string(),
        reset_to: opt_i64(args, "resetTo", "resetTo must be an integer")?.unwrap_or(0),
    })?;
    Ok(json!({
        "value": result.value,
        "previousValue": result.previous_value,
    }))
}

fn counter_list(store: &mut SqliteStore) -> Result<Value, DispatchError> {
    let rows = store.counter_list()?;
    let counters: Vec<Value> = rows
        .into_iter()
        .map(|row| {
            json!({
                "name": row.name,
                "value": row.value,
                "min": row.min_value,
                "max": row.max_value,
                "updatedAt": row.updated_at_ms,
            })
        })
        .collect();
    Ok(json!({ "counters": counters }))
}

fn counter_delete(
    store: &mut SqliteStore,
    args: &JsonMap<String, Value>,
) -> Result<Value, DispatchError> {
    let name = require_str(args, "name", "name is required")?;
    let deleted = store.counter_delete(name)?;
    Ok(json!({ "deleted": deleted }))
}

fn queue_push(store: &mut SqliteStore, args: &JsonMap<String, Value>) -> Result<Value, DispatchError> {
    let payload = args
        .get("payload")
        .cloned()
        .ok_or(DispatchError::InvalidArgs("payload is required"))?;
    let result = store.queue_push(QueuePushRequest {
        queue: require_str(args, "queue", "queue is required")?.to_string(),
        payload,
        priority: opt_i64(args, "priority", "priority must be an integer")?.unwrap_or(0),
    })?;
    Ok(json!({
        "jobId": result.job_id,
        "position": result.position,
    }))
}

fn queue_pop(store: &mut SqliteStore, args: &JsonMap<String, Value>) -> Result<Value, DispatchError> {
    let result = store.queue_pop(QueuePopRequest {
        queue: require_str(args, "queue", "queue is required")?.to_string(),
        visibility_seconds: require_u64(
            args,
            "visibilitySeconds",
            "visibilitySeconds must be a non-negative integer",
        )?,
    })?;
    match result {
        Some(job) => Ok(json!({
            "jobId": job.job_id,
            "payload": job.payload,
            "attempt": job.attempt,
        })),
        None => Ok(json!({ "empty": true })),
    }
}

fn queue_complete(
    store: &mut SqliteStore,
    args: &JsonMap<String, Value>,
) -> Result<Value, DispatchError> {
    let job_id = require_i64(args, "jobId", "jobId is required")?;
    let result = store.queue_complete(job_id)?;
    Ok(json!({ "completed": result.completed }))
}

fn queue_fail(store: &mut SqliteStore, args: &JsonMap<String, Value>) -> Result<Value, DispatchError> {
    let result = store.queue_fail(QueueFailRequest {
        job_id: require_i64(args, "jobId", "jobId is required")?,
        error: require_str(args, "error", "error is required")?.to_string(),
    })?;
    Ok(json!({
        "failed": result.failed,
        "willRetry": result.will_retry,
    }))
}

fn queue_status(
    store: &mut SqliteStore,
    args: &JsonMap<String, Value>,
) -> Result<Value, DispatchError> {
    let queue = require_str(args, "queue", "queue is required")?;
    let status = store.queue_status(queue)?;
    Ok(json!({
        "pending": status.pending,
        "processing": status.processing,
        "completed": status.completed,
        "failed": status.failed,
    }))
}

fn lock_acquire(
    store: &mut SqliteStore,
    args: &JsonMap<String, Value>,
) -> Result<Value, DispatchError> {
    let name = require_str(args, "name", "name is required")?;
    let ttl = require_u64(args, "ttlSeconds", "ttlSeconds must be a non-negative integer")?;
    let result = store.lock_acquire(name, ttl)?;
    if result.acquired {
        Ok(json!({
            "acquired": true,
            "token": result.token,
            "expiresAt": result.expires_at_ms,
        }))
    } else {
        Ok(json!({ "acquired": false }))
    }
}

fn lock_check(store: &mut SqliteStore, args: &JsonMap<String, Value>) -> Result<Value, DispatchError> {
    let name = require_str(args, "name", "name is required")?;
    let result = store.lock_check(name)?;
    if result.locked {
        Ok(json!({ "locked": true, "expiresAt": result.expires_at_ms }))
    } else {
        Ok(json!({ "locked": false }))
    }
}

fn lock_extend(
    store: &mut SqliteStore,
    args: &JsonMap<String, Value>,
) -> Result<Value, DispatchError> {
    let result = store.lock_extend(LockExtendRequest {
        name: require_str(args, "name", "name is required")?.to_string(),
        token: require_str(args, "token", "token is required")?.to_string(),
        ttl_seconds: require_u64(args, "ttlSeconds", "ttlSeconds must be a non-negative integer")?,
    })?;
    if result.extended {
        Ok(json!({ "extended": true, "expiresAt": result.expires_at_ms }))
    } else {
        Ok(json!({ "extended": false }))
    }
}

fn lock_release(
    store: &mut SqliteStore,
    args: &JsonMap<String, Value>,
) -> Result<Value, DispatchError> {
    let name = require_str(args, "name", "name is required")?;
    let token = require_str(args, "token", "token is required")?;
    let result = store.lock_release(name, token)?;
    Ok(json!({ "released": result.released }))
}

fn lock_list(store: &mut SqliteStore) -> Result<Value, DispatchError> {
    let rows = store.lock_list()?;
    let locks: Vec<Value> = rows
        .into_iter()
        .map(|row| {
            json!({
                "name": row.name,
                "expiresAt": row.expires_at_ms,
                "createdAt": row.created_at_ms,
            })
        })
        .collect();
    Ok(json!({ "locks": locks }))
}

fn sql_query(store: &mut SqliteStore, args: &JsonMap<String, Value>) -> Result<Value, DispatchError> {
    let statement = require_str(args, "statement", "statement is required")?;
    let params = sql_params(args)?;
    let result = store.sql_query(statement, &params)?;
    Ok(json!({
        "columns": result.columns,
        "rows": result.rows,
        "rowCount": result.row_count,
    }))
}

fn sql_execute(
    store: &mut SqliteStore,
    args: &JsonMap<String, Value>,
) -> Result<Value, DispatchError> {
    let statement = require_str(args, "statement", "statement is required")?;
    let params = sql_params(args)?;
    let result = store.sql_execute(statement, &params)?;
    Ok(json!({
        "success": result.success,
        "rowsAffected": result.rows_affected,
    }))
}

fn sql_schema(store: &mut SqliteStore) -> Result<Value, DispatchError> {
    let tables = store.sql_schema()?;
    let tables: Vec<Value> = tables
        .into_iter()
        .map(|table| json!({ "name": table.name, "definition": table.definition }))
        .collect();
    Ok(json!({ "tables": tables }))
}

fn record_put(store: &mut SqliteStore, args: &JsonMap<String, Value>) -> Result<Value, DispatchError> {
    let value = args
        .get("value")
        .cloned()
        .ok_or(DispatchError::InvalidArgs("value is required"))?;
    let metadata = match args.get("metadata") {
        None | Some(Value::Null) => None,
        Some(metadata) => Some(metadata.clone()),
    };
    let row = store.record_put(RecordPutRequest {
        key: require_str(args, "key", "key is required")?.to_string(),
        value,
        metadata,
    })?;
    Ok(record_row_json(row))
}

fn record_get(store: &mut SqliteStore, args: &JsonMap<String, Value>) -> Result<Value, DispatchError> {
    let key = require_str(args, "key", "key is required")?;
    let row = store
        .record_get(key)?
        .ok_or(DispatchError::NotFound("record"))?;
    Ok(record_row_json(row))
}

fn record_delete(
    store: &mut SqliteStore,
    args: &JsonMap<String, Value>,
) -> Result<Value, DispatchError> {
    let key = require_str(args, "key", "key is required")?;
    let deleted = store.record_delete(key)?;
    Ok(json!({ "deleted": deleted }))
}

fn record_list(
    store: &mut SqliteStore,
    args: &JsonMap<String, Value>,
) -> Result<Value, DispatchError> {
    let limit = opt_u64(args, "limit", "limit must be a non-negative integer")?.unwrap_or(50);
    let offset = opt_u64(args, "offset", "offset must be a non-negative integer")?.unwrap_or(0);
    let rows = store.record_list(RecordListRequest {
        limit: limit as usize,
        offset: offset as usize,
    })?;
    let records: Vec<Value> = rows.into_iter().map(record_row_json).collect();
    Ok(json!({ "records": records }))
}

fn record_row_json(row: sc_storage::RecordRow) -> Value {
    json!({
        "key": row.key,
        "value": row.value,
        "metadata": row.metadata,
        "createdAt": row.created_at_ms,
        "updatedAt": row.updated_at_ms,
    })
}
