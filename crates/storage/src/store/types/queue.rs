#![forbid(unsafe_code)]

use serde_json::Value as JsonValue;

#[derive(Clone, Debug)]
pub struct QueuePushRequest {
    pub queue: String,
    pub payload: JsonValue,
    pub priority: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuePushResult {
    pub job_id: i64,
    pub position: i64,
}

#[derive(Clone, Debug)]
pub struct QueuePopRequest {
    pub queue: String,
    pub visibility_seconds: u64,
}

/// `None` when no job is eligible (the "empty" marker).
#[derive(Clone, Debug)]
pub struct PoppedJob {
    pub job_id: i64,
    pub payload: JsonValue,
    pub attempt: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueCompleteResult {
    pub completed: bool,
}

#[derive(Clone, Debug)]
pub struct QueueFailRequest {
    pub job_id: i64,
    pub error: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueFailResult {
    pub failed: bool,
    pub will_retry: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueStatus {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}
