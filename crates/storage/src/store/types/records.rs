#![forbid(unsafe_code)]

use serde_json::Value as JsonValue;

#[derive(Clone, Debug)]
pub struct RecordPutRequest {
    pub key: String,
    pub value: JsonValue,
    pub metadata: Option<JsonValue>,
}

#[derive(Clone, Debug)]
pub struct RecordRow {
    pub key: String,
    pub value: JsonValue,
    pub metadata: Option<JsonValue>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct RecordListRequest {
    pub limit: usize,
    pub offset: usize,
}
