#![forbid(unsafe_code)]

use serde_json::Value as JsonValue;

#[derive(Clone, Debug)]
pub struct SqlQueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
    pub row_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqlExecuteResult {
    pub success: bool,
    pub rows_affected: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub definition: String,
}
