#![forbid(unsafe_code)]

#[derive(Clone, Debug)]
pub struct CounterRow {
    pub name: String,
    pub value: i64,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct CounterAdjustRequest {
    pub name: String,
    pub step: i64,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterAdjustResult {
    pub value: i64,
    pub previous_value: i64,
    pub capped: bool,
}

#[derive(Clone, Debug)]
pub struct CounterResetRequest {
    pub name: String,
    pub reset_to: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterResetResult {
    pub value: i64,
    pub previous_value: i64,
}
