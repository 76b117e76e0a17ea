#![forbid(unsafe_code)]

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockAcquireResult {
    pub acquired: bool,
    pub token: Option<String>,
    pub expires_at_ms: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockCheckResult {
    pub locked: bool,
    pub expires_at_ms: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct LockExtendRequest {
    pub name: String,
    pub token: String,
    pub ttl_seconds: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockExtendResult {
    pub extended: bool,
    pub expires_at_ms: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockReleaseResult {
    pub released: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockRow {
    pub name: String,
    pub expires_at_ms: i64,
    pub created_at_ms: i64,
}
