//! Domain primitives: TimeMs, SalesCode, OrderNo.

use serde::{Deserialize, Serialize};

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    pub fn as_ms(&self) -> i64 {
        self.0
    }
}

/// Unique code identifying a sales account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SalesCode(pub String);

impl SalesCode {
    pub fn new(code: impl Into<String>) -> Self {
        SalesCode(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SalesCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Externally-facing order number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderNo(pub String);

impl OrderNo {
    pub fn new(no: impl Into<String>) -> Self {
        OrderNo(no.into())
    }

    /// Generate a fresh order number from the creation time and a uuid tail.
    pub fn generate(created_at: TimeMs) -> Self {
        let tail = uuid::Uuid::new_v4().simple().to_string();
        OrderNo(format!("RL{}{}", created_at.as_ms(), &tail[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
