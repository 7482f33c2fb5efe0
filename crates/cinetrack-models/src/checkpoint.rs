use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CHECKPOINT_PROFILE: &str = "profile";
pub const CHECKPOINT_LAST_SYNC: &str = "last_sync";
pub const CHECKPOINT_CACHE_ENABLED: &str = "cache_enabled";

/// Singleton settings row, one per key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncCheckpoint {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl SyncCheckpoint {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            value,
            updated_at: Utc::now(),
        }
    }

    pub fn last_sync(at: DateTime<Utc>) -> Self {
        Self {
            key: CHECKPOINT_LAST_SYNC.to_string(),
            value: serde_json::Value::String(at.to_rfc3339()),
            updated_at: at,
        }
    }
}
