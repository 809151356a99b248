use serde::{Deserialize, Serialize};

/// Raw row of the key/value ledger table.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub key: String,
    pub value: String,
    pub written_at: String,
}

/// Stored under `topic:<id>` once the topic's root message was posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMirrorRecord {
    /// Destination handle every reply of the topic is threaded under.
    pub thread_handle: String,
    pub mirrored_at: String,
}

/// Stored under `reply:<id>`; the value is just the mirroring timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMirrorRecord {
    pub mirrored_at: String,
}
