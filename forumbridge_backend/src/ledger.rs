//! Durable record of what has already been mirrored.
//!
//! The ledger is a plain string key/value store. Topic and reply records live
//! under disjoint key prefixes so an id shared between a topic and a reply can
//! never collide.

use crate::database::models::{ReplyMirrorRecord, TopicMirrorRecord};
use crate::database::repositories::LedgerRepository;
use crate::database::Database;
use crate::utils::now_utc_iso;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

pub const TOPIC_PREFIX: &str = "topic:";
pub const REPLY_PREFIX: &str = "reply:";

pub fn topic_key(topic_id: &str) -> String {
    format!("{TOPIC_PREFIX}{topic_id}")
}

pub fn reply_key(reply_id: &str) -> String {
    format!("{REPLY_PREFIX}{reply_id}")
}

/// Key/value store the mirror engine reads and writes.
///
/// No compare-and-set is offered: callers read, act, then write.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

#[async_trait]
impl Ledger for Database {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_repositories(|repos| repos.ledger().get(key))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let written_at = now_utc_iso();
        let inserted =
            self.with_repositories(|repos| repos.ledger().insert(key, value, &written_at))?;
        if !inserted {
            tracing::warn!(key, "ledger key already present, keeping the first record");
        }
        Ok(())
    }
}

/// Typed accessors over any [`Ledger`].
pub struct MirrorLedger<'a> {
    inner: &'a dyn Ledger,
}

impl<'a> MirrorLedger<'a> {
    pub fn new(inner: &'a dyn Ledger) -> Self {
        Self { inner }
    }

    pub async fn topic(&self, topic_id: &str) -> Result<Option<TopicMirrorRecord>> {
        let Some(raw) = self.inner.get(&topic_key(topic_id)).await? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt ledger record for topic {topic_id}"))?;
        Ok(Some(record))
    }

    pub async fn record_topic(&self, topic_id: &str, record: &TopicMirrorRecord) -> Result<()> {
        let value = serde_json::to_string(record).context("failed to encode topic record")?;
        self.inner.put(&topic_key(topic_id), &value).await
    }

    pub async fn reply(&self, reply_id: &str) -> Result<Option<ReplyMirrorRecord>> {
        let record = self
            .inner
            .get(&reply_key(reply_id))
            .await?
            .map(|mirrored_at| ReplyMirrorRecord { mirrored_at });
        Ok(record)
    }

    pub async fn record_reply(&self, reply_id: &str, record: &ReplyMirrorRecord) -> Result<()> {
        self.inner
            .put(&reply_key(reply_id), &record.mirrored_at)
            .await
    }
}

/// Process-local ledger; nothing survives the process.
#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory ledger mutex poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory ledger mutex poisoned"))?;
        entries
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
        Ok(())
    }
}
