use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::config::FeedConfig;

/// Top-level conversation item; becomes a thread root at the destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

impl Topic {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Live replies ordered by creation time. Equal timestamps keep feed order.
    pub fn replies_in_order(&self) -> Vec<&Reply> {
        let mut replies: Vec<&Reply> = self.replies.iter().filter(|r| !r.is_deleted()).collect();
        replies.sort_by_key(|reply| reply.created_at);
        replies
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Reply {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("feed returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("feed response could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Anything that can hand out the current snapshot of the conversation feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Topic>, FetchError>;
}

#[derive(Deserialize)]
struct FeedEnvelope {
    topics: Vec<Topic>,
}

/// Accepts `{"topics": [...]}` or a bare array. The shape is picked up front so
/// decode errors point at the offending field.
pub fn parse_feed(body: &str) -> Result<Vec<Topic>, FetchError> {
    if body.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<Topic>>(body).map_err(FetchError::Decode)
    } else {
        serde_json::from_str::<FeedEnvelope>(body)
            .map(|envelope| envelope.topics)
            .map_err(FetchError::Decode)
    }
}

#[derive(Clone)]
pub struct HttpFeedClient {
    config: FeedConfig,
    client: reqwest::Client,
}

impl HttpFeedClient {
    pub fn new(config: FeedConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl FeedSource for HttpFeedClient {
    async fn fetch(&self) -> Result<Vec<Topic>, FetchError> {
        let mut request = self.client.get(&self.config.url);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(FetchError::Transport)?;
        let status = response.status();
        let body = response.text().await.map_err(FetchError::Transport)?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                body: truncate(&body, 200),
            });
        }

        let topics = parse_feed(&body)?;
        tracing::debug!(topics = topics.len(), url = %self.config.url, "fetched feed snapshot");
        Ok(topics)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Unsigned(number) => number.to_string(),
        Id::Signed(number) => number.to_string(),
    })
}
