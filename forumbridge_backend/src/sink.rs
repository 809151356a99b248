use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SlackConfig;
use crate::identity::PostingIdentity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    /// Handle of the thread root to reply under; `None` starts a new thread.
    pub thread_anchor: Option<String>,
    pub identity: Option<PostingIdentity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub message_id: String,
}

#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct PostError {
    pub reason: String,
}

impl PostError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Destination chat platform.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn post(&self, message: &OutboundMessage) -> Result<PostedMessage, PostError>;
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_url: Option<&'a str>,
    unfurl_links: bool,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Posts through Slack's `chat.postMessage` Web API method.
#[derive(Clone)]
pub struct SlackClient {
    config: SlackConfig,
    client: reqwest::Client,
}

impl SlackClient {
    pub fn new(config: SlackConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl MessageSink for SlackClient {
    async fn post(&self, message: &OutboundMessage) -> Result<PostedMessage, PostError> {
        let url = format!("{}/chat.postMessage", self.config.api_base);
        let identity = message.identity.as_ref();
        let request = PostMessageRequest {
            channel: &self.config.channel,
            text: &message.text,
            thread_ts: message.thread_anchor.as_deref(),
            username: identity
                .map(|identity| identity.display_name.trim())
                .filter(|name| !name.is_empty()),
            icon_url: identity.and_then(|identity| identity.icon_url.as_deref()),
            unfurl_links: false,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.token)
            .json(&request)
            .send()
            .await
            .map_err(|err| PostError::new(format!("request to Slack failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PostError::new(format!("Slack returned {status}: {body}")));
        }

        let payload: PostMessageResponse = response
            .json()
            .await
            .map_err(|err| PostError::new(format!("unreadable Slack response: {err}")))?;

        match (payload.ok, payload.ts) {
            (true, Some(ts)) => Ok(PostedMessage { message_id: ts }),
            (true, None) => Err(PostError::new("Slack accepted the message without a ts")),
            (false, _) => Err(PostError::new(
                payload.error.unwrap_or_else(|| "unknown_error".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_absent_thread_and_identity() {
        let request = PostMessageRequest {
            channel: "C123",
            text: "hello",
            thread_ts: None,
            username: None,
            icon_url: None,
            unfurl_links: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"channel": "C123", "text": "hello", "unfurl_links": false})
        );
    }

    #[test]
    fn error_response_decodes() {
        let payload: PostMessageResponse =
            serde_json::from_str(r#"{"ok": false, "error": "channel_not_found"}"#).unwrap();
        assert!(!payload.ok);
        assert_eq!(payload.error.as_deref(), Some("channel_not_found"));
        assert!(payload.ts.is_none());
    }
}
