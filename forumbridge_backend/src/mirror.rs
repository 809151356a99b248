//! One mirroring pass: fetch the feed, post whatever the ledger has not seen,
//! record what was posted.
//!
//! Everything inside a pass runs sequentially. A topic's replies are only
//! attempted once the topic has a thread handle, and replies go out in
//! creation order. Nothing is written to the ledger unless the sink confirmed
//! the post, so failed items are retried by the next pass simply because the
//! ledger still has no record of them.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::database::models::{ReplyMirrorRecord, TopicMirrorRecord};
use crate::feed::{FeedSource, FetchError, Reply, Topic};
use crate::format::{escape_plain, to_chat_markup};
use crate::identity::AvatarDirectory;
use crate::ledger::{Ledger, MirrorLedger};
use crate::sink::{MessageSink, OutboundMessage};
use crate::utils::now_utc_iso;

#[derive(Debug, Error)]
pub enum PassError {
    #[error("failed to fetch feed: {0}")]
    Fetch(#[from] FetchError),
}

#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub pass_id: Uuid,
    pub started_at: String,
    pub finished_at: String,
    pub new_topic_count: usize,
    pub new_reply_count: usize,
    /// Items skipped because the ledger already had them.
    pub already_mirrored_count: usize,
    pub deleted_count: usize,
    pub errors: Vec<String>,
}

impl PassSummary {
    fn start(pass_id: Uuid) -> Self {
        Self {
            pass_id,
            started_at: now_utc_iso(),
            finished_at: String::new(),
            new_topic_count: 0,
            new_reply_count: 0,
            already_mirrored_count: 0,
            deleted_count: 0,
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicOutcome {
    Posted { thread_handle: String },
    AlreadyMirrored { thread_handle: String },
    Failed(String),
}

impl TopicOutcome {
    pub fn thread_handle(&self) -> Option<&str> {
        match self {
            TopicOutcome::Posted { thread_handle }
            | TopicOutcome::AlreadyMirrored { thread_handle } => Some(thread_handle),
            TopicOutcome::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Posted,
    AlreadyMirrored,
    Failed(String),
}

#[derive(Clone)]
pub struct MirrorEngine {
    feed: Arc<dyn FeedSource>,
    ledger: Arc<dyn Ledger>,
    sink: Arc<dyn MessageSink>,
    avatars: Arc<AvatarDirectory>,
}

impl MirrorEngine {
    pub fn new(
        feed: Arc<dyn FeedSource>,
        ledger: Arc<dyn Ledger>,
        sink: Arc<dyn MessageSink>,
        avatars: Arc<AvatarDirectory>,
    ) -> Self {
        Self {
            feed,
            ledger,
            sink,
            avatars,
        }
    }

    /// Runs one full pass. Only a feed failure aborts it; per-item failures
    /// land in [`PassSummary::errors`].
    pub async fn run_pass(&self) -> Result<PassSummary, PassError> {
        let pass_id = Uuid::new_v4();
        let span = tracing::info_span!("mirror_pass", %pass_id);
        self.run_pass_inner(pass_id).instrument(span).await
    }

    async fn run_pass_inner(&self, pass_id: Uuid) -> Result<PassSummary, PassError> {
        let topics = self.feed.fetch().await?;
        let mut summary = PassSummary::start(pass_id);
        tracing::info!(topics = topics.len(), "starting mirror pass");

        for topic in &topics {
            if topic.is_deleted() {
                summary.deleted_count += 1;
                continue;
            }

            let outcome = self.mirror_topic(topic).await;
            let thread_handle = match &outcome {
                TopicOutcome::Posted { thread_handle } => {
                    summary.new_topic_count += 1;
                    thread_handle
                }
                TopicOutcome::AlreadyMirrored { thread_handle } => {
                    summary.already_mirrored_count += 1;
                    thread_handle
                }
                TopicOutcome::Failed(error) => {
                    tracing::warn!(topic_id = %topic.id, error = %error, "topic not mirrored");
                    summary.errors.push(error.clone());
                    continue;
                }
            };

            summary.deleted_count += topic.replies.iter().filter(|r| r.is_deleted()).count();
            for reply in topic.replies_in_order() {
                match self.mirror_reply(topic, reply, thread_handle).await {
                    ReplyOutcome::Posted => summary.new_reply_count += 1,
                    ReplyOutcome::AlreadyMirrored => summary.already_mirrored_count += 1,
                    ReplyOutcome::Failed(error) => {
                        tracing::warn!(
                            topic_id = %topic.id,
                            reply_id = %reply.id,
                            error = %error,
                            "reply not mirrored"
                        );
                        summary.errors.push(error);
                    }
                }
            }
        }

        summary.finished_at = now_utc_iso();
        tracing::info!(
            new_topics = summary.new_topic_count,
            new_replies = summary.new_reply_count,
            already_mirrored = summary.already_mirrored_count,
            errors = summary.errors.len(),
            "mirror pass finished"
        );
        Ok(summary)
    }

    /// Posts the topic as a new thread root unless the ledger already has it.
    pub async fn mirror_topic(&self, topic: &Topic) -> TopicOutcome {
        let ledger = MirrorLedger::new(self.ledger.as_ref());
        match ledger.topic(&topic.id).await {
            Ok(Some(record)) => {
                return TopicOutcome::AlreadyMirrored {
                    thread_handle: record.thread_handle,
                }
            }
            Ok(None) => {}
            Err(err) => {
                return TopicOutcome::Failed(format!(
                    "Could not read ledger for topic \"{}\": {err:#}",
                    topic.subject
                ))
            }
        }

        let message = OutboundMessage {
            text: format!(
                "{}\n\n{}",
                escape_plain(&topic.subject),
                to_chat_markup(&topic.content)
            ),
            thread_anchor: None,
            identity: Some(self.avatars.resolve(&topic.author_name)),
        };
        let posted = match self.sink.post(&message).await {
            Ok(posted) => posted,
            Err(err) => {
                return TopicOutcome::Failed(format!(
                    "Failed to post topic \"{}\": {}",
                    topic.subject, err.reason
                ))
            }
        };

        let record = TopicMirrorRecord {
            thread_handle: posted.message_id,
            mirrored_at: now_utc_iso(),
        };
        if let Err(err) = ledger.record_topic(&topic.id, &record).await {
            // Already visible at the destination; the next pass will post it again.
            return TopicOutcome::Failed(format!(
                "Posted topic \"{}\" but could not record it: {err:#}",
                topic.subject
            ));
        }

        tracing::info!(topic_id = %topic.id, thread = %record.thread_handle, "topic mirrored");
        TopicOutcome::Posted {
            thread_handle: record.thread_handle,
        }
    }

    /// Posts the reply under `thread_handle` unless the ledger already has it.
    pub async fn mirror_reply(
        &self,
        topic: &Topic,
        reply: &Reply,
        thread_handle: &str,
    ) -> ReplyOutcome {
        let ledger = MirrorLedger::new(self.ledger.as_ref());
        match ledger.reply(&reply.id).await {
            Ok(Some(_)) => return ReplyOutcome::AlreadyMirrored,
            Ok(None) => {}
            Err(err) => {
                return ReplyOutcome::Failed(format!(
                    "Could not read ledger for reply by {} on \"{}\": {err:#}",
                    reply.author_name, topic.subject
                ))
            }
        }

        let message = OutboundMessage {
            text: to_chat_markup(&reply.content),
            thread_anchor: Some(thread_handle.to_string()),
            identity: Some(self.avatars.resolve(&reply.author_name)),
        };
        if let Err(err) = self.sink.post(&message).await {
            return ReplyOutcome::Failed(format!(
                "Failed to post reply by {} on \"{}\": {}",
                reply.author_name, topic.subject, err.reason
            ));
        }

        let record = ReplyMirrorRecord {
            mirrored_at: now_utc_iso(),
        };
        if let Err(err) = ledger.record_reply(&reply.id, &record).await {
            return ReplyOutcome::Failed(format!(
                "Posted reply by {} on \"{}\" but could not record it: {err:#}",
                reply.author_name, topic.subject
            ));
        }

        tracing::debug!(topic_id = %topic.id, reply_id = %reply.id, "reply mirrored");
        ReplyOutcome::Posted
    }
}
