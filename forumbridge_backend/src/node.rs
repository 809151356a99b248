use crate::api::{self, AppState};
use crate::bootstrap::{self, BootstrapResources};
use crate::config::BridgeConfig;
use crate::database::Database;
use crate::feed::HttpFeedClient;
use crate::mirror::MirrorEngine;
use crate::scheduler;
use crate::sink::SlackClient;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// Bootstraps persistent state once and wires the mirror engine to the real
/// feed, ledger and Slack clients for whichever entrypoint needs it.
pub struct BridgeNode {
    config: BridgeConfig,
    bootstrap: BootstrapResources,
    engine: MirrorEngine,
}

impl BridgeNode {
    pub async fn start(config: BridgeConfig) -> Result<Self> {
        let bootstrap = bootstrap::initialize(&config).await?;

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("forumbridge/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build shared HTTP client")?;

        let feed = HttpFeedClient::new(config.feed.clone(), http_client.clone());
        let sink = SlackClient::new(config.slack.clone(), http_client);
        let engine = MirrorEngine::new(
            Arc::new(feed),
            Arc::new(bootstrap.database.clone()),
            Arc::new(sink),
            Arc::new(bootstrap.avatars.clone()),
        );

        tracing::info!(
            directories_created = ?bootstrap.directories_created,
            database_initialized = bootstrap.database_initialized,
            avatars = bootstrap.avatars.len(),
            feed_url = %config.feed.url,
            channel = %config.slack.channel,
            "forumbridge node initialized"
        );

        Ok(Self {
            config,
            bootstrap,
            engine,
        })
    }

    /// Runs the REST API and the periodic scheduler until either stops.
    pub async fn run_server(&self) -> Result<()> {
        let state = AppState {
            engine: self.engine.clone(),
            database: self.database(),
        };
        let scheduled = scheduler::run_periodic(self.engine.clone(), self.config.sync_interval());

        tokio::select! {
            result = api::serve_http(state, self.config.api_port) => result,
            _ = scheduled => Ok(()),
        }
    }

    pub fn engine(&self) -> MirrorEngine {
        self.engine.clone()
    }

    pub fn database(&self) -> Database {
        self.bootstrap.database.clone()
    }
}
