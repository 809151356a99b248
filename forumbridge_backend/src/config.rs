use anyhow::{anyhow, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub api_port: u16,
    pub sync_interval_secs: u64,
    pub paths: BridgePaths,
    pub feed: FeedConfig,
    pub slack: SlackConfig,
    pub avatars_path: Option<PathBuf>,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match non_empty_var("FORUMBRIDGE_HOME") {
            Some(home) => BridgePaths::from_base_dir(home)?,
            None => BridgePaths::discover()?,
        };
        let api_port = env::var("FORUMBRIDGE_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        let sync_interval_secs = env::var("FORUMBRIDGE_SYNC_INTERVAL_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(300);
        let feed = FeedConfig::from_env()?;
        let slack = SlackConfig::from_env()?;
        let avatars_path = non_empty_var("FORUMBRIDGE_AVATARS_PATH").map(PathBuf::from);
        Ok(Self {
            api_port,
            sync_interval_secs,
            paths,
            feed,
            slack,
            avatars_path,
        })
    }

    pub fn new(api_port: u16, paths: BridgePaths, feed: FeedConfig, slack: SlackConfig) -> Self {
        Self {
            api_port,
            sync_interval_secs: 300,
            paths,
            feed,
            slack,
            avatars_path: None,
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub token: Option<String>,
}

impl FeedConfig {
    pub fn from_env() -> Result<Self> {
        let url = required_var("FORUMBRIDGE_FEED_URL")?;
        let token = non_empty_var("FORUMBRIDGE_FEED_TOKEN");
        Ok(Self { url, token })
    }
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub api_base: String,
    pub token: String,
    pub channel: String,
}

impl SlackConfig {
    pub fn from_env() -> Result<Self> {
        let token = required_var("FORUMBRIDGE_SLACK_TOKEN")?;
        let channel = required_var("FORUMBRIDGE_SLACK_CHANNEL")?;
        let api_base = non_empty_var("FORUMBRIDGE_SLACK_API_BASE")
            .unwrap_or_else(|| DEFAULT_SLACK_API_BASE.to_string());
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            channel,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct BridgePaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
}

impl BridgePaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("forumbridge.db");
        Ok(Self {
            base,
            data_dir,
            db_path,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn required_var(name: &str) -> Result<String> {
    non_empty_var(name).ok_or_else(|| anyhow!("{name} must be set"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted_at_base_dir() {
        let paths = BridgePaths::from_base_dir("/srv/forumbridge").expect("paths");
        assert_eq!(paths.data_dir, PathBuf::from("/srv/forumbridge/data"));
        assert_eq!(
            paths.db_path,
            PathBuf::from("/srv/forumbridge/data/forumbridge.db")
        );
    }
}
