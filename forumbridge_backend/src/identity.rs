use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Who a mirrored message should appear to come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostingIdentity {
    pub display_name: String,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AvatarFile {
    #[serde(default, rename = "avatar")]
    avatars: Vec<AvatarEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct AvatarEntry {
    name: String,
    url: String,
}

/// Ordered name → icon URL table. Built once at start-up and never mutated.
#[derive(Debug, Clone, Default)]
pub struct AvatarDirectory {
    entries: Vec<(String, String)>,
}

impl AvatarDirectory {
    pub fn new<I, N, U>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, U)>,
        N: Into<String>,
        U: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, url)| (name.into(), url.into()))
                .collect(),
        }
    }

    /// Parses a TOML document of `[[avatar]]` tables, keeping file order.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let file: AvatarFile = toml::from_str(raw).context("failed to parse avatar table")?;
        Ok(Self::new(
            file.avatars.into_iter().map(|entry| (entry.name, entry.url)),
        ))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read avatar table {}", path.display()))?;
        Self::from_toml(&raw)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Exact match first, then a case-insensitive substring match in either
    /// direction. The first matching entry in table order wins.
    pub fn icon_for(&self, author: &str) -> Option<&str> {
        if let Some((_, url)) = self.entries.iter().find(|(name, _)| name == author) {
            return Some(url);
        }

        // An empty needle is a substring of everything.
        let needle = author.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(name, _)| {
                let name = name.to_lowercase();
                !name.is_empty() && (name.contains(&needle) || needle.contains(&name))
            })
            .map(|(_, url)| url.as_str())
    }

    pub fn resolve(&self, author: &str) -> PostingIdentity {
        PostingIdentity {
            display_name: author.to_string(),
            icon_url: self.icon_for(author).map(str::to_string),
        }
    }
}
