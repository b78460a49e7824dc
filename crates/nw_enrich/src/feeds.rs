//! Feed configuration and scanning. The config is a YAML mapping of source
//! name to feed URLs, consumed read-only once per run; the scanner turns it
//! into candidate (title, url) entries for the collect job.

use nw_core::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

fn default_category() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSpec {
    pub url: String,
    #[serde(default = "default_category")]
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub feeds: Vec<FeedSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedsConfig {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

impl FeedsConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| Error::Config(format!("invalid feed config: {}", e)))
    }
}

/// One candidate article out of a feed: where it points and which configured
/// source it belongs to.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub url: String,
    pub source: String,
    pub category: String,
}

/// Parses one feed document into entries. Entries without a link are useless
/// downstream and dropped here; missing titles get a placeholder.
pub fn parse_feed(bytes: &[u8], source_name: &str, category: &str) -> Result<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|e| Error::Extraction(format!("failed to parse feed: {}", e)))?;

    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry.links.first().map(|l| l.href.clone())?;
            Some(FeedEntry {
                title: entry
                    .title
                    .map(|t| t.content)
                    .unwrap_or_else(|| "No Title".to_string()),
                url,
                source: source_name.to_string(),
                category: category.to_string(),
            })
        })
        .collect())
}

pub struct FeedScanner {
    client: reqwest::Client,
}

impl FeedScanner {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Walks every configured feed and yields candidate entries. A feed that
    /// fails to fetch or parse is logged and skipped; it must not take the
    /// rest of the run down with it.
    pub async fn scan(&self, config: &FeedsConfig) -> Result<Vec<FeedEntry>> {
        let mut entries = Vec::new();
        for (source_name, source) in &config.sources {
            for feed in &source.feeds {
                tracing::info!(source = %source_name, url = %feed.url, "scanning feed");
                match self.scan_feed(source_name, feed).await {
                    Ok(mut found) => entries.append(&mut found),
                    Err(e) => tracing::warn!(url = %feed.url, error = %e, "failed to scan feed"),
                }
            }
        }
        Ok(entries)
    }

    async fn scan_feed(&self, source_name: &str, feed: &FeedSpec) -> Result<Vec<FeedEntry>> {
        let bytes = self
            .client
            .get(&feed.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        parse_feed(&bytes, source_name, &feed.category)
    }
}
