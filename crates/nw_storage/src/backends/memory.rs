use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use nw_core::{Article, ArticleStore, NewArticle, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory article store. Backs tests and dry runs; everything is gone
/// when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    articles: Vec<Article>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            articles: Vec::new(),
            next_id: 1,
        }
    }

    fn insert_article(&mut self, new: &NewArticle) -> bool {
        if self.articles.iter().any(|a| a.url == new.url) {
            return false;
        }
        let now = Utc::now();
        self.articles.push(Article {
            id: self.next_id,
            title: new.title.clone(),
            url: new.url.clone(),
            source: new.source.clone(),
            image_url: new.image_url.clone(),
            published_date: new.published_date,
            content: None,
            summary: None,
            tags: Vec::new(),
            metadata_generated: false,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        });
        self.next_id += 1;
        true
    }

    fn claim_unenriched(&mut self, limit: u32, lease: Duration) -> Vec<Article> {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::MAX);

        let mut candidates: Vec<usize> = self
            .articles
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.metadata_generated)
            .filter(|(_, a)| a.claimed_at.map_or(true, |t| t + lease <= now))
            .map(|(i, _)| i)
            .collect();
        candidates.sort_by(|&a, &b| {
            self.articles[b]
                .created_at
                .cmp(&self.articles[a].created_at)
        });
        candidates.truncate(limit as usize);

        let mut claimed = Vec::with_capacity(candidates.len());
        for i in candidates {
            self.articles[i].claimed_at = Some(now);
            claimed.push(self.articles[i].clone());
        }
        claimed
    }

    fn find_mut(&mut self, id: i64) -> Result<&mut Article> {
        self.articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| nw_core::Error::Storage(format!("no article with id {}", id)))
    }
}

pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::new())),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    async fn insert_article(&self, article: &NewArticle) -> Result<bool> {
        let mut store = self.store.write().await;
        Ok(store.insert_article(article))
    }

    async fn claim_unenriched(&self, limit: u32, lease: Duration) -> Result<Vec<Article>> {
        let mut store = self.store.write().await;
        Ok(store.claim_unenriched(limit, lease))
    }

    async fn release_claim(&self, id: i64) -> Result<()> {
        let mut store = self.store.write().await;
        store.find_mut(id)?.claimed_at = None;
        Ok(())
    }

    async fn set_published_date(&self, id: i64, date: NaiveDate) -> Result<()> {
        let mut store = self.store.write().await;
        let article = store.find_mut(id)?;
        article.published_date = Some(date);
        article.updated_at = Utc::now();
        Ok(())
    }

    async fn set_source(&self, id: i64, source: &str) -> Result<()> {
        let mut store = self.store.write().await;
        let article = store.find_mut(id)?;
        article.source = source.to_string();
        article.updated_at = Utc::now();
        Ok(())
    }

    async fn apply_enrichment(
        &self,
        id: i64,
        content: &str,
        summary: &str,
        tags: &[String],
    ) -> Result<()> {
        let mut store = self.store.write().await;
        let article = store.find_mut(id)?;
        if article.metadata_generated {
            tracing::warn!(id, "article is already enriched; leaving it untouched");
            return Ok(());
        }
        article.content = Some(content.to_string());
        article.summary = Some(summary.to_string());
        article.tags = tags.to_vec();
        article.metadata_generated = true;
        article.claimed_at = None;
        article.updated_at = Utc::now();
        Ok(())
    }

    async fn list_articles(&self) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        let mut articles = store.articles.clone();
        articles.sort_by_key(|a| a.id);
        Ok(articles)
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<Article>> {
        let store = self.store.read().await;
        Ok(store.articles.iter().find(|a| a.url == url).cloned())
    }

    async fn delete_articles(&self, ids: &[i64]) -> Result<u64> {
        let mut store = self.store.write().await;
        let before = store.articles.len();
        store.articles.retain(|a| !ids.contains(&a.id));
        Ok((before - store.articles.len()) as u64)
    }

    async fn relabel_source(&self, prefix: &str, canonical: &str) -> Result<u64> {
        let mut store = self.store.write().await;
        let now = Utc::now();
        let mut updated = 0;
        for article in store
            .articles
            .iter_mut()
            .filter(|a| a.source.starts_with(prefix) && a.source != canonical)
        {
            article.source = canonical.to_string();
            article.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    async fn source_counts(&self) -> Result<Vec<(String, i64)>> {
        let store = self.store.read().await;
        let mut counts = std::collections::HashMap::new();
        for article in &store.articles {
            *counts.entry(article.source.clone()).or_insert(0i64) += 1;
        }
        let mut counts: Vec<(String, i64)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(counts)
    }
}
