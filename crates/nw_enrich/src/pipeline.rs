//! The per-article enrichment pipeline and the two batch jobs built on it.
//! Each article moves through fetch, date, body text, summary/tags and
//! source strictly in that order; a hard failure at any point skips the
//! article for this run without touching what is already stored.

use futures::stream::{self, StreamExt};
use nw_core::{title_preview, Article, ArticleStore, LanguageModel, NewArticle, Result};
use nw_inference::tasks;
use std::sync::Arc;
use std::time::Duration;

use crate::document::Document;
use crate::extract::{date, image, source, text};
use crate::feeds::{FeedEntry, FeedScanner, FeedsConfig};
use crate::fetcher::{Fetcher, COLLECT_TIMEOUT, ENRICH_TIMEOUT};

/// How long an enrichment claim is honored before a crashed run's articles
/// become claimable again.
pub const CLAIM_LEASE: Duration = Duration::from_secs(15 * 60);

/// Bounded fan-out across articles; publisher sites and the model API both
/// rate-limit.
const MAX_IN_FLIGHT: usize = 4;

/// Stage at which an article dropped out of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Text,
    Summarize,
    Persist,
}

/// Terminal outcome for one article within a run.
#[derive(Debug)]
pub enum Outcome {
    Enriched,
    Skipped { stage: Stage, reason: String },
}

#[derive(Debug, Default)]
pub struct CollectReport {
    pub scanned: usize,
    pub inserted: usize,
    pub existing: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct EnrichReport {
    pub claimed: usize,
    pub enriched: usize,
    pub skipped: usize,
}

pub struct Pipeline {
    store: Arc<dyn ArticleStore>,
    model: Arc<dyn LanguageModel>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn ArticleStore>, model: Arc<dyn LanguageModel>) -> Self {
        Self { store, model }
    }

    /// Collect job: scan the configured feeds and insert one row per new
    /// article, with the publish date and top image extracted up front.
    /// Connectivity failures skip the article; it is not marked failed.
    pub async fn collect(&self, config: &FeedsConfig) -> Result<CollectReport> {
        let scanner = FeedScanner::new(COLLECT_TIMEOUT)?;
        let fetcher = Fetcher::new(COLLECT_TIMEOUT)?;
        let entries = scanner.scan(config).await?;

        let mut report = CollectReport {
            scanned: entries.len(),
            ..Default::default()
        };

        let results: Vec<Result<bool>> = stream::iter(entries)
            .map(|entry| self.collect_entry(&fetcher, entry))
            .buffer_unordered(MAX_IN_FLIGHT)
            .collect()
            .await;

        for result in results {
            match result {
                Ok(true) => report.inserted += 1,
                Ok(false) => report.existing += 1,
                Err(e) => {
                    report.skipped += 1;
                    tracing::warn!(error = %e, "article skipped");
                }
            }
        }
        Ok(report)
    }

    async fn collect_entry(&self, fetcher: &Fetcher, entry: FeedEntry) -> Result<bool> {
        tracing::info!(title = %title_preview(&entry.title), url = %entry.url, "collecting article");
        // The connectivity probe and the extractors share a single fetch.
        let page = fetcher.fetch(&entry.url).await?;
        self.collect_fetched(entry, &page.html).await
    }

    /// Everything after the fetch, separated so tests can feed in HTML.
    pub(crate) async fn collect_fetched(&self, entry: FeedEntry, html: &str) -> Result<bool> {
        let (date_candidate, image_url) = {
            let doc = Document::parse(html);
            (date::candidate(&doc), image::extract(&doc))
        };

        let published_date = match date_candidate {
            Some(raw) => date::resolve(self.model.as_ref(), &raw).await,
            None => None,
        };
        if published_date.is_none() {
            tracing::debug!(url = %entry.url, "no date found");
        }

        let article = NewArticle {
            title: entry.title,
            url: entry.url,
            source: entry.source,
            image_url,
            published_date,
        };
        self.store.insert_article(&article).await
    }

    /// Enrich job: claim a capped batch of unenriched articles and run each
    /// through the body-text / summary / tag chain. One article's failure
    /// never aborts the others, and nothing already enriched is touched.
    pub async fn enrich(&self, limit: u32) -> Result<EnrichReport> {
        let fetcher = Fetcher::new(ENRICH_TIMEOUT)?;
        let articles = self.store.claim_unenriched(limit, CLAIM_LEASE).await?;

        let mut report = EnrichReport {
            claimed: articles.len(),
            ..Default::default()
        };
        tracing::info!(count = report.claimed, "claimed unenriched articles");

        let outcomes: Vec<Outcome> = stream::iter(articles)
            .map(|article| self.enrich_article(&fetcher, article))
            .buffer_unordered(MAX_IN_FLIGHT)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::Enriched => report.enriched += 1,
                Outcome::Skipped { stage, reason } => {
                    report.skipped += 1;
                    tracing::warn!(?stage, reason, "article skipped");
                }
            }
        }
        Ok(report)
    }

    async fn enrich_article(&self, fetcher: &Fetcher, article: Article) -> Outcome {
        tracing::info!(
            id = article.id,
            title = %title_preview(&article.title),
            "enriching article"
        );
        let page = match fetcher.fetch(&article.url).await {
            Ok(page) => page,
            Err(e) => return self.skip(&article, Stage::Fetch, e.to_string()).await,
        };
        self.enrich_fetched(article, &page.html).await
    }

    /// The post-fetch stages, separated so tests can feed in HTML.
    pub(crate) async fn enrich_fetched(&self, article: Article, html: &str) -> Outcome {
        let (date_candidate, site_name, body_text) = {
            let doc = Document::parse(html);
            (
                article
                    .published_date
                    .is_none()
                    .then(|| date::candidate(&doc))
                    .flatten(),
                source::site_name(&doc),
                text::extract(&doc),
            )
        };

        // Fill a missing publish date. A failed patch degrades, it does not
        // abort the enrichment.
        if let Some(raw) = date_candidate {
            if let Some(found) = date::resolve(self.model.as_ref(), &raw).await {
                if let Err(e) = self.store.set_published_date(article.id, found).await {
                    tracing::warn!(id = article.id, error = %e, "failed to set published date");
                }
            }
        }

        if body_text.is_empty() {
            return self
                .skip(&article, Stage::Text, "no body text".to_string())
                .await;
        }

        let (summary, tags) = match tasks::summarize_and_tag(self.model.as_ref(), &body_text).await
        {
            Ok(pair) => pair,
            Err(e) => return self.skip(&article, Stage::Summarize, e.to_string()).await,
        };

        // Fill a missing source label, same best-effort rules as the date.
        if article.source.is_empty() {
            if let Some(found) =
                source::resolve(self.model.as_ref(), site_name, &article.url, &article.title).await
            {
                if let Err(e) = self.store.set_source(article.id, &found).await {
                    tracing::warn!(id = article.id, error = %e, "failed to set source");
                }
            }
        }

        if let Err(e) = self
            .store
            .apply_enrichment(article.id, &body_text, &summary, &tags)
            .await
        {
            return self.skip(&article, Stage::Persist, e.to_string()).await;
        }

        Outcome::Enriched
    }

    /// A skip releases the claim so the next scheduled run picks the article
    /// up again.
    async fn skip(&self, article: &Article, stage: Stage, reason: String) -> Outcome {
        if let Err(e) = self.store.release_claim(article.id).await {
            tracing::warn!(id = article.id, error = %e, "failed to release claim");
        }
        Outcome::Skipped { stage, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use nw_inference::prompts;
    use nw_storage::MemoryStorage;

    /// Scripted model: a canned summary and tag answer, date questions get
    /// a canned date, source questions a canned label.
    struct StubModel {
        summary: &'static str,
        fail_summary: bool,
    }

    impl StubModel {
        fn new() -> Self {
            Self {
                summary: "要約である。",
                fail_summary: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail_summary: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl LanguageModel for StubModel {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
            if prompt.starts_with(prompts::SUMMARY_PREFIX) {
                if self.fail_summary {
                    return Err(nw_core::Error::Inference("model unavailable".to_string()));
                }
                return Ok(self.summary.to_string());
            }
            if prompt.starts_with(prompts::TAGS_PREFIX) {
                return Ok("半導体, TSMC".to_string());
            }
            if prompt.starts_with(prompts::SOURCE_PREFIX) {
                return Ok("Web".to_string());
            }
            Ok("2025-03-01".to_string())
        }
    }

    fn entry(url: &str) -> FeedEntry {
        FeedEntry {
            title: "テスト記事".to_string(),
            url: url.to_string(),
            source: "ITmedia".to_string(),
            category: "tech".to_string(),
        }
    }

    fn pipeline_with(model: StubModel) -> (Pipeline, Arc<MemoryStorage>) {
        let store = Arc::new(MemoryStorage::new());
        let pipeline = Pipeline::new(store.clone(), Arc::new(model));
        (pipeline, store)
    }

    const ARTICLE_HTML: &str = r#"<html>
        <head>
            <meta property="og:image" content="https://cdn.example.com/top.jpg">
            <meta property="og:site_name" content="ITmedia NEWS">
        </head>
        <body><time>2025-03-01</time><p>半導体 の 記事 本文</p></body>
    </html>"#;

    #[tokio::test]
    async fn test_collect_extracts_date_and_image() {
        let (pipeline, store) = pipeline_with(StubModel::new());
        let inserted = pipeline
            .collect_fetched(entry("https://example.com/1"), ARTICLE_HTML)
            .await
            .unwrap();
        assert!(inserted);

        let article = store
            .get_by_url("https://example.com/1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(article.source, "ITmedia");
        assert_eq!(article.published_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(
            article.image_url.as_deref(),
            Some("https://cdn.example.com/top.jpg")
        );
        assert!(!article.metadata_generated);
    }

    #[tokio::test]
    async fn test_collect_twice_inserts_once() {
        let (pipeline, store) = pipeline_with(StubModel::new());
        assert!(pipeline
            .collect_fetched(entry("https://example.com/1"), ARTICLE_HTML)
            .await
            .unwrap());
        assert!(!pipeline
            .collect_fetched(entry("https://example.com/1"), ARTICLE_HTML)
            .await
            .unwrap());
        assert_eq!(store.list_articles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_collect_without_date_inserts_with_none() {
        let (pipeline, store) = pipeline_with(StubModel::new());
        // No date anywhere, and even the model is never consulted without a
        // candidate string to coerce.
        pipeline
            .collect_fetched(
                entry("https://example.com/2"),
                "<html><body><p>no signals</p></body></html>",
            )
            .await
            .unwrap();

        let article = store
            .get_by_url("https://example.com/2")
            .await
            .unwrap()
            .unwrap();
        assert!(article.published_date.is_none());
        assert!(article.image_url.is_none());
    }

    async fn claimed_article(pipeline: &Pipeline, store: &MemoryStorage, url: &str) -> Article {
        pipeline
            .collect_fetched(
                entry(url),
                "<html><body><p>placeholder</p></body></html>",
            )
            .await
            .unwrap();
        store
            .claim_unenriched(1, Duration::from_secs(600))
            .await
            .unwrap()
            .pop()
            .unwrap()
    }

    #[tokio::test]
    async fn test_enrich_happy_path() {
        let (pipeline, store) = pipeline_with(StubModel::new());
        let article = claimed_article(&pipeline, &store, "https://example.com/1").await;

        let outcome = pipeline.enrich_fetched(article, ARTICLE_HTML).await;
        assert!(matches!(outcome, Outcome::Enriched));

        let stored = store
            .get_by_url("https://example.com/1")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.metadata_generated);
        assert_eq!(stored.summary.as_deref(), Some("要約である。"));
        assert_eq!(stored.tags, vec!["半導体", "TSMC"]);
        assert_eq!(stored.content.as_deref(), Some("2025-03-01半導体の記事本文"));
        assert_eq!(stored.published_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert!(stored.claimed_at.is_none());
    }

    #[tokio::test]
    async fn test_empty_body_skips_without_partial_writes() {
        let (pipeline, store) = pipeline_with(StubModel::new());
        let article = claimed_article(&pipeline, &store, "https://example.com/1").await;

        let outcome = pipeline.enrich_fetched(article, "").await;
        assert!(matches!(
            outcome,
            Outcome::Skipped {
                stage: Stage::Text,
                ..
            }
        ));

        let stored = store
            .get_by_url("https://example.com/1")
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.metadata_generated);
        assert!(stored.summary.is_none());
        assert!(stored.tags.is_empty());
        // The claim is released so the next run sees the article again.
        assert!(stored.claimed_at.is_none());
    }

    #[tokio::test]
    async fn test_model_failure_skips_whole_enrichment() {
        let (pipeline, store) = pipeline_with(StubModel::failing());
        let article = claimed_article(&pipeline, &store, "https://example.com/1").await;

        let outcome = pipeline.enrich_fetched(article, ARTICLE_HTML).await;
        assert!(matches!(
            outcome,
            Outcome::Skipped {
                stage: Stage::Summarize,
                ..
            }
        ));

        let stored = store
            .get_by_url("https://example.com/1")
            .await
            .unwrap()
            .unwrap();
        // All-or-nothing: no summary means no tags and no content either.
        assert!(stored.summary.is_none());
        assert!(stored.tags.is_empty());
        assert!(stored.content.is_none());
        assert!(!stored.metadata_generated);
    }

    #[tokio::test]
    async fn test_enrich_fills_missing_source() {
        let (pipeline, store) = pipeline_with(StubModel::new());
        let mut article = claimed_article(&pipeline, &store, "https://example.com/1").await;
        store.set_source(article.id, "").await.unwrap();
        article.source = String::new();

        pipeline.enrich_fetched(article, ARTICLE_HTML).await;

        let stored = store
            .get_by_url("https://example.com/1")
            .await
            .unwrap()
            .unwrap();
        // og:site_name wins before the host or the model get a say.
        assert_eq!(stored.source, "ITmedia NEWS");
    }

    #[tokio::test]
    async fn test_enriched_article_is_never_claimed_again() {
        let (pipeline, store) = pipeline_with(StubModel::new());
        let article = claimed_article(&pipeline, &store, "https://example.com/1").await;
        pipeline.enrich_fetched(article, ARTICLE_HTML).await;

        let claimed = store
            .claim_unenriched(10, Duration::from_secs(0))
            .await
            .unwrap();
        assert!(claimed.is_empty());
    }
}
