use crate::types::{Article, NewArticle};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert a newly collected article. A URL conflict is a silent no-op;
    /// returns false when the record already existed.
    async fn insert_article(&self, article: &NewArticle) -> Result<bool>;

    /// Claim up to `limit` unenriched articles for this run, newest first.
    /// Rows with a live claim younger than `lease` are skipped, so two
    /// concurrent runs never hand out the same article.
    async fn claim_unenriched(&self, limit: u32, lease: Duration) -> Result<Vec<Article>>;

    /// Release a claim without enriching; the article stays eligible for the
    /// next run.
    async fn release_claim(&self, id: i64) -> Result<()>;

    /// Patch the published date of a single article.
    async fn set_published_date(&self, id: i64, date: NaiveDate) -> Result<()>;

    /// Patch the source label of a single article.
    async fn set_source(&self, id: i64, source: &str) -> Result<()>;

    /// Write content, summary and tags and flip `metadata_generated` in one
    /// transaction. A row that is already enriched is left untouched; any
    /// write error rolls the whole update back.
    async fn apply_enrichment(
        &self,
        id: i64,
        content: &str,
        summary: &str,
        tags: &[String],
    ) -> Result<()>;

    /// All stored articles, for the maintenance sweeps.
    async fn list_articles(&self) -> Result<Vec<Article>>;

    /// Look up a single article by its URL.
    async fn get_by_url(&self, url: &str) -> Result<Option<Article>>;

    /// Delete (or archive) the given articles; returns how many went away.
    async fn delete_articles(&self, ids: &[i64]) -> Result<u64>;

    /// Collapse every source label starting with `prefix` to `canonical`,
    /// leaving already-canonical labels untouched; returns the update count.
    async fn relabel_source(&self, prefix: &str, canonical: &str) -> Result<u64>;

    /// Distinct source labels with their article counts, most articles first.
    async fn source_counts(&self) -> Result<Vec<(String, i64)>>;
}
