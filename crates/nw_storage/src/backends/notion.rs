//! Paged-document backend. Speaks a Notion-style HTTP API: cursor-paginated
//! database queries for reads, per-page property patches for writes and
//! archival instead of deletion. Same `ArticleStore` contract as the
//! relational backend.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use nw_core::{parse_iso_date, Article, ArticleStore, NewArticle, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

const NOTION_VERSION: &str = "2022-06-28";
const PAGE_SIZE: u32 = 100;
// Rich-text property values are capped by the API.
const RICH_TEXT_LIMIT: usize = 2000;

#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub api_key: String,
    pub database_id: String,
    pub base_url: String,
}

impl NotionConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("NOTION_API_KEY")
            .map_err(|_| nw_core::Error::Config("NOTION_API_KEY is not set".to_string()))?;
        let database_id = std::env::var("NOTION_DATABASE_ID")
            .map_err(|_| nw_core::Error::Config("NOTION_DATABASE_ID is not set".to_string()))?;
        Ok(Self {
            api_key,
            database_id,
            base_url: "https://api.notion.com/v1".to_string(),
        })
    }
}

/// Lazy walk over a paged database query. Yields one page of results per
/// call and exposes the API cursor, so a consumer can stop anywhere and a
/// new walk can resume from where an old one left off.
pub struct QueryCursor {
    client: Client,
    config: NotionConfig,
    filter: Option<Value>,
    next_cursor: Option<String>,
    exhausted: bool,
}

impl QueryCursor {
    pub fn new(client: Client, config: NotionConfig, filter: Option<Value>) -> Self {
        Self::resume(client, config, filter, None)
    }

    /// Resume a walk from a previously saved cursor.
    pub fn resume(
        client: Client,
        config: NotionConfig,
        filter: Option<Value>,
        cursor: Option<String>,
    ) -> Self {
        Self {
            client,
            config,
            filter,
            next_cursor: cursor,
            exhausted: false,
        }
    }

    pub fn cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    pub async fn next_page(&mut self) -> Result<Option<Vec<Value>>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut payload = json!({
            "page_size": PAGE_SIZE,
            "sorts": [{"timestamp": "created_time", "direction": "descending"}],
        });
        if let Some(filter) = &self.filter {
            payload["filter"] = filter.clone();
        }
        if let Some(cursor) = &self.next_cursor {
            payload["start_cursor"] = json!(cursor);
        }

        let body: Value = self
            .client
            .post(format!(
                "{}/databases/{}/query",
                self.config.base_url, self.config.database_id
            ))
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        self.next_cursor = body["next_cursor"].as_str().map(str::to_string);
        self.exhausted = !body["has_more"].as_bool().unwrap_or(false);

        Ok(Some(
            body["results"].as_array().cloned().unwrap_or_default(),
        ))
    }
}

fn rich_text(value: &str) -> Value {
    if value.is_empty() {
        json!({"rich_text": []})
    } else {
        json!({"rich_text": [{"text": {"content": value}}]})
    }
}

fn clip(value: &str) -> String {
    value.chars().take(RICH_TEXT_LIMIT).collect()
}

fn prop_rich_text(props: &Value, name: &str) -> Option<String> {
    props
        .get(name)?
        .get("rich_text")?
        .as_array()?
        .first()?
        .pointer("/text/content")?
        .as_str()
        .map(str::to_string)
}

fn prop_title(props: &Value) -> Option<String> {
    props
        .get("Title")?
        .get("title")?
        .as_array()?
        .first()?
        .pointer("/text/content")?
        .as_str()
        .map(str::to_string)
}

fn prop_url(props: &Value, name: &str) -> Option<String> {
    props.get(name)?.get("url")?.as_str().map(str::to_string)
}

fn prop_date(props: &Value) -> Option<NaiveDate> {
    let start = props.get("Date")?.pointer("/date/start")?.as_str()?;
    start.get(0..10).and_then(parse_iso_date)
}

fn prop_checkbox(props: &Value, name: &str) -> bool {
    props
        .get(name)
        .and_then(|p| p.get("checkbox"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn prop_unique_id(props: &Value) -> Option<i64> {
    props.get("ID")?.pointer("/unique_id/number")?.as_i64()
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split([',', '、'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn page_time(page: &Value, field: &str) -> DateTime<Utc> {
    page[field]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Maps a query result page onto an `Article` plus the page id used for
/// patches. Pages without a numeric unique id are skipped.
fn article_from_page(page: &Value) -> Option<(Article, String)> {
    let page_id = page["id"].as_str()?.to_string();
    let props = page.get("properties")?;
    let id = prop_unique_id(props)?;

    let claimed_at = prop_rich_text(props, "ClaimedAt")
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some((
        Article {
            id,
            title: prop_title(props).unwrap_or_default(),
            url: prop_url(props, "URL").unwrap_or_default(),
            source: prop_rich_text(props, "Source").unwrap_or_default(),
            image_url: prop_url(props, "ImageURL"),
            published_date: prop_date(props),
            content: prop_rich_text(props, "Content"),
            summary: prop_rich_text(props, "Summary"),
            tags: prop_rich_text(props, "Tags")
                .map(|raw| split_tags(&raw))
                .unwrap_or_default(),
            metadata_generated: prop_checkbox(props, "MetadataGenerated"),
            claimed_at,
            created_at: page_time(page, "created_time"),
            updated_at: page_time(page, "last_edited_time"),
        },
        page_id,
    ))
}

pub struct NotionStorage {
    client: Client,
    config: NotionConfig,
    // unique-id number -> page id, refreshed by every query walk
    page_ids: RwLock<HashMap<i64, String>>,
}

impl NotionStorage {
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(NotionConfig::from_env()?))
    }

    pub fn new(config: NotionConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            page_ids: RwLock::new(HashMap::new()),
        }
    }

    fn query_cursor(&self, filter: Option<Value>) -> QueryCursor {
        QueryCursor::new(self.client.clone(), self.config.clone(), filter)
    }

    async fn remember_page(&self, id: i64, page_id: &str) {
        self.page_ids.write().await.insert(id, page_id.to_string());
    }

    /// Page id for a stored article, walking the database once if the
    /// mapping has not been seen in this process yet.
    async fn page_id(&self, id: i64) -> Result<String> {
        if let Some(page_id) = self.page_ids.read().await.get(&id) {
            return Ok(page_id.clone());
        }

        let mut cursor = self.query_cursor(None);
        let mut found = None;
        while let Some(pages) = cursor.next_page().await? {
            for page in &pages {
                if let Some((article, page_id)) = article_from_page(page) {
                    self.remember_page(article.id, &page_id).await;
                    if article.id == id {
                        found = Some(page_id);
                    }
                }
            }
            if found.is_some() {
                break;
            }
        }

        found.ok_or_else(|| nw_core::Error::Storage(format!("no page for article id {}", id)))
    }

    async fn patch_properties(&self, page_id: &str, properties: Value) -> Result<()> {
        self.client
            .patch(format!("{}/pages/{}", self.config.base_url, page_id))
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&json!({ "properties": properties }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn fetch_page(&self, page_id: &str) -> Result<Value> {
        let page = self
            .client
            .get(format!("{}/pages/{}", self.config.base_url, page_id))
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(page)
    }
}

#[async_trait]
impl ArticleStore for NotionStorage {
    async fn insert_article(&self, article: &NewArticle) -> Result<bool> {
        if self.get_by_url(&article.url).await?.is_some() {
            return Ok(false);
        }

        let mut properties = json!({
            "Title": {"title": [{"text": {"content": article.title}}]},
            "URL": {"url": article.url},
            "Source": rich_text(&article.source),
        });
        if let Some(image_url) = &article.image_url {
            properties["ImageURL"] = json!({"url": image_url});
        }
        if let Some(date) = article.published_date {
            properties["Date"] = json!({"date": {"start": date.format("%Y-%m-%d").to_string()}});
        }

        self.client
            .post(format!("{}/pages", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&json!({
                "parent": {"database_id": self.config.database_id},
                "properties": properties,
            }))
            .send()
            .await?
            .error_for_status()?;

        Ok(true)
    }

    async fn claim_unenriched(&self, limit: u32, lease: Duration) -> Result<Vec<Article>> {
        let lease = chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();

        let filter = json!({"property": "MetadataGenerated", "checkbox": {"equals": false}});
        let mut cursor = self.query_cursor(Some(filter));
        let mut claimed = Vec::new();

        'pages: while let Some(pages) = cursor.next_page().await? {
            for page in &pages {
                let Some((mut article, page_id)) = article_from_page(page) else {
                    continue;
                };
                self.remember_page(article.id, &page_id).await;
                if article.metadata_generated {
                    continue;
                }
                if article.claimed_at.map_or(false, |t| t + lease > now) {
                    continue;
                }

                // The paged API has no transactions, so the claim marker is
                // advisory rather than atomic.
                self.patch_properties(&page_id, json!({"ClaimedAt": rich_text(&now.to_rfc3339())}))
                    .await?;
                article.claimed_at = Some(now);
                claimed.push(article);
                if claimed.len() >= limit as usize {
                    break 'pages;
                }
            }
        }

        Ok(claimed)
    }

    async fn release_claim(&self, id: i64) -> Result<()> {
        let page_id = self.page_id(id).await?;
        self.patch_properties(&page_id, json!({"ClaimedAt": rich_text("")}))
            .await
    }

    async fn set_published_date(&self, id: i64, date: NaiveDate) -> Result<()> {
        let page_id = self.page_id(id).await?;
        self.patch_properties(
            &page_id,
            json!({"Date": {"date": {"start": date.format("%Y-%m-%d").to_string()}}}),
        )
        .await
    }

    async fn set_source(&self, id: i64, source: &str) -> Result<()> {
        let page_id = self.page_id(id).await?;
        self.patch_properties(&page_id, json!({"Source": rich_text(source)}))
            .await
    }

    async fn apply_enrichment(
        &self,
        id: i64,
        content: &str,
        summary: &str,
        tags: &[String],
    ) -> Result<()> {
        let page_id = self.page_id(id).await?;

        let page = self.fetch_page(&page_id).await?;
        if page
            .get("properties")
            .map_or(false, |p| prop_checkbox(p, "MetadataGenerated"))
        {
            tracing::warn!(id, "article is already enriched; leaving it untouched");
            return Ok(());
        }

        // A single patch carries every property, so the write lands as a
        // whole or not at all.
        self.patch_properties(
            &page_id,
            json!({
                "Content": rich_text(&clip(content)),
                "Summary": rich_text(&clip(summary)),
                "Tags": rich_text(&clip(&tags.join(", "))),
                "MetadataGenerated": {"checkbox": true},
                "ClaimedAt": rich_text(""),
            }),
        )
        .await
    }

    async fn list_articles(&self) -> Result<Vec<Article>> {
        let mut cursor = self.query_cursor(None);
        let mut articles = Vec::new();
        while let Some(pages) = cursor.next_page().await? {
            for page in &pages {
                if let Some((article, page_id)) = article_from_page(page) {
                    self.remember_page(article.id, &page_id).await;
                    articles.push(article);
                }
            }
        }
        articles.sort_by_key(|a| a.id);
        Ok(articles)
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<Article>> {
        let body: Value = self
            .client
            .post(format!(
                "{}/databases/{}/query",
                self.config.base_url, self.config.database_id
            ))
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&json!({
                "page_size": 1,
                "filter": {"property": "URL", "url": {"equals": url}},
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(page) = body["results"].as_array().and_then(|r| r.first()) else {
            return Ok(None);
        };
        let Some((article, page_id)) = article_from_page(page) else {
            return Ok(None);
        };
        self.remember_page(article.id, &page_id).await;
        Ok(Some(article))
    }

    async fn delete_articles(&self, ids: &[i64]) -> Result<u64> {
        let mut deleted = 0;
        for &id in ids {
            let page_id = match self.page_id(id).await {
                Ok(page_id) => page_id,
                Err(e) => {
                    tracing::warn!(id, error = %e, "cannot archive article");
                    continue;
                }
            };

            let result = self
                .client
                .patch(format!("{}/pages/{}", self.config.base_url, page_id))
                .bearer_auth(&self.config.api_key)
                .header("Notion-Version", NOTION_VERSION)
                .json(&json!({"archived": true}))
                .send()
                .await
                .and_then(|r| r.error_for_status());

            match result {
                Ok(_) => deleted += 1,
                Err(e) => tracing::warn!(id, error = %e, "failed to archive article"),
            }
        }
        Ok(deleted)
    }

    async fn relabel_source(&self, prefix: &str, canonical: &str) -> Result<u64> {
        let articles = self.list_articles().await?;
        let mut updated = 0;
        for article in articles
            .iter()
            .filter(|a| a.source.starts_with(prefix) && a.source != canonical)
        {
            self.set_source(article.id, canonical).await?;
            updated += 1;
        }
        Ok(updated)
    }

    async fn source_counts(&self) -> Result<Vec<(String, i64)>> {
        let mut counts = HashMap::new();
        for article in self.list_articles().await? {
            *counts.entry(article.source).or_insert(0i64) += 1;
        }
        let mut counts: Vec<(String, i64)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(counts)
    }
}
