//! URL-duplicate sweep. The earliest-created record (lowest id) per URL is
//! authoritative; every later one is deleted. Running the sweep twice in a
//! row deletes on the first pass only.

use nw_core::{title_preview, ArticleStore, Result};
use std::collections::HashMap;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DedupeReport {
    pub scanned: usize,
    pub deleted: u64,
}

pub async fn run(store: &dyn ArticleStore) -> Result<DedupeReport> {
    let articles = store.list_articles().await?;
    let scanned = articles.len();

    let mut keep: HashMap<&str, i64> = HashMap::new();
    let mut doomed = Vec::new();

    for article in &articles {
        match keep.get_mut(article.url.as_str()) {
            None => {
                keep.insert(&article.url, article.id);
            }
            Some(kept) => {
                // The group's survivor is always the lowest id, so a URL can
                // never lose its last record.
                let loser = if article.id < *kept {
                    std::mem::replace(kept, article.id)
                } else {
                    article.id
                };
                tracing::info!(
                    id = loser,
                    title = %title_preview(&article.title),
                    url = %article.url,
                    "duplicate detected"
                );
                doomed.push(loser);
            }
        }
    }

    let deleted = if doomed.is_empty() {
        0
    } else {
        doomed.sort_unstable();
        store.delete_articles(&doomed).await?
    };

    tracing::info!(scanned, deleted, "duplicate sweep finished");
    Ok(DedupeReport { scanned, deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use nw_core::{Article, NewArticle};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Store stub that can actually hold URL duplicates, which the real
    /// backends refuse to create.
    struct DuplicateStore {
        articles: Mutex<Vec<Article>>,
    }

    impl DuplicateStore {
        fn with_ids_and_urls(rows: &[(i64, &str)]) -> Self {
            let articles = rows
                .iter()
                .map(|(id, url)| Article {
                    id: *id,
                    title: format!("article {}", id),
                    url: url.to_string(),
                    source: "test".to_string(),
                    image_url: None,
                    published_date: None,
                    content: None,
                    summary: None,
                    tags: Vec::new(),
                    metadata_generated: false,
                    claimed_at: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
                .collect();
            Self {
                articles: Mutex::new(articles),
            }
        }

        fn ids(&self) -> Vec<i64> {
            self.articles.lock().unwrap().iter().map(|a| a.id).collect()
        }
    }

    #[async_trait]
    impl ArticleStore for DuplicateStore {
        async fn insert_article(&self, _article: &NewArticle) -> Result<bool> {
            Ok(false)
        }

        async fn claim_unenriched(&self, _limit: u32, _lease: Duration) -> Result<Vec<Article>> {
            Ok(Vec::new())
        }

        async fn release_claim(&self, _id: i64) -> Result<()> {
            Ok(())
        }

        async fn set_published_date(&self, _id: i64, _date: NaiveDate) -> Result<()> {
            Ok(())
        }

        async fn set_source(&self, _id: i64, _source: &str) -> Result<()> {
            Ok(())
        }

        async fn apply_enrichment(
            &self,
            _id: i64,
            _content: &str,
            _summary: &str,
            _tags: &[String],
        ) -> Result<()> {
            Ok(())
        }

        async fn list_articles(&self) -> Result<Vec<Article>> {
            Ok(self.articles.lock().unwrap().clone())
        }

        async fn get_by_url(&self, _url: &str) -> Result<Option<Article>> {
            Ok(None)
        }

        async fn delete_articles(&self, ids: &[i64]) -> Result<u64> {
            let mut articles = self.articles.lock().unwrap();
            let before = articles.len();
            articles.retain(|a| !ids.contains(&a.id));
            Ok((before - articles.len()) as u64)
        }

        async fn relabel_source(&self, _prefix: &str, _canonical: &str) -> Result<u64> {
            Ok(0)
        }

        async fn source_counts(&self) -> Result<Vec<(String, i64)>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_lowest_id_survives() {
        let store = DuplicateStore::with_ids_and_urls(&[
            (5, "http://dup"),
            (9, "http://dup"),
            (7, "http://unique"),
        ]);

        let report = run(&store).await.unwrap();
        assert_eq!(report, DedupeReport { scanned: 3, deleted: 1 });
        assert_eq!(store.ids(), vec![5, 7]);
    }

    #[tokio::test]
    async fn test_survivor_wins_regardless_of_listing_order() {
        // The higher id comes first here; it must still be the one deleted.
        let store = DuplicateStore::with_ids_and_urls(&[
            (9, "http://dup"),
            (5, "http://dup"),
            (3, "http://dup"),
        ]);

        let report = run(&store).await.unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(store.ids(), vec![3]);
    }

    #[tokio::test]
    async fn test_second_sweep_deletes_nothing() {
        let store = DuplicateStore::with_ids_and_urls(&[
            (5, "http://dup"),
            (9, "http://dup"),
        ]);

        assert_eq!(run(&store).await.unwrap().deleted, 1);
        assert_eq!(run(&store).await.unwrap().deleted, 0);
        assert_eq!(store.ids(), vec![5]);
    }

    #[tokio::test]
    async fn test_unique_urls_are_untouched() {
        let store = DuplicateStore::with_ids_and_urls(&[(1, "http://a"), (2, "http://b")]);
        let report = run(&store).await.unwrap();
        assert_eq!(report, DedupeReport { scanned: 2, deleted: 0 });
        assert_eq!(store.ids(), vec![1, 2]);
    }
}
