use async_trait::async_trait;
use chrono::NaiveDate;
use nw_core::{Article, ArticleStore, NewArticle, Result};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        url TEXT NOT NULL UNIQUE,
        source TEXT NOT NULL,
        image_url TEXT,
        published_date DATE,
        content TEXT,
        summary TEXT,
        tags TEXT[] NOT NULL DEFAULT '{}',
        metadata_generated BOOLEAN NOT NULL DEFAULT FALSE,
        claimed_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS articles_unenriched_idx
        ON articles (created_at DESC)
        WHERE metadata_generated = FALSE
    "#,
    // Add future migrations here
];

pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub async fn from_env() -> Result<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| nw_core::Error::Config("DATABASE_URL is not set".to_string()))?;
        Self::new_with_url(&url).await
    }

    pub async fn new_with_url(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| nw_core::Error::Storage(format!("failed to connect to database: {}", e)))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| nw_core::Error::Storage(format!("failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self { pool })
    }
}

fn article_from_row(row: &PgRow) -> std::result::Result<Article, sqlx::Error> {
    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        source: row.try_get("source")?,
        image_url: row.try_get("image_url")?,
        published_date: row.try_get("published_date")?,
        content: row.try_get("content")?,
        summary: row.try_get("summary")?,
        tags: row.try_get("tags")?,
        metadata_generated: row.try_get("metadata_generated")?,
        claimed_at: row.try_get("claimed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn storage_err(context: &str, e: impl std::fmt::Display) -> nw_core::Error {
    nw_core::Error::Storage(format!("{}: {}", context, e))
}

// LIKE patterns are built from config-level prefixes, but escape anyway.
fn like_prefix(prefix: &str) -> String {
    format!("{}%", prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_"))
}

#[async_trait]
impl ArticleStore for PostgresStorage {
    async fn insert_article(&self, article: &NewArticle) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles (title, url, source, image_url, published_date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(&article.title)
        .bind(&article.url)
        .bind(&article.source)
        .bind(&article.image_url)
        .bind(article.published_date)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("failed to insert article", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn claim_unenriched(&self, limit: u32, lease: Duration) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            WITH claimed AS (
                UPDATE articles SET claimed_at = now()
                WHERE id IN (
                    SELECT id FROM articles
                    WHERE metadata_generated = FALSE
                      AND (claimed_at IS NULL OR claimed_at < now() - make_interval(secs => $2))
                    ORDER BY created_at DESC
                    LIMIT $1
                    FOR UPDATE SKIP LOCKED
                )
                RETURNING *
            )
            SELECT * FROM claimed ORDER BY created_at DESC
            "#,
        )
        .bind(limit as i64)
        .bind(lease.as_secs_f64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("failed to claim articles", e))?;

        rows.iter()
            .map(|row| article_from_row(row).map_err(|e| storage_err("failed to read article row", e)))
            .collect()
    }

    async fn release_claim(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE articles SET claimed_at = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("failed to release claim", e))?;
        Ok(())
    }

    async fn set_published_date(&self, id: i64, date: NaiveDate) -> Result<()> {
        sqlx::query("UPDATE articles SET published_date = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(date)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("failed to set published date", e))?;
        Ok(())
    }

    async fn set_source(&self, id: i64, source: &str) -> Result<()> {
        sqlx::query("UPDATE articles SET source = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(source)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("failed to set source", e))?;
        Ok(())
    }

    async fn apply_enrichment(
        &self,
        id: i64,
        content: &str,
        summary: &str,
        tags: &[String],
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_err("failed to open transaction", e))?;

        let result = sqlx::query(
            r#"
            UPDATE articles
            SET content = $2,
                summary = $3,
                tags = $4,
                metadata_generated = TRUE,
                claimed_at = NULL,
                updated_at = now()
            WHERE id = $1 AND metadata_generated = FALSE
            "#,
        )
        .bind(id)
        .bind(content)
        .bind(summary)
        .bind(tags)
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_err("failed to apply enrichment", e))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| storage_err("failed to roll back", e))?;
            tracing::warn!(id, "article is already enriched; leaving it untouched");
            return Ok(());
        }

        tx.commit()
            .await
            .map_err(|e| storage_err("failed to commit enrichment", e))?;
        Ok(())
    }

    async fn list_articles(&self) -> Result<Vec<Article>> {
        let rows = sqlx::query("SELECT * FROM articles ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_err("failed to list articles", e))?;

        rows.iter()
            .map(|row| article_from_row(row).map_err(|e| storage_err("failed to read article row", e)))
            .collect()
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE url = $1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_err("failed to get article by url", e))?;

        row.map(|row| article_from_row(&row).map_err(|e| storage_err("failed to read article row", e)))
            .transpose()
    }

    async fn delete_articles(&self, ids: &[i64]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("failed to delete articles", e))?;
        Ok(result.rows_affected())
    }

    async fn relabel_source(&self, prefix: &str, canonical: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE articles SET source = $1, updated_at = now()
            WHERE source LIKE $2 AND source <> $1
            "#,
        )
        .bind(canonical)
        .bind(like_prefix(prefix))
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("failed to relabel sources", e))?;
        Ok(result.rows_affected())
    }

    async fn source_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT source, COUNT(*) AS count
            FROM articles
            GROUP BY source
            ORDER BY count DESC, source
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("failed to count sources", e))?;

        rows.iter()
            .map(|row| {
                Ok((
                    row.try_get("source")
                        .map_err(|e| storage_err("failed to read source", e))?,
                    row.try_get("count")
                        .map_err(|e| storage_err("failed to read count", e))?,
                ))
            })
            .collect()
    }
}
