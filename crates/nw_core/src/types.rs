use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A stored news article. `id` is assigned by the store on creation and is
/// monotonic within a store, which makes it the dedup tie-breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub source: String,
    pub image_url: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub metadata_generated: bool,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload produced by the collect job. Enrichment fields are filled
/// later by the enrich job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub url: String,
    pub source: String,
    pub image_url: Option<String>,
    pub published_date: Option<NaiveDate>,
}

/// Parses a date string only if it is exactly `YYYY-MM-DD`. Every fallback
/// tier of the date chain runs its candidate through this before a value is
/// accepted, so a malformed heuristic or model answer can never reach the
/// date column.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let b = s.as_bytes();
    if b.len() != 10 || b[4] != b'-' || b[7] != b'-' {
        return None;
    }
    if !b
        .iter()
        .enumerate()
        .all(|(i, c)| matches!(i, 4 | 7) || c.is_ascii_digit())
    {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Truncated title preview for log lines; full titles are persisted as-is.
pub fn title_preview(title: &str) -> String {
    title.chars().take(50).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(
            parse_iso_date("2025-03-01"),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
        assert!(parse_iso_date("2025-3-1").is_none());
        assert!(parse_iso_date("2025/03/01").is_none());
        assert!(parse_iso_date("2025-03-01T10:00:00Z").is_none());
        assert!(parse_iso_date("2025-13-01").is_none());
        assert!(parse_iso_date("日付情報なし").is_none());
        assert!(parse_iso_date("").is_none());
    }

    #[test]
    fn test_title_preview() {
        let long = "a".repeat(80);
        assert_eq!(title_preview(&long).chars().count(), 50);
        // Multi-byte titles must not be cut on a byte boundary
        let jp = "半導体".repeat(30);
        assert_eq!(title_preview(&jp).chars().count(), 50);
        assert_eq!(title_preview("short"), "short");
    }
}
