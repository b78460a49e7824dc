//! Publish-date extraction: a fixed-order chain of structural, metadata and
//! heuristic signals, then increasingly expensive parsing of whatever the
//! chain surfaced. The model is strictly the last resort, and nothing that
//! fails the final `YYYY-MM-DD` check ever becomes a date.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use nw_core::{parse_iso_date, LanguageModel};
use nw_inference::tasks;
use regex::Regex;

use super::{first_found, Extracted};
use crate::document::Document;

/// Tier 1: the first structural `<time>` element.
fn time_element(doc: &Document) -> Extracted<String> {
    doc.first_text("time").into()
}

/// Tier 2: `article:modified_time`, else `date`, checked in that priority
/// order across all meta tags.
fn meta_date(doc: &Document) -> Extracted<String> {
    doc.meta_property("article:modified_time")
        .or_else(|| doc.meta_property("date"))
        .into()
}

/// Tier 3: the first element whose class or id attribute looks date-ish.
fn dated_attribute(doc: &Document) -> Extracted<String> {
    doc.first_dated_text().into()
}

/// Raw candidate string from the chain, if any tier found one.
pub fn candidate(doc: &Document) -> Option<String> {
    first_found(doc, &[time_element, meta_date, dated_attribute]).into_option()
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%Y年%m月%d日",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%m/%d/%Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

lazy_static! {
    /// Prose like 「公開日:2025年3月1日」 still carries an extractable y/m/d.
    static ref EMBEDDED_DATE: Regex =
        Regex::new(r"(\d{4})[年/\-\.](\d{1,2})[月/\-\.](\d{1,2})").unwrap();
}

/// Locale-tolerant parse covering the shapes publishers actually emit:
/// RFC 3339/2822 timestamps, slashed, dotted and Japanese-era-free 年月日
/// dates, English prose dates, and dates embedded mid-sentence.
pub fn fuzzy_parse(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.date_naive());
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    if let Some(caps) = EMBEDDED_DATE.captures(raw) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    None
}

/// Resolves a raw candidate to a date: exact `YYYY-MM-DD` as-is, then the
/// fuzzy parse, and only if both fail, the model. Any path that cannot
/// produce a real date yields None, never a partially-valid guess.
pub async fn resolve(model: &dyn LanguageModel, raw: &str) -> Option<NaiveDate> {
    if let Some(date) = parse_iso_date(raw.trim()) {
        return Some(date);
    }
    if let Some(date) = fuzzy_parse(raw) {
        return Some(date);
    }
    tasks::coerce_date(model, raw).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nw_core::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingModel {
        answer: &'static str,
        calls: AtomicUsize,
    }

    impl CountingModel {
        fn new(answer: &'static str) -> Self {
            Self {
                answer,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for CountingModel {
        fn name(&self) -> &str {
            "counting"
        }

        async fn complete(&self, _prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.to_string())
        }
    }

    #[test]
    fn test_time_element_wins_over_later_tiers() {
        let doc = Document::parse(
            r#"<html><head><meta property="date" content="2020-01-01"></head>
            <body><time>2025-03-01</time><div class="date">2019-01-01</div></body></html>"#,
        );
        assert_eq!(candidate(&doc).as_deref(), Some("2025-03-01"));
    }

    #[test]
    fn test_meta_priority_ignores_document_order() {
        // A "date" meta tag earlier in the document must not beat
        // article:modified_time.
        let doc = Document::parse(
            r#"<html><head>
                <meta property="date" content="2020-01-01">
                <meta property="article:modified_time" content="2025-03-01">
            </head></html>"#,
        );
        assert_eq!(candidate(&doc).as_deref(), Some("2025-03-01"));
    }

    #[test]
    fn test_dated_attribute_is_the_last_tier() {
        let doc = Document::parse(r#"<html><body><div class="the-date">2025年3月1日</div></body></html>"#);
        assert_eq!(candidate(&doc).as_deref(), Some("2025年3月1日"));

        let nothing = Document::parse("<html><body><p>no dates here</p></body></html>");
        assert!(candidate(&nothing).is_none());
    }

    #[test]
    fn test_fuzzy_parse() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 1);
        assert_eq!(fuzzy_parse("2025年3月1日"), expected);
        assert_eq!(fuzzy_parse("2025/03/01"), expected);
        assert_eq!(fuzzy_parse("March 1, 2025"), expected);
        assert_eq!(fuzzy_parse("Sat, 1 Mar 2025 09:00:00 +0900"), expected);
        assert_eq!(fuzzy_parse("2025-03-01T09:00:00+09:00"), expected);
        assert_eq!(fuzzy_parse("公開日:2025年3月1日"), expected);
        assert_eq!(fuzzy_parse("2025年13月1日"), None);
        assert_eq!(fuzzy_parse("updated recently"), None);
        assert_eq!(fuzzy_parse(""), None);
    }

    #[tokio::test]
    async fn test_model_is_not_invoked_when_parsing_succeeds() {
        let model = CountingModel::new("2000-01-01");
        let date = resolve(&model, "2025年3月1日").await;
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_model_is_the_last_resort() {
        let model = CountingModel::new("2025-03-01");
        let date = resolve(&model, "the first Saturday of March, twenty twenty-five").await;
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nonconforming_model_answer_yields_none() {
        let model = CountingModel::new("It was published on 2025-03-01.");
        assert_eq!(resolve(&model, "gibberish date").await, None);
    }
}
