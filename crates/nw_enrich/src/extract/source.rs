//! Publisher-label extraction: site metadata first, then the URL host, and
//! a model guess only when both come up empty.

use nw_core::LanguageModel;
use nw_inference::tasks;
use url::Url;

use crate::document::Document;

/// Tier 1: the `og:site_name` meta tag.
pub fn site_name(doc: &Document) -> Option<String> {
    doc.meta_property("og:site_name")
}

/// Tier 2: label derived from the URL host. `www.` is stripped, the first
/// DNS label is kept and its first letter upper-cased (the rest lowered),
/// so `www.nhk.or.jp` becomes `Nhk`.
pub fn from_url(article_url: &str) -> Option<String> {
    let parsed = Url::parse(article_url).ok()?;
    let host = parsed.host_str()?;
    let label = host.strip_prefix("www.").unwrap_or(host).split('.').next()?;
    let mut chars = label.chars();
    let first = chars.next()?;
    Some(
        first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
    )
}

/// The full chain. Each tier runs only when the one before produced
/// nothing; in particular the model never sees an article whose host or
/// metadata already named the publisher.
pub async fn resolve(
    model: &dyn LanguageModel,
    site_name: Option<String>,
    article_url: &str,
    title: &str,
) -> Option<String> {
    if let Some(name) = site_name.filter(|name| !name.is_empty()) {
        return Some(name);
    }
    if let Some(name) = from_url(article_url) {
        return Some(name);
    }
    tasks::guess_source(model, title).await
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
    fn test_site_name() {
        let doc = Document::parse(r#"<meta property="og:site_name" content="ITmedia NEWS">"#);
        assert_eq!(site_name(&doc).as_deref(), Some("ITmedia NEWS"));
    }

    #[test]
    fn test_from_url() {
        assert_eq!(from_url("https://www.nhk.or.jp/news/1").as_deref(), Some("Nhk"));
        assert_eq!(from_url("https://gigazine.net/x").as_deref(), Some("Gigazine"));
        assert_eq!(from_url("https://news.yahoo.co.jp/a").as_deref(), Some("News"));
        assert!(from_url("not a url").is_none());
    }

    #[tokio::test]
    async fn test_metadata_wins_without_model() {
        let model = CountingModel::new("unused");
        let resolved = resolve(
            &model,
            Some("ITmedia NEWS".to_string()),
            "https://www.itmedia.co.jp/news/1",
            "title",
        )
        .await;
        assert_eq!(resolved.as_deref(), Some("ITmedia NEWS"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_host_tier_runs_when_metadata_is_empty() {
        let model = CountingModel::new("unused");
        let resolved = resolve(&model, None, "https://www.nhk.or.jp/news/1", "title").await;
        assert_eq!(resolved.as_deref(), Some("Nhk"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_model_only_when_everything_else_failed() {
        let model = CountingModel::new("Nikkei");
        let resolved = resolve(&model, None, "not a url", "日経の記事タイトル").await;
        assert_eq!(resolved.as_deref(), Some("Nikkei"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }
}
