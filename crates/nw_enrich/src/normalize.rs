//! Source-label consolidation. Publishers ship one brand under many feed
//! names ("ITmedia NEWS", "ITmedia Mobile", ...); this sweep collapses each
//! family onto one canonical label by prefix.

use nw_core::{ArticleStore, Result};

#[derive(Debug, Clone, Copy)]
pub struct NormalizeRule {
    pub prefix: &'static str,
    pub canonical: &'static str,
}

/// The label families that accumulate near-duplicates in practice. Order
/// matters: a label is handled by the first rule whose prefix matches.
pub const DEFAULT_RULES: &[NormalizeRule] = &[
    NormalizeRule { prefix: "ITmedia", canonical: "ITmedia" },
    NormalizeRule { prefix: "マイナビ", canonical: "マイナビ Tech+" },
    NormalizeRule { prefix: "日経", canonical: "日経XTECH" },
    NormalizeRule { prefix: "TECH+", canonical: "日経XTECH" },
];

/// Pure form of the rule table: the canonical label a raw one maps to, or
/// None when the label is untouched (no rule matches, or it is already
/// canonical).
pub fn canonicalize(label: &str, rules: &[NormalizeRule]) -> Option<&'static str> {
    rules
        .iter()
        .find(|rule| label.starts_with(rule.prefix))
        .filter(|rule| label != rule.canonical)
        .map(|rule| rule.canonical)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub updated: u64,
}

/// Applies every rule store-side and reports how many labels changed.
/// Idempotent: a second pass over a normalized corpus updates nothing.
pub async fn run(store: &dyn ArticleStore, rules: &[NormalizeRule]) -> Result<NormalizeReport> {
    let mut updated = 0;
    for rule in rules {
        let count = store.relabel_source(rule.prefix, rule.canonical).await?;
        if count > 0 {
            tracing::info!(
                prefix = rule.prefix,
                canonical = rule.canonical,
                count,
                "normalized source labels"
            );
        }
        updated += count;
    }
    Ok(NormalizeReport { updated })
}
