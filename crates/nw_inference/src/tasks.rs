//! Model-backed enrichment tasks. Each task wraps one or two completions
//! behind a narrow contract and validates the answer's shape before anything
//! typed is returned.

use chrono::NaiveDate;
use nw_core::{parse_iso_date, Error, LanguageModel, Result};

use crate::prompts;

pub const SUMMARY_MAX_TOKENS: u32 = 500;
pub const TAGS_MAX_TOKENS: u32 = 500;
pub const DATE_MAX_TOKENS: u32 = 50;
pub const SOURCE_MAX_TOKENS: u32 = 20;
pub const TEMPERATURE: f32 = 0.5;

/// Two chained completions over the article body: a ~200-character
/// declarative summary, then a comma-separated tag list derived from that
/// summary. A failed stage or an empty summary fails the pair as a whole, so
/// callers never see tags without a summary or vice versa.
pub async fn summarize_and_tag(
    model: &dyn LanguageModel,
    article_text: &str,
) -> Result<(String, Vec<String>)> {
    if article_text.is_empty() {
        return Err(Error::Inference("article text is empty".to_string()));
    }

    let summary = model
        .complete(
            &prompts::summary_prompt(article_text),
            SUMMARY_MAX_TOKENS,
            TEMPERATURE,
        )
        .await?;
    let summary = summary.trim().to_string();
    if summary.is_empty() {
        return Err(Error::Inference("model returned an empty summary".to_string()));
    }

    let tags_raw = model
        .complete(&prompts::tags_prompt(&summary), TAGS_MAX_TOKENS, TEMPERATURE)
        .await?;

    Ok((summary, split_tags(&tags_raw)))
}

/// Splits a model tag answer on ASCII and ideographic commas, trims each
/// token and drops empties. Order is the model's order; duplicates are the
/// prompt's problem, not ours.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split([',', '、'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Last-resort coercion of a date string the heuristics could not parse.
/// The answer is accepted only if it is exactly `YYYY-MM-DD`; a chatty or
/// malformed answer (and any model error) degrades to None.
pub async fn coerce_date(model: &dyn LanguageModel, raw: &str) -> Option<NaiveDate> {
    match model
        .complete(&prompts::date_prompt(raw), DATE_MAX_TOKENS, TEMPERATURE)
        .await
    {
        Ok(answer) => parse_iso_date(answer.trim()),
        Err(e) => {
            tracing::warn!(raw, error = %e, "model date coercion failed");
            None
        }
    }
}

/// One-word publisher guess from the article title. Empty and failed
/// answers collapse to None so the caller can leave the field unset.
pub async fn guess_source(model: &dyn LanguageModel, title: &str) -> Option<String> {
    match model
        .complete(&prompts::source_prompt(title), SOURCE_MAX_TOKENS, TEMPERATURE)
        .await
    {
        Ok(answer) => {
            let answer = answer.trim();
            if answer.is_empty() {
                None
            } else {
                Some(answer.to_string())
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "model source inference failed");
            None
        }
    }
}
