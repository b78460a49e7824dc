use async_trait::async_trait;
use nw_core::{LanguageModel, Result};
use std::fmt;

use crate::prompts;

/// Deterministic offline model for tests and dry runs. Recognizes the
/// pipeline's prompts by their fixed prefixes and answers without I/O.
pub struct DummyModel;

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

#[async_trait]
impl LanguageModel for DummyModel {
    fn name(&self) -> &str {
        "dummy"
    }

    async fn complete(&self, prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
        if let Some(text) = prompt.strip_prefix(prompts::SUMMARY_PREFIX) {
            // First 200 characters of the body stand in for a summary.
            return Ok(text.chars().take(200).collect());
        }
        if prompt.starts_with(prompts::TAGS_PREFIX) {
            return Ok("ニュース, テクノロジー".to_string());
        }
        if prompt.starts_with(prompts::SOURCE_PREFIX) {
            return Ok("Web".to_string());
        }
        // Date coercion gets no usable answer, so the caller degrades to
        // "no date found" instead of storing a made-up value.
        Ok(String::new())
    }
}
