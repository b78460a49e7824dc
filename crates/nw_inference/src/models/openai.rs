use async_trait::async_trait;
use nw_core::{LanguageModel, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Config;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: String,
}

/// OpenAI-compatible chat-completions backend.
pub struct OpenAiModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiModel {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| nw_core::Error::Inference("OpenAI API key is required".to_string()))?;

        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: config
                .model_name
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

impl fmt::Debug for OpenAiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiModel")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You are a helpful assistant.".to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| nw_core::Error::Inference("model returned no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_requires_api_key() {
        let result = OpenAiModel::new(&Config::default());
        assert!(result.is_err());

        let config = Config {
            api_key: Some("test-key".to_string()),
            ..Config::default()
        };
        let model = OpenAiModel::new(&config).unwrap();
        assert_eq!(model.base_url, DEFAULT_BASE_URL);
        assert_eq!(model.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config {
            api_key: Some("super-secret".to_string()),
            ..Config::default()
        };
        let model = OpenAiModel::new(&config).unwrap();
        let debug = format!("{:?}", model);
        assert!(!debug.contains("super-secret"));
    }
}
