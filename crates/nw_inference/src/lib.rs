pub mod models;
pub mod prompts;
pub mod tasks;

pub use models::create_model;

/// Model backend configuration, built once at process start and passed by
/// reference into whoever needs a model.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model_name: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: std::env::var("OPENAI_BASE_URL").ok(),
            model_name: std::env::var("OPENAI_MODEL").ok(),
        }
    }
}
