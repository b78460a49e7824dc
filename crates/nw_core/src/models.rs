use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the name of the model backend
    fn name(&self) -> &str;

    /// Single text-in/text-out completion. The model's answer is untyped;
    /// callers must validate its shape before letting it near a typed field.
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String>;
}
