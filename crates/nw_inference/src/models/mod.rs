use nw_core::{LanguageModel, Result};
use std::sync::Arc;

use crate::Config;

pub mod dummy;
pub mod openai;

pub use dummy::DummyModel;
pub use openai::OpenAiModel;

/// Builds a model backend by name. "openai" needs an API key in the config;
/// "dummy" runs offline.
pub fn create_model(kind: &str, config: &Config) -> Result<Arc<dyn LanguageModel>> {
    match kind {
        "openai" => Ok(Arc::new(OpenAiModel::new(config)?)),
        "dummy" => Ok(Arc::new(DummyModel)),
        other => Err(nw_core::Error::Inference(format!(
            "unknown model backend: {}",
            other
        ))),
    }
}
