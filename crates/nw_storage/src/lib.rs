use nw_core::{ArticleStore, Result};
use std::sync::Arc;

pub mod backends;

pub use backends::*;

/// Builds a storage backend by name. "postgres" reads DATABASE_URL,
/// "notion" reads NOTION_API_KEY / NOTION_DATABASE_ID, "memory" needs
/// nothing and forgets everything on exit.
pub async fn create_store(kind: &str) -> Result<Arc<dyn ArticleStore>> {
    match kind {
        "memory" => Ok(Arc::new(MemoryStorage::new())),
        #[cfg(feature = "postgres")]
        "postgres" => Ok(Arc::new(PostgresStorage::from_env().await?)),
        #[cfg(feature = "notion")]
        "notion" => Ok(Arc::new(NotionStorage::from_env()?)),
        other => Err(nw_core::Error::Storage(format!(
            "unknown storage backend: {}",
            other
        ))),
    }
}
