use async_trait::async_trait;
use iw_core::config::StorageConfig;
use iw_core::{ArticleStorage, Error, Result};
use std::sync::Arc;

pub mod backends;
pub mod journal;

pub use backends::*;
pub use journal::{RunJournal, RunMarker};

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn get_error_message() -> &'static str;
    async fn open(config: &StorageConfig) -> Result<Self>
    where
        Self: Sized;
}

async fn open_backend<T>(config: &StorageConfig) -> Result<Arc<dyn ArticleStorage>>
where
    T: StorageBackend + ArticleStorage + 'static,
{
    match T::open(config).await {
        Ok(storage) => Ok(Arc::new(storage)),
        Err(e) => {
            tracing::error!(error = %e, hint = T::get_error_message(), "failed to open storage");
            Err(e)
        }
    }
}

/// Open the named backend (`sqlite` or `memory`).
pub async fn create_storage(kind: &str, config: &StorageConfig) -> Result<Arc<dyn ArticleStorage>> {
    match kind {
        "memory" => open_backend::<InMemoryStorage>(config).await,
        #[cfg(feature = "sqlite")]
        "sqlite" => open_backend::<SqliteStorage>(config).await,
        other => Err(Error::Config(format!("Unsupported storage backend: {}", other))),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::journal::{RunJournal, RunMarker};
    pub use super::{create_storage, StorageBackend};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_storage() {
        let storage = create_storage("memory", &StorageConfig::default()).await.unwrap();
        assert_eq!(storage.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_unknown_storage() {
        let result = create_storage("qdrant", &StorageConfig::default()).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
