use crate::config::{IndexBackend, IndexConfig};
use crate::error::{AppError, Result};
use crate::state::{
    InMemoryResultStore, InMemorySortedSets, RedisResultStore, RedisSortedSets, ResultStore,
    SortedSetBackend,
};
use std::sync::Arc;

fn redis_url(config: &IndexConfig) -> Result<&str> {
    config.redis_url.as_deref().ok_or_else(|| {
        AppError::Configuration("Redis backend requires 'redis_url' configuration".to_string())
    })
}

/// Create the sorted-set backend for the range index
pub async fn create_index_backend(config: &IndexConfig) -> Result<Arc<dyn SortedSetBackend>> {
    match config.backend {
        IndexBackend::Memory => {
            tracing::info!("Initializing in-memory range index backend");
            Ok(Arc::new(InMemorySortedSets::new()))
        }

        IndexBackend::Redis => {
            let url = redis_url(config)?;
            tracing::info!(url = %url, "Initializing Redis range index backend");
            Ok(Arc::new(RedisSortedSets::new(url).await?))
        }
    }
}

/// Create the primary result store
pub async fn create_result_store(config: &IndexConfig) -> Result<Arc<dyn ResultStore>> {
    match config.backend {
        IndexBackend::Memory => {
            tracing::info!("Initializing in-memory result store");
            Ok(Arc::new(InMemoryResultStore::new()))
        }

        IndexBackend::Redis => {
            let url = redis_url(config)?;
            tracing::info!(url = %url, "Initializing Redis result store");
            Ok(Arc::new(
                RedisResultStore::new_with_prefix(url, &config.key_prefix).await?,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_in_memory_backends() {
        let config = IndexConfig::default();

        let backend = create_index_backend(&config).await.unwrap();
        backend.add("k", "a", 1.0).await.unwrap();
        assert_eq!(backend.range_by_score("k", 0.0, 2.0).await.unwrap().len(), 1);

        let store = create_result_store(&config).await.unwrap();
        assert!(store.markers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redis_requires_url() {
        let config = IndexConfig {
            backend: IndexBackend::Redis,
            redis_url: None,
            key_prefix: "mrs".to_string(),
        };

        assert!(matches!(
            create_index_backend(&config).await,
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            create_result_store(&config).await,
            Err(AppError::Configuration(_))
        ));
    }
}
