use crate::models::TechnologyProperties;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

type PropertiesKey = (String, String);

/// Cached `(technology, marker)` property lookups using Moka
///
/// A cached `None` records that the catalog holds no properties for the pair,
/// which is a valid deviation-free state rather than a miss.
#[derive(Clone)]
pub struct PropertiesCache {
    cache: Cache<PropertiesKey, Option<Arc<TechnologyProperties>>>,
}

impl PropertiesCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    fn key(technology_name: &str, marker_name: &str) -> PropertiesKey {
        (technology_name.to_string(), marker_name.to_string())
    }

    pub async fn get(
        &self,
        technology_name: &str,
        marker_name: &str,
    ) -> Option<Option<Arc<TechnologyProperties>>> {
        self.cache.get(&Self::key(technology_name, marker_name)).await
    }

    pub async fn insert(
        &self,
        technology_name: &str,
        marker_name: &str,
        properties: Option<Arc<TechnologyProperties>>,
    ) {
        self.cache
            .insert(Self::key(technology_name, marker_name), properties)
            .await;
    }

    pub async fn invalidate(&self, technology_name: &str, marker_name: &str) {
        self.cache
            .invalidate(&Self::key(technology_name, marker_name))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let cache = PropertiesCache::new(100, Duration::from_secs(60));
        let properties = Arc::new(TechnologyProperties {
            is_percentage: Some(true),
            ..Default::default()
        });

        cache.insert("ise", "ph", Some(properties.clone())).await;
        assert_eq!(cache.get("ise", "ph").await, Some(Some(properties)));

        cache.invalidate("ise", "ph").await;
        assert_eq!(cache.get("ise", "ph").await, None);
    }

    #[tokio::test]
    async fn test_cache_remembers_absent_properties() {
        let cache = PropertiesCache::new(100, Duration::from_secs(60));

        cache.insert("ise", "nitrate", None).await;
        assert_eq!(cache.get("ise", "nitrate").await, Some(None));
    }

    #[tokio::test]
    async fn test_cache_ttl() {
        let cache = PropertiesCache::new(100, Duration::from_millis(100));

        cache.insert("ise", "ph", None).await;

        // Value should be present immediately
        assert!(cache.get("ise", "ph").await.is_some());

        // Wait for TTL to expire
        tokio::time::sleep(Duration::from_millis(150)).await;

        // Value should be expired
        assert!(cache.get("ise", "ph").await.is_none());
    }
}
