use crate::error::{AppError, Result};
use crate::models::{MeasurementResult, ResultId};
use crate::state::{ResultStore, SortedSetBackend};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::collections::HashSet;

/// Open a managed connection and check it with PING
async fn connect(redis_url: &str) -> Result<ConnectionManager> {
    let client = Client::open(redis_url).map_err(|e| {
        AppError::Configuration(format!("Invalid Redis URL '{}': {}", redis_url, e))
    })?;

    let mut connection = ConnectionManager::new(client)
        .await
        .map_err(|e| AppError::Connectivity(format!("Failed to connect to Redis: {}", e)))?;

    redis::cmd("PING")
        .query_async::<_, String>(&mut connection)
        .await
        .map_err(|e| AppError::Connectivity(format!("Redis connection test failed: {}", e)))?;

    Ok(connection)
}

/// Attach context to a Redis failure without losing its error class
fn command_error(context: &str, err: RedisError) -> AppError {
    match AppError::from(err) {
        AppError::Connectivity(msg) => AppError::Connectivity(format!("{}: {}", context, msg)),
        other => AppError::Internal(format!("{}: {}", context, other)),
    }
}

/// Render a score bound the way ZRANGEBYSCORE expects it
fn score_arg(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        // Display is the shortest exact round-trip form
        format!("{}", score)
    }
}

/// Escape glob metacharacters so a key prefix matches literally in SCAN
fn glob_escape(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Redis-backed sorted sets for the range index
#[derive(Clone)]
pub struct RedisSortedSets {
    connection: ConnectionManager,
}

impl RedisSortedSets {
    /// Connect to Redis
    pub async fn new(redis_url: &str) -> Result<Self> {
        let connection = connect(redis_url).await?;
        tracing::info!("Initialized Redis sorted-set backend");
        Ok(Self { connection })
    }
}

#[async_trait]
impl SortedSetBackend for RedisSortedSets {
    async fn add(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .zadd(key, member, score)
            .await
            .map_err(|e| command_error("Failed to add index entry", e))?;
        Ok(())
    }

    async fn remove(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .zrem(key, member)
            .await
            .map_err(|e| command_error("Failed to remove index entry", e))?;
        Ok(())
    }

    async fn range_by_score(
        &self,
        key: &str,
        lower: f64,
        upper: f64,
    ) -> Result<HashSet<String>> {
        let mut conn = self.connection.clone();
        let members: Vec<String> = conn
            .zrangebyscore(key, score_arg(lower), score_arg(upper))
            .await
            .map_err(|e| command_error("Failed to query index range", e))?;
        Ok(members.into_iter().collect())
    }

    async fn members_with_scores(&self, key: &str) -> Result<Vec<(String, f64)>> {
        let mut conn = self.connection.clone();
        let entries: Vec<(String, f64)> = conn
            .zrange_withscores(key, 0, -1)
            .await
            .map_err(|e| command_error("Failed to read index", e))?;
        Ok(entries)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| command_error("Failed to drop index", e))?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        let pattern = format!("{}*", glob_escape(prefix));
        let mut iter: redis::AsyncIter<String> = conn
            .scan_match(&pattern)
            .await
            .map_err(|e| command_error("Failed to scan index keys", e))?;

        // SCAN may yield a key more than once
        let mut keys = std::collections::BTreeSet::new();
        while let Some(key) = iter.next_item().await {
            keys.insert(key);
        }
        Ok(keys.into_iter().collect())
    }
}

/// Redis-based result store: one hash per marker, field = record id, value = JSON
#[derive(Clone)]
pub struct RedisResultStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisResultStore {
    /// Create a new Redis result store
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::new_with_prefix(redis_url, "mrs").await
    }

    /// Create a new Redis result store with custom key prefix
    pub async fn new_with_prefix(redis_url: &str, prefix: &str) -> Result<Self> {
        let connection = connect(redis_url).await?;
        tracing::info!("Initialized Redis result store with prefix '{}'", prefix);

        Ok(Self {
            connection,
            key_prefix: prefix.to_string(),
        })
    }

    /// Hash holding every result of a marker
    fn marker_results_key(&self, marker_name: &str) -> String {
        format!("{}:results:{}", self.key_prefix, marker_name)
    }

    /// Set of markers with stored results
    fn markers_key(&self) -> String {
        format!("{}:markers", self.key_prefix)
    }
}

#[async_trait]
impl ResultStore for RedisResultStore {
    async fn save(&self, result: &MeasurementResult) -> Result<()> {
        result.validate()?;
        let value = serde_json::to_string(result)?;

        let mut conn = self.connection.clone();
        let _: () = conn
            .hset(self.marker_results_key(&result.marker_name), &result.record_id, value)
            .await
            .map_err(|e| command_error("Failed to save result", e))?;
        let _: () = conn
            .sadd(self.markers_key(), &result.marker_name)
            .await
            .map_err(|e| command_error("Failed to update marker set", e))?;

        tracing::debug!(result_id = %result.id(), "Result saved to Redis");
        Ok(())
    }

    async fn get(&self, id: &ResultId) -> Result<Option<MeasurementResult>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn
            .hget(self.marker_results_key(&id.marker_name), &id.record_id)
            .await
            .map_err(|e| command_error("Failed to get result", e))?;

        value
            .map(|json| serde_json::from_str(&json).map_err(AppError::from))
            .transpose()
    }

    async fn delete(&self, id: &ResultId) -> Result<()> {
        let mut conn = self.connection.clone();
        let key = self.marker_results_key(&id.marker_name);

        let removed: u64 = conn
            .hdel(&key, &id.record_id)
            .await
            .map_err(|e| command_error("Failed to delete result", e))?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("Result {} not found", id)));
        }

        let remaining: u64 = conn
            .hlen(&key)
            .await
            .map_err(|e| command_error("Failed to count marker results", e))?;
        if remaining == 0 {
            let _: () = conn
                .srem(self.markers_key(), &id.marker_name)
                .await
                .map_err(|e| command_error("Failed to update marker set", e))?;
        }

        tracing::debug!(result_id = %id, "Result deleted from Redis");
        Ok(())
    }

    async fn exists(&self, id: &ResultId) -> Result<bool> {
        let mut conn = self.connection.clone();
        conn.hexists(self.marker_results_key(&id.marker_name), &id.record_id)
            .await
            .map_err(|e| command_error("Failed to check result existence", e))
    }

    async fn list_by_marker(&self, marker_name: &str) -> Result<Vec<MeasurementResult>> {
        let mut conn = self.connection.clone();
        let values: Vec<String> = conn
            .hvals(self.marker_results_key(marker_name))
            .await
            .map_err(|e| command_error("Failed to list marker results", e))?;

        let mut results = values
            .iter()
            .map(|json| serde_json::from_str(json).map_err(AppError::from))
            .collect::<Result<Vec<MeasurementResult>>>()?;
        results.sort_by(|a, b| a.record_id.cmp(&b.record_id));

        Ok(results)
    }

    async fn markers(&self) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        let mut markers: Vec<String> = conn
            .smembers(self.markers_key())
            .await
            .map_err(|e| command_error("Failed to list markers", e))?;
        markers.sort();
        Ok(markers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_REDIS_URL: &str = "redis://127.0.0.1:6379/15";

    // Helper to check if Redis is available
    async fn redis_available() -> bool {
        match Client::open(TEST_REDIS_URL) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(mut conn) => redis::cmd("PING")
                    .query_async::<_, String>(&mut conn)
                    .await
                    .is_ok(),
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    fn unique_prefix() -> String {
        format!("test-{}", uuid::Uuid::new_v4())
    }

    #[test]
    fn test_score_arg_formats_infinities() {
        assert_eq!(score_arg(f64::INFINITY), "+inf");
        assert_eq!(score_arg(f64::NEG_INFINITY), "-inf");
        assert_eq!(score_arg(1.5), "1.5");
        let tiny = 5e-324;
        assert_eq!(score_arg(tiny).parse::<f64>().unwrap(), tiny);
    }

    #[test]
    fn test_glob_escape() {
        assert_eq!(glob_escape("mrs:range:"), "mrs:range:");
        assert_eq!(glob_escape("a*b?[c]"), "a\\*b\\?\\[c\\]");
    }

    #[tokio::test]
    async fn test_sorted_set_range_query() {
        if !redis_available().await {
            eprintln!("Skipping test: Redis not available");
            return;
        }
        let sets = RedisSortedSets::new(TEST_REDIS_URL).await.unwrap();
        let key = format!("{}:range", unique_prefix());

        sets.add(&key, "a", 1.0).await.unwrap();
        sets.add(&key, "b", 2.0).await.unwrap();
        sets.add(&key, "c", 3.0).await.unwrap();

        let found = sets.range_by_score(&key, 1.0, 2.0).await.unwrap();
        assert_eq!(found, HashSet::from(["a".to_string(), "b".to_string()]));

        let above = sets
            .range_by_score(&key, crate::boundary::next_up(2.0), f64::INFINITY)
            .await
            .unwrap();
        assert_eq!(above, HashSet::from(["c".to_string()]));

        let prefix = key.trim_end_matches("range");
        assert_eq!(sets.keys_with_prefix(prefix).await.unwrap(), vec![key.clone()]);

        // Cleanup
        sets.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_result_store_round_trip() {
        if !redis_available().await {
            eprintln!("Skipping test: Redis not available");
            return;
        }
        let store = RedisResultStore::new_with_prefix(TEST_REDIS_URL, &unique_prefix())
            .await
            .unwrap();
        let result = MeasurementResult::range("rec-1", "ph", 6.0, 6.5).with_technology("ise");

        store.save(&result).await.unwrap();
        assert_eq!(store.get(&result.id()).await.unwrap(), Some(result.clone()));
        assert_eq!(store.markers().await.unwrap(), vec!["ph"]);

        // Cleanup
        store.delete(&result.id()).await.unwrap();
        assert!(store.markers().await.unwrap().is_empty());
    }
}
