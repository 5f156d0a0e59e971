pub mod store;
pub mod cache;
pub mod redis_store;
pub mod factory;

pub use store::*;
pub use cache::*;
pub use redis_store::{RedisResultStore, RedisSortedSets};
pub use factory::{create_index_backend, create_result_store};

use crate::error::Result;
use crate::models::{MeasurementResult, ResultId};
use async_trait::async_trait;
use std::collections::HashSet;

/// Trait for the primary result store
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Save (insert or replace) a result
    async fn save(&self, result: &MeasurementResult) -> Result<()>;

    /// Get a result by identity
    async fn get(&self, id: &ResultId) -> Result<Option<MeasurementResult>>;

    /// Delete a result
    async fn delete(&self, id: &ResultId) -> Result<()>;

    /// Check whether a result exists
    async fn exists(&self, id: &ResultId) -> Result<bool>;

    /// All results stored for a marker
    async fn list_by_marker(&self, marker_name: &str) -> Result<Vec<MeasurementResult>>;

    /// Markers with at least one stored result
    async fn markers(&self) -> Result<Vec<String>>;
}

/// Trait for sorted-set storage backing the range index
///
/// Each key names one sorted collection of `(score, member)` pairs with at most
/// one score per member.
#[async_trait]
pub trait SortedSetBackend: Send + Sync {
    /// Insert a member or replace its score
    async fn add(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// Remove a member; missing members are ignored
    async fn remove(&self, key: &str, member: &str) -> Result<()>;

    /// Members whose score lies in `[lower, upper]`
    async fn range_by_score(&self, key: &str, lower: f64, upper: f64)
        -> Result<HashSet<String>>;

    /// Every member with its score, ascending by score
    async fn members_with_scores(&self, key: &str) -> Result<Vec<(String, f64)>>;

    /// Drop a whole sorted set
    async fn delete(&self, key: &str) -> Result<()>;

    /// Names of the non-empty sorted sets starting with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}
