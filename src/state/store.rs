use crate::error::{AppError, Result};
use crate::models::{MeasurementResult, ResultId};
use crate::state::{ResultStore, SortedSetBackend};
use async_trait::async_trait;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// In-memory result store (for embedding and testing)
#[derive(Clone)]
pub struct InMemoryResultStore {
    results: Arc<DashMap<ResultId, MeasurementResult>>,
    marker_index: Arc<DashMap<String, HashSet<String>>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self {
            results: Arc::new(DashMap::new()),
            marker_index: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn save(&self, result: &MeasurementResult) -> Result<()> {
        result.validate()?;

        let id = result.id();
        self.results.insert(id.clone(), result.clone());
        self.marker_index
            .entry(id.marker_name.clone())
            .or_default()
            .insert(id.record_id.clone());

        tracing::debug!(result_id = %id, "Result saved");
        Ok(())
    }

    async fn get(&self, id: &ResultId) -> Result<Option<MeasurementResult>> {
        Ok(self.results.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &ResultId) -> Result<()> {
        if self.results.remove(id).is_none() {
            return Err(AppError::NotFound(format!("Result {} not found", id)));
        }

        if let Some(mut records) = self.marker_index.get_mut(&id.marker_name) {
            records.remove(&id.record_id);
        }
        self.marker_index
            .remove_if(&id.marker_name, |_, records| records.is_empty());

        tracing::debug!(result_id = %id, "Result deleted");
        Ok(())
    }

    async fn exists(&self, id: &ResultId) -> Result<bool> {
        Ok(self.results.contains_key(id))
    }

    async fn list_by_marker(&self, marker_name: &str) -> Result<Vec<MeasurementResult>> {
        let Some(records) = self.marker_index.get(marker_name) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<MeasurementResult> = records
            .iter()
            .filter_map(|record_id| {
                self.results
                    .get(&ResultId::new(record_id.clone(), marker_name))
                    .map(|entry| entry.clone())
            })
            .collect();
        results.sort_by(|a, b| a.record_id.cmp(&b.record_id));

        Ok(results)
    }

    async fn markers(&self) -> Result<Vec<String>> {
        let mut markers: Vec<String> = self
            .marker_index
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        markers.sort();
        Ok(markers)
    }
}

/// Total order over scores; `-0.0` is folded into `0.0`
#[derive(Debug, Clone, Copy)]
struct ScoreKey(f64);

impl ScoreKey {
    fn new(score: f64) -> Self {
        Self(score + 0.0)
    }
}

impl PartialEq for ScoreKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoreKey {}

impl PartialOrd for ScoreKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoreKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, ScoreKey>,
    ordered: BTreeSet<(ScoreKey, String)>,
}

impl SortedSet {
    fn insert(&mut self, member: &str, score: ScoreKey) {
        if let Some(previous) = self.scores.insert(member.to_string(), score) {
            self.ordered.remove(&(previous, member.to_string()));
        }
        self.ordered.insert((score, member.to_string()));
    }

    fn remove(&mut self, member: &str) {
        if let Some(previous) = self.scores.remove(member) {
            self.ordered.remove(&(previous, member.to_string()));
        }
    }

    fn range(&self, lower: ScoreKey, upper: ScoreKey) -> HashSet<String> {
        if lower > upper {
            return HashSet::new();
        }

        self.ordered
            .range((lower, String::new())..)
            .take_while(|(score, _)| *score <= upper)
            .map(|(_, member)| member.clone())
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// In-memory sorted sets (for embedding and testing)
#[derive(Clone, Default)]
pub struct InMemorySortedSets {
    sets: Arc<DashMap<String, SortedSet>>,
}

impl InMemorySortedSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sorted sets currently held
    pub fn key_count(&self) -> usize {
        self.sets.len()
    }
}

#[async_trait]
impl SortedSetBackend for InMemorySortedSets {
    async fn add(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member, ScoreKey::new(score));
        Ok(())
    }

    async fn remove(&self, key: &str, member: &str) -> Result<()> {
        if let Some(mut set) = self.sets.get_mut(key) {
            set.remove(member);
        }
        self.sets.remove_if(key, |_, set| set.is_empty());
        Ok(())
    }

    async fn range_by_score(
        &self,
        key: &str,
        lower: f64,
        upper: f64,
    ) -> Result<HashSet<String>> {
        Ok(self
            .sets
            .get(key)
            .map(|set| set.range(ScoreKey::new(lower), ScoreKey::new(upper)))
            .unwrap_or_default())
    }

    async fn members_with_scores(&self, key: &str) -> Result<Vec<(String, f64)>> {
        Ok(self
            .sets
            .get(key)
            .map(|set| {
                set.ordered
                    .iter()
                    .map(|(score, member)| (member.clone(), score.0))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.sets.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .sets
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
