//! Per-marker range index over sorted sets.
//!
//! Every marker owns four sorted sets, one per `(bound, variant)` pair:
//!
//! ```text
//! {prefix}:range:min:raw:{marker}          score = stored min
//! {prefix}:range:max:raw:{marker}          score = stored max
//! {prefix}:range:min:technology:{marker}   score = min - technology deviation
//! {prefix}:range:max:technology:{marker}   score = max + technology deviation
//! ```
//!
//! Members are plain record ids. The index is derived from the primary result
//! store and can always be rebuilt from it (see [`IndexMaintainer`]).

pub mod maintenance;

pub use maintenance::IndexMaintainer;

use crate::error::{AppError, Result};
use crate::metrics::INDEX_WRITES_TOTAL;
use crate::models::{MeasurementResult, ResultId};
use crate::state::SortedSetBackend;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use strum::{AsRefStr, Display};

/// Which edge of a result range a sorted set scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum IndexBound {
    Min,
    Max,
}

/// Raw stored values or technology-deviation-adjusted values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IndexVariant {
    Raw,
    Technology,
}

impl IndexVariant {
    pub const ALL: [IndexVariant; 2] = [IndexVariant::Raw, IndexVariant::Technology];

    pub fn from_technology_flag(use_technology_deviations: bool) -> Self {
        if use_technology_deviations {
            IndexVariant::Technology
        } else {
            IndexVariant::Raw
        }
    }
}

/// A record's indexed range for one marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRange {
    pub record_id: String,
    pub min: f64,
    pub max: f64,
}

/// Range index over a sorted-set backend
#[derive(Clone)]
pub struct RangeIndexStore {
    backend: Arc<dyn SortedSetBackend>,
    key_prefix: String,
}

impl RangeIndexStore {
    pub fn new(backend: Arc<dyn SortedSetBackend>, key_prefix: impl Into<String>) -> Self {
        Self {
            backend,
            key_prefix: key_prefix.into(),
        }
    }

    /// Name of the sorted set for a marker, bound and variant
    pub fn index_key(&self, marker_name: &str, bound: IndexBound, variant: IndexVariant) -> String {
        // Marker goes last so no two markers can produce the same key
        format!("{}:range:{}:{}:{}", self.key_prefix, bound, variant, marker_name)
    }

    /// Write a result's effective bounds into one variant
    pub async fn index_result(
        &self,
        result: &MeasurementResult,
        effective_min: f64,
        effective_max: f64,
        variant: IndexVariant,
    ) -> Result<()> {
        let effective_min = checked_score(effective_min, "effective min")?;
        let effective_max = checked_score(effective_max, "effective max")?;
        if effective_min > effective_max {
            return Err(AppError::BadRequest(format!(
                "Effective min {} exceeds effective max {} for result {}",
                effective_min,
                effective_max,
                result.id()
            )));
        }

        let min_key = self.index_key(&result.marker_name, IndexBound::Min, variant);
        let max_key = self.index_key(&result.marker_name, IndexBound::Max, variant);

        self.backend
            .add(&min_key, &result.record_id, effective_min)
            .await?;
        self.backend
            .add(&max_key, &result.record_id, effective_max)
            .await?;

        INDEX_WRITES_TOTAL
            .with_label_values(&[variant.as_ref(), "index"])
            .inc();
        tracing::debug!(
            result_id = %result.id(),
            variant = %variant,
            effective_min,
            effective_max,
            "Result indexed"
        );
        Ok(())
    }

    /// Record ids whose min-side score lies in `[lower, upper]`
    pub async fn search_minimum_matches(
        &self,
        marker_name: &str,
        lower: f64,
        upper: f64,
        variant: IndexVariant,
    ) -> Result<HashSet<String>> {
        self.search_side(marker_name, IndexBound::Min, lower, upper, variant)
            .await
    }

    /// Record ids whose max-side score lies in `[lower, upper]`
    pub async fn search_maximum_matches(
        &self,
        marker_name: &str,
        lower: f64,
        upper: f64,
        variant: IndexVariant,
    ) -> Result<HashSet<String>> {
        self.search_side(marker_name, IndexBound::Max, lower, upper, variant)
            .await
    }

    async fn search_side(
        &self,
        marker_name: &str,
        bound: IndexBound,
        lower: f64,
        upper: f64,
        variant: IndexVariant,
    ) -> Result<HashSet<String>> {
        let lower = checked_score(lower, "lower bound")?;
        let upper = checked_score(upper, "upper bound")?;
        if lower > upper {
            return Ok(HashSet::new());
        }

        let key = self.index_key(marker_name, bound, variant);
        self.backend.range_by_score(&key, lower, upper).await
    }

    /// Remove a result from all four sorted sets of its marker
    pub async fn remove_result(&self, id: &ResultId) -> Result<()> {
        for variant in IndexVariant::ALL {
            for bound in [IndexBound::Min, IndexBound::Max] {
                let key = self.index_key(&id.marker_name, bound, variant);
                self.backend.remove(&key, &id.record_id).await?;
            }
        }

        INDEX_WRITES_TOTAL
            .with_label_values(&["all", "remove"])
            .inc();
        tracing::debug!(result_id = %id, "Result removed from range index");
        Ok(())
    }

    /// Pair every min-side entry of a marker with its max-side entry
    pub async fn all_for_marker(
        &self,
        marker_name: &str,
        variant: IndexVariant,
    ) -> Result<Vec<IndexedRange>> {
        let min_key = self.index_key(marker_name, IndexBound::Min, variant);
        let max_key = self.index_key(marker_name, IndexBound::Max, variant);

        let (min_entries, max_entries) = futures::try_join!(
            self.backend.members_with_scores(&min_key),
            self.backend.members_with_scores(&max_key),
        )?;

        let mut max_scores: HashMap<String, f64> = max_entries.into_iter().collect();
        let mut ranges = Vec::with_capacity(min_entries.len());

        for (record_id, min) in min_entries {
            match max_scores.remove(&record_id) {
                Some(max) => ranges.push(IndexedRange { record_id, min, max }),
                None => tracing::warn!(
                    marker = marker_name,
                    record_id = %record_id,
                    "Record indexed on the min side only"
                ),
            }
        }

        for record_id in max_scores.keys() {
            tracing::warn!(
                marker = marker_name,
                record_id = %record_id,
                "Record indexed on the max side only"
            );
        }

        Ok(ranges)
    }

    /// Drop the four sorted sets of a marker
    pub async fn clear_marker(&self, marker_name: &str) -> Result<()> {
        for variant in IndexVariant::ALL {
            for bound in [IndexBound::Min, IndexBound::Max] {
                self.backend
                    .delete(&self.index_key(marker_name, bound, variant))
                    .await?;
            }
        }

        INDEX_WRITES_TOTAL
            .with_label_values(&["all", "clear"])
            .inc();
        tracing::debug!(marker = marker_name, "Range index cleared");
        Ok(())
    }

    /// Markers that still own at least one index sorted set
    pub async fn indexed_markers(&self) -> Result<Vec<String>> {
        let prefix = format!("{}:range:", self.key_prefix);
        let markers: BTreeSet<String> = self
            .backend
            .keys_with_prefix(&prefix)
            .await?
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix))
            // bound:variant:marker, and the marker may itself contain ':'
            .filter_map(|rest| rest.splitn(3, ':').nth(2))
            .map(str::to_string)
            .collect();
        Ok(markers.into_iter().collect())
    }
}

/// Reject NaN and fold `-0.0` into `0.0`
fn checked_score(score: f64, what: &str) -> Result<f64> {
    if score.is_nan() {
        return Err(AppError::BadRequest(format!("{} is not a number", what)));
    }
    Ok(score + 0.0)
}
