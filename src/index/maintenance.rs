use crate::deviation::DeviationResolver;
use crate::error::Result;
use crate::index::{IndexVariant, RangeIndexStore};
use crate::models::{MeasurementResult, ResultId};
use crate::state::ResultStore;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Keeps the range index in step with the primary result store
#[derive(Clone)]
pub struct IndexMaintainer {
    index: RangeIndexStore,
    resolver: DeviationResolver,
    store: Arc<dyn ResultStore>,
}

impl IndexMaintainer {
    pub fn new(
        index: RangeIndexStore,
        resolver: DeviationResolver,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            index,
            resolver,
            store,
        }
    }

    /// Index a saved result in both variants
    ///
    /// Results without a numeric payload are not indexed; any entries left
    /// from an earlier numeric version of the result are removed.
    pub async fn on_result_saved(&self, result: &MeasurementResult) -> Result<()> {
        result.validate()?;

        let Some((min, max)) = result.numeric_bounds() else {
            return self.index.remove_result(&result.id()).await;
        };

        // Resolve first so a failed lookup leaves the index untouched
        let (technology_min, technology_max) = match result.technology_name.as_deref() {
            Some(technology) => {
                self.resolver
                    .resolve_bounds(technology, &result.marker_name, min, max)
                    .await?
            }
            None => (min, max),
        };

        self.index
            .index_result(result, min, max, IndexVariant::Raw)
            .await?;
        self.index
            .index_result(result, technology_min, technology_max, IndexVariant::Technology)
            .await
    }

    /// Remove a deleted result from every variant
    pub async fn on_result_deleted(&self, id: &ResultId) -> Result<()> {
        self.index.remove_result(id).await
    }

    /// Recompute technology entries after a pair's deviation ranges changed
    ///
    /// Returns the number of re-indexed results.
    pub async fn on_deviation_ranges_changed(
        &self,
        technology_name: &str,
        marker_name: &str,
    ) -> Result<usize> {
        self.resolver.invalidate(technology_name, marker_name).await;

        let mut reindexed = 0;
        for result in self.store.list_by_marker(marker_name).await? {
            if result.technology_name.as_deref() != Some(technology_name) {
                continue;
            }
            let Some((min, max)) = result.numeric_bounds() else {
                continue;
            };

            let (technology_min, technology_max) = self
                .resolver
                .resolve_bounds(technology_name, marker_name, min, max)
                .await?;
            self.index
                .index_result(&result, technology_min, technology_max, IndexVariant::Technology)
                .await?;
            reindexed += 1;
        }

        tracing::info!(
            technology = technology_name,
            marker = marker_name,
            reindexed,
            "Technology index recomputed"
        );
        Ok(reindexed)
    }

    /// Rebuild a marker's index from the primary store
    pub async fn rebuild_marker(&self, marker_name: &str) -> Result<usize> {
        self.index.clear_marker(marker_name).await?;

        let mut indexed = 0;
        for result in self.store.list_by_marker(marker_name).await? {
            if result.numeric_bounds().is_none() {
                continue;
            }
            self.on_result_saved(&result).await?;
            indexed += 1;
        }

        tracing::info!(marker = marker_name, indexed, "Marker index rebuilt");
        Ok(indexed)
    }

    /// Rebuild every marker known to the primary store or the index
    ///
    /// Markers present only in the index have no stored results left, so
    /// their sorted sets are cleared and nothing is re-indexed.
    pub async fn rebuild_all(&self) -> Result<usize> {
        let mut markers: BTreeSet<String> = self.store.markers().await?.into_iter().collect();
        markers.extend(self.index.indexed_markers().await?);

        let mut indexed = 0;
        for marker in markers {
            indexed += self.rebuild_marker(&marker).await?;
        }

        tracing::info!(indexed, "Range index rebuilt");
        Ok(indexed)
    }
}
