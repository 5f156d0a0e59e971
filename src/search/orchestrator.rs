use crate::deviation::TechnologyCatalog;
use crate::error::{AppError, Result};
use crate::index::{IndexVariant, IndexedRange, RangeIndexStore};
use crate::metrics::{INDEX_DRIFT_TOTAL, RANGE_SEARCHES_TOTAL, RANGE_SEARCH_DURATION_SECONDS};
use crate::models::{MeasurementResult, ResultId};
use crate::search::query::{RangeQuery, ResolvedQuery};
use crate::search::strategy::strategy_for;
use crate::state::ResultStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Entry point for range searches
///
/// Resolves caller intent into bounds, runs the matching strategy against the
/// range index and optionally hydrates matches from the primary store.
#[derive(Clone)]
pub struct QueryOrchestrator {
    index: RangeIndexStore,
    catalog: Arc<dyn TechnologyCatalog>,
    store: Arc<dyn ResultStore>,
}

impl QueryOrchestrator {
    pub fn new(
        index: RangeIndexStore,
        catalog: Arc<dyn TechnologyCatalog>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            index,
            catalog,
            store,
        }
    }

    /// Record ids of the marker's results matching the query
    pub async fn search_ids(&self, query: &RangeQuery) -> Result<HashSet<String>> {
        let resolved = query.resolve()?;
        self.ensure_marker(&resolved.marker_name).await?;

        let strategy = strategy_for(resolved.search_type);
        let timer = Instant::now();

        let outcome = self.run(&resolved).await;

        let label = if outcome.is_ok() { "ok" } else { "error" };
        RANGE_SEARCHES_TOTAL
            .with_label_values(&[strategy.name(), label])
            .inc();
        RANGE_SEARCH_DURATION_SECONDS
            .with_label_values(&[strategy.name()])
            .observe(timer.elapsed().as_secs_f64());

        let ids = outcome?;
        tracing::debug!(
            marker = %resolved.marker_name,
            strategy = strategy.name(),
            variant = %resolved.variant,
            min = resolved.min,
            max = resolved.max,
            matches = ids.len(),
            "Range search completed"
        );
        Ok(ids)
    }

    /// Full stored results matching the query, ordered by record id
    ///
    /// A matched id with no stored result means the index has drifted from
    /// the primary store; the search fails with [`AppError::IndexDrift`].
    pub async fn search_results(&self, query: &RangeQuery) -> Result<Vec<MeasurementResult>> {
        let ids = self.search_ids(query).await?;

        let mut record_ids: Vec<String> = ids.into_iter().collect();
        record_ids.sort();

        let lookups = record_ids
            .iter()
            .map(|record_id| self.hydrate(record_id, &query.marker_name));
        futures::future::try_join_all(lookups).await
    }

    /// Every indexed range of a marker, unfiltered
    pub async fn all_results_for_marker(
        &self,
        marker_name: &str,
        use_technology_deviations: bool,
    ) -> Result<Vec<IndexedRange>> {
        self.ensure_marker(marker_name).await?;
        self.index
            .all_for_marker(
                marker_name,
                IndexVariant::from_technology_flag(use_technology_deviations),
            )
            .await
    }

    async fn run(&self, resolved: &ResolvedQuery) -> Result<HashSet<String>> {
        let strategy = strategy_for(resolved.search_type);
        match resolved.tolerance_bounds {
            Some((min_with_tolerance, max_with_tolerance)) => {
                strategy
                    .search_with_tolerance(
                        &self.index,
                        &resolved.marker_name,
                        resolved.min,
                        resolved.max,
                        min_with_tolerance,
                        max_with_tolerance,
                        resolved.variant,
                    )
                    .await
            }
            None => {
                strategy
                    .search(
                        &self.index,
                        &resolved.marker_name,
                        resolved.min,
                        resolved.max,
                        resolved.variant,
                    )
                    .await
            }
        }
    }

    async fn ensure_marker(&self, marker_name: &str) -> Result<()> {
        if self.catalog.marker_exists(marker_name).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Marker {} not found", marker_name)))
        }
    }

    async fn hydrate(&self, record_id: &str, marker_name: &str) -> Result<MeasurementResult> {
        let id = ResultId::new(record_id, marker_name);
        match self.store.get(&id).await? {
            Some(result) => Ok(result),
            None => {
                INDEX_DRIFT_TOTAL.inc();
                tracing::error!(
                    result_id = %id,
                    "Range index references a result missing from the store"
                );
                Err(AppError::IndexDrift(format!(
                    "Indexed result {} has no stored counterpart",
                    id
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogConfig;
    use crate::deviation::{DeviationResolver, InMemoryTechnologyCatalog};
    use crate::index::IndexMaintainer;
    use crate::models::Margin;
    use crate::search::SearchType;
    use crate::state::{InMemoryResultStore, InMemorySortedSets};

    struct Harness {
        orchestrator: QueryOrchestrator,
        maintainer: IndexMaintainer,
        store: Arc<InMemoryResultStore>,
    }

    impl Harness {
        async fn save(&self, result: MeasurementResult) {
            self.store.save(&result).await.unwrap();
            self.maintainer.on_result_saved(&result).await.unwrap();
        }
    }

    fn harness() -> Harness {
        let catalog = Arc::new(InMemoryTechnologyCatalog::new());
        catalog.add_marker("M");

        let index = RangeIndexStore::new(Arc::new(InMemorySortedSets::new()), "test");
        let store = Arc::new(InMemoryResultStore::new());
        let resolver = DeviationResolver::from_config(catalog.clone(), &CatalogConfig::default());

        Harness {
            orchestrator: QueryOrchestrator::new(index.clone(), catalog, store.clone()),
            maintainer: IndexMaintainer::new(index, resolver, store.clone()),
            store,
        }
    }

    #[tokio::test]
    async fn test_search_ids_by_range() {
        let h = harness();
        h.save(MeasurementResult::range("r1", "M", 1.5, 2.5)).await;
        h.save(MeasurementResult::range("r2", "M", 0.5, 2.5)).await;

        let exact = h
            .orchestrator
            .search_ids(&RangeQuery::new("M").with_range(1.0, 3.0))
            .await
            .unwrap();
        assert_eq!(exact, HashSet::from(["r1".to_string()]));

        let below = h
            .orchestrator
            .search_ids(
                &RangeQuery::new("M")
                    .with_range(1.0, 3.0)
                    .with_search_type(SearchType::MinOutOfRange),
            )
            .await
            .unwrap();
        assert_eq!(below, HashSet::from(["r2".to_string()]));
    }

    #[tokio::test]
    async fn test_value_with_deviation() {
        let h = harness();
        h.save(MeasurementResult::point("r1", "M", 9.5)).await;
        h.save(MeasurementResult::point("r2", "M", 12.0)).await;

        let ids = h
            .orchestrator
            .search_ids(
                &RangeQuery::new("M")
                    .with_value(10.0)
                    .with_deviation(Margin::absolute(1.0)),
            )
            .await
            .unwrap();
        assert_eq!(ids, HashSet::from(["r1".to_string()]));
    }

    #[tokio::test]
    async fn test_unknown_marker_is_not_found() {
        let h = harness();
        let err = h
            .orchestrator
            .search_ids(&RangeQuery::new("unknown").with_value(1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = h
            .orchestrator
            .all_results_for_marker("unknown", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_bad_request_before_marker_lookup() {
        let h = harness();
        let err = h
            .orchestrator
            .search_ids(&RangeQuery::new("unknown").with_value(1.0).with_min(0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_search_results_are_hydrated_in_order() {
        let h = harness();
        for id in ["r3", "r1", "r2"] {
            h.save(MeasurementResult::range(id, "M", 1.0, 2.0)).await;
        }

        let results = h
            .orchestrator
            .search_results(&RangeQuery::new("M").with_range(0.0, 5.0))
            .await
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.record_id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
    }

    #[tokio::test]
    async fn test_missing_stored_result_is_drift() {
        let h = harness();
        // Indexed without being stored
        h.maintainer
            .on_result_saved(&MeasurementResult::point("ghost", "M", 1.0))
            .await
            .unwrap();

        let before = INDEX_DRIFT_TOTAL.get();
        let err = h
            .orchestrator
            .search_results(&RangeQuery::new("M").with_value(1.0))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::IndexDrift(_)));
        assert_eq!(err.error_code(), "INDEX_DRIFT");
        assert!(INDEX_DRIFT_TOTAL.get() > before);
    }

    #[tokio::test]
    async fn test_all_results_for_marker() {
        let h = harness();
        h.save(MeasurementResult::range("r1", "M", 3.0, 4.0)).await;
        h.save(MeasurementResult::range("r2", "M", 1.0, 9.0)).await;

        let all = h.orchestrator.all_results_for_marker("M", false).await.unwrap();
        assert_eq!(
            all,
            vec![
                IndexedRange {
                    record_id: "r2".to_string(),
                    min: 1.0,
                    max: 9.0
                },
                IndexedRange {
                    record_id: "r1".to_string(),
                    min: 3.0,
                    max: 4.0
                },
            ]
        );
    }
}
