//! Shared fixtures for integration tests
//!
//! Builds the full in-memory stack: catalog, result store, range index,
//! maintainer and orchestrator wired the way the binary wires them.

#![allow(dead_code)]

use marker_range_search::{
    config::CatalogConfig,
    deviation::{DeviationResolver, InMemoryTechnologyCatalog},
    index::{IndexMaintainer, RangeIndexStore},
    models::{DeviationRange, MeasurementResult, ResultId, TechnologyProperties},
    search::QueryOrchestrator,
    state::{InMemoryResultStore, InMemorySortedSets, ResultStore},
};
use std::sync::Arc;

pub const CATALOG_YAML: &str = r#"
markers: [M, ph]
technologies:
  - name: T
    markers:
      M:
        is_percentage: false
        deviation_ranges:
          - { from: 1.0, to: 2.0, deviation: 0.5 }
  - name: pct
    markers:
      ph:
        is_percentage: true
        deviation_ranges:
          - { from: 0.0, to: 14.0, deviation: 0.1 }
"#;

pub struct TestStack {
    pub catalog: InMemoryTechnologyCatalog,
    pub backend: Arc<InMemorySortedSets>,
    pub store: Arc<InMemoryResultStore>,
    pub index: RangeIndexStore,
    pub maintainer: IndexMaintainer,
    pub orchestrator: QueryOrchestrator,
}

impl TestStack {
    pub fn new() -> Self {
        let catalog =
            InMemoryTechnologyCatalog::from_yaml_str(CATALOG_YAML).expect("test catalog parses");
        let backend = Arc::new(InMemorySortedSets::new());
        let store = Arc::new(InMemoryResultStore::new());
        let index = RangeIndexStore::new(backend.clone(), "it");
        let resolver =
            DeviationResolver::from_config(Arc::new(catalog.clone()), &CatalogConfig::default());

        Self {
            maintainer: IndexMaintainer::new(index.clone(), resolver, store.clone()),
            orchestrator: QueryOrchestrator::new(
                index.clone(),
                Arc::new(catalog.clone()),
                store.clone(),
            ),
            catalog,
            backend,
            store,
            index,
        }
    }

    /// Store a result and index it, as the CRUD layer would
    pub async fn save(&self, result: MeasurementResult) {
        self.store.save(&result).await.expect("save result");
        self.maintainer
            .on_result_saved(&result)
            .await
            .expect("index result");
    }

    /// Delete a result and drop it from the index
    pub async fn delete(&self, record_id: &str, marker_name: &str) {
        let id = ResultId::new(record_id, marker_name);
        self.store.delete(&id).await.expect("delete result");
        self.maintainer
            .on_result_deleted(&id)
            .await
            .expect("unindex result");
    }

    /// Replace the deviation ranges of a technology on a marker
    pub fn set_deviation(
        &self,
        technology: &str,
        marker: &str,
        ranges: Vec<DeviationRange>,
        is_percentage: bool,
    ) {
        self.catalog
            .set_properties(
                technology,
                marker,
                TechnologyProperties {
                    deviation_ranges: ranges,
                    is_percentage: Some(is_percentage),
                    ..Default::default()
                },
            )
            .expect("valid properties");
    }
}

/// Sorted ids for order-independent assertions
pub fn sorted<I: IntoIterator<Item = String>>(ids: I) -> Vec<String> {
    let mut ids: Vec<String> = ids.into_iter().collect();
    ids.sort();
    ids
}

/// Value of a metric sample line in Prometheus exposition format
///
/// Example: `name{a="1"} 42` -> Some(42.0)
pub fn extract_metric_value(line: &str) -> Option<f64> {
    line.split_whitespace().last()?.parse::<f64>().ok()
}
