//! Prometheus metrics for the range search engine.
//!
//! Covers strategy invocations, index writes and index/store drift. Metrics
//! are created lazily and registered once through [`init_metrics`].
//!
//! # Example
//! ```no_run
//! use marker_range_search::metrics::{gather_metrics, init_metrics};
//!
//! init_metrics().ok();
//! println!("{}", gather_metrics());
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Range searches executed
    ///
    /// Labels: strategy, outcome (ok, error)
    pub static ref RANGE_SEARCHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("range_searches_total", "Total number of range searches")
            .namespace("marker_range_search"),
        &["strategy", "outcome"]
    ).expect("Failed to create RANGE_SEARCHES_TOTAL metric");

    /// Range search duration in seconds
    ///
    /// Labels: strategy
    pub static ref RANGE_SEARCH_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "range_search_duration_seconds",
            "Range search duration in seconds"
        )
        .namespace("marker_range_search")
        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["strategy"]
    ).expect("Failed to create RANGE_SEARCH_DURATION_SECONDS metric");

    /// Index mutations
    ///
    /// Labels: variant (raw, technology, all), operation (index, remove, clear)
    pub static ref INDEX_WRITES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("index_writes_total", "Total number of range index mutations")
            .namespace("marker_range_search"),
        &["variant", "operation"]
    ).expect("Failed to create INDEX_WRITES_TOTAL metric");

    /// Indexed record ids with no stored result
    pub static ref INDEX_DRIFT_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("index_drift_total", "Indexed results missing from the primary store")
            .namespace("marker_range_search")
    ).expect("Failed to create INDEX_DRIFT_TOTAL metric");
}

/// Register all metrics with the global registry
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(RANGE_SEARCHES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(RANGE_SEARCH_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(INDEX_WRITES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(INDEX_DRIFT_TOTAL.clone()))?;

    tracing::info!("Prometheus metrics registered");
    Ok(())
}

/// Export metrics in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_metrics_are_exported() {
        // Global registry: a second registration in the same process fails
        let _ = init_metrics();
        INDEX_DRIFT_TOTAL.inc();

        let output = gather_metrics();
        assert!(output.contains("marker_range_search_index_drift_total"));
        assert!(output.contains("# TYPE marker_range_search_index_drift_total counter"));
    }

    #[test]
    fn test_search_counter_labels() {
        let before = RANGE_SEARCHES_TOTAL
            .with_label_values(&["exact_match", "ok"])
            .get();
        RANGE_SEARCHES_TOTAL
            .with_label_values(&["exact_match", "ok"])
            .inc();
        let after = RANGE_SEARCHES_TOTAL
            .with_label_values(&["exact_match", "ok"])
            .get();
        assert!(after >= before + 1.0);
    }

    #[test]
    fn test_drift_counter_increments() {
        let before = INDEX_DRIFT_TOTAL.get();
        INDEX_DRIFT_TOTAL.inc();
        assert!(INDEX_DRIFT_TOTAL.get() >= before + 1);
    }
}
