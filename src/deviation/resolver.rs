use crate::config::CatalogConfig;
use crate::deviation::TechnologyCatalog;
use crate::error::{AppError, Result};
use crate::models::TechnologyProperties;
use crate::state::PropertiesCache;
use std::sync::Arc;
use std::time::Duration;

/// Resolves raw values into technology-deviation-adjusted bounds
#[derive(Clone)]
pub struct DeviationResolver {
    catalog: Arc<dyn TechnologyCatalog>,
    cache: PropertiesCache,
}

impl DeviationResolver {
    pub fn new(catalog: Arc<dyn TechnologyCatalog>, cache: PropertiesCache) -> Self {
        Self { catalog, cache }
    }

    /// Create a resolver with cache limits from configuration
    pub fn from_config(catalog: Arc<dyn TechnologyCatalog>, config: &CatalogConfig) -> Self {
        let cache = PropertiesCache::new(
            config.cache_capacity,
            Duration::from_secs(config.cache_ttl_secs),
        );
        Self::new(catalog, cache)
    }

    /// Effective `(min, max)` for a single raw value
    ///
    /// Without a deviation band covering `raw_value` the value is returned
    /// unchanged on both sides.
    pub async fn resolve(
        &self,
        technology_name: &str,
        marker_name: &str,
        raw_value: f64,
    ) -> Result<(f64, f64)> {
        check_finite(raw_value)?;
        let properties = self.properties(technology_name, marker_name).await?;
        Ok(widen(properties.as_deref(), raw_value))
    }

    /// Effective bounds for a stored range: the lower band widens `min`
    /// downward and the upper band widens `max` upward
    pub async fn resolve_bounds(
        &self,
        technology_name: &str,
        marker_name: &str,
        min: f64,
        max: f64,
    ) -> Result<(f64, f64)> {
        check_finite(min)?;
        check_finite(max)?;
        let properties = self.properties(technology_name, marker_name).await?;

        let (effective_min, _) = widen(properties.as_deref(), min);
        let (_, effective_max) = widen(properties.as_deref(), max);
        Ok((effective_min, effective_max))
    }

    /// Drop the cached properties of a pair after its deviation ranges changed
    pub async fn invalidate(&self, technology_name: &str, marker_name: &str) {
        self.cache.invalidate(technology_name, marker_name).await;
        tracing::debug!(
            technology = technology_name,
            marker = marker_name,
            "Deviation properties invalidated"
        );
    }

    async fn properties(
        &self,
        technology_name: &str,
        marker_name: &str,
    ) -> Result<Option<Arc<TechnologyProperties>>> {
        if let Some(cached) = self.cache.get(technology_name, marker_name).await {
            return Ok(cached);
        }

        if !self.catalog.technology_exists(technology_name).await? {
            return Err(AppError::NotFound(format!(
                "Technology {} not found",
                technology_name
            )));
        }
        if !self.catalog.marker_exists(marker_name).await? {
            return Err(AppError::NotFound(format!("Marker {} not found", marker_name)));
        }

        let properties = self
            .catalog
            .properties(technology_name, marker_name)
            .await?
            .map(Arc::new);
        self.cache
            .insert(technology_name, marker_name, properties.clone())
            .await;

        Ok(properties)
    }
}

fn widen(properties: Option<&TechnologyProperties>, value: f64) -> (f64, f64) {
    match properties.and_then(|p| p.margin_for(value)) {
        Some(margin) => margin.widen(value),
        None => (value, value),
    }
}

fn check_finite(value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Cannot resolve deviation for non-finite value {}",
            value
        )))
    }
}
