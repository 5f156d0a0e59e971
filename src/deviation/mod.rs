//! Technology-specific measurement deviation.
//!
//! A technology may declare, per marker, bands of raw values within which a
//! measurement is only accurate to a given deviation. The resolver turns a
//! raw value into the widened bounds stored in the technology index variant.

pub mod catalog;
pub mod resolver;

pub use catalog::InMemoryTechnologyCatalog;
pub use resolver::DeviationResolver;

use crate::error::Result;
use crate::models::TechnologyProperties;
use async_trait::async_trait;

/// Trait for technology and marker metadata
#[async_trait]
pub trait TechnologyCatalog: Send + Sync {
    /// Whether the technology is known
    async fn technology_exists(&self, technology_name: &str) -> Result<bool>;

    /// Whether the marker is known
    async fn marker_exists(&self, marker_name: &str) -> Result<bool>;

    /// Properties recorded for a technology on a marker, if any
    async fn properties(
        &self,
        technology_name: &str,
        marker_name: &str,
    ) -> Result<Option<TechnologyProperties>>;
}
