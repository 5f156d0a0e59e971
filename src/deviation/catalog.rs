use crate::deviation::TechnologyCatalog;
use crate::error::{AppError, Result};
use crate::models::TechnologyProperties;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use validator::Validate;

/// On-disk catalog layout
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    markers: Vec<String>,

    #[serde(default)]
    technologies: Vec<TechnologyEntry>,
}

#[derive(Debug, Deserialize)]
struct TechnologyEntry {
    name: String,

    /// Properties keyed by marker name
    #[serde(default)]
    markers: HashMap<String, TechnologyProperties>,
}

/// In-memory technology and marker metadata
#[derive(Debug, Clone, Default)]
pub struct InMemoryTechnologyCatalog {
    markers: Arc<DashSet<String>>,
    technologies: Arc<DashMap<String, HashMap<String, TechnologyProperties>>>,
}

impl InMemoryTechnologyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        let catalog = Self::new();

        for marker in file.markers {
            catalog.add_marker(marker);
        }
        for entry in &file.technologies {
            catalog.add_technology(entry.name.clone());
        }
        for entry in file.technologies {
            for (marker, properties) in entry.markers {
                catalog.set_properties(&entry.name, &marker, properties)?;
            }
        }

        tracing::info!(
            markers = catalog.markers.len(),
            technologies = catalog.technologies.len(),
            "Technology catalog loaded"
        );
        Ok(catalog)
    }

    /// Load a catalog from a YAML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&yaml)
    }

    pub fn add_marker(&self, marker_name: impl Into<String>) {
        self.markers.insert(marker_name.into());
    }

    pub fn add_technology(&self, technology_name: impl Into<String>) {
        self.technologies.entry(technology_name.into()).or_default();
    }

    /// Replace the properties of a technology for a marker
    ///
    /// Callers that changed deviation ranges must also re-index the affected
    /// results (see `IndexMaintainer::on_deviation_ranges_changed`).
    pub fn set_properties(
        &self,
        technology_name: &str,
        marker_name: &str,
        properties: TechnologyProperties,
    ) -> Result<()> {
        properties.validate()?;

        if !self.markers.contains(marker_name) {
            return Err(AppError::NotFound(format!("Marker {} not found", marker_name)));
        }
        for other in &properties.comparable_with {
            if !self.technologies.contains_key(other) {
                return Err(AppError::Validation(format!(
                    "Technology {} is declared comparable with unknown technology {}",
                    technology_name, other
                )));
            }
        }

        let mut markers = self.technologies.get_mut(technology_name).ok_or_else(|| {
            AppError::NotFound(format!("Technology {} not found", technology_name))
        })?;
        markers.insert(marker_name.to_string(), properties);
        Ok(())
    }
}

#[async_trait]
impl TechnologyCatalog for InMemoryTechnologyCatalog {
    async fn technology_exists(&self, technology_name: &str) -> Result<bool> {
        Ok(self.technologies.contains_key(technology_name))
    }

    async fn marker_exists(&self, marker_name: &str) -> Result<bool> {
        Ok(self.markers.contains(marker_name))
    }

    async fn properties(
        &self,
        technology_name: &str,
        marker_name: &str,
    ) -> Result<Option<TechnologyProperties>> {
        Ok(self
            .technologies
            .get(technology_name)
            .and_then(|markers| markers.get(marker_name).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviationRange;
    use std::io::Write;

    const CATALOG: &str = r#"
markers: [ph, nitrate]
technologies:
  - name: ise-a
    markers:
      ph:
        is_percentage: false
        deviation_ranges:
          - { from: 1.0, to: 2.0, deviation: 0.5 }
        comparable_with: [ise-b]
  - name: ise-b
"#;

    #[tokio::test]
    async fn test_load_from_yaml() {
        let catalog = InMemoryTechnologyCatalog::from_yaml_str(CATALOG).unwrap();

        assert!(catalog.marker_exists("ph").await.unwrap());
        assert!(!catalog.marker_exists("lead").await.unwrap());
        assert!(catalog.technology_exists("ise-b").await.unwrap());

        let properties = catalog.properties("ise-a", "ph").await.unwrap().unwrap();
        assert_eq!(
            properties.deviation_ranges,
            vec![DeviationRange::new(1.0, 2.0, 0.5)]
        );
        assert_eq!(properties.comparable_with, vec!["ise-b"]);
        assert!(catalog.properties("ise-b", "ph").await.unwrap().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let catalog = InMemoryTechnologyCatalog::from_path(file.path()).unwrap();
        assert_eq!(catalog.technologies.len(), 2);
    }

    #[test]
    fn test_overlapping_ranges_are_rejected_on_load() {
        let yaml = r#"
markers: [ph]
technologies:
  - name: ise-a
    markers:
      ph:
        is_percentage: true
        deviation_ranges:
          - { from: 0.0, to: 5.0, deviation: 0.1 }
          - { from: 4.0, to: 9.0, deviation: 0.1 }
"#;
        assert!(matches!(
            InMemoryTechnologyCatalog::from_yaml_str(yaml),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_properties_for_unknown_marker_fail() {
        let catalog = InMemoryTechnologyCatalog::new();
        catalog.add_technology("ise-a");

        let err = catalog
            .set_properties("ise-a", "ph", TechnologyProperties::default())
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_unknown_comparable_technology_fails() {
        let catalog = InMemoryTechnologyCatalog::new();
        catalog.add_marker("ph");
        catalog.add_technology("ise-a");

        let properties = TechnologyProperties {
            comparable_with: vec!["ise-z".to_string()],
            ..Default::default()
        };
        assert!(catalog.set_properties("ise-a", "ph", properties).is_err());
    }
}
