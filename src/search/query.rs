//! Range search requests and their resolution into concrete bounds

use crate::error::{AppError, Result};
use crate::index::IndexVariant;
use crate::models::Margin;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Range-matching semantics
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SearchType {
    /// Result range lies inside the query range
    #[default]
    ExactMatch,

    /// Result min lies below the query range, result max inside it
    MinOutOfRange,

    /// Result min lies inside the query range, result max above it
    MaxOutOfRange,

    /// Result range strictly encloses the query range
    BothOutOfRange,
}

/// A caller's range search request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeQuery {
    /// Marker to search
    pub marker_name: String,

    /// Single target value; exclusive with `min`/`max`
    pub value: Option<f64>,

    /// Spread turning `value` into a range
    pub deviation: Option<Margin>,

    /// Lower query bound
    pub min: Option<f64>,

    /// Upper query bound
    pub max: Option<f64>,

    /// How far outside the range an out-of-range side may reach
    pub tolerance: Option<Margin>,

    /// Requested semantics; exact match when absent
    pub search_type: Option<SearchType>,

    /// Search the technology-deviation-adjusted index
    #[serde(default)]
    pub use_technology_deviations: bool,
}

impl RangeQuery {
    pub fn new(marker_name: impl Into<String>) -> Self {
        Self {
            marker_name: marker_name.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_deviation(mut self, deviation: Margin) -> Self {
        self.deviation = Some(deviation);
        self
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_range(self, min: f64, max: f64) -> Self {
        self.with_min(min).with_max(max)
    }

    pub fn with_tolerance(mut self, tolerance: Margin) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn with_search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = Some(search_type);
        self
    }

    pub fn with_technology_deviations(mut self, enabled: bool) -> Self {
        self.use_technology_deviations = enabled;
        self
    }

    /// Turn caller intent into one strategy invocation
    pub fn resolve(&self) -> Result<ResolvedQuery> {
        if self.marker_name.is_empty() {
            return Err(AppError::BadRequest("Marker name is required".to_string()));
        }
        for (name, margin) in [("deviation", self.deviation), ("tolerance", self.tolerance)] {
            if let Some(margin) = margin {
                if !margin.amount.is_finite() {
                    return Err(AppError::BadRequest(format!("{} must be finite", name)));
                }
            }
        }

        let (min, max, search_type) = match (self.value, self.min, self.max) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(AppError::BadRequest(
                    "value cannot be combined with min or max".to_string(),
                ));
            }
            (None, None, None) => {
                return Err(AppError::BadRequest(
                    "one of value, min or max is required".to_string(),
                ));
            }
            (Some(value), None, None) => {
                check_bound(value, "value")?;
                match self.deviation {
                    Some(deviation) => {
                        let (min, max) = deviation.widen(value);
                        (min, max, self.search_type.unwrap_or_default())
                    }
                    None => {
                        if let Some(requested) = self.search_type {
                            if requested != SearchType::ExactMatch {
                                tracing::debug!(
                                    requested = %requested,
                                    "Single value without deviation searched as exact match"
                                );
                            }
                        }
                        (value, value, SearchType::ExactMatch)
                    }
                }
            }
            (None, min, max) => {
                if self.deviation.is_some() {
                    return Err(AppError::BadRequest(
                        "deviation applies to a single value only".to_string(),
                    ));
                }
                let min = min.map(|m| check_bound(m, "min")).transpose()?;
                let max = max.map(|m| check_bound(m, "max")).transpose()?;
                (
                    min.unwrap_or(f64::NEG_INFINITY),
                    max.unwrap_or(f64::INFINITY),
                    self.search_type.unwrap_or_default(),
                )
            }
        };

        if min > max {
            return Err(AppError::BadRequest(format!(
                "min {} is greater than max {}",
                min, max
            )));
        }

        let tolerance_bounds = match self.tolerance {
            Some(_) if search_type == SearchType::ExactMatch => {
                return Err(AppError::BadRequest(
                    "tolerance cannot be used with an exact match search".to_string(),
                ));
            }
            Some(tolerance) => Some((
                widen_outward(min, &tolerance, true),
                widen_outward(max, &tolerance, false),
            )),
            None => None,
        };

        Ok(ResolvedQuery {
            marker_name: self.marker_name.clone(),
            min,
            max,
            tolerance_bounds,
            search_type,
            variant: IndexVariant::from_technology_flag(self.use_technology_deviations),
        })
    }
}

/// Concrete bounds and strategy for one search
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    pub marker_name: String,
    pub min: f64,
    pub max: f64,
    /// `(min_with_tolerance, max_with_tolerance)` when a tolerance was given
    pub tolerance_bounds: Option<(f64, f64)>,
    pub search_type: SearchType,
    pub variant: IndexVariant,
}

fn check_bound(value: f64, name: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AppError::BadRequest(format!("{} must be a finite number", name)))
    }
}

/// Push a bound away from the range by the tolerance; open ends stay open
fn widen_outward(bound: f64, tolerance: &Margin, downward: bool) -> f64 {
    if !bound.is_finite() {
        return bound;
    }
    let spread = tolerance.applied_to(bound);
    if downward {
        bound - spread
    } else {
        bound + spread
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_type_parsing() {
        assert_eq!("exact_match".parse::<SearchType>().unwrap(), SearchType::ExactMatch);
        assert_eq!(
            "BOTH_OUT_OF_RANGE".parse::<SearchType>().unwrap(),
            SearchType::BothOutOfRange
        );
        assert_eq!(SearchType::MinOutOfRange.to_string(), "min_out_of_range");
    }

    #[test]
    fn test_single_value_is_exact_point() {
        let resolved = RangeQuery::new("ph")
            .with_value(6.5)
            .with_search_type(SearchType::MaxOutOfRange)
            .resolve()
            .unwrap();

        assert_eq!((resolved.min, resolved.max), (6.5, 6.5));
        assert_eq!(resolved.search_type, SearchType::ExactMatch);
        assert_eq!(resolved.variant, IndexVariant::Raw);
    }

    #[test]
    fn test_value_with_deviation_keeps_requested_type() {
        let resolved = RangeQuery::new("ph")
            .with_value(10.0)
            .with_deviation(Margin::percentage(0.1))
            .with_search_type(SearchType::MinOutOfRange)
            .with_technology_deviations(true)
            .resolve()
            .unwrap();

        assert_eq!((resolved.min, resolved.max), (9.0, 11.0));
        assert_eq!(resolved.search_type, SearchType::MinOutOfRange);
        assert_eq!(resolved.variant, IndexVariant::Technology);
    }

    #[test]
    fn test_half_open_queries() {
        let only_min = RangeQuery::new("ph").with_min(2.0).resolve().unwrap();
        assert_eq!((only_min.min, only_min.max), (2.0, f64::INFINITY));

        let only_max = RangeQuery::new("ph").with_max(2.0).resolve().unwrap();
        assert_eq!((only_max.min, only_max.max), (f64::NEG_INFINITY, 2.0));
    }

    #[test]
    fn test_conflicting_inputs_are_bad_requests() {
        let cases = [
            RangeQuery::new("ph").with_value(1.0).with_min(0.0),
            RangeQuery::new("ph").with_value(1.0).with_max(2.0),
            RangeQuery::new("ph"),
            RangeQuery::new("ph").with_range(3.0, 1.0),
            RangeQuery::new("ph").with_min(f64::NAN),
            RangeQuery::new("ph").with_min(1.0).with_deviation(Margin::absolute(0.1)),
            RangeQuery::new("").with_value(1.0),
        ];

        for query in cases {
            assert!(
                matches!(query.resolve(), Err(AppError::BadRequest(_))),
                "{:?} should be rejected",
                query
            );
        }
    }

    #[test]
    fn test_tolerance_with_exact_match_fails_fast() {
        let explicit = RangeQuery::new("ph")
            .with_range(1.0, 2.0)
            .with_search_type(SearchType::ExactMatch)
            .with_tolerance(Margin::absolute(0.5));
        assert!(matches!(explicit.resolve(), Err(AppError::BadRequest(_))));

        // Defaulted exact match is rejected too
        let defaulted = RangeQuery::new("ph")
            .with_range(1.0, 2.0)
            .with_tolerance(Margin::absolute(0.5));
        assert!(matches!(defaulted.resolve(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_tolerance_bounds() {
        let resolved = RangeQuery::new("ph")
            .with_range(10.0, 20.0)
            .with_search_type(SearchType::BothOutOfRange)
            .with_tolerance(Margin::percentage(0.5))
            .resolve()
            .unwrap();
        assert_eq!(resolved.tolerance_bounds, Some((5.0, 30.0)));

        let open = RangeQuery::new("ph")
            .with_max(20.0)
            .with_search_type(SearchType::MaxOutOfRange)
            .with_tolerance(Margin::percentage(0.0))
            .resolve()
            .unwrap();
        assert_eq!(open.tolerance_bounds, Some((f64::NEG_INFINITY, 20.0)));
    }
}
