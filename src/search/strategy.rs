use crate::boundary::{exclusive_lower, exclusive_upper};
use crate::error::{AppError, Result};
use crate::index::{IndexVariant, RangeIndexStore};
use crate::search::intersect::intersect;
use crate::search::query::SearchType;
use async_trait::async_trait;
use std::collections::HashSet;

/// Trait for range-matching strategies
///
/// Every strategy matches the min side and the max side of indexed results
/// against an inclusive score window each and intersects the two sets. They
/// differ only in where those windows sit relative to the query range.
#[async_trait]
pub trait RangeSearchStrategy: Send + Sync {
    /// Match against the query range, with open-ended out-of-range sides
    async fn search(
        &self,
        index: &RangeIndexStore,
        marker_name: &str,
        min: f64,
        max: f64,
        variant: IndexVariant,
    ) -> Result<HashSet<String>>;

    /// Match with out-of-range sides capped at the tolerance bounds
    #[allow(clippy::too_many_arguments)]
    async fn search_with_tolerance(
        &self,
        index: &RangeIndexStore,
        marker_name: &str,
        min: f64,
        max: f64,
        min_with_tolerance: f64,
        max_with_tolerance: f64,
        variant: IndexVariant,
    ) -> Result<HashSet<String>>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Get the search type this strategy implements
    fn search_type(&self) -> SearchType;
}

/// Inclusive score windows for both sides of a result range
#[derive(Debug, Clone, Copy, PartialEq)]
struct SideWindows {
    min_side: (f64, f64),
    max_side: (f64, f64),
}

async fn match_sides(
    index: &RangeIndexStore,
    marker_name: &str,
    windows: SideWindows,
    variant: IndexVariant,
) -> Result<HashSet<String>> {
    let (min_matches, max_matches) = futures::try_join!(
        index.search_minimum_matches(marker_name, windows.min_side.0, windows.min_side.1, variant),
        index.search_maximum_matches(marker_name, windows.max_side.0, windows.max_side.1, variant),
    )?;

    Ok(intersect(min_matches, max_matches))
}

/// min ∈ [min, max] and max ∈ [min, max]
pub struct ExactMatchStrategy;

impl ExactMatchStrategy {
    fn windows(min: f64, max: f64) -> SideWindows {
        SideWindows {
            min_side: (min, max),
            max_side: (min, max),
        }
    }
}

#[async_trait]
impl RangeSearchStrategy for ExactMatchStrategy {
    async fn search(
        &self,
        index: &RangeIndexStore,
        marker_name: &str,
        min: f64,
        max: f64,
        variant: IndexVariant,
    ) -> Result<HashSet<String>> {
        match_sides(index, marker_name, Self::windows(min, max), variant).await
    }

    async fn search_with_tolerance(
        &self,
        _index: &RangeIndexStore,
        _marker_name: &str,
        _min: f64,
        _max: f64,
        _min_with_tolerance: f64,
        _max_with_tolerance: f64,
        _variant: IndexVariant,
    ) -> Result<HashSet<String>> {
        Err(AppError::BadRequest(
            "tolerance cannot be used with an exact match search".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "exact_match"
    }

    fn search_type(&self) -> SearchType {
        SearchType::ExactMatch
    }
}

/// min ∈ (-inf, min) and max ∈ [min, max]
pub struct MinOutOfRangeStrategy;

impl MinOutOfRangeStrategy {
    fn windows(min: f64, max: f64, min_floor: f64) -> SideWindows {
        SideWindows {
            min_side: (min_floor, exclusive_upper(min)),
            max_side: (min, max),
        }
    }
}

#[async_trait]
impl RangeSearchStrategy for MinOutOfRangeStrategy {
    async fn search(
        &self,
        index: &RangeIndexStore,
        marker_name: &str,
        min: f64,
        max: f64,
        variant: IndexVariant,
    ) -> Result<HashSet<String>> {
        let windows = Self::windows(min, max, f64::NEG_INFINITY);
        match_sides(index, marker_name, windows, variant).await
    }

    async fn search_with_tolerance(
        &self,
        index: &RangeIndexStore,
        marker_name: &str,
        min: f64,
        max: f64,
        min_with_tolerance: f64,
        _max_with_tolerance: f64,
        variant: IndexVariant,
    ) -> Result<HashSet<String>> {
        let windows = Self::windows(min, max, min_with_tolerance);
        match_sides(index, marker_name, windows, variant).await
    }

    fn name(&self) -> &str {
        "min_out_of_range"
    }

    fn search_type(&self) -> SearchType {
        SearchType::MinOutOfRange
    }
}

/// min ∈ [min, max] and max ∈ (max, +inf)
pub struct MaxOutOfRangeStrategy;

impl MaxOutOfRangeStrategy {
    fn windows(min: f64, max: f64, max_ceiling: f64) -> SideWindows {
        SideWindows {
            min_side: (min, max),
            max_side: (exclusive_lower(max), max_ceiling),
        }
    }
}

#[async_trait]
impl RangeSearchStrategy for MaxOutOfRangeStrategy {
    async fn search(
        &self,
        index: &RangeIndexStore,
        marker_name: &str,
        min: f64,
        max: f64,
        variant: IndexVariant,
    ) -> Result<HashSet<String>> {
        let windows = Self::windows(min, max, f64::INFINITY);
        match_sides(index, marker_name, windows, variant).await
    }

    async fn search_with_tolerance(
        &self,
        index: &RangeIndexStore,
        marker_name: &str,
        min: f64,
        max: f64,
        _min_with_tolerance: f64,
        max_with_tolerance: f64,
        variant: IndexVariant,
    ) -> Result<HashSet<String>> {
        let windows = Self::windows(min, max, max_with_tolerance);
        match_sides(index, marker_name, windows, variant).await
    }

    fn name(&self) -> &str {
        "max_out_of_range"
    }

    fn search_type(&self) -> SearchType {
        SearchType::MaxOutOfRange
    }
}

/// min ∈ (-inf, min) and max ∈ (max, +inf)
pub struct BothOutOfRangeStrategy;

impl BothOutOfRangeStrategy {
    fn windows(min: f64, max: f64, min_floor: f64, max_ceiling: f64) -> SideWindows {
        SideWindows {
            min_side: (min_floor, exclusive_upper(min)),
            max_side: (exclusive_lower(max), max_ceiling),
        }
    }
}

#[async_trait]
impl RangeSearchStrategy for BothOutOfRangeStrategy {
    async fn search(
        &self,
        index: &RangeIndexStore,
        marker_name: &str,
        min: f64,
        max: f64,
        variant: IndexVariant,
    ) -> Result<HashSet<String>> {
        let windows = Self::windows(min, max, f64::NEG_INFINITY, f64::INFINITY);
        match_sides(index, marker_name, windows, variant).await
    }

    async fn search_with_tolerance(
        &self,
        index: &RangeIndexStore,
        marker_name: &str,
        min: f64,
        max: f64,
        min_with_tolerance: f64,
        max_with_tolerance: f64,
        variant: IndexVariant,
    ) -> Result<HashSet<String>> {
        let windows = Self::windows(min, max, min_with_tolerance, max_with_tolerance);
        match_sides(index, marker_name, windows, variant).await
    }

    fn name(&self) -> &str {
        "both_out_of_range"
    }

    fn search_type(&self) -> SearchType {
        SearchType::BothOutOfRange
    }
}

static EXACT_MATCH: ExactMatchStrategy = ExactMatchStrategy;
static MIN_OUT_OF_RANGE: MinOutOfRangeStrategy = MinOutOfRangeStrategy;
static MAX_OUT_OF_RANGE: MaxOutOfRangeStrategy = MaxOutOfRangeStrategy;
static BOTH_OUT_OF_RANGE: BothOutOfRangeStrategy = BothOutOfRangeStrategy;

/// The strategy implementing a search type
pub fn strategy_for(search_type: SearchType) -> &'static dyn RangeSearchStrategy {
    match search_type {
        SearchType::ExactMatch => &EXACT_MATCH,
        SearchType::MinOutOfRange => &MIN_OUT_OF_RANGE,
        SearchType::MaxOutOfRange => &MAX_OUT_OF_RANGE,
        SearchType::BothOutOfRange => &BOTH_OUT_OF_RANGE,
    }
}
