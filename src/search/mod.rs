//! Deviation-aware range search.
//!
//! A [`RangeQuery`] names a marker and either a single value (optionally
//! widened by a deviation) or a `min`/`max` range. The [`QueryOrchestrator`]
//! resolves it into concrete bounds and hands them to one of four
//! [`RangeSearchStrategy`] implementations:
//!
//! ```text
//! exact_match        min ∈ [min, max]          max ∈ [min, max]
//! min_out_of_range   min ∈ [floor, min)        max ∈ [min, max]
//! max_out_of_range   min ∈ [min, max]          max ∈ (max, ceiling]
//! both_out_of_range  min ∈ [floor, min)        max ∈ (max, ceiling]
//! ```
//!
//! `floor` and `ceiling` are infinite unless a tolerance is given. Each side is
//! one score-range read against the range index; the two sides are fetched
//! concurrently and intersected.

mod intersect;
mod orchestrator;
mod query;
mod strategy;

pub use intersect::intersect;
pub use orchestrator::QueryOrchestrator;
pub use query::{RangeQuery, ResolvedQuery, SearchType};
pub use strategy::{
    strategy_for, BothOutOfRangeStrategy, ExactMatchStrategy, MaxOutOfRangeStrategy,
    MinOutOfRangeStrategy, RangeSearchStrategy,
};
