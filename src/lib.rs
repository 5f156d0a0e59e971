//! Deviation-aware numeric range search over marker measurements.
//!
//! Stored results are indexed by their min and max bounds in per-marker sorted
//! sets, once with raw values and once widened by the measuring technology's
//! deviation. Searches combine one score-range read per side with a set
//! intersection to answer exact-match and out-of-range questions.

pub mod boundary;
pub mod config;
pub mod deviation;
pub mod error;
pub mod index;
pub mod metrics;
pub mod models;
pub mod search;
pub mod state;

pub use config::Config;
pub use deviation::{DeviationResolver, InMemoryTechnologyCatalog, TechnologyCatalog};
pub use error::{AppError, Result};
pub use index::{IndexMaintainer, IndexVariant, IndexedRange, RangeIndexStore};
pub use models::{Margin, MeasurementResult, ResultId};
pub use search::{QueryOrchestrator, RangeQuery, SearchType};
pub use state::{ResultStore, SortedSetBackend};
