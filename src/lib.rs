// Carbon Screen - Core Library
// Exposes all modules for use in the CLI and tests

pub mod consolidate;
pub mod matching;
pub mod merge;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod store;
pub mod table;
pub mod validate;

// Re-export commonly used types
pub use consolidate::{ConsolidationReport, DuplicateConsolidator};
pub use matching::{
    normalize_name, token_set_ratio, token_sets_equal, EntityMatcher, IssuerMatch, MatchOutcome,
    MatchPolicy,
};
pub use merge::RecordMerger;
pub use metrics::{CarbonMetricsEngine, FuelType};
pub use pipeline::{
    PipelineReport, ScreeningPipeline, SkippedYear, YearOutcome, YearResult, YearSummary,
};
pub use registry::{DatasetKind, DatasetRegistry};
pub use store::TableStore;
pub use table::{Cell, Table};
pub use validate::InputValidator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
