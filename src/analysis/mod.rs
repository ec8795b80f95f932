//! Report analysis.
//!
//! Aggregation of result summaries into reports, report comparison, and
//! derivation of summaries from stored runs and results.

pub mod aggregator;
pub mod summarize;

pub use aggregator::*;
pub use summarize::*;
