//! Field extraction strategies and the merge gate.

pub mod merge;
pub mod pattern;
pub mod patterns;
pub mod semantic;

pub use merge::ResultMerger;
pub use pattern::PatternExtractor;
pub use semantic::SemanticExtractor;

use crate::error::Result;
use crate::models::config::Strategy;
use crate::models::record::CandidateRecord;

/// A way of turning filtered card text into candidate fields.
///
/// Implementations are alternatives; a pipeline runs exactly one.
pub trait FieldExtractor: Send + Sync {
    /// Which strategy this extractor implements.
    fn strategy(&self) -> Strategy;

    /// Extract candidate fields. Finding nothing is `Ok` with an empty record.
    fn extract(&self, text: &str) -> Result<CandidateRecord>;
}
