//! Deterministic regex-table extraction.

use tracing::{debug, trace};

use super::merge::is_absent_value;
use super::patterns::{FieldPattern, CARD_PATTERNS, LABEL_PREFIX};
use super::FieldExtractor;
use crate::error::Result;
use crate::models::config::Strategy;
use crate::models::record::{CandidateRecord, FieldKey};

/// Runs the card pattern table over newline-joined filtered text.
pub struct PatternExtractor {
    patterns: &'static [FieldPattern],
}

impl PatternExtractor {
    /// Create an extractor over the built-in card patterns.
    pub fn new() -> Self {
        Self {
            patterns: CARD_PATTERNS.as_slice(),
        }
    }

    /// Create an extractor over a custom pattern table.
    pub fn with_patterns(patterns: &'static [FieldPattern]) -> Self {
        Self { patterns }
    }

    /// First trimmed match for a single field, if any.
    pub fn extract_field(&self, field: FieldKey, text: &str) -> Option<String> {
        self.patterns
            .iter()
            .filter(|p| p.field == field)
            .find_map(|p| accept(p, text))
    }

    /// Apply every pattern; fields without a usable match are left out.
    pub fn extract_all(&self, text: &str) -> CandidateRecord {
        let mut record = CandidateRecord::new();

        for pattern in self.patterns {
            if let Some(value) = accept(pattern, text) {
                trace!("{} = {:?}", pattern.field, value);
                record.insert(pattern.field.as_str(), value);
            }
        }

        debug!(
            "Pattern extraction matched {}/{} fields",
            record.len(),
            self.patterns.len()
        );
        record
    }
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for PatternExtractor {
    fn strategy(&self) -> Strategy {
        Strategy::Pattern
    }

    fn extract(&self, text: &str) -> Result<CandidateRecord> {
        Ok(self.extract_all(text))
    }
}

fn accept(pattern: &FieldPattern, text: &str) -> Option<String> {
    let value = pattern.capture(text)?.trim();
    if is_absent_value(value) {
        return None;
    }
    if LABEL_PREFIX.is_match(value) {
        debug!("{} captured the label {:?}, treating as absent", pattern.field, value);
        return None;
    }
    Some(value.to_string())
}
