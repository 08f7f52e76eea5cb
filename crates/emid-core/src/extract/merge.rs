//! The merge gate every candidate passes before it becomes a result.

use tracing::{debug, trace};

use crate::models::record::{CandidateRecord, ExtractedRecord, FieldKey, NOT_FOUND};

/// True for values that mean "absent": blank after trimming, or the
/// "not found" sentinel in any letter case.
pub fn is_absent_value(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(NOT_FOUND)
}

/// Normalizes a candidate into an [`ExtractedRecord`].
///
/// Keys outside the closed [`FieldKey`] set are dropped, values are trimmed,
/// absent values are dropped, and the first surviving value per key wins.
/// Merging is idempotent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultMerger;

impl ResultMerger {
    pub fn new() -> Self {
        Self
    }

    pub fn merge(&self, candidate: &CandidateRecord) -> ExtractedRecord {
        let mut record = ExtractedRecord::default();
        let mut dropped = 0usize;

        for (raw_key, raw_value) in candidate.iter() {
            let Some(key) = FieldKey::normalize(raw_key) else {
                debug!("Dropping unknown field {:?}", raw_key);
                dropped += 1;
                continue;
            };

            if is_absent_value(raw_value) {
                trace!("Dropping absent value for {}", key);
                dropped += 1;
                continue;
            }

            if !record.insert_checked(key, raw_value.trim().to_string()) {
                dropped += 1;
            }
        }

        debug!(
            "Merged {} candidate entries into {} fields ({} dropped)",
            candidate.len(),
            record.len(),
            dropped
        );
        record
    }
}
