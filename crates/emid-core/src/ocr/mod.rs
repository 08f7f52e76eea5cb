//! OCR collaborator interface.

#[cfg(feature = "native")]
pub mod pure_engine;

use std::cmp::Ordering;

use crate::error::OcrError;
use crate::models::line::RecognizedLine;
use crate::storage::StagedDocument;

/// Turns a staged document into recognized text blocks.
pub trait OcrBackend: Send + Sync {
    /// Recognize the document. Returned blocks are in reading order.
    fn detect(&self, document: &StagedDocument<'_>) -> Result<Vec<RecognizedLine>, OcrError>;
}

/// Sort lines top-to-bottom then left-to-right, treating tops within the
/// same `row_tolerance` band as one row.
///
/// Lines are left untouched if any of them has no geometry.
pub fn sort_by_reading_order(lines: &mut [RecognizedLine], row_tolerance: f32) {
    if lines.iter().any(|line| line.bbox.is_none()) {
        return;
    }
    let tolerance = row_tolerance.max(1.0);

    lines.sort_by(|a, b| {
        let (ax, ay, _, _) = a.rect().unwrap_or_default();
        let (bx, by, _, _) = b.rect().unwrap_or_default();

        let row_a = (ay / tolerance) as i32;
        let row_b = (by / tolerance) as i32;
        row_a
            .cmp(&row_b)
            .then_with(|| ax.partial_cmp(&bx).unwrap_or(Ordering::Equal))
    });
}
