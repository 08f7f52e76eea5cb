//! Recognized text blocks as returned by an OCR collaborator.

use serde::{Deserialize, Serialize};

/// Granularity of a recognized block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    /// A whole page.
    Page,
    /// A single line of text. The only block type used for extraction.
    Line,
    /// A single word.
    Word,
}

/// A block of text recognized on the document, with optional geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedLine {
    /// Recognized text content.
    pub text: String,

    /// Block granularity.
    pub block_type: BlockType,

    /// Recognition confidence (0.0 - 1.0), when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,

    /// Quadrilateral (x1, y1, x2, y2, x3, y3, x4, y4) in image pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f32; 8]>,
}

impl RecognizedLine {
    /// A LINE block without geometry.
    pub fn line(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            block_type: BlockType::Line,
            confidence: None,
            bbox: None,
        }
    }

    /// A WORD block without geometry.
    pub fn word(text: impl Into<String>) -> Self {
        Self {
            block_type: BlockType::Word,
            ..Self::line(text)
        }
    }

    pub fn with_bbox(mut self, bbox: [f32; 8]) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn is_line(&self) -> bool {
        self.block_type == BlockType::Line
    }

    /// Axis-aligned bounding rectangle (min_x, min_y, max_x, max_y).
    pub fn rect(&self) -> Option<(f32, f32, f32, f32)> {
        let bbox = self.bbox?;
        let xs = [bbox[0], bbox[2], bbox[4], bbox[6]];
        let ys = [bbox[1], bbox[3], bbox[5], bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        Some((min_x, min_y, max_x, max_y))
    }
}
