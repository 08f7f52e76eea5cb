//! Local OCR backend using `pure-onnx-ocr`.

use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info, warn};

use crate::error::{OcrError, PdfError};
use crate::models::config::OcrConfig;
use crate::models::line::RecognizedLine;
use crate::pdf::{is_pdf, PdfDocument};
use crate::storage::StagedDocument;

use super::{sort_by_reading_order, OcrBackend};

const UNKNOWN_TOKEN: &str = "[UNK]";

/// OCR backend backed by `pure-onnx-ocr` (PaddleOCR models, no external
/// ONNX Runtime).
pub struct PureOcrBackend {
    engine: pure_onnx_ocr::engine::OcrEngine,
    config: OcrConfig,
}

impl PureOcrBackend {
    /// Load the detection and recognition models named in `config`.
    pub fn new(config: OcrConfig) -> Result<Self, OcrError> {
        for name in config.model_files() {
            let path = config.model_path(name);
            if !path.exists() {
                return Err(OcrError::ModelLoad(format!(
                    "{} not found (run `emid models download`)",
                    path.display()
                )));
            }
        }

        let det_path = config.model_path(&config.detection_model);
        let rec_path = config.model_path(&config.recognition_model);
        let dict_path = config.model_path(&config.dictionary);

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", config.model_dir.display());

        Ok(Self { engine, config })
    }

    /// Recognize one image.
    pub fn recognize(&self, image: &DynamicImage) -> Result<Vec<RecognizedLine>, OcrError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        debug!("Recognizing image: {}x{}", width, height);

        let results = self
            .engine
            .run_from_image(image)
            .map_err(|e| OcrError::Detection(format!("pure-onnx-ocr: {}", e)))?;

        let mut lines: Vec<RecognizedLine> = results
            .iter()
            .map(|r| {
                RecognizedLine::line(self.clean_text(&r.text))
                    .with_bbox(polygon_to_bbox(&r.bounding_box))
                    .with_confidence(r.confidence)
            })
            .filter(|line| !line.text.trim().is_empty())
            .collect();

        sort_by_reading_order(&mut lines, self.config.row_tolerance);

        info!(
            "OCR complete: {} lines in {}ms",
            lines.len(),
            start.elapsed().as_millis()
        );
        Ok(lines)
    }

    fn recognize_pdf(&self, data: &[u8]) -> Result<Vec<RecognizedLine>, OcrError> {
        let pdf = PdfDocument::load(data)?;

        let mut text_error = None;
        if self.config.prefer_embedded_text {
            match pdf.text_lines() {
                Ok(text_lines) if !text_lines.is_empty() => {
                    info!("Using PDF text layer ({} lines)", text_lines.len());
                    return Ok(text_lines.into_iter().map(RecognizedLine::line).collect());
                }
                Ok(_) => debug!("PDF has no text layer, falling back to OCR"),
                Err(e) => {
                    warn!("PDF text layer unreadable ({}), falling back to OCR", e);
                    text_error = Some(e);
                }
            }
        }

        let images = pdf.images();
        if images.is_empty() {
            return Err(no_content_error(text_error));
        }

        let mut lines = Vec::new();
        for image in &images {
            lines.extend(self.recognize(image)?);
        }
        Ok(lines)
    }

    fn clean_text(&self, text: &str) -> String {
        if self.config.keep_unknown {
            text.to_string()
        } else {
            text.replace(UNKNOWN_TOKEN, " ")
        }
    }
}

impl OcrBackend for PureOcrBackend {
    fn detect(&self, document: &StagedDocument<'_>) -> Result<Vec<RecognizedLine>, OcrError> {
        let data = document.read()?;

        if is_pdf(&data) {
            debug!("Detected PDF input: {}", document.handle().key);
            return self.recognize_pdf(&data);
        }

        let image = image::load_from_memory(&data)
            .map_err(|e| OcrError::InvalidDocument(e.to_string()))?;
        self.recognize(&image)
    }
}

/// Error for a PDF with nothing to recognize. A text layer that failed to
/// extract is the more useful cause to report.
fn no_content_error(text_error: Option<PdfError>) -> OcrError {
    match text_error {
        Some(e) => OcrError::Pdf(e),
        None => OcrError::InvalidDocument(
            "PDF has neither a text layer nor decodable images".into(),
        ),
    }
}

/// Convert a `Polygon<f64>` to our `[f32; 8]` bbox format, taking the first
/// four exterior points.
fn polygon_to_bbox(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 8] {
    let mut bbox = [0.0f32; 8];
    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        bbox[i * 2] = coord.x as f32;
        bbox[i * 2 + 1] = coord.y as f32;
    }
    bbox
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_models_are_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = OcrConfig {
            model_dir: dir.path().to_path_buf(),
            ..OcrConfig::default()
        };

        let err = PureOcrBackend::new(config).err().unwrap();
        assert!(matches!(err, OcrError::ModelLoad(_)));
        assert!(err.to_string().contains("det.onnx"));
    }

    #[test]
    fn test_empty_pdf_reports_text_layer_failure() {
        let err = no_content_error(Some(PdfError::TextExtraction("bad font".into())));
        assert!(matches!(err, OcrError::Pdf(PdfError::TextExtraction(_))));
        assert!(err.to_string().contains("bad font"));

        let err = no_content_error(None);
        assert!(matches!(err, OcrError::InvalidDocument(_)));
    }
}
