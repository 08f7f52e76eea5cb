//! WASM bindings for identity card field extraction.
//!
//! Exposes the deterministic pattern strategy and the line filter to
//! browsers and Node.js. OCR runs on the JavaScript side; recognized lines
//! come in, a plain object of found fields goes out.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use emid_core::ocr::sort_by_reading_order;
use emid_core::{ExtractedRecord, ExtractionPipeline, ExtractionResult, FieldKey, LineFilter, RecognizedLine};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    // Plain objects rather than JS `Map`s.
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

fn extract_record<S: AsRef<str>>(lines: &[S]) -> Result<ExtractedRecord, JsValue> {
    ExtractionPipeline::pattern()
        .extract_lines(lines)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Extract fields from newline-separated recognized text.
#[wasm_bindgen(js_name = extractFields)]
pub fn extract_fields(text: &str) -> Result<JsValue, JsValue> {
    let lines: Vec<&str> = text.lines().collect();
    to_js(&extract_record(&lines)?)
}

/// Extract fields from an array of recognized lines.
#[wasm_bindgen(js_name = extractFieldsFromLines)]
pub fn extract_fields_from_lines(lines: Vec<String>) -> Result<JsValue, JsValue> {
    to_js(&extract_record(&lines)?)
}

/// Whether a line would be kept for extraction (Latin letters, no Arabic).
#[wasm_bindgen(js_name = isUsableLine)]
pub fn is_usable_line(line: &str) -> bool {
    LineFilter::is_usable(line)
}

/// The field keys a result object can contain, in display order.
#[wasm_bindgen(js_name = fieldKeys)]
pub fn field_keys() -> js_sys::Array {
    FieldKey::ALL
        .iter()
        .map(|key| JsValue::from_str(key.as_str()))
        .collect()
}

/// Display label for a field key, e.g. `passport_no` -> "Passport Number".
#[wasm_bindgen(js_name = fieldLabel)]
pub fn field_label(key: &str) -> Option<String> {
    FieldKey::normalize(key).map(|key| key.label().to_string())
}

/// Collects boxes from browser-side OCR, then extracts in reading order.
#[wasm_bindgen]
pub struct OcrLines {
    lines: Vec<RecognizedLine>,
    row_tolerance: f32,
}

#[wasm_bindgen]
impl OcrLines {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            row_tolerance: 20.0,
        }
    }

    /// Pixel band within which boxes count as one row.
    #[wasm_bindgen(js_name = setRowTolerance)]
    pub fn set_row_tolerance(&mut self, tolerance: f32) {
        self.row_tolerance = tolerance;
    }

    /// Add a recognized line with its quadrilateral.
    #[wasm_bindgen(js_name = addBox)]
    #[allow(clippy::too_many_arguments)]
    pub fn add_box(
        &mut self,
        text: &str,
        x1: f32, y1: f32,
        x2: f32, y2: f32,
        x3: f32, y3: f32,
        x4: f32, y4: f32,
        confidence: f32,
    ) {
        self.lines.push(
            RecognizedLine::line(text)
                .with_bbox([x1, y1, x2, y2, x3, y3, x4, y4])
                .with_confidence(confidence),
        );
    }

    /// Add a recognized line without geometry.
    #[wasm_bindgen(js_name = addLine)]
    pub fn add_line(&mut self, text: &str) {
        self.lines.push(RecognizedLine::line(text));
    }

    /// Text of the lines in reading order.
    #[wasm_bindgen(js_name = getText)]
    pub fn get_text(&self) -> String {
        self.ordered()
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Extract fields from the collected lines.
    pub fn extract(&self) -> Result<JsValue, JsValue> {
        to_js(&self.run()?.record)
    }

    /// Extract fields together with line counts and the text used.
    #[wasm_bindgen(js_name = extractWithMetadata)]
    pub fn extract_with_metadata(&self) -> Result<JsValue, JsValue> {
        to_js(&self.run()?)
    }
}

impl OcrLines {
    fn ordered(&self) -> Vec<RecognizedLine> {
        let mut lines = self.lines.clone();
        sort_by_reading_order(&mut lines, self.row_tolerance);
        lines
    }

    fn run(&self) -> Result<ExtractionResult, JsValue> {
        ExtractionPipeline::pattern()
            .run(&self.ordered())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

impl Default for OcrLines {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_is_usable_line() {
        assert!(is_usable_line("Name: JOHN SMITH"));
        assert!(!is_usable_line("Name اسم: JOHN SMITH"));
        assert!(!is_usable_line("784-1990"));
    }

    #[wasm_bindgen_test]
    fn test_field_keys() {
        assert_eq!(field_keys().length(), 9);
        assert_eq!(field_label("passport_number").as_deref(), Some("Passport Number"));
        assert_eq!(field_label("blood_type"), None);
    }

    #[wasm_bindgen_test]
    fn test_extract_record() {
        let record = extract_record(&["Name: JOHN SMITH", "اسم: جون سميث", "Nationality: USA"]).unwrap();
        assert_eq!(record.get(FieldKey::Name), Some("JOHN SMITH"));
        assert_eq!(record.get(FieldKey::Nationality), Some("USA"));
        assert_eq!(record.len(), 2);
    }

    #[wasm_bindgen_test]
    fn test_ocr_lines_reading_order() {
        let mut lines = OcrLines::new();
        lines.add_box("Nationality: USA", 10.0, 60.0, 200.0, 60.0, 200.0, 75.0, 10.0, 75.0, 0.9);
        lines.add_box("Name: JOHN SMITH", 10.0, 10.0, 200.0, 10.0, 200.0, 25.0, 10.0, 25.0, 0.9);
        assert_eq!(lines.get_text(), "Name: JOHN SMITH\nNationality: USA");

        let result = lines.run().unwrap();
        assert_eq!(result.lines_total, 2);
        assert_eq!(result.record.get(FieldKey::Name), Some("JOHN SMITH"));
    }
}
