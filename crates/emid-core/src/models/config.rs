//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EmidError, LlmError};

/// Main configuration for the emid pipeline.
///
/// Immutable after construction; components receive the section they need.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmidConfig {
    /// OCR backend configuration.
    pub ocr: OcrConfig,

    /// Blob staging configuration.
    pub storage: StorageConfig,

    /// Strategy selection and text preparation.
    pub extraction: ExtractionConfig,

    /// Embedding and completion service configuration.
    pub semantic: SemanticConfig,
}

/// Which extraction strategy a deployment runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Label-anchored regular expressions. Deterministic, offline.
    #[default]
    Pattern,
    /// Embedding retrieval plus a language-model query.
    Semantic,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Pattern => write!(f, "pattern"),
            Strategy::Semantic => write!(f, "semantic"),
        }
    }
}

/// Default download source for the OCR model files: a third-party mirror of
/// the PaddleOCR PP-OCR mobile detection and Latin recognition models,
/// already exported to ONNX. Point `ocr.model_base_url` (or
/// `emid models download --base-url`) at a self-hosted copy to change it.
pub const DEFAULT_MODEL_BASE_URL: &str =
    "https://github.com/jakubmatias/incr/raw/main/models/mobile";

/// Local OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Keep `[UNK]` tokens in recognized text instead of replacing them with spaces.
    pub keep_unknown: bool,

    /// Vertical distance (pixels) under which boxes count as the same row.
    pub row_tolerance: f32,

    /// Use a PDF's text layer instead of running OCR on its images.
    pub prefer_embedded_text: bool,

    /// Base URL the model files are downloaded from. Defaults to
    /// [`DEFAULT_MODEL_BASE_URL`].
    pub model_base_url: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            keep_unknown: false,
            row_tolerance: 20.0,
            prefer_embedded_text: true,
            model_base_url: DEFAULT_MODEL_BASE_URL.to_string(),
        }
    }
}

impl OcrConfig {
    /// Get full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.model_dir.join(model_name)
    }

    /// Download URL of a model file under `base_url`, or under
    /// `model_base_url` when no override is given.
    pub fn model_url(&self, base_url: Option<&str>, model_name: &str) -> String {
        let base = base_url.unwrap_or(self.model_base_url.as_str()).trim_end_matches('/');
        format!("{}/{}", base, model_name)
    }

    /// The three files the engine needs, in load order.
    pub fn model_files(&self) -> [&str; 3] {
        [
            self.detection_model.as_str(),
            self.recognition_model.as_str(),
            self.dictionary.as_str(),
        ]
    }
}

/// Blob staging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for staged objects.
    pub staging_dir: PathBuf,

    /// Key prefix for staged documents.
    pub key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            staging_dir: std::env::temp_dir().join("emid"),
            key_prefix: "emirates_ids".to_string(),
        }
    }
}

/// Extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Strategy to run.
    pub strategy: Strategy,

    /// Join filtered lines with newlines (true) or spaces (false).
    /// The pattern strategy anchors on line breaks and needs `true`.
    pub preserve_line_breaks: bool,

    /// Feed the semantic strategy only lines that pass the line filter.
    /// When false it receives every LINE block.
    pub filter_semantic_input: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Pattern,
            preserve_line_breaks: true,
            filter_semantic_input: true,
        }
    }
}

/// Embedding and completion service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// Base URL of an OpenAI-compatible API.
    pub api_base: String,

    /// API key. Never written back to disk.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,

    /// Embedding model name.
    pub embedding_model: String,

    /// Completion model name.
    pub completion_model: String,

    /// Sampling temperature for the completion call.
    pub temperature: f32,

    /// Target chunk length in characters.
    pub chunk_size: usize,

    /// Characters shared between neighbouring chunks.
    pub chunk_overlap: usize,

    /// Number of chunks retrieved for the extraction query.
    pub top_k: usize,

    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            completion_model: "gpt-3.5-turbo-instruct".to_string(),
            temperature: 0.0,
            chunk_size: 512,
            chunk_overlap: 32,
            top_k: 4,
            timeout_secs: 60,
        }
    }
}

impl SemanticConfig {
    /// The configured key, or the one found in `api_key_env`.
    pub fn resolve_api_key(&self) -> Result<String, LlmError> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.clone());
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(self.api_key_env.clone()))
    }
}

impl EmidConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, EmidError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), EmidError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), EmidError> {
        let semantic = &self.semantic;
        if semantic.chunk_size == 0 {
            return Err(EmidError::Config("semantic.chunk_size must be positive".into()));
        }
        if semantic.chunk_overlap >= semantic.chunk_size {
            return Err(EmidError::Config(format!(
                "semantic.chunk_overlap ({}) must be smaller than semantic.chunk_size ({})",
                semantic.chunk_overlap, semantic.chunk_size
            )));
        }
        if semantic.top_k == 0 {
            return Err(EmidError::Config("semantic.top_k must be positive".into()));
        }
        if !(0.0..=2.0).contains(&semantic.temperature) {
            return Err(EmidError::Config(format!(
                "semantic.temperature ({}) must be within 0.0..=2.0",
                semantic.temperature
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = EmidConfig::default();
        assert_eq!(config.extraction.strategy, Strategy::Pattern);
        assert!(config.extraction.preserve_line_breaks);
        assert_eq!(config.semantic.chunk_size, 512);
        assert_eq!(config.semantic.chunk_overlap, 32);
        assert_eq!(config.semantic.temperature, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_model_url() {
        let mut ocr = OcrConfig::default();
        assert_eq!(
            ocr.model_url(None, "det.onnx"),
            format!("{}/det.onnx", DEFAULT_MODEL_BASE_URL)
        );

        ocr.model_base_url = "https://models.example.org/emid/".into();
        assert_eq!(
            ocr.model_url(None, "latin_dict.txt"),
            "https://models.example.org/emid/latin_dict.txt"
        );
        assert_eq!(
            ocr.model_url(Some("http://localhost:8000//"), "det.onnx"),
            "http://localhost:8000/det.onnx"
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EmidConfig =
            serde_json::from_str(r#"{"extraction":{"strategy":"semantic"}}"#).unwrap();
        assert_eq!(config.extraction.strategy, Strategy::Semantic);
        assert!(config.extraction.filter_semantic_input);
        assert_eq!(config.semantic.top_k, 4);
    }

    #[test]
    fn test_api_key_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = EmidConfig::default();
        config.semantic.api_key = Some("sk-secret".into());
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("sk-secret"));

        let loaded = EmidConfig::from_file(&path).unwrap();
        assert_eq!(loaded.semantic.api_key, None);
        assert_eq!(loaded.storage.key_prefix, "emirates_ids");
    }

    #[test]
    fn test_validate_rejects_overlap_not_below_size() {
        let mut config = EmidConfig::default();
        config.semantic.chunk_overlap = 512;
        assert!(matches!(config.validate(), Err(EmidError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = EmidConfig::default();
        config.semantic.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let semantic = SemanticConfig {
            api_key: Some("sk-file".into()),
            api_key_env: "EMID_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..SemanticConfig::default()
        };
        assert_eq!(semantic.resolve_api_key().unwrap(), "sk-file");

        let missing = SemanticConfig {
            api_key_env: "EMID_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..SemanticConfig::default()
        };
        assert!(matches!(
            missing.resolve_api_key(),
            Err(LlmError::MissingApiKey(_))
        ));
    }
}
