//! Core library for identity card field extraction.
//!
//! This crate provides:
//! - Bilingual (Arabic/English) OCR line filtering
//! - Regex-table field extraction for Emirates ID cards
//! - Retrieval-augmented language-model extraction with a regex fallback
//! - A merge gate that enforces the "present means found" record invariant
//! - Collaborator traits for OCR, blob staging, embeddings and completions

pub mod error;
pub mod extract;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod storage;
pub mod text;

pub use error::{EmidError, Result};
pub use extract::{FieldExtractor, PatternExtractor, ResultMerger, SemanticExtractor};
pub use llm::{Completer, Embedder};
pub use models::config::{EmidConfig, Strategy};
pub use models::line::{BlockType, RecognizedLine};
pub use models::record::{CandidateRecord, ExtractedRecord, FieldKey};
pub use ocr::OcrBackend;
pub use pipeline::{DocumentProcessor, ExtractionPipeline, ExtractionResult};
pub use storage::{BlobHandle, BlobStore, StagedDocument};
pub use text::{JoinMode, LineFilter, TextSplitter};

#[cfg(feature = "native")]
pub use llm::openai::OpenAiClient;
#[cfg(feature = "native")]
pub use ocr::pure_engine::PureOcrBackend;
#[cfg(feature = "native")]
pub use storage::local::LocalBlobStore;
