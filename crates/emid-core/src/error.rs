//! Error types for the emid-core library.

use thiserror::Error;

/// Main error type for the emid library.
///
/// Collaborator failures are wrapped in a variant naming the stage that
/// failed, so the message shown to a user always says where it broke.
#[derive(Error, Debug)]
pub enum EmidError {
    /// Staging the document in blob storage failed.
    #[error("failed during upload: {0}")]
    Upload(#[source] StorageError),

    /// The OCR collaborator failed.
    #[error("failed during text detection: {0}")]
    Detection(#[source] OcrError),

    /// The embedding or completion collaborator failed.
    #[error("failed during semantic extraction: {0}")]
    Semantic(#[source] LlmError),

    /// The staged object could not be released after a successful detection.
    #[error("failed during staged object cleanup: {0}")]
    Cleanup(#[source] StorageError),

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised by a blob storage collaborator.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The local file could not be staged.
    #[error("failed to stage {path}: {reason}")]
    Put { path: String, reason: String },

    /// The staged object could not be read back.
    #[error("failed to read {key}: {reason}")]
    Read { key: String, reason: String },

    /// The staged object could not be deleted.
    #[error("failed to delete {key}: {reason}")]
    Delete { key: String, reason: String },

    /// No object is stored under the key.
    #[error("object not found: {0}")]
    NotFound(String),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text detection failed.
    #[error("text detection failed: {0}")]
    Detection(String),

    /// The staged document could not be fetched.
    #[error("document unavailable: {0}")]
    Storage(#[from] StorageError),

    /// The document is neither a decodable image nor a PDF.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// PDF input could not be processed.
    #[error("PDF input: {0}")]
    Pdf(#[from] PdfError),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors raised by the embedding and completion collaborators.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The service could not be reached.
    #[error("cannot connect to {0}")]
    Connection(String),

    /// The request exceeded the configured timeout.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// Transport-level HTTP failure.
    #[error("HTTP client error: {0}")]
    Http(String),

    /// The service answered with a non-success status.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The service response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    ResponseParsing(String),

    /// Embedding vectors are missing or have inconsistent dimensions.
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),

    /// No credential is configured for the service.
    #[error("missing API key (set {0} or semantic.api_key)")]
    MissingApiKey(String),
}

/// The language model did not answer with a JSON object.
///
/// Recovered locally by the regex fallback; never surfaced to callers.
#[derive(Error, Debug)]
pub enum ModelOutputError {
    /// No `{ ... }` span in the response.
    #[error("no JSON object in model response")]
    NoObject,

    /// A span was found but it is not valid JSON.
    #[error("invalid JSON in model response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for the emid library.
pub type Result<T> = std::result::Result<T, EmidError>;
