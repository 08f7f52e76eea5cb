//! Retrieval-augmented extraction through an embedding and a completion
//! service.
//!
//! The filtered text is split into overlapping chunks, the chunks most
//! similar to the extraction query are retrieved, and a completion model
//! answers the query over them. An answer that is not JSON is recovered with
//! a reduced regex set instead of failing the run.

mod index;
mod prompt;
mod response;

pub use index::ChunkIndex;
pub use prompt::extraction_query;
pub use response::{fallback_extract, parse_json_record};

use tracing::{debug, info, warn};

use super::FieldExtractor;
use crate::error::{EmidError, LlmError, Result};
use crate::llm::{Completer, Embedder};
use crate::models::config::{SemanticConfig, Strategy};
use crate::models::record::CandidateRecord;
use crate::text::TextSplitter;

/// Semantic extractor over injected embedding and completion collaborators.
pub struct SemanticExtractor<E, C> {
    embedder: E,
    completer: C,
    splitter: TextSplitter,
    top_k: usize,
    temperature: f32,
}

impl<E: Embedder, C: Completer> SemanticExtractor<E, C> {
    /// Create an extractor with default chunking and retrieval settings.
    pub fn new(embedder: E, completer: C) -> Self {
        Self::with_config(embedder, completer, &SemanticConfig::default())
    }

    /// Create an extractor using the chunking, retrieval and sampling
    /// settings from `config`.
    pub fn with_config(embedder: E, completer: C, config: &SemanticConfig) -> Self {
        Self {
            embedder,
            completer,
            splitter: TextSplitter::new(config.chunk_size, config.chunk_overlap),
            top_k: config.top_k,
            temperature: config.temperature,
        }
    }

    /// Retrieve context and ask the completion model.
    fn ask(&self, text: &str) -> std::result::Result<Option<String>, LlmError> {
        let chunks = self.splitter.split(text);
        if chunks.is_empty() {
            return Ok(None);
        }

        let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed_batch(&refs)?;
        let index = ChunkIndex::build(chunks, embeddings)?;

        let query = extraction_query();
        let query_vector = self.embedder.embed(&query)?;
        let context = index.top_k(&query_vector, self.top_k)?;
        debug!(
            "Retrieved {}/{} chunks for completion",
            context.len(),
            index.len()
        );

        self.completer
            .complete(&query, &context, self.temperature)
            .map(Some)
    }
}

impl<E: Embedder, C: Completer> FieldExtractor for SemanticExtractor<E, C> {
    fn strategy(&self) -> Strategy {
        Strategy::Semantic
    }

    fn extract(&self, text: &str) -> Result<CandidateRecord> {
        let Some(answer) = self.ask(text).map_err(EmidError::Semantic)? else {
            info!("No text to extract from, skipping semantic extraction");
            return Ok(CandidateRecord::new());
        };

        match parse_json_record(&answer) {
            Ok(record) => Ok(record),
            Err(e) => {
                warn!("Model response was not usable JSON ({}), using regex fallback", e);
                Ok(fallback_extract(&answer))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use pretty_assertions::assert_eq;

    /// Embeds by counting a few card words, enough to rank chunks.
    struct KeywordEmbedder {
        calls: AtomicUsize,
    }

    impl KeywordEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Embedder for KeywordEmbedder {
        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let lower = text.to_lowercase();
            Ok(["name", "passport", "sponsor"]
                .iter()
                .map(|w| lower.matches(w).count() as f32 + 0.01)
                .collect())
        }
    }

    struct Scripted {
        answer: std::result::Result<String, ()>,
        seen: Mutex<Vec<(usize, f32)>>,
    }

    impl Scripted {
        fn answering(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                answer: Err(()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Completer for Scripted {
        fn complete(
            &self,
            _instruction: &str,
            documents: &[&str],
            temperature: f32,
        ) -> std::result::Result<String, LlmError> {
            self.seen.lock().unwrap().push((documents.len(), temperature));
            self.answer
                .clone()
                .map_err(|_| LlmError::Connection("http://localhost".into()))
        }
    }

    const CARD: &str = "Name: JANE DOE\nPassport No: Z1234567\nSponsor: ACME LLC";

    #[test]
    fn test_json_answer() {
        let extractor = SemanticExtractor::new(
            KeywordEmbedder::new(),
            Scripted::answering(r#"{"name": "JANE DOE", "passport_no": "Z1234567"}"#),
        );

        let record = extractor.extract(CARD).unwrap();
        let pairs: Vec<(&str, &str)> = record.iter().collect();
        assert_eq!(pairs, vec![("name", "JANE DOE"), ("passport_no", "Z1234567")]);
    }

    #[test]
    fn test_prose_answer_falls_back() {
        let extractor = SemanticExtractor::new(
            KeywordEmbedder::new(),
            Scripted::answering("Sure! Name: JANE DOE"),
        );

        let record = extractor.extract(CARD).unwrap();
        let pairs: Vec<(&str, &str)> = record.iter().collect();
        assert_eq!(pairs, vec![("name", "JANE DOE")]);
    }

    #[test]
    fn test_empty_text_makes_no_calls() {
        let embedder = KeywordEmbedder::new();
        let completer = Scripted::answering("{}");
        let extractor = SemanticExtractor::new(embedder, completer);

        assert!(extractor.extract("   ").unwrap().is_empty());
        assert_eq!(extractor.embedder.calls.load(Ordering::SeqCst), 0);
        assert!(extractor.completer.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_collaborator_failure_names_stage() {
        let extractor = SemanticExtractor::new(KeywordEmbedder::new(), Scripted::failing());

        let err = extractor.extract(CARD).unwrap_err();
        assert!(matches!(err, EmidError::Semantic(LlmError::Connection(_))));
        assert!(err.to_string().starts_with("failed during semantic extraction"));
    }

    #[test]
    fn test_retrieval_and_temperature_follow_config() {
        let config = SemanticConfig {
            chunk_size: 16,
            chunk_overlap: 0,
            top_k: 2,
            temperature: 0.3,
            ..SemanticConfig::default()
        };
        let extractor =
            SemanticExtractor::with_config(KeywordEmbedder::new(), Scripted::answering("{}"), &config);

        extractor.extract(CARD).unwrap();
        assert_eq!(*extractor.completer.seen.lock().unwrap(), vec![(2, 0.3)]);
    }
}
