//! Orchestration: OCR lines to a merged record.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{EmidError, Result};
use crate::extract::{FieldExtractor, PatternExtractor, ResultMerger};
use crate::models::config::{ExtractionConfig, Strategy};
use crate::models::line::RecognizedLine;
use crate::models::record::ExtractedRecord;
use crate::ocr::OcrBackend;
use crate::storage::{with_staged, BlobStore};
use crate::text::{JoinMode, LineFilter};

#[cfg(feature = "native")]
use crate::models::config::EmidConfig;

/// Outcome of one extraction run.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    /// Fields that survived the merge gate.
    pub record: ExtractedRecord,
    /// Strategy that produced the record.
    pub strategy: Strategy,
    /// LINE blocks received.
    pub lines_total: usize,
    /// Lines passed to the extractor.
    pub lines_used: usize,
    /// Wall time of the extraction step in milliseconds.
    pub processing_time_ms: u64,
    /// Text handed to the extractor.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
}

/// Runs the line filter, exactly one extractor and the merge gate.
pub struct ExtractionPipeline {
    extractor: Box<dyn FieldExtractor>,
    filter: LineFilter,
    join: JoinMode,
    filter_semantic_input: bool,
    merger: ResultMerger,
}

impl ExtractionPipeline {
    /// Pipeline around `extractor` with the default text preparation.
    pub fn new(extractor: Box<dyn FieldExtractor>) -> Self {
        Self::with_options(extractor, &ExtractionConfig::default())
    }

    /// Pipeline around `extractor` with the text preparation from `options`.
    /// `options.strategy` is ignored; the extractor decides the strategy.
    pub fn with_options(extractor: Box<dyn FieldExtractor>, options: &ExtractionConfig) -> Self {
        if extractor.strategy() == Strategy::Pattern && !options.preserve_line_breaks {
            warn!("Pattern extraction with space-joined text will over-capture across labels");
        }

        Self {
            extractor,
            filter: LineFilter::new(),
            join: JoinMode::from_preserve_line_breaks(options.preserve_line_breaks),
            filter_semantic_input: options.filter_semantic_input,
            merger: ResultMerger::new(),
        }
    }

    /// Deterministic pattern pipeline.
    pub fn pattern() -> Self {
        Self::new(Box::new(PatternExtractor::new()))
    }

    /// Build the pipeline the configuration selects.
    #[cfg(feature = "native")]
    pub fn from_config(config: &EmidConfig) -> Result<Self> {
        use std::sync::Arc;

        use crate::extract::SemanticExtractor;
        use crate::llm::openai::OpenAiClient;

        config.validate()?;

        let extractor: Box<dyn FieldExtractor> = match config.extraction.strategy {
            Strategy::Pattern => Box::new(PatternExtractor::new()),
            Strategy::Semantic => {
                let client = Arc::new(
                    OpenAiClient::from_config(&config.semantic)
                        .map_err(|e| EmidError::Config(e.to_string()))?,
                );
                Box::new(SemanticExtractor::with_config(
                    Arc::clone(&client),
                    client,
                    &config.semantic,
                ))
            }
        };

        info!("Using {} extraction", extractor.strategy());
        Ok(Self::with_options(extractor, &config.extraction))
    }

    pub fn strategy(&self) -> Strategy {
        self.extractor.strategy()
    }

    /// Extract a record from OCR output. Only LINE blocks are used.
    pub fn extract(&self, lines: &[RecognizedLine]) -> Result<ExtractedRecord> {
        Ok(self.run(lines)?.record)
    }

    /// Extract a record from plain text lines, each taken as a LINE block.
    pub fn extract_lines<S: AsRef<str>>(&self, lines: &[S]) -> Result<ExtractedRecord> {
        let texts: Vec<&str> = lines.iter().map(AsRef::as_ref).collect();
        Ok(self.run_texts(&texts)?.record)
    }

    /// Extract a record from OCR output, with run statistics.
    pub fn run(&self, lines: &[RecognizedLine]) -> Result<ExtractionResult> {
        let texts: Vec<&str> = lines
            .iter()
            .filter(|line| line.is_line())
            .map(|line| line.text.as_str())
            .collect();
        debug!("{} of {} blocks are LINE blocks", texts.len(), lines.len());

        self.run_texts(&texts)
    }

    fn run_texts(&self, texts: &[&str]) -> Result<ExtractionResult> {
        let start = Instant::now();
        let strategy = self.extractor.strategy();

        let used: Vec<&str> = if strategy == Strategy::Semantic && !self.filter_semantic_input {
            texts.to_vec()
        } else {
            self.filter.filter(texts)
        };
        let text = used.join(self.join.delimiter());

        let candidate = self.extractor.extract(&text)?;
        let record = self.merger.merge(&candidate);

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "{} extraction: {} fields from {}/{} lines in {}ms",
            strategy,
            record.len(),
            used.len(),
            texts.len(),
            processing_time_ms
        );

        Ok(ExtractionResult {
            record,
            strategy,
            lines_total: texts.len(),
            lines_used: used.len(),
            processing_time_ms,
            text,
        })
    }
}

/// Stages a document, runs OCR over it and extracts a record.
pub struct DocumentProcessor {
    store: Box<dyn BlobStore>,
    ocr: Box<dyn OcrBackend>,
    pipeline: ExtractionPipeline,
}

impl DocumentProcessor {
    pub fn new(
        store: Box<dyn BlobStore>,
        ocr: Box<dyn OcrBackend>,
        pipeline: ExtractionPipeline,
    ) -> Self {
        Self {
            store,
            ocr,
            pipeline,
        }
    }

    /// Local staging, local OCR and the configured strategy.
    #[cfg(feature = "native")]
    pub fn from_config(config: &EmidConfig) -> Result<Self> {
        use crate::ocr::pure_engine::PureOcrBackend;
        use crate::storage::local::LocalBlobStore;

        let pipeline = ExtractionPipeline::from_config(config)?;
        let ocr = PureOcrBackend::new(config.ocr.clone()).map_err(EmidError::Detection)?;
        let store = LocalBlobStore::from_config(&config.storage);

        Ok(Self::new(Box::new(store), Box::new(ocr), pipeline))
    }

    pub fn pipeline(&self) -> &ExtractionPipeline {
        &self.pipeline
    }

    /// Stage `path` and recognize it. The staged object is always released.
    pub fn detect(&self, path: &Path) -> Result<Vec<RecognizedLine>> {
        with_staged(self.store.as_ref(), path, |staged| {
            self.ocr.detect(staged).map_err(EmidError::Detection)
        })
    }

    /// Recognize `path` and extract a record from it.
    pub fn process_file(&self, path: &Path) -> Result<ExtractionResult> {
        info!("Processing {}", path.display());
        let lines = self.detect(path)?;
        self.pipeline.run(&lines)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::{LlmError, OcrError, StorageError};
    use crate::extract::SemanticExtractor;
    use crate::llm::{Completer, Embedder};
    use crate::models::record::{CandidateRecord, FieldKey};
    use crate::storage::{BlobHandle, StagedDocument};
    use pretty_assertions::assert_eq;

    const SCENARIO: [&str; 4] = [
        "Name: JOHN SMITH",
        "اسم: جون سميث",
        "ID Number: 784-1990-1234567-1",
        "Nationality: USA",
    ];

    fn pairs(record: &ExtractedRecord) -> Vec<(FieldKey, &str)> {
        record.iter().collect()
    }

    #[test]
    fn test_end_to_end_pattern() {
        let lines: Vec<RecognizedLine> = SCENARIO.iter().map(|t| RecognizedLine::line(*t)).collect();
        let result = ExtractionPipeline::pattern().run(&lines).unwrap();

        assert_eq!(
            pairs(&result.record),
            vec![
                (FieldKey::Name, "JOHN SMITH"),
                (FieldKey::IdNumber, "784-1990-1234567-1"),
                (FieldKey::Nationality, "USA"),
            ]
        );
        assert_eq!(result.strategy, Strategy::Pattern);
        assert_eq!((result.lines_total, result.lines_used), (4, 3));
        assert_eq!(
            result.text,
            "Name: JOHN SMITH\nID Number: 784-1990-1234567-1\nNationality: USA"
        );
    }

    #[test]
    fn test_value_on_dropped_arabic_line_stays_absent() {
        let pipeline = ExtractionPipeline::pattern();

        let record = pipeline
            .extract_lines(&["Name:", "اسم: جون سميث", "Nationality: USA"])
            .unwrap();
        assert_eq!(pairs(&record), vec![(FieldKey::Nationality, "USA")]);

        let record = pipeline
            .extract_lines(&["ID Number:", "رقم الهوية 784", "Name: JOHN SMITH"])
            .unwrap();
        assert_eq!(pairs(&record), vec![(FieldKey::Name, "JOHN SMITH")]);
    }

    #[test]
    fn test_word_blocks_are_ignored() {
        let lines = vec![
            RecognizedLine::word("Name: WORD ONLY"),
            RecognizedLine::line("Nationality: USA"),
        ];
        let record = ExtractionPipeline::pattern().extract(&lines).unwrap();
        assert_eq!(pairs(&record), vec![(FieldKey::Nationality, "USA")]);
    }

    struct Unfiltered;

    impl FieldExtractor for Unfiltered {
        fn strategy(&self) -> Strategy {
            Strategy::Semantic
        }

        fn extract(&self, _text: &str) -> Result<CandidateRecord> {
            Ok([
                ("name", "  JANE DOE "),
                ("sponsor", "Not Found"),
                ("blood_type", "O+"),
                ("passport", "Z1234567"),
                ("profession", ""),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect())
        }
    }

    #[test]
    fn test_output_keys_stay_in_closed_set() {
        let record = ExtractionPipeline::new(Box::new(Unfiltered))
            .extract_lines(&["anything"])
            .unwrap();

        assert_eq!(
            pairs(&record),
            vec![(FieldKey::Name, "JANE DOE"), (FieldKey::PassportNo, "Z1234567")]
        );
        assert!(record.keys().all(|k| FieldKey::ALL.contains(&k)));
    }

    struct Flat;

    impl Embedder for Flat {
        fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, LlmError> {
            Ok(vec![1.0, 1.0])
        }
    }

    struct Recorder {
        answer: &'static str,
        documents: Mutex<Vec<String>>,
    }

    impl Completer for Recorder {
        fn complete(
            &self,
            _instruction: &str,
            documents: &[&str],
            _temperature: f32,
        ) -> std::result::Result<String, LlmError> {
            let mut seen = self.documents.lock().unwrap();
            seen.extend(documents.iter().map(|d| d.to_string()));
            Ok(self.answer.to_string())
        }
    }

    fn semantic(answer: &'static str, options: &ExtractionConfig) -> (ExtractionPipeline, Arc<Recorder>) {
        let recorder = Arc::new(Recorder {
            answer,
            documents: Mutex::new(Vec::new()),
        });
        let extractor = SemanticExtractor::new(Flat, Arc::clone(&recorder));
        (ExtractionPipeline::with_options(Box::new(extractor), options), recorder)
    }

    #[test]
    fn test_semantic_fallback_does_not_raise() {
        let (pipeline, _) = semantic("Name: JANE DOE", &ExtractionConfig::default());
        let record = pipeline.extract_lines(&SCENARIO).unwrap();
        assert_eq!(pairs(&record), vec![(FieldKey::Name, "JANE DOE")]);
    }

    #[test]
    fn test_semantic_empty_answer_is_empty_record() {
        let (pipeline, _) = semantic("I don't know.", &ExtractionConfig::default());
        assert!(pipeline.extract_lines(&SCENARIO).unwrap().is_empty());
    }

    #[test]
    fn test_semantic_input_filtering_is_configurable() {
        let (filtered, seen) = semantic("{}", &ExtractionConfig::default());
        filtered.extract_lines(&SCENARIO).unwrap();
        assert!(!seen.documents.lock().unwrap().concat().contains("جون"));

        let options = ExtractionConfig {
            strategy: Strategy::Semantic,
            preserve_line_breaks: false,
            filter_semantic_input: false,
        };
        let (unfiltered, seen) = semantic("{}", &options);
        let result = unfiltered.run(&SCENARIO.map(RecognizedLine::line)).unwrap();
        assert_eq!(result.lines_used, 4);
        assert!(!result.text.contains('\n'));
        assert!(seen.documents.lock().unwrap().concat().contains("جون"));
    }

    struct CountingStore {
        deletes: Arc<AtomicUsize>,
    }

    impl BlobStore for CountingStore {
        fn put(&self, path: &Path) -> std::result::Result<BlobHandle, StorageError> {
            Ok(BlobHandle {
                key: path.display().to_string(),
                uri: format!("mem://{}", path.display()),
            })
        }

        fn read(&self, _handle: &BlobHandle) -> std::result::Result<Vec<u8>, StorageError> {
            Ok(Vec::new())
        }

        fn delete(&self, _handle: &BlobHandle) -> std::result::Result<(), StorageError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ScriptedOcr(std::result::Result<Vec<&'static str>, &'static str>);

    impl OcrBackend for ScriptedOcr {
        fn detect(
            &self,
            _document: &StagedDocument<'_>,
        ) -> std::result::Result<Vec<RecognizedLine>, OcrError> {
            match &self.0 {
                Ok(lines) => Ok(lines.iter().map(|t| RecognizedLine::line(*t)).collect()),
                Err(reason) => Err(OcrError::Detection(reason.to_string())),
            }
        }
    }

    fn processor(ocr: ScriptedOcr) -> (DocumentProcessor, Arc<AtomicUsize>) {
        let deletes = Arc::new(AtomicUsize::new(0));
        let store = CountingStore {
            deletes: Arc::clone(&deletes),
        };
        let processor =
            DocumentProcessor::new(Box::new(store), Box::new(ocr), ExtractionPipeline::pattern());
        (processor, deletes)
    }

    #[test]
    fn test_process_file_releases_staged_object() {
        let (processor, deletes) = processor(ScriptedOcr(Ok(SCENARIO.to_vec())));
        let result = processor.process_file(Path::new("card.png")).unwrap();
        assert_eq!(result.record.len(), 3);
        assert_eq!(deletes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ocr_failure_is_wrapped_and_released() {
        let (processor, deletes) = processor(ScriptedOcr(Err("model crashed")));
        let err = processor.process_file(Path::new("card.png")).unwrap_err();
        assert!(matches!(err, EmidError::Detection(OcrError::Detection(_))));
        assert!(err.to_string().starts_with("failed during text detection"));
        assert_eq!(deletes.load(Ordering::SeqCst), 1);
    }
}
