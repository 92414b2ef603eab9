//! Core Extractor implementation

use crate::chunking::TextChunker;
use crate::config::ExtractorConfig;
use crate::decode::decode;
use crate::diagnostics::{check_context, probe, DiagnosticsConfig};
use crate::error::ExtractorError;
use crate::indexing::{index_document, IndexedCorpus};
use crate::output::Accumulator;
use crate::packing::{pack, TokenEstimator};
use crate::prompt::PromptBuilder;
use crate::reconcile::{placeholders, reconcile};
use crate::rerank::{batch_query, rerank, unscored};
use crate::retrieval::{retrieve, CandidateSet};
use crate::types::{
    BatchReport, BatchStage, ExtractionRecord, ExtractionRun, FieldSpec, FinalOutput,
    RunMetadata, Schema, ScoredChunk,
};
use fieldex_domain::{EmbeddingModel, LlmProvider, RelevanceScorer, TokenCounter, VectorStore};
use std::fmt::Display;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The Extractor answers a schema of questions from one document
///
/// Indexing happens once per run. Questions are then processed in batches,
/// strictly one after another; a batch that fails for any reason still
/// contributes one placeholder record per field.
pub struct Extractor<L, E, R, T = TokenEstimator> {
    llm: L,
    embedder: E,
    scorer: R,
    counter: T,
    config: ExtractorConfig,
    diagnostics: Option<DiagnosticsConfig>,
}

impl<L, E, R> Extractor<L, E, R, TokenEstimator>
where
    L: LlmProvider,
    E: EmbeddingModel,
    R: RelevanceScorer,
{
    /// Create a new Extractor
    ///
    /// Fails if the configuration does not validate.
    pub fn new(
        llm: L,
        embedder: E,
        scorer: R,
        config: ExtractorConfig,
    ) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;
        Ok(Self {
            llm,
            embedder,
            scorer,
            counter: TokenEstimator::new(),
            config,
            diagnostics: None,
        })
    }
}

impl<L, E, R, T> Extractor<L, E, R, T>
where
    L: LlmProvider,
    L::Error: Display,
    E: EmbeddingModel,
    E::Error: Display,
    R: RelevanceScorer,
    R::Error: Display,
    T: TokenCounter,
{
    /// Replace the token counter used for the context budget
    pub fn with_token_counter<U: TokenCounter>(self, counter: U) -> Extractor<L, E, R, U> {
        Extractor {
            llm: self.llm,
            embedder: self.embedder,
            scorer: self.scorer,
            counter,
            config: self.config,
            diagnostics: self.diagnostics,
        }
    }

    /// Enable the retrieval probe and the packed-context checkpoint
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticsConfig) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Embedding model used for indexing and retrieval
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Chunk and index a document
    pub fn index(&self, document: &str) -> Result<IndexedCorpus, ExtractorError> {
        let chunker = TextChunker::from_config(&self.config);
        index_document(
            document,
            &chunker,
            &self.embedder,
            &self.config.collection_prefix,
        )
    }

    /// Index the document and answer every active field of the schema
    ///
    /// Only indexing errors are returned; batch failures end up as
    /// placeholder records in the output.
    pub fn run(&self, document: &str, schema: &Schema) -> Result<ExtractionRun, ExtractorError> {
        let start = Instant::now();
        let fields = schema.active_fields();
        info!(
            "Starting extraction: {} active fields ({} skipped), batch size {}",
            fields.len(),
            schema.skipped_count(),
            self.config.batch_size
        );

        let corpus = self.index(document)?;

        if let Some(diagnostics) = &self.diagnostics {
            let report = probe(
                &diagnostics.term,
                diagnostics.question.as_deref(),
                &corpus.chunks,
                &self.embedder,
                &corpus.index,
                self.config.top_k,
            );
            for line in report.to_string().lines() {
                info!("Probe: {}", line);
            }
        }

        let (output, batches) = self.extract(&corpus.index, &fields);
        let failed_batches = batches.iter().filter(|b| b.is_failed()).count();

        let metadata = RunMetadata {
            model_name: self.llm.model_name().to_string(),
            collection: corpus.collection().to_string(),
            chunk_count: corpus.len(),
            field_count: fields.len(),
            skipped_fields: schema.skipped_count(),
            batch_count: batches.len(),
            failed_batches,
            processing_time_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Extraction complete: {} records, {}/{} batches failed, {} ms",
            output.fields.len(),
            failed_batches,
            batches.len(),
            metadata.processing_time_ms
        );

        Ok(ExtractionRun {
            output,
            metadata,
            batches,
        })
    }

    /// Answer fields against an existing index
    ///
    /// Returns exactly one record per field, in field order, plus a report
    /// per batch.
    pub fn extract<S>(&self, index: &S, fields: &[FieldSpec]) -> (FinalOutput, Vec<BatchReport>)
    where
        S: VectorStore,
        S::Error: Display,
    {
        let mut accumulator = Accumulator::new();
        let mut reports = Vec::new();
        let total = fields.len().div_ceil(self.config.batch_size);

        for (position, batch) in fields.chunks(self.config.batch_size).enumerate() {
            info!(
                "Processing batch {}/{} ({} fields)",
                position + 1,
                total,
                batch.len()
            );
            let (records, report) = self.process_batch(index, batch, position);
            debug_assert_eq!(records.len(), batch.len());
            accumulator.extend(records);
            reports.push(report);
        }

        (accumulator.finish(), reports)
    }

    fn process_batch<S>(
        &self,
        index: &S,
        batch: &[FieldSpec],
        position: usize,
    ) -> (Vec<ExtractionRecord>, BatchReport)
    where
        S: VectorStore,
        S::Error: Display,
    {
        let field_ids = batch.iter().map(|f| f.id.clone()).collect();
        let mut report = BatchReport::new(position, field_ids);

        let retrieval = retrieve(batch, &self.embedder, index, self.config.top_k);
        report.candidates = retrieval.candidates.len();
        report.retrieval_failures = retrieval.failed_fields.len();

        advance(&mut report, BatchStage::Reranking);
        let scored = self.rank(batch, retrieval.candidates, &mut report);

        advance(&mut report, BatchStage::Packing);
        let packed = pack(&scored, &self.counter, self.config.context_token_limit());
        report.context_chunks = packed.chunk_count;
        report.context_tokens = packed.token_count;
        debug!(
            "Batch {}: packed {}/{} chunks, {} tokens",
            position,
            packed.chunk_count,
            scored.len(),
            packed.token_count
        );
        if let Some(diagnostics) = &self.diagnostics {
            check_context(diagnostics, &report.field_ids, &packed.text);
        }

        advance(&mut report, BatchStage::Prompting);
        let request = PromptBuilder::new(batch, &packed.text)
            .with_domain(self.config.domain.as_deref())
            .build(self.config.temperature, self.config.max_output_tokens);

        let raw = match self.llm.generate(&request) {
            Ok(raw) => raw,
            Err(e) => return fail(report, batch, e.to_string()),
        };
        debug!("Batch {}: model answered {} chars", position, raw.len());

        advance(&mut report, BatchStage::Parsing);
        let parsed = match decode(&raw) {
            Ok(parsed) => parsed,
            Err(e) => return fail(report, batch, e.to_string()),
        };

        match reconcile(batch, &parsed) {
            Ok(records) => {
                advance(&mut report, BatchStage::Done);
                (records, report)
            }
            Err(e) => fail(report, batch, e.to_string()),
        }
    }

    /// Order candidates by relevance, keeping retrieval order if scoring fails
    fn rank(
        &self,
        batch: &[FieldSpec],
        candidates: CandidateSet,
        report: &mut BatchReport,
    ) -> Vec<ScoredChunk> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let query = batch_query(batch);
        match rerank(&query, candidates.as_slice().to_vec(), &self.scorer) {
            Ok(scored) => scored,
            Err(e) => {
                warn!(
                    "Batch {}: reranking failed, keeping retrieval order: {}",
                    report.index, e
                );
                report.rerank_fallback = true;
                unscored(candidates.into_vec())
            }
        }
    }
}

fn advance(report: &mut BatchReport, stage: BatchStage) {
    debug!("Batch {}: {} -> {}", report.index, report.stage, stage);
    report.stage = stage;
}

fn fail(
    mut report: BatchReport,
    batch: &[FieldSpec],
    message: String,
) -> (Vec<ExtractionRecord>, BatchReport) {
    warn!(
        "Batch {} failed while {}: {}",
        report.index, report.stage, message
    );
    report.failed_at = Some(report.stage);
    advance(&mut report, BatchStage::Failed);
    let records = placeholders(batch, &message);
    report.error = Some(message);
    (records, report)
}
