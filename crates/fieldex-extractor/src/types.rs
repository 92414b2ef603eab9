//! Schema, record and run types for extraction

use crate::error::ExtractorError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// One question to answer from the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Stable identifier, echoed back by the model
    pub id: String,

    /// Natural-language question
    pub question: String,

    /// Excluded from extraction when true
    #[serde(default)]
    pub skip: bool,
}

impl FieldSpec {
    /// Create an active field
    pub fn new(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            skip: false,
        }
    }

    /// Read a field from one raw schema entry
    ///
    /// Returns `None` when `id` or `question` is missing or is neither a
    /// string nor a number. Both are kept exactly as written, blank text
    /// included. `skip` accepts a JSON boolean or the string `"true"` in any
    /// case.
    fn from_entry(entry: &Map<String, Value>) -> Option<Self> {
        let id = entry.get("id").and_then(value_as_text)?;
        let question = entry.get("question").and_then(value_as_text)?;
        let skip = match entry.get("skip") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        };
        Some(Self { id, question, skip })
    }
}

/// Render a JSON string or number as text, verbatim
pub(crate) fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The parsed question schema: `{"fields": [{id, question, skip?}, ...]}`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    /// Every well-formed field, in schema order, skipped ones included
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    /// Parse a schema document
    ///
    /// A missing `fields` key yields an empty schema. Malformed entries are
    /// skipped with a warning.
    pub fn from_json(json: &str) -> Result<Self, ExtractorError> {
        let root: Value = serde_json::from_str(json)?;
        let root = root
            .as_object()
            .ok_or_else(|| {
                ExtractorError::Schema("schema root must be a JSON object".to_string())
            })?;

        let entries = match root.get("fields") {
            None => return Ok(Self::default()),
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                return Err(ExtractorError::Schema("`fields` must be an array".to_string()));
            }
        };

        let mut fields = Vec::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            match entry.as_object().and_then(FieldSpec::from_entry) {
                Some(field) => fields.push(field),
                None => warn!(
                    "Ignoring schema entry {} without a string or numeric id and question",
                    position
                ),
            }
        }
        Ok(Self { fields })
    }

    /// Fields that take part in extraction, in schema order
    pub fn active_fields(&self) -> Vec<FieldSpec> {
        self.fields.iter().filter(|f| !f.skip).cloned().collect()
    }

    /// Number of fields marked `skip`
    pub fn skipped_count(&self) -> usize {
        self.fields.iter().filter(|f| f.skip).count()
    }
}

/// Answer for one field
///
/// `value` and `source_quote` are always written, `null` when absent.
/// `type_guided` and `error` appear only when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// Field id
    pub id: String,

    /// Extracted value, `null` when not found
    #[serde(default)]
    pub value: Value,

    /// Normalised or typed form of the value, when the model gives one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_guided: Option<Value>,

    /// Verbatim evidence from the document
    #[serde(default)]
    pub source_quote: Value,

    /// Why the field has no answer, for failed batches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionRecord {
    /// Build a record from one model entry
    ///
    /// The id is the batch field's id, not the model's rendering of it.
    pub fn from_model_entry(id: impl Into<String>, entry: &Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            value: entry.get("value").cloned().unwrap_or(Value::Null),
            type_guided: entry.get("type_guided").cloned(),
            source_quote: entry.get("source_quote").cloned().unwrap_or(Value::Null),
            error: None,
        }
    }

    /// Placeholder for a field whose batch failed
    pub fn failed(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: Value::Null,
            type_guided: None,
            source_quote: Value::Null,
            error: Some(message.into()),
        }
    }

    /// Whether the record carries an error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The document written at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalOutput {
    /// One record per active field, in batch order
    pub fields: Vec<ExtractionRecord>,
}

impl FinalOutput {
    /// Look up a record by field id
    pub fn get(&self, id: &str) -> Option<&ExtractionRecord> {
        self.fields.iter().find(|r| r.id == id)
    }

    /// Number of records carrying an error
    pub fn error_count(&self) -> usize {
        self.fields.iter().filter(|r| r.is_error()).count()
    }
}

/// A candidate chunk with its relevance score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Chunk text
    pub text: String,

    /// Relevance score; `0.0` for every chunk when scoring failed
    pub score: f32,
}

/// Chunks joined into one context string within the token budget
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedContext {
    /// Joined chunk texts
    pub text: String,

    /// Number of chunks included
    pub chunk_count: usize,

    /// Token count of `text` as measured by the packer's counter
    pub token_count: usize,

    /// Number of candidate chunks left out
    pub dropped: usize,
}

impl PackedContext {
    /// Whether no chunk fit
    pub fn is_empty(&self) -> bool {
        self.chunk_count == 0
    }
}

/// Lifecycle of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStage {
    /// Gathering candidate chunks
    Retrieving,
    /// Scoring candidates against the batch query
    Reranking,
    /// Fitting chunks into the context budget
    Packing,
    /// Waiting on the model
    Prompting,
    /// Decoding and reconciling the answer
    Parsing,
    /// Records produced from the model output
    Done,
    /// Placeholder records produced
    Failed,
}

impl std::fmt::Display for BatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BatchStage::Retrieving => "retrieving",
            BatchStage::Reranking => "reranking",
            BatchStage::Packing => "packing",
            BatchStage::Prompting => "prompting",
            BatchStage::Parsing => "parsing",
            BatchStage::Done => "done",
            BatchStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What happened to one batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// Zero-based batch index
    pub index: usize,

    /// Field ids in the batch
    pub field_ids: Vec<String>,

    /// Final stage reached (`Done` or `Failed`)
    pub stage: BatchStage,

    /// Stage at which the batch failed, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<BatchStage>,

    /// Distinct candidate chunks retrieved
    pub candidates: usize,

    /// Fields whose retrieval failed and contributed nothing
    pub retrieval_failures: usize,

    /// Whether candidates kept their retrieval order with zero scores
    pub rerank_fallback: bool,

    /// Chunks packed into the prompt
    pub context_chunks: usize,

    /// Tokens of packed context
    pub context_tokens: usize,

    /// Failure message written into the placeholder records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchReport {
    pub(crate) fn new(index: usize, field_ids: Vec<String>) -> Self {
        Self {
            index,
            field_ids,
            stage: BatchStage::Retrieving,
            failed_at: None,
            candidates: 0,
            retrieval_failures: 0,
            rerank_fallback: false,
            context_chunks: 0,
            context_tokens: 0,
            error: None,
        }
    }

    /// Whether the batch produced placeholders
    pub fn is_failed(&self) -> bool {
        self.stage == BatchStage::Failed
    }
}

/// Run-level facts, for logs and the CLI summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    /// Model that answered the extraction calls
    pub model_name: String,

    /// Name of the per-run vector collection
    pub collection: String,

    /// Chunks indexed
    pub chunk_count: usize,

    /// Active fields extracted
    pub field_count: usize,

    /// Fields excluded by `skip`
    pub skipped_fields: usize,

    /// Batches processed
    pub batch_count: usize,

    /// Batches that produced placeholders
    pub failed_batches: usize,

    /// Wall-clock duration of the run
    pub processing_time_ms: u64,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    /// Records to write
    pub output: FinalOutput,

    /// Run-level facts
    pub metadata: RunMetadata,

    /// One report per batch, in order
    pub batches: Vec<BatchReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_parsing() {
        let schema = Schema::from_json(
            r#"{"fields": [
                {"id": "age", "question": "Patient age?"},
                {"id": 7, "question": "Blood type?", "skip": "TRUE"},
                {"id": "dose", "question": "Daily dose?", "skip": false}
            ]}"#,
        )
        .unwrap();

        assert_eq!(schema.fields.len(), 3);
        assert_eq!(schema.fields[1].id, "7");
        assert!(schema.fields[1].skip);
        assert_eq!(schema.skipped_count(), 1);

        let active = schema.active_fields();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, "age");
        assert_eq!(active[1].id, "dose");
    }

    #[test]
    fn test_schema_ignores_malformed_entries() {
        let schema = Schema::from_json(
            r#"{"fields": [
                {"id": "a"},
                {"question": "No id?"},
                "not an object",
                {"id": null, "question": "Null id?"},
                {"id": "b", "question": ["not", "text"]},
                {"id": "c", "question": "Kept?"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(schema.fields, vec![FieldSpec::new("c", "Kept?")]);
    }

    #[test]
    fn test_schema_keeps_blank_text_verbatim() {
        let schema = Schema::from_json(
            r#"{"fields": [
                {"id": "a", "question": ""},
                {"id": "b", "question": "   "},
                {"id": "", "question": "Unnamed?"},
                {"id": " 4.5 ", "question": "Padded id?"}
            ]}"#,
        )
        .unwrap();

        let ids: Vec<&str> = schema.fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "", " 4.5 "]);
        assert_eq!(schema.fields[0].question, "");
        assert_eq!(schema.fields[1].question, "   ");
        assert_eq!(schema.active_fields().len(), 4);
    }

    #[test]
    fn test_schema_skip_variants() {
        let schema = Schema::from_json(
            r#"{"fields": [
                {"id": "a", "question": "q", "skip": true},
                {"id": "b", "question": "q", "skip": "True"},
                {"id": "c", "question": "q", "skip": "yes"},
                {"id": "d", "question": "q", "skip": 1}
            ]}"#,
        )
        .unwrap();
        let skipped: Vec<bool> = schema.fields.iter().map(|f| f.skip).collect();
        assert_eq!(skipped, vec![true, true, false, false]);
    }

    #[test]
    fn test_schema_without_fields_key() {
        let schema = Schema::from_json(r#"{"title": "empty"}"#).unwrap();
        assert!(schema.fields.is_empty());
    }

    #[test]
    fn test_schema_rejects_bad_shapes() {
        assert!(matches!(
            Schema::from_json("[1, 2]"),
            Err(ExtractorError::Schema(_))
        ));
        assert!(matches!(
            Schema::from_json(r#"{"fields": {}}"#),
            Err(ExtractorError::Schema(_))
        ));
        assert!(matches!(
            Schema::from_json("{not json"),
            Err(ExtractorError::JsonParse(_))
        ));
    }

    #[test]
    fn test_record_serialization_shape() {
        let ok = ExtractionRecord {
            id: "age".to_string(),
            value: Value::from("42"),
            type_guided: None,
            source_quote: Value::Null,
            error: None,
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json, serde_json::json!({"id": "age", "value": "42", "source_quote": null}));

        let failed = ExtractionRecord::failed("dose", "invalid structure");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "dose",
                "value": null,
                "source_quote": null,
                "error": "invalid structure"
            })
        );
    }

    #[test]
    fn test_record_from_model_entry() {
        let entry = serde_json::json!({
            "id": 3,
            "value": ["a", "b"],
            "type_guided": {"unit": "mg"},
            "extra": "ignored"
        });
        let record = ExtractionRecord::from_model_entry("3", entry.as_object().unwrap());
        assert_eq!(record.id, "3");
        assert_eq!(record.value, serde_json::json!(["a", "b"]));
        assert_eq!(record.type_guided, Some(serde_json::json!({"unit": "mg"})));
        assert_eq!(record.source_quote, Value::Null);
        assert!(!record.is_error());
    }

    #[test]
    fn test_final_output_lookup() {
        let output = FinalOutput {
            fields: vec![
                ExtractionRecord::failed("a", "boom"),
                ExtractionRecord::from_model_entry("b", &Map::new()),
            ],
        };
        assert_eq!(output.error_count(), 1);
        assert!(output.get("b").is_some());
        assert!(output.get("zzz").is_none());
    }

    #[test]
    fn test_batch_stage_display() {
        assert_eq!(BatchStage::Reranking.to_string(), "reranking");
        assert_eq!(
            serde_json::to_value(BatchStage::Failed).unwrap(),
            Value::from("failed")
        );
    }
}
