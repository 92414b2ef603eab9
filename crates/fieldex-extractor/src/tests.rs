//! Integration tests for the Extractor

#[cfg(test)]
mod tests {
    use crate::{
        BatchStage, CharEstimate, DiagnosticsConfig, Extractor, ExtractorConfig, ExtractorError,
        FieldSpec, FinalOutput, Schema, INVALID_STRUCTURE, MISSING_FROM_OUTPUT,
    };
    use fieldex_domain::{CompletionRequest, RelevanceScorer};
    use fieldex_llm::{MockProvider, TermOverlapScorer};
    use fieldex_store::{MockEmbeddingModel, VectorIndex};
    use serde_json::{json, Value};

    type TestExtractor<R = TermOverlapScorer> =
        Extractor<MockProvider, MockEmbeddingModel, R, CharEstimate>;

    const NOTE: &str = "Admission note.\n\n\
        The patient is a 54-year-old woman admitted for fatigue and weight loss. \
        She reports no fever.\n\n\n\n\
        Current medication: Metformin 500 mg twice daily, Ramipril 5 mg once daily. \
        Known allergy to penicillin.\n\n\
        Family history: father with type 2 diabetes. Mother alive and well. \
        Lives alone, retired teacher, non-smoker.\n\n\
        Plan: fasting glucose, HbA1c, thyroid panel. Follow-up in two weeks.";

    fn small_config() -> ExtractorConfig {
        ExtractorConfig {
            chunk_size: 160,
            chunk_overlap: 30,
            boundary_lookback: 60,
            top_k: 2,
            batch_size: 2,
            ..ExtractorConfig::default()
        }
    }

    fn extractor(llm: MockProvider, config: ExtractorConfig) -> TestExtractor {
        Extractor::new(llm, MockEmbeddingModel::new(64), TermOverlapScorer::new(), config)
            .unwrap()
            .with_token_counter(CharEstimate)
    }

    fn schema(ids: &[&str]) -> Schema {
        let fields: Vec<Value> = ids
            .iter()
            .map(|id| json!({"id": id, "question": format!("Question {}?", id)}))
            .collect();
        Schema::from_json(&json!({ "fields": fields }).to_string()).unwrap()
    }

    /// Question ids and texts the prompt asked about
    fn questions_in(request: &CompletionRequest) -> Vec<(String, String)> {
        let marker = "QUESTIONS:\n";
        let start = request.user.rfind(marker).unwrap() + marker.len();
        let end = request.user.rfind("\n\nReturn only valid JSON.").unwrap();
        let list: Vec<Value> = serde_json::from_str(&request.user[start..end]).unwrap();
        list.iter()
            .map(|q| {
                (
                    q["id"].as_str().unwrap().to_string(),
                    q["question"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    /// Context block of the prompt
    fn context_in(request: &CompletionRequest) -> String {
        let open = "DOCUMENT CONTEXT:\n\"\"\"\n";
        let start = request.user.find(open).unwrap() + open.len();
        let end = request.user.find("\n\"\"\"\n\nQUESTIONS:").unwrap();
        request.user[start..end].to_string()
    }

    /// Answers every question it is asked
    fn echo_answers(request: &CompletionRequest) -> Result<String, String> {
        let fields: Vec<Value> = questions_in(request)
            .into_iter()
            .map(|(id, question)| {
                json!({"id": id, "value": format!("answer to {}", question), "source_quote": null})
            })
            .collect();
        Ok(json!({ "fields": fields }).to_string())
    }

    struct FailingScorer;

    impl RelevanceScorer for FailingScorer {
        type Error = String;

        fn score(&self, _query: &str, _documents: &[String]) -> Result<Vec<f32>, String> {
            Err("reranker offline".to_string())
        }
    }

    fn ids(output: &FinalOutput) -> Vec<&str> {
        output.fields.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_full_extraction_flow() {
        let llm = MockProvider::from_fn(echo_answers).with_model_name("qwen-14b");
        let extractor = extractor(llm.clone(), small_config());

        let schema = schema(&["1.1", "1.2", "2.1", "2.2", "3.1"]);
        let run = extractor.run(NOTE, &schema).unwrap();

        assert_eq!(ids(&run.output), vec!["1.1", "1.2", "2.1", "2.2", "3.1"]);
        assert_eq!(run.output.error_count(), 0);
        assert_eq!(run.output.fields[2].value, json!("answer to Question 2.1?"));

        assert_eq!(llm.call_count(), 3);
        assert_eq!(run.batches.len(), 3);
        assert!(run.batches.iter().all(|b| b.stage == BatchStage::Done));
        assert_eq!(run.batches[2].field_ids, vec!["3.1".to_string()]);

        assert_eq!(run.metadata.model_name, "qwen-14b");
        assert_eq!(run.metadata.field_count, 5);
        assert_eq!(run.metadata.batch_count, 3);
        assert_eq!(run.metadata.failed_batches, 0);
        assert!(run.metadata.chunk_count > 1);
        assert!(run.metadata.collection.starts_with("documents_"));
    }

    #[test]
    fn test_skipped_fields_are_not_extracted() {
        let llm = MockProvider::from_fn(echo_answers);
        let extractor = extractor(llm.clone(), small_config());
        let schema = Schema::from_json(
            r#"{"fields": [
                {"id": "a", "question": "Age?"},
                {"id": "b", "question": "Weight?", "skip": true},
                {"id": "c", "question": "Height?", "skip": "true"}
            ]}"#,
        )
        .unwrap();

        let run = extractor.run(NOTE, &schema).unwrap();
        assert_eq!(ids(&run.output), vec!["a"]);
        assert_eq!(run.metadata.skipped_fields, 2);
        assert_eq!(llm.call_count(), 1);
    }

    #[test]
    fn test_blank_question_still_yields_a_record() {
        // Answers only the questions that have text
        let llm = MockProvider::from_fn(|request| {
            let fields: Vec<Value> = questions_in(request)
                .into_iter()
                .filter(|(_, question)| !question.trim().is_empty())
                .map(|(id, _)| json!({"id": id, "value": "answered", "source_quote": null}))
                .collect();
            Ok(json!({ "fields": fields }).to_string())
        });
        let extractor = extractor(llm, small_config());
        let schema = Schema::from_json(
            r#"{"fields": [
                {"id": "a", "question": "Age?"},
                {"id": "b", "question": ""},
                {"id": " c ", "question": "Height?"}
            ]}"#,
        )
        .unwrap();

        let run = extractor.run(NOTE, &schema).unwrap();

        assert_eq!(ids(&run.output), vec!["a", "b", " c "]);
        let blank = run.output.get("b").unwrap();
        assert!(blank.value.is_null());
        assert_eq!(blank.error.as_deref(), Some(MISSING_FROM_OUTPUT));
        assert_eq!(run.batches[0].retrieval_failures, 1);
        assert!(!run.output.get(" c ").unwrap().is_error());
    }

    #[test]
    fn test_transport_failure_yields_placeholders() {
        let llm = MockProvider::default();
        llm.push_error("connection refused");
        let extractor = extractor(llm, ExtractorConfig::default());

        let run = extractor.run(NOTE, &schema(&["4.5", "4.6"])).unwrap();

        assert_eq!(run.output.fields.len(), 2);
        for record in &run.output.fields {
            assert!(record.value.is_null());
            assert!(record.source_quote.is_null());
            assert_eq!(record.error.as_deref(), Some("LLM error: connection refused"));
        }
        assert_eq!(run.batches[0].stage, BatchStage::Failed);
        assert_eq!(run.batches[0].failed_at, Some(BatchStage::Prompting));
        assert_eq!(run.metadata.failed_batches, 1);
    }

    #[test]
    fn test_failed_batch_does_not_abort_run() {
        let llm = MockProvider::from_fn(echo_answers);
        llm.push_error("timeout");
        let extractor = extractor(llm.clone(), small_config());

        let run = extractor.run(NOTE, &schema(&["a", "b", "c", "d"])).unwrap();

        assert_eq!(ids(&run.output), vec!["a", "b", "c", "d"]);
        assert!(run.output.fields[0].is_error());
        assert!(run.output.fields[1].is_error());
        assert!(!run.output.fields[2].is_error());
        assert!(!run.output.fields[3].is_error());
        assert_eq!(llm.call_count(), 2);
    }

    #[test]
    fn test_invalid_structure() {
        let llm = MockProvider::new(r#"{"answers": [{"id": "a", "value": 1}]}"#);
        let extractor = extractor(llm, small_config());

        let run = extractor.run(NOTE, &schema(&["a", "b"])).unwrap();
        assert!(run
            .output
            .fields
            .iter()
            .all(|r| r.error.as_deref() == Some(INVALID_STRUCTURE)));
        assert_eq!(run.batches[0].failed_at, Some(BatchStage::Parsing));
    }

    #[test]
    fn test_unrepairable_output() {
        let llm = MockProvider::new("Sorry, I cannot help with that request.");
        let extractor = extractor(llm, small_config());

        let run = extractor.run(NOTE, &schema(&["a"])).unwrap();
        let error = run.output.fields[0].error.as_deref().unwrap();
        assert!(error.starts_with("unrepairable model output"));
    }

    #[test]
    fn test_empty_output_is_a_batch_failure() {
        let llm = MockProvider::new("```json\n```");
        let extractor = extractor(llm, small_config());

        let run = extractor.run(NOTE, &schema(&["a"])).unwrap();
        assert_eq!(run.output.fields[0].error.as_deref(), Some("empty model output"));
    }

    #[test]
    fn test_messy_output_is_repaired() {
        let llm = MockProvider::new(
            "```json\n{\"fields\": [{\"id\": \"a\", \"value\": \"Metformin\nRamipril\", \"source_quote\": None},\n{\"id\": \"b\", \"value\": \"54\"",
        );
        let extractor = extractor(llm, small_config());

        let run = extractor.run(NOTE, &schema(&["a", "b"])).unwrap();
        assert_eq!(run.output.error_count(), 0);
        assert_eq!(run.output.fields[0].value, json!("Metformin Ramipril"));
        assert_eq!(run.output.fields[1].value, json!("54"));
    }

    #[test]
    fn test_reconciliation_with_partial_answers() {
        let llm = MockProvider::new(
            r#"{"fields": [
                {"id": "b", "value": "second", "type_guided": "string"},
                {"id": "zzz", "value": "stray"},
                {"id": "b", "value": "duplicate"}
            ]}"#,
        );
        let extractor = extractor(llm, small_config());

        let run = extractor.run(NOTE, &schema(&["a", "b"])).unwrap();
        assert_eq!(ids(&run.output), vec!["a", "b"]);
        assert_eq!(run.output.fields[0].error.as_deref(), Some(MISSING_FROM_OUTPUT));
        assert_eq!(run.output.fields[1].value, json!("second"));
        assert_eq!(run.output.fields[1].type_guided, Some(json!("string")));
        assert_eq!(run.batches[0].stage, BatchStage::Done);
    }

    #[test]
    fn test_numeric_ids_match() {
        let llm = MockProvider::new(r#"{"fields": [{"id": 7, "value": "x"}]}"#);
        let extractor = extractor(llm, small_config());
        let schema = Schema::from_json(r#"{"fields": [{"id": 7, "question": "Seven?"}]}"#).unwrap();

        let run = extractor.run(NOTE, &schema).unwrap();
        assert_eq!(run.output.fields[0].id, "7");
        assert_eq!(run.output.fields[0].value, json!("x"));
    }

    #[test]
    fn test_empty_candidate_set_still_prompts() {
        let llm = MockProvider::from_fn(echo_answers);
        let extractor = extractor(llm.clone(), small_config());
        let empty = VectorIndex::new(64);
        let fields = vec![FieldSpec::new("a", "Age?"), FieldSpec::new("b", "Sex?")];

        let (output, reports) = extractor.extract(&empty, &fields);

        assert_eq!(output.fields.len(), 2);
        assert_eq!(reports[0].candidates, 0);
        assert_eq!(reports[0].context_chunks, 0);
        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(context_in(&requests[0]), "");
    }

    #[test]
    fn test_rerank_failure_keeps_retrieval_order() {
        let llm = MockProvider::from_fn(echo_answers);
        let extractor: TestExtractor<FailingScorer> =
            Extractor::new(llm, MockEmbeddingModel::new(64), FailingScorer, small_config())
                .unwrap()
                .with_token_counter(CharEstimate);

        let run = extractor.run(NOTE, &schema(&["a", "b"])).unwrap();
        assert_eq!(run.output.error_count(), 0);
        assert!(run.batches[0].rerank_fallback);
        assert_eq!(run.batches[0].stage, BatchStage::Done);
    }

    #[test]
    fn test_context_respects_token_budget() {
        let llm = MockProvider::from_fn(echo_answers);
        let config = ExtractorConfig {
            top_k: 4,
            context_window: 200,
            safety_margin: 140,
            ..small_config()
        };
        let limit = config.context_token_limit();
        let extractor = extractor(llm.clone(), config);

        let run = extractor.run(NOTE, &schema(&["a", "b", "c"])).unwrap();

        for report in &run.batches {
            assert!(report.context_tokens < limit);
            assert!(report.context_chunks <= report.candidates);
        }
        for request in llm.requests() {
            let context = context_in(&request);
            let tokens: usize = context
                .split(crate::CHUNK_SEPARATOR)
                .filter(|c| !c.is_empty())
                .map(|c| c.chars().count() / 4)
                .sum();
            assert!(tokens < limit);
        }
    }

    #[test]
    fn test_request_settings() {
        let llm = MockProvider::from_fn(echo_answers);
        let config = ExtractorConfig {
            temperature: 0.1,
            max_output_tokens: 2000,
            domain: Some("medical".to_string()),
            ..small_config()
        };
        let extractor = extractor(llm.clone(), config);
        extractor.run(NOTE, &schema(&["a"])).unwrap();

        let request = &llm.requests()[0];
        assert_eq!(request.temperature, 0.1);
        assert_eq!(request.max_tokens, 2000);
        assert!(request.system.contains("medical data extraction"));
        assert_eq!(questions_in(request), vec![("a".to_string(), "Question a?".to_string())]);
    }

    #[test]
    fn test_index_chunk_boundaries() {
        let extractor = extractor(MockProvider::default(), ExtractorConfig::default());
        let text = "a".repeat(2500);

        let corpus = extractor.index(&text).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.chunks[0].char_len(), 2000);
        assert_eq!(corpus.chunks[1].char_len(), 800);
    }

    #[test]
    fn test_empty_document_is_fatal() {
        let llm = MockProvider::from_fn(echo_answers);
        let extractor = extractor(llm.clone(), small_config());

        let result = extractor.run("   \n\n  ", &schema(&["a"]));
        assert!(matches!(result, Err(ExtractorError::EmptyDocument)));
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ExtractorConfig {
            batch_size: 0,
            ..ExtractorConfig::default()
        };
        let result = Extractor::new(
            MockProvider::default(),
            MockEmbeddingModel::new(8),
            TermOverlapScorer::new(),
            config,
        );
        assert!(matches!(result, Err(ExtractorError::Config(_))));
    }

    #[test]
    fn test_diagnostics_do_not_change_output() {
        let plain = extractor(MockProvider::from_fn(echo_answers), small_config());
        let probed = extractor(MockProvider::from_fn(echo_answers), small_config())
            .with_diagnostics(DiagnosticsConfig {
                term: "Metformin".to_string(),
                question: Some("Current medication?".to_string()),
                watch_field: Some("b".to_string()),
            });

        let schema = schema(&["a", "b", "c"]);
        let first = plain.run(NOTE, &schema).unwrap();
        let second = probed.run(NOTE, &schema).unwrap();
        assert_eq!(first.output, second.output);
    }

    #[test]
    fn test_rerun_is_deterministic() {
        let extractor = extractor(MockProvider::from_fn(echo_answers), small_config());
        let schema = schema(&["a", "b", "c"]);

        let first = extractor.run(NOTE, &schema).unwrap();
        let second = extractor.run(NOTE, &schema).unwrap();
        assert_eq!(first.output, second.output);
    }

    #[test]
    fn test_output_written_once_at_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("extraction.json");
        let extractor = extractor(MockProvider::from_fn(echo_answers), small_config());

        let run = extractor.run(NOTE, &schema(&["a", "b", "c"])).unwrap();
        run.output.write_to(&path).unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["fields"].as_array().unwrap().len(), 3);
        assert_eq!(written["fields"][0]["source_quote"], Value::Null);
        assert!(written["fields"][0].get("error").is_none());
    }
}
