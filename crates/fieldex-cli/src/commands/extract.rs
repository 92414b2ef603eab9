//! Extract command implementation.

use super::read_input;
use crate::backends;
use crate::cli::ExtractArgs;
use crate::config::{Config, RerankerKind};
use crate::error::Result;
use crate::output::Formatter;
use fieldex_extractor::{Extractor, Schema};

/// Execute the extract command.
pub fn execute_extract(
    args: ExtractArgs,
    config: &mut Config,
    formatter: &Formatter,
) -> Result<()> {
    apply_args(&args, config);

    let document = read_input(&config.paths.context, "context")?;
    let schema = Schema::from_json(&read_input(&config.paths.schema, "schema")?)?;
    if schema.active_fields().is_empty() {
        println!("{}", formatter.warning("Schema has no active fields"));
    }

    let mut extractor = Extractor::new(
        backends::provider(config)?,
        backends::embedder(config)?,
        backends::scorer(config)?,
        config.extractor.clone(),
    )?;
    if let Some(diagnostics) = &config.diagnostics {
        extractor = extractor.with_diagnostics(diagnostics.clone());
    }

    if config.reranker.kind == RerankerKind::TermOverlap {
        println!(
            "{}",
            formatter.warning("Reranking by lexical term overlap, not a cross-encoder")
        );
    }

    let run = extractor.run(&document, &schema)?;
    run.output.write_to(&config.paths.output)?;

    println!("{}", formatter.format_run(&run)?);

    let errors = run.output.error_count();
    if errors > 0 {
        println!(
            "{}",
            formatter.warning(&format!(
                "{} of {} fields carry an error",
                errors,
                run.output.fields.len()
            ))
        );
    }
    println!(
        "{}",
        formatter.success(&format!(
            "Wrote {} fields to {}",
            run.output.fields.len(),
            config.paths.output.display()
        ))
    );

    Ok(())
}

/// Apply command-line overrides to the loaded configuration.
fn apply_args(args: &ExtractArgs, config: &mut Config) {
    if let Some(context) = &args.context {
        config.paths.context = context.clone();
    }
    if let Some(schema) = &args.schema {
        config.paths.schema = schema.clone();
    }
    if let Some(output) = &args.output {
        config.paths.output = output.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.extractor.batch_size = batch_size;
    }
    if let Some(top_k) = args.top_k {
        config.extractor.top_k = top_k;
    }
    config.apply_endpoint(&args.endpoint);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::EndpointArgs;
    use std::path::PathBuf;

    #[test]
    fn test_flags_override_file_values() {
        let mut config = Config::default();
        let args = ExtractArgs {
            context: Some(PathBuf::from("notes/visit.txt")),
            schema: None,
            output: Some(PathBuf::from("out/result.json")),
            batch_size: Some(2),
            top_k: None,
            endpoint: EndpointArgs {
                model: Some("llama-3-8b".to_string()),
                ..EndpointArgs::default()
            },
        };

        apply_args(&args, &mut config);

        assert_eq!(config.paths.context, PathBuf::from("notes/visit.txt"));
        assert_eq!(config.paths.schema, PathBuf::from("schema.json"));
        assert_eq!(config.paths.output, PathBuf::from("out/result.json"));
        assert_eq!(config.extractor.batch_size, 2);
        assert_eq!(config.extractor.top_k, 4);
        assert_eq!(config.llm.model, "llama-3-8b");
    }

    #[test]
    fn test_missing_context_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.json");
        let mut config = Config::default();
        let args = ExtractArgs {
            context: Some(dir.path().join("absent.txt")),
            schema: Some(dir.path().join("absent.json")),
            output: Some(output.clone()),
            batch_size: None,
            top_k: None,
            endpoint: EndpointArgs::default(),
        };
        let formatter = Formatter::new(crate::config::OutputFormat::Quiet, false);

        assert!(execute_extract(args, &mut config, &formatter).is_err());
        assert!(!output.exists());
    }
}
