//! Probe command implementation.

use super::read_input;
use crate::backends;
use crate::cli::ProbeArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use fieldex_extractor::{index_document, probe, TextChunker};

/// Execute the probe command.
pub fn execute_probe(args: ProbeArgs, config: &mut Config, formatter: &Formatter) -> Result<()> {
    let diagnostics = config.diagnostics.clone().unwrap_or_default();
    let term = args
        .term
        .or_else(|| Some(diagnostics.term).filter(|t| !t.is_empty()))
        .ok_or_else(|| {
            CliError::InvalidInput("no term given (--term or [diagnostics] term)".into())
        })?;
    let question = args.question.or(diagnostics.question);

    if let Some(context) = args.context {
        config.paths.context = context;
    }
    config.apply_endpoint(&args.endpoint);

    let document = read_input(&config.paths.context, "context")?;
    let embedder = backends::embedder(config)?;
    let chunker = TextChunker::from_config(&config.extractor);
    let corpus = index_document(
        &document,
        &chunker,
        &embedder,
        &config.extractor.collection_prefix,
    )?;

    let report = probe(
        &term,
        question.as_deref(),
        &corpus.chunks,
        &embedder,
        &corpus.index,
        config.extractor.top_k,
    );

    println!("{}", formatter.format_probe(&report)?);
    Ok(())
}
