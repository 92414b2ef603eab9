//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use fieldex_extractor::{BatchReport, ExtractionRun, FinalOutput, ProbeReport};
use serde_json::Value;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

const CELL_WIDTH: usize = 60;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format the summary of an extraction run.
    pub fn format_run(&self, run: &ExtractionRun) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "metadata": run.metadata,
                "batches": run.batches,
            }))?),
            OutputFormat::Table => Ok(format!(
                "{}\n{}",
                self.format_fields_table(&run.output),
                self.format_batches_table(&run.batches)
            )),
            OutputFormat::Quiet => Ok(format!(
                "{} fields, {} errors",
                run.output.fields.len(),
                run.output.error_count()
            )),
        }
    }

    /// Format extracted values as a table.
    fn format_fields_table(&self, output: &FinalOutput) -> String {
        if output.fields.is_empty() {
            return self.colorize("No fields extracted.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["Field", "Value", "Source"]);

        for record in &output.fields {
            let value = match &record.error {
                Some(error) => self.colorize(&truncate(error), "red"),
                None => truncate(&display_value(&record.value)),
            };
            builder.push_record([
                record.id.clone(),
                value,
                truncate(&display_value(&record.source_quote)),
            ]);
        }

        rounded(builder)
    }

    /// Format per-batch reports as a table.
    fn format_batches_table(&self, batches: &[BatchReport]) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Batch", "Fields", "Stage", "Candidates", "Chunks", "Tokens"]);

        for batch in batches {
            let stage = match batch.failed_at {
                Some(stage) => self.colorize(&format!("failed at {}", stage), "red"),
                None if batch.rerank_fallback => {
                    self.colorize(&format!("{} (unranked)", batch.stage), "yellow")
                }
                None => batch.stage.to_string(),
            };
            builder.push_record([
                batch.index.to_string(),
                batch.field_ids.join(", "),
                stage,
                batch.candidates.to_string(),
                batch.context_chunks.to_string(),
                batch.context_tokens.to_string(),
            ]);
        }

        rounded(builder)
    }

    /// Format chunking statistics.
    pub fn format_chunks(&self, chunks: &[String]) -> Result<String> {
        let lengths: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        let total: usize = lengths.iter().sum();
        let min = lengths.iter().copied().min().unwrap_or(0);
        let max = lengths.iter().copied().max().unwrap_or(0);
        let mean = if chunks.is_empty() { 0 } else { total / chunks.len() };

        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "chunks": chunks.len(),
                "total_chars": total,
                "min_chars": min,
                "max_chars": max,
                "mean_chars": mean,
            }))?),
            OutputFormat::Quiet => Ok(chunks.len().to_string()),
            OutputFormat::Table => {
                if chunks.is_empty() {
                    return Ok(self.colorize("Document produced no chunks.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["#", "Chars", "Starts with"]);
                for (i, chunk) in chunks.iter().enumerate() {
                    builder.push_record([i.to_string(), lengths[i].to_string(), truncate(chunk)]);
                }

                Ok(format!(
                    "{}\n{}",
                    rounded(builder),
                    self.info(&format!(
                        "{} chunks, {} chars (min {}, max {}, mean {})",
                        chunks.len(),
                        total,
                        min,
                        max,
                        mean
                    ))
                ))
            }
        }
    }

    /// Format a diagnostics probe report.
    pub fn format_probe(&self, report: &ProbeReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Quiet => {
                Ok(if report.is_healthy() { "ok" } else { "missing" }.to_string())
            }
            OutputFormat::Table => {
                let body = report.to_string();
                let status = if report.is_healthy() {
                    self.success(&format!("'{}' reaches retrieval", report.term))
                } else {
                    self.warning(&format!("'{}' is lost before the model sees it", report.term))
                };
                Ok(format!("{}{}", body, status))
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn rounded(builder: Builder) -> String {
    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    table.to_string()
}

/// Render a JSON value for a table cell.
fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Single-line, width-capped cell text.
fn truncate(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= CELL_WIDTH {
        return flat;
    }
    let mut cut: String = flat.chars().take(CELL_WIDTH - 3).collect();
    cut.push_str("...");
    cut
}
