//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Fieldex - answer a question schema from a document with a local LLM.
#[derive(Debug, Parser)]
#[command(name = "fieldex")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log stage transitions and sizes
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (essentials only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract every schema field from a document
    Extract(ExtractArgs),

    /// Chunk a document and show chunk statistics
    Chunk(ChunkArgs),

    /// Check whether a term survives chunking and retrieval
    Probe(ProbeArgs),

    /// Show or initialise the configuration
    Config(ConfigArgs),
}

/// Model endpoint overrides shared by commands that call a server.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct EndpointArgs {
    /// OpenAI-compatible base URL for chat and embeddings
    #[arg(long, env = "FIELDEX_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Chat model name
    #[arg(long, env = "FIELDEX_MODEL")]
    pub model: Option<String>,

    /// API key sent as a bearer token
    #[arg(long, env = "FIELDEX_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

/// Arguments for the extract command.
#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// Plain-text document to extract from
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Question schema (JSON: {"fields": [{id, question, skip?}]})
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Where to write the results
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Questions per model call
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Chunks retrieved per question
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    #[command(flatten)]
    pub endpoint: EndpointArgs,
}

/// Arguments for the chunk command.
#[derive(Debug, Parser)]
pub struct ChunkArgs {
    /// Plain-text document to chunk
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Window size in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks
    #[arg(long)]
    pub overlap: Option<usize>,
}

/// Arguments for the probe command.
#[derive(Debug, Parser)]
pub struct ProbeArgs {
    /// Text expected in the document
    #[arg(short, long)]
    pub term: Option<String>,

    /// Question expected to retrieve the term
    #[arg(short, long)]
    pub question: Option<String>,

    /// Plain-text document to probe
    #[arg(long)]
    pub context: Option<PathBuf>,

    #[command(flatten)]
    pub endpoint: EndpointArgs,
}

/// Arguments for the config command.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    /// Write the default configuration file if none exists
    #[arg(long)]
    pub init: bool,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}
