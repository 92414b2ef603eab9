//! Chunk command implementation.

use super::read_input;
use crate::cli::ChunkArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use fieldex_extractor::TextChunker;

/// Execute the chunk command.
pub fn execute_chunk(args: ChunkArgs, config: &mut Config, formatter: &Formatter) -> Result<()> {
    if let Some(context) = args.context {
        config.paths.context = context;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.extractor.chunk_size = chunk_size;
    }
    if let Some(overlap) = args.overlap {
        config.extractor.chunk_overlap = overlap;
    }
    config.extractor.validate().map_err(CliError::Config)?;

    let document = read_input(&config.paths.context, "context")?;
    let chunks = TextChunker::from_config(&config.extractor).chunk(&document);

    println!("{}", formatter.format_chunks(&chunks)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;

    #[test]
    fn test_overlap_must_stay_below_size() {
        let mut config = Config::default();
        let args = ChunkArgs {
            context: None,
            chunk_size: Some(100),
            overlap: Some(100),
        };
        let formatter = Formatter::new(OutputFormat::Quiet, false);

        let result = execute_chunk(args, &mut config, &formatter);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_chunks_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "First paragraph.\n\nSecond paragraph.").unwrap();

        let mut config = Config::default();
        let args = ChunkArgs {
            context: Some(path),
            chunk_size: None,
            overlap: None,
        };
        let formatter = Formatter::new(OutputFormat::Quiet, false);

        assert!(execute_chunk(args, &mut config, &formatter).is_ok());
    }
}
