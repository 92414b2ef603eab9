//! Fieldex CLI - answer a question schema from a document with a local LLM.

use clap::Parser;
use fieldex_cli::commands;
use fieldex_cli::{Cli, Command, Config, Formatter};
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> fieldex_cli::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for JSON output
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = Config::load(cli.config.as_deref())?;

    // Determine output format
    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);

    // Determine color setting
    let color_enabled = !cli.no_color && config.settings.color;

    // Create formatter
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Command::Extract(args) => commands::execute_extract(args, &mut config, &formatter)?,
        Command::Chunk(args) => commands::execute_chunk(args, &mut config, &formatter)?,
        Command::Probe(args) => commands::execute_probe(args, &mut config, &formatter)?,
        Command::Config(args) => {
            let path = match cli.config {
                Some(path) => path,
                None => Config::path()?,
            };
            commands::execute_config(args, &config, &path, &formatter)?;
        }
    }

    Ok(())
}
