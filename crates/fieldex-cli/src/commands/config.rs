//! Config command implementation.

use crate::cli::ConfigArgs;
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use std::path::Path;

/// Execute the config command.
///
/// Prints the effective configuration, or with `--init` writes the defaults
/// to `path` unless a file is already there.
pub fn execute_config(
    args: ConfigArgs,
    config: &Config,
    path: &Path,
    formatter: &Formatter,
) -> Result<()> {
    if !args.init {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    if path.exists() {
        println!(
            "{}",
            formatter.warning(&format!("{} already exists, leaving it unchanged", path.display()))
        );
        return Ok(());
    }

    Config::default().save(path)?;
    println!(
        "{}",
        formatter.success(&format!("Wrote default configuration to {}", path.display()))
    );
    Ok(())
}
