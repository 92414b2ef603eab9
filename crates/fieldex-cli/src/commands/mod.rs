//! Command implementations.

pub mod chunk;
pub mod config;
pub mod extract;
pub mod probe;

pub use self::chunk::execute_chunk;
pub use self::config::execute_config;
pub use self::extract::execute_extract;
pub use self::probe::execute_probe;

use crate::error::{CliError, Result};
use fieldex_extractor::ExtractorError;
use std::fs;
use std::path::Path;

/// Read a UTF-8 input file, naming it in the error.
pub(crate) fn read_input(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        CliError::from(ExtractorError::Input(format!(
            "cannot read {} file {}: {}",
            what,
            path.display(),
            e
        )))
    })
}
