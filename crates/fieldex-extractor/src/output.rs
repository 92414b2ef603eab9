//! Accumulation of batch records and the final write

use crate::error::ExtractorError;
use crate::types::{ExtractionRecord, FinalOutput};
use std::fs;
use std::path::Path;
use tracing::info;

/// Collects records batch after batch, in order
#[derive(Debug, Default)]
pub struct Accumulator {
    records: Vec<ExtractionRecord>,
}

impl Accumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one batch's records
    pub fn extend(&mut self, records: Vec<ExtractionRecord>) {
        self.records.extend(records);
    }

    /// Records collected so far
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was collected
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Wrap the records as the final document
    pub fn finish(self) -> FinalOutput {
        FinalOutput {
            fields: self.records,
        }
    }
}

impl FinalOutput {
    /// Render as indented JSON; non-ASCII text is kept verbatim
    pub fn to_json_pretty(&self) -> Result<String, ExtractorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the document once, creating the parent directory if needed
    pub fn write_to(&self, path: &Path) -> Result<(), ExtractorError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json_pretty()?)?;
        info!(
            "Wrote {} records to {}",
            self.fields.len(),
            path.display()
        );
        Ok(())
    }
}
