//! Matching decoded model entries back to the batch's fields

use crate::types::{value_as_text, ExtractionRecord, FieldSpec};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

/// Error message for a field the model did not answer
pub const MISSING_FROM_OUTPUT: &str = "missing from model output";

/// Error message for output without a `fields` list
pub const INVALID_STRUCTURE: &str = "invalid structure";

/// The decoded value has no `fields` list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructureError;

impl std::fmt::Display for StructureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(INVALID_STRUCTURE)
    }
}

/// Produce exactly one record per batch field, in batch order
///
/// Entries are matched by id (numbers compare as their text form). The first
/// entry for an id wins; entries for ids outside the batch are dropped.
pub fn reconcile(
    batch: &[FieldSpec],
    parsed: &Value,
) -> Result<Vec<ExtractionRecord>, StructureError> {
    let entries = parsed
        .get("fields")
        .and_then(Value::as_array)
        .ok_or(StructureError)?;

    let mut by_id: HashMap<String, &Map<String, Value>> = HashMap::new();
    for entry in entries {
        let Some(object) = entry.as_object() else {
            warn!("Ignoring non-object entry in model output");
            continue;
        };
        let Some(id) = object.get("id").and_then(value_as_text) else {
            warn!("Ignoring model entry without id");
            continue;
        };
        let Some(field_id) = batch_id(batch, &id) else {
            warn!("Dropping model entry for unknown field {}", id);
            continue;
        };
        if by_id.contains_key(field_id) {
            warn!("Duplicate model entry for field {}, keeping the first", field_id);
            continue;
        }
        by_id.insert(field_id.to_string(), object);
    }

    Ok(batch
        .iter()
        .map(|field| match by_id.get(&field.id) {
            Some(entry) => ExtractionRecord::from_model_entry(field.id.clone(), entry),
            None => ExtractionRecord::failed(field.id.clone(), MISSING_FROM_OUTPUT),
        })
        .collect())
}

/// The batch id an echoed id refers to
///
/// An exact match wins; otherwise surrounding whitespace is ignored on both
/// sides.
fn batch_id<'a>(batch: &'a [FieldSpec], id: &str) -> Option<&'a str> {
    batch
        .iter()
        .find(|f| f.id == id)
        .or_else(|| batch.iter().find(|f| f.id.trim() == id.trim()))
        .map(|f| f.id.as_str())
}

/// One placeholder per batch field carrying the same error
pub fn placeholders(batch: &[FieldSpec], message: &str) -> Vec<ExtractionRecord> {
    batch
        .iter()
        .map(|field| ExtractionRecord::failed(field.id.clone(), message))
        .collect()
}
