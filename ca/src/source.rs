//! Bulk source loading
//!
//! The bulk source is a JSON file holding an array of user objects. Any problem
//! with the file aborts the run before a single record is processed.

use eyre::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::schema::Record;

/// Load every record from a JSON array file
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let content =
        fs::read_to_string(path).context(format!("Failed to read bulk source {}", path.display()))?;
    let records = parse_records(&content).context(format!("Invalid bulk source {}", path.display()))?;
    info!(path = %path.display(), count = records.len(), "Loaded bulk source");
    Ok(records)
}

/// Parse a JSON array of objects
pub fn parse_records(content: &str) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_str(content).context("Bulk source is not valid JSON")?;

    let Value::Array(items) = value else {
        return Err(eyre::eyre!("Bulk source must be a JSON array of objects"));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(record) => Ok(record),
            _ => Err(eyre::eyre!("Bulk source element {} is not an object", index)),
        })
        .collect()
}
