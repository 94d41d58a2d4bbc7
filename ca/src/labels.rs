//! Option code to label rewriting
//!
//! Early app builds stored placeholder codes ("Option 1".."Option 8") in care
//! preference lists and session notes. These tables map them to the labels the
//! app shows today. Unknown codes pass through unchanged, which makes every
//! rewrite idempotent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::RewriteError;

/// Fixed code → label table with identity fallback
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionLabelMap {
    entries: BTreeMap<String, String>,
}

impl OptionLabelMap {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Label for `code`, or `code` itself when the table has no entry
    pub fn label<'a>(&'a self, code: &'a str) -> &'a str {
        self.entries.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// A rewrite stays idempotent only if no label is itself a code and no label
    /// contains the text separator
    pub fn check_idempotent(&self) -> Result<(), String> {
        for (code, label) in self.iter() {
            if self.entries.contains_key(label) {
                return Err(format!("label '{}' for '{}' is also a code", label, code));
            }
            if label.contains(',') {
                return Err(format!("label '{}' for '{}' contains a comma", label, code));
            }
            if label.trim() != label {
                return Err(format!("label '{}' for '{}' has surrounding whitespace", label, code));
            }
        }
        Ok(())
    }

    /// Labels for `carePreferences.careType`
    pub fn care_types() -> Self {
        Self::new([
            ("Option 1", "Personal Care"),
            ("Option 2", "Medication Management"),
            ("Option 3", "Mobility Assistance"),
            ("Option 4", "Household Support"),
            ("Option 5", "Meal Preparation"),
            ("Option 6", "Companionship"),
            ("Option 7", "Transportation"),
            ("Option 8", "Errand Running"),
        ])
    }

    /// Labels for `carePreferences.tasks` and session notes
    pub fn tasks() -> Self {
        Self::new([
            ("Option 1", "Bathing Assistance"),
            ("Option 2", "Dressing Assistance"),
            ("Option 3", "Grooming Support"),
            ("Option 4", "Toileting Assistance"),
            ("Option 5", "Light Housekeeping"),
            ("Option 6", "Grocery Shopping"),
            ("Option 7", "Medication Reminders"),
            ("Option 8", "Emotional Support"),
        ])
    }
}

/// Rewrite a comma-separated free-text value
///
/// Segments are trimmed, mapped, and rejoined with `", "`.
pub fn rewrite_text(text: &str, table: &OptionLabelMap) -> String {
    text.split(',')
        .map(|segment| table.label(segment.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rewrite a string or a list of strings, keeping the input's shape
pub fn rewrite_labels(value: &Value, table: &OptionLabelMap) -> Result<Value, RewriteError> {
    match value {
        Value::String(text) => Ok(Value::String(rewrite_text(text, table))),
        Value::Array(items) => {
            debug!(len = items.len(), "rewrite_labels: list value");
            items
                .iter()
                .map(|item| match item {
                    Value::String(code) => Ok(Value::String(table.label(code).to_string())),
                    other => Err(RewriteError::UnsupportedShape {
                        found: format!("list containing {}", shape_name(other)),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        other => Err(RewriteError::UnsupportedShape {
            found: shape_name(other).to_string(),
        }),
    }
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
