//! Batch jobs
//!
//! Every job walks its input one record at a time. A record that fails is
//! logged with its natural key and counted; it never stops the batch.

use colored::*;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::{RecordError, RemapError};
use crate::schema::Record;

mod photos;
mod rewrite;
mod users;

pub use photos::{PhotoListing, collect_photo_urls, download_url};
pub use rewrite::{plan_care_preference_updates, plan_note_update, rewrite_care_preferences, rewrite_session_notes};
pub use users::{AccountMode, UserLoad, migrate_users, seed_users};

/// What happened to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Written,
    /// Nothing to write, e.g. a note that is already rewritten
    Skipped,
}

/// Tallies for one job run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Set when the input itself failed part way, e.g. a page request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<String>,
}

impl BatchReport {
    pub fn tally(&mut self, outcome: &Result<Outcome, RecordError>) {
        match outcome {
            Ok(Outcome::Written) => self.succeeded += 1,
            Ok(Outcome::Skipped) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.failed == 0 && self.is_complete() {
            "✓".green()
        } else {
            "✗".red()
        };
        write!(
            f,
            "{} Completed! Succeeded: {}, Errors: {}, Skipped: {}",
            mark,
            self.succeeded.to_string().green(),
            self.failed.to_string().red(),
            self.skipped
        )?;
        if let Some(reason) = &self.interrupted {
            write!(f, " ({} {})", "interrupted:".red(), reason)?;
        }
        Ok(())
    }
}

/// The record's email, which account lookups and creation are keyed by
pub(crate) fn require_email<'r>(record: &'r Record, natural_key: &str) -> Result<&'r str, RecordError> {
    match record.get("email").and_then(Value::as_str) {
        Some(email) if !email.is_empty() => Ok(email),
        _ => Err(RemapError::MissingRequiredField {
            field: "email".to_string(),
            natural_key: natural_key.to_string(),
        }
        .into()),
    }
}
