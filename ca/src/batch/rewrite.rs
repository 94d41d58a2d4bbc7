//! Option label rewrite passes over stored documents

use futures::StreamExt;
use serde_json::Value;
use std::pin::pin;
use tracing::{debug, info, warn};

use super::{BatchReport, Outcome};
use crate::backend::{Document, DocumentStore, FieldUpdate, stream_collection};
use crate::error::{RecordError, RewriteError};
use crate::labels::{OptionLabelMap, rewrite_labels, rewrite_text};
use crate::schema::Record;

const CARE_PREFERENCES: &str = "carePreferences";
const NOTE: &str = "note";

/// Field updates for a user's care preference lists; empty when nothing changes
///
/// Only list values are rewritten. Anything else (absent, null, a bare string)
/// is left alone, so is a document without a `carePreferences` mapping.
pub fn plan_care_preference_updates(
    fields: &Record,
    care_types: &OptionLabelMap,
    tasks: &OptionLabelMap,
) -> Result<Vec<FieldUpdate>, RewriteError> {
    let Some(Value::Object(preferences)) = fields.get(CARE_PREFERENCES) else {
        return Ok(Vec::new());
    };

    let mut updates = Vec::new();
    for (name, table) in [("careType", care_types), ("tasks", tasks)] {
        let Some(current) = preferences.get(name).filter(|v| v.is_array()) else {
            continue;
        };
        let rewritten = rewrite_labels(current, table)?;
        if &rewritten != current {
            updates.push(FieldUpdate::new(format!("{}.{}", CARE_PREFERENCES, name), rewritten));
        }
    }
    Ok(updates)
}

/// The rewritten note, or `None` when the note is missing, blank or already rewritten
pub fn plan_note_update(fields: &Record, tasks: &OptionLabelMap) -> Option<FieldUpdate> {
    let note = fields.get(NOTE)?.as_str().filter(|n| !n.is_empty())?;
    let rewritten = rewrite_text(note, tasks);
    (rewritten != note).then(|| FieldUpdate::new(NOTE, Value::String(rewritten)))
}

/// Rewrite `carePreferences.careType` and `carePreferences.tasks` of every user
pub async fn rewrite_care_preferences(
    store: &dyn DocumentStore,
    collection: &str,
    care_types: &OptionLabelMap,
    tasks: &OptionLabelMap,
) -> BatchReport {
    info!(%collection, "Rewriting care preferences");
    run_pass(store, collection, |doc| {
        if !matches!(doc.fields.get(CARE_PREFERENCES), Some(Value::Object(_))) {
            debug!(key = %doc.key, "rewrite_care_preferences: no care preferences");
            return Ok(None);
        }
        let updates =
            plan_care_preference_updates(&doc.fields, care_types, tasks).map_err(|source| RecordError::Rewrite {
                key: doc.key.clone(),
                source,
            })?;
        Ok((!updates.is_empty()).then_some(updates))
    })
    .await
}

/// Rewrite the comma-separated `note` of every session
pub async fn rewrite_session_notes(store: &dyn DocumentStore, collection: &str, tasks: &OptionLabelMap) -> BatchReport {
    info!(%collection, "Rewriting session notes");
    run_pass(store, collection, |doc| {
        match doc.fields.get(NOTE) {
            Some(Value::String(note)) if !note.is_empty() => {}
            other => {
                warn!(key = %doc.key, note = ?other, "Session has no note to rewrite");
                return Ok(None);
            }
        }
        Ok(plan_note_update(&doc.fields, tasks).map(|update| vec![update]))
    })
    .await
}

/// Stream `collection`, plan each document's updates and apply the non-empty ones
///
/// A failing page request ends the pass; documents already handled stay counted.
async fn run_pass<F>(store: &dyn DocumentStore, collection: &str, plan: F) -> BatchReport
where
    F: Fn(&Document) -> Result<Option<Vec<FieldUpdate>>, RecordError>,
{
    let mut report = BatchReport::default();
    let mut documents = pin!(stream_collection(store, collection));

    while let Some(next) = documents.next().await {
        let doc = match next {
            Ok(doc) => doc,
            Err(e) => {
                warn!(%collection, error = %e, "Listing failed, stopping pass");
                report.interrupted = Some(e.to_string());
                break;
            }
        };

        let outcome = apply(store, collection, &doc, &plan).await;
        match &outcome {
            Ok(Outcome::Written) => info!(key = %doc.key, "Rewrote document"),
            Ok(Outcome::Skipped) => debug!(key = %doc.key, "run_pass: nothing to rewrite"),
            Err(e) => warn!(key = %doc.key, error = %e, "Skipping document"),
        }
        report.tally(&outcome);
    }

    info!(
        %collection,
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        "Finished rewrite pass"
    );
    report
}

async fn apply<F>(store: &dyn DocumentStore, collection: &str, doc: &Document, plan: &F) -> Result<Outcome, RecordError>
where
    F: Fn(&Document) -> Result<Option<Vec<FieldUpdate>>, RecordError>,
{
    let Some(updates) = plan(doc)? else {
        return Ok(Outcome::Skipped);
    };
    store
        .update_fields(collection, &doc.key, &updates)
        .await
        .map_err(|e| RecordError::store_write(collection, &doc.key, e))?;
    Ok(Outcome::Written)
}
