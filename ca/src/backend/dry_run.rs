//! Document store wrapper that reads through and swallows writes
//!
//! Lets a job run its full read-transform path against a live project while
//! every write is only logged and recorded.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use super::{DocumentPage, DocumentStore, FieldUpdate};
use crate::error::ServiceError;
use crate::schema::Record;

/// A write that was not performed
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedWrite {
    Set {
        collection: String,
        key: String,
        record: Record,
    },
    Update {
        collection: String,
        key: String,
        updates: Vec<FieldUpdate>,
    },
}

pub struct DryRunStore<'a> {
    inner: &'a dyn DocumentStore,
    planned: Mutex<Vec<PlannedWrite>>,
}

impl<'a> DryRunStore<'a> {
    pub fn new(inner: &'a dyn DocumentStore) -> Self {
        Self {
            inner,
            planned: Mutex::new(Vec::new()),
        }
    }

    pub async fn planned(&self) -> Vec<PlannedWrite> {
        self.planned.lock().await.clone()
    }
}

#[async_trait]
impl<'a> DocumentStore for DryRunStore<'a> {
    async fn set_document(&self, collection: &str, key: &str, record: &Record) -> Result<(), ServiceError> {
        info!(%collection, %key, fields = record.len(), "dry run: would set document");
        self.planned.lock().await.push(PlannedWrite::Set {
            collection: collection.to_string(),
            key: key.to_string(),
            record: record.clone(),
        });
        Ok(())
    }

    async fn update_fields(&self, collection: &str, key: &str, updates: &[FieldUpdate]) -> Result<(), ServiceError> {
        let paths: Vec<&str> = updates.iter().map(|u| u.path.as_str()).collect();
        info!(%collection, %key, ?paths, "dry run: would update fields");
        self.planned.lock().await.push(PlannedWrite::Update {
            collection: collection.to_string(),
            key: key.to_string(),
            updates: updates.to_vec(),
        });
        Ok(())
    }

    async fn list_documents(&self, collection: &str, page_token: Option<&str>) -> Result<DocumentPage, ServiceError> {
        self.inner.list_documents(collection, page_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryDocumentStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_writes_are_recorded_not_forwarded() {
        let inner = MemoryDocumentStore::new();
        inner
            .set_document("sessions", "s1", json!({"note": "Option 1"}).as_object().unwrap())
            .await
            .unwrap();
        let dry = DryRunStore::new(&inner);

        let page = dry.list_documents("sessions", None).await.unwrap();
        assert_eq!(page.documents.len(), 1);

        dry.update_fields("sessions", "s1", &[FieldUpdate::new("note", json!("Bathing Assistance"))])
            .await
            .unwrap();
        dry.set_document("sessions", "s2", &Record::new()).await.unwrap();

        assert_eq!(dry.planned().await.len(), 2);
        assert_eq!(inner.write_count().await, 1);
        assert_eq!(inner.document("sessions", "s1").await.unwrap()["note"], json!("Option 1"));
    }
}
