//! In-process backends
//!
//! Used by the test suites, and as the account service of a seeding dry run.
//! Collections are kept in key order, so listings are deterministic.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{Document, DocumentPage, DocumentStore, FieldUpdate, IdentityService, ObjectDescriptor, ObjectStore};
use crate::error::ServiceError;
use crate::schema::Record;

/// Accounts keyed by email
#[derive(Debug, Default)]
pub struct MemoryIdentity {
    accounts: Mutex<BTreeMap<String, String>>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register an account
    pub fn with_account(mut self, email: impl Into<String>, uid: impl Into<String>) -> Self {
        self.accounts.get_mut().insert(email.into(), uid.into());
        self
    }

    pub async fn account_count(&self) -> usize {
        self.accounts.lock().await.len()
    }

    pub async fn uid_for(&self, email: &str) -> Option<String> {
        self.accounts.lock().await.get(email).cloned()
    }
}

#[async_trait]
impl IdentityService for MemoryIdentity {
    async fn resolve_by_email(&self, email: &str) -> Result<String, ServiceError> {
        self.accounts
            .lock()
            .await
            .get(email)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound {
                email: email.to_string(),
            })
    }

    async fn create_account(&self, email: &str, _password: &str) -> Result<String, ServiceError> {
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(email) {
            return Err(ServiceError::AccountExists {
                email: email.to_string(),
            });
        }
        let uid = Uuid::now_v7().simple().to_string();
        debug!(%email, %uid, "MemoryIdentity::create_account: created");
        accounts.insert(email.to_string(), uid.clone());
        Ok(uid)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    collections: BTreeMap<String, BTreeMap<String, Record>>,
    failing_keys: HashSet<String>,
    writes: usize,
    list_calls: usize,
}

/// Collections of documents with full-overwrite writes
#[derive(Debug)]
pub struct MemoryDocumentStore {
    state: Mutex<StoreState>,
    page_size: usize,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_page_size(100)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            page_size: page_size.max(1),
        }
    }

    /// Make every write to `key` fail, in any collection
    pub async fn fail_writes_to(&self, key: impl Into<String>) {
        self.state.lock().await.failing_keys.insert(key.into());
    }

    pub async fn document(&self, collection: &str, key: &str) -> Option<Record> {
        self.state
            .lock()
            .await
            .collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned()
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.state
            .lock()
            .await
            .collections
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Successful writes so far, sets and updates alike
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }

    pub async fn list_calls(&self) -> usize {
        self.state.lock().await.list_calls
    }

    fn check_writable(state: &StoreState, key: &str) -> Result<(), ServiceError> {
        if state.failing_keys.contains(key) {
            return Err(ServiceError::Api {
                status: 503,
                message: format!("write to {} rejected", key),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn set_document(&self, collection: &str, key: &str, record: &Record) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        Self::check_writable(&state, key)?;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), record.clone());
        state.writes += 1;
        Ok(())
    }

    async fn update_fields(&self, collection: &str, key: &str, updates: &[FieldUpdate]) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        Self::check_writable(&state, key)?;
        let document = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(key))
            .ok_or_else(|| ServiceError::Api {
                status: 404,
                message: format!("No document to update: {}/{}", collection, key),
            })?;

        for update in updates {
            set_path(document, &update.path, update.value.clone());
        }
        state.writes += 1;
        Ok(())
    }

    async fn list_documents(&self, collection: &str, page_token: Option<&str>) -> Result<DocumentPage, ServiceError> {
        let mut state = self.state.lock().await;
        state.list_calls += 1;

        let Some(docs) = state.collections.get(collection) else {
            return Ok(DocumentPage::default());
        };

        // The page token is the last key of the previous page
        let mut documents: Vec<Document> = docs
            .iter()
            .filter(|(key, _)| page_token.is_none_or(|after| key.as_str() > after))
            .take(self.page_size + 1)
            .map(|(key, fields)| Document {
                key: key.clone(),
                fields: fields.clone(),
            })
            .collect();

        let next_page_token = if documents.len() > self.page_size {
            documents.truncate(self.page_size);
            documents.last().map(|doc| doc.key.clone())
        } else {
            None
        };

        Ok(DocumentPage {
            documents,
            next_page_token,
        })
    }
}

/// Write `value` at a dotted path, creating intermediate mappings
fn set_path(record: &mut Record, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut current = record;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Record::new()));
        if !entry.is_object() {
            *entry = Value::Object(Record::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), value);
}

/// A fixed listing of objects
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Vec<ObjectDescriptor>,
}

impl MemoryObjectStore {
    pub fn new(objects: Vec<ObjectDescriptor>) -> Self {
        Self { objects }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectDescriptor>, ServiceError> {
        Ok(self
            .objects
            .iter()
            .filter(|object| object.name.starts_with(prefix))
            .cloned()
            .collect())
    }
}
