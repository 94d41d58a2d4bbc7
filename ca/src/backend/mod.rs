//! External services the batch jobs drive
//!
//! The jobs only see these traits. [`memory`] keeps everything in process;
//! [`firebase`] talks to the Identity Toolkit, Firestore and Cloud Storage REST APIs.

use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use serde_json::Value;
use tracing::debug;

use crate::error::ServiceError;
use crate::schema::Record;

pub mod dry_run;
pub mod firebase;
pub mod memory;

/// Maps a natural key (email) to an opaque account id
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Fails with [`ServiceError::NotFound`] when no account uses `email`
    async fn resolve_by_email(&self, email: &str) -> Result<String, ServiceError>;

    /// Fails with [`ServiceError::AccountExists`] when `email` is already taken
    async fn create_account(&self, email: &str, password: &str) -> Result<String, ServiceError>;
}

/// A stored document and its key within the collection
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: String,
    pub fields: Record,
}

/// One page of a collection listing
#[derive(Debug, Clone, Default)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    pub next_page_token: Option<String>,
}

/// Value written at a dotted field path, e.g. `carePreferences.tasks`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub path: String,
    pub value: Value,
}

impl FieldUpdate {
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Replace whatever is stored at `collection/key` with `record`
    async fn set_document(&self, collection: &str, key: &str, record: &Record) -> Result<(), ServiceError>;

    /// Overwrite only the given field paths of an existing document
    async fn update_fields(&self, collection: &str, key: &str, updates: &[FieldUpdate]) -> Result<(), ServiceError>;

    /// Fetch one page of documents; `None` requests the first page
    async fn list_documents(&self, collection: &str, page_token: Option<&str>) -> Result<DocumentPage, ServiceError>;
}

/// Lazily stream every document of a collection, one page request at a time
pub fn stream_collection<'a>(
    store: &'a dyn DocumentStore,
    collection: &'a str,
) -> impl Stream<Item = Result<Document, ServiceError>> + 'a {
    debug!(%collection, "stream_collection: called");
    // None: exhausted, Some(None): first page, Some(Some(token)): next page
    let pages = stream::try_unfold(Some(None::<String>), move |cursor| async move {
        let Some(token) = cursor else {
            return Ok::<_, ServiceError>(None);
        };
        let page = store.list_documents(collection, token.as_deref()).await?;
        debug!(count = page.documents.len(), "stream_collection: fetched page");
        let next = page.next_page_token.filter(|t| !t.is_empty()).map(Some);
        Ok(Some((page.documents, next)))
    });

    pages
        .map_ok(|documents| stream::iter(documents.into_iter().map(Ok::<_, ServiceError>)))
        .try_flatten()
}

/// A stored object as listed under a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub bucket: String,
    pub name: String,
    /// Firebase download token, if the object has one
    pub download_token: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every object whose name starts with `prefix`, in listing order
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectDescriptor>, ServiceError>;
}
