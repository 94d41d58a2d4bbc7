//! Firestore v1 REST adapter

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::codec::{self, Fields, FirestoreValue, MapValue};
use super::{Transport, build_url};
use crate::backend::{Document, DocumentPage, DocumentStore, FieldUpdate};
use crate::error::ServiceError;
use crate::schema::Record;

pub struct Firestore {
    transport: Transport,
    documents_url: String,
    page_size: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireDocument {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(default)]
    fields: Fields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<WireDocument>,
    next_page_token: Option<String>,
}

impl Firestore {
    pub(crate) fn new(transport: Transport, base_url: &str, project_id: &str, page_size: u32) -> Self {
        Self {
            transport,
            documents_url: format!(
                "{}/v1/projects/{}/databases/(default)/documents",
                base_url.trim_end_matches('/'),
                project_id
            ),
            page_size,
        }
    }

    fn document_url(&self, collection: &str, key: &str) -> Result<Url, ServiceError> {
        build_url(&self.documents_url, &[collection, key])
    }
}

/// Key of a document from its full resource name
fn document_key(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Turn dotted-path updates into the nested field map Firestore expects
fn nest_updates(updates: &[FieldUpdate]) -> Fields {
    let mut root = Fields::new();
    for update in updates {
        let segments: Vec<&str> = update.path.split('.').collect();
        insert_path(&mut root, &segments, FirestoreValue::from_json(&update.value));
    }
    root
}

fn insert_path(fields: &mut Fields, segments: &[&str], value: FirestoreValue) {
    match segments {
        [] => {}
        [last] => {
            fields.insert(last.to_string(), value);
        }
        [first, rest @ ..] => {
            let entry = fields
                .entry(first.to_string())
                .or_insert_with(|| FirestoreValue::MapValue(MapValue::default()));
            if let FirestoreValue::MapValue(map) = entry {
                insert_path(&mut map.fields, rest, value);
            } else {
                let mut map = MapValue::default();
                insert_path(&mut map.fields, rest, value);
                *entry = FirestoreValue::MapValue(map);
            }
        }
    }
}

#[async_trait]
impl DocumentStore for Firestore {
    async fn set_document(&self, collection: &str, key: &str, record: &Record) -> Result<(), ServiceError> {
        debug!(%collection, %key, "set_document: called");
        // PATCH without an update mask replaces the whole document
        let body = WireDocument {
            name: String::new(),
            fields: codec::encode_fields(record),
        };
        let request = self
            .transport
            .request(Method::PATCH, self.document_url(collection, key)?)
            .json(&body);
        self.transport.send::<serde_json::Value>(request).await?;
        Ok(())
    }

    async fn update_fields(&self, collection: &str, key: &str, updates: &[FieldUpdate]) -> Result<(), ServiceError> {
        debug!(%collection, %key, count = updates.len(), "update_fields: called");
        let mut url = self.document_url(collection, key)?;
        {
            let mut query = url.query_pairs_mut();
            for update in updates {
                query.append_pair("updateMask.fieldPaths", &update.path);
            }
            query.append_pair("currentDocument.exists", "true");
        }
        let body = WireDocument {
            name: String::new(),
            fields: nest_updates(updates),
        };
        let request = self.transport.request(Method::PATCH, url).json(&body);
        self.transport.send::<serde_json::Value>(request).await?;
        Ok(())
    }

    async fn list_documents(&self, collection: &str, page_token: Option<&str>) -> Result<DocumentPage, ServiceError> {
        debug!(%collection, ?page_token, "list_documents: called");
        let mut url = build_url(&self.documents_url, &[collection])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pageSize", &self.page_size.to_string());
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let response: ListResponse = self.transport.send(self.transport.request(Method::GET, url)).await?;

        let documents = response
            .documents
            .into_iter()
            .map(|doc| {
                Ok(Document {
                    key: document_key(&doc.name).to_string(),
                    fields: codec::decode_fields(doc.fields)?,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        Ok(DocumentPage {
            documents,
            next_page_token: response.next_page_token,
        })
    }
}
