//! Cloud Storage JSON API adapter (object listing only)

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::{Transport, build_url};
use crate::backend::{ObjectDescriptor, ObjectStore};
use crate::error::ServiceError;

/// Custom metadata key holding Firebase download tokens
const DOWNLOAD_TOKENS_KEY: &str = "firebaseStorageDownloadTokens";

pub struct CloudStorage {
    transport: Transport,
    base_url: String,
    bucket: String,
    page_size: u32,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
    #[serde(default)]
    bucket: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

impl CloudStorage {
    pub(crate) fn new(transport: Transport, base_url: &str, bucket: String, page_size: u32) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            page_size,
        }
    }
}

/// First token of a comma-separated token list
fn first_token(tokens: &str) -> Option<String> {
    tokens
        .split(',')
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

impl From<ObjectResource> for ObjectDescriptor {
    fn from(resource: ObjectResource) -> Self {
        let download_token = resource.metadata.get(DOWNLOAD_TOKENS_KEY).and_then(|t| first_token(t));
        Self {
            bucket: resource.bucket,
            name: resource.name,
            download_token,
        }
    }
}

#[async_trait]
impl ObjectStore for CloudStorage {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectDescriptor>, ServiceError> {
        debug!(bucket = %self.bucket, %prefix, "list_objects: called");
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = build_url(&self.base_url, &["storage", "v1", "b", &self.bucket, "o"])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("prefix", prefix);
                query.append_pair("maxResults", &self.page_size.to_string());
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let response: ListResponse = self.transport.send(self.transport.request(Method::GET, url)).await?;
            objects.extend(response.items.into_iter().map(|item| {
                let mut descriptor = ObjectDescriptor::from(item);
                if descriptor.bucket.is_empty() {
                    descriptor.bucket = self.bucket.clone();
                }
                descriptor
            }));

            match response.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = objects.len(), "list_objects: done");
        Ok(objects)
    }
}
