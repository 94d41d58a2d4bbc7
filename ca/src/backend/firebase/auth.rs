//! Identity Toolkit admin API

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use super::{Transport, build_url};
use crate::backend::IdentityService;
use crate::error::ServiceError;

pub struct FirebaseAuth {
    transport: Transport,
    base_url: String,
    project_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfo {
    local_id: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<UserInfo>,
}

impl FirebaseAuth {
    pub(crate) fn new(transport: Transport, base_url: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            project_id: project_id.into(),
        }
    }

    /// `{base}/v1/projects/{project}/{action}`
    fn url(&self, action: &str) -> Result<reqwest::Url, ServiceError> {
        build_url(&self.base_url, &["v1", "projects", &self.project_id, action])
    }
}

#[async_trait]
impl IdentityService for FirebaseAuth {
    async fn resolve_by_email(&self, email: &str) -> Result<String, ServiceError> {
        debug!(%email, "resolve_by_email: called");
        let request = self
            .transport
            .request(Method::POST, self.url("accounts:lookup")?)
            .json(&serde_json::json!({ "email": [email] }));

        let response: LookupResponse = match self.transport.send(request).await {
            Ok(response) => response,
            Err(ServiceError::Api { message, .. }) if message.starts_with("USER_NOT_FOUND") => {
                return Err(ServiceError::NotFound {
                    email: email.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        response
            .users
            .into_iter()
            .next()
            .map(|user| user.local_id)
            .ok_or_else(|| ServiceError::NotFound {
                email: email.to_string(),
            })
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<String, ServiceError> {
        debug!(%email, "create_account: called");
        let request = self
            .transport
            .request(Method::POST, self.url("accounts")?)
            .json(&serde_json::json!({ "email": email, "password": password }));

        match self.transport.send::<UserInfo>(request).await {
            Ok(user) => Ok(user.local_id),
            Err(ServiceError::Api { message, .. }) if message.starts_with("EMAIL_EXISTS") => {
                Err(ServiceError::AccountExists {
                    email: email.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}
