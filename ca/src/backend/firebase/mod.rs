//! Firebase REST adapters
//!
//! One [`FirebaseContext`] is built per run from the config and the
//! service-account file. Each service is created on demand so that a job only
//! needs access to the APIs it actually calls.
//!
//! Production endpoints need an OAuth2 access token, read from the environment
//! variable named by `firebase.access-token-env`. Emulator endpoints accept the
//! fixed `owner` token.

use eyre::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::FirebaseConfig;
use crate::error::ServiceError;

mod auth;
pub mod codec;
mod credentials;
mod firestore;
mod storage;

pub use auth::FirebaseAuth;
pub use credentials::ServiceAccount;
pub use firestore::Firestore;
pub use storage::CloudStorage;

/// Token the Firebase emulators accept for admin access
const EMULATOR_TOKEN: &str = "owner";

const AUTH_EMULATOR_ENV: &str = "FIREBASE_AUTH_EMULATOR_HOST";
const FIRESTORE_EMULATOR_ENV: &str = "FIRESTORE_EMULATOR_HOST";
const STORAGE_EMULATOR_ENV: &str = "FIREBASE_STORAGE_EMULATOR_HOST";

/// Where one service's requests go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub base_url: String,
    pub emulator: bool,
}

impl Endpoint {
    /// Config emulator host, then the conventional environment variable, then the production URL
    pub fn resolve(production_url: &str, emulator_host: Option<&str>, emulator_env: &str) -> Self {
        let host = emulator_host
            .map(str::to_string)
            .or_else(|| std::env::var(emulator_env).ok())
            .filter(|h| !h.trim().is_empty());

        match host {
            Some(host) => {
                let host = host.trim().trim_end_matches('/');
                let base_url = if host.starts_with("http://") || host.starts_with("https://") {
                    host.to_string()
                } else {
                    format!("http://{}", host)
                };
                Self {
                    base_url,
                    emulator: true,
                }
            }
            None => Self {
                base_url: production_url.trim_end_matches('/').to_string(),
                emulator: false,
            },
        }
    }
}

/// Authenticated JSON-over-HTTP plumbing shared by the adapters
#[derive(Clone)]
pub(crate) struct Transport {
    http: Client,
    token: String,
}

impl Transport {
    pub(crate) fn new(http: Client, token: impl Into<String>) -> Self {
        Self {
            http,
            token: token.into(),
        }
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.token)
    }

    /// Send and decode the JSON reply; non-2xx statuses become [`ServiceError::Api`]
    pub(crate) async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ServiceError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "Transport::send: API error");
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let body = if text.trim().is_empty() { "{}" } else { text.as_str() };
        Ok(serde_json::from_str(body)?)
    }
}

/// Pull `error.message` out of a Google API error body, else return the body
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Parse `base` and append path segments, percent-encoding each one
pub(crate) fn build_url(base: &str, segments: &[&str]) -> Result<Url, ServiceError> {
    let mut url = Url::parse(base).map_err(|e| ServiceError::InvalidResponse(format!("bad URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| ServiceError::InvalidResponse(format!("URL cannot take a path: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Everything needed to build the service adapters for one run
pub struct FirebaseContext {
    http: Client,
    account: ServiceAccount,
    config: FirebaseConfig,
}

impl FirebaseContext {
    pub fn new(account: ServiceAccount, config: FirebaseConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("Failed to build HTTP client")?;
        info!(project = %account.project_id, client = %account.client_email, "Firebase context ready");
        Ok(Self { http, account, config })
    }

    pub fn project_id(&self) -> &str {
        &self.account.project_id
    }

    /// Bucket from the config, else the project's default Firebase bucket
    pub fn bucket(&self) -> String {
        self.config
            .bucket
            .clone()
            .unwrap_or_else(|| format!("{}.firebasestorage.app", self.account.project_id))
    }

    fn transport(&self, endpoint: &Endpoint) -> Result<Transport> {
        if endpoint.emulator {
            debug!(base_url = %endpoint.base_url, "FirebaseContext::transport: using emulator");
            return Ok(Transport::new(self.http.clone(), EMULATOR_TOKEN));
        }
        let token = std::env::var(&self.config.access_token_env).map_err(|_| {
            eyre::eyre!(
                "No access token found. Set the {} environment variable (e.g. from `gcloud auth print-access-token`).",
                self.config.access_token_env
            )
        })?;
        Ok(Transport::new(self.http.clone(), token))
    }

    pub fn auth(&self) -> Result<FirebaseAuth> {
        let endpoint = Endpoint::resolve(
            &self.config.auth_url,
            self.config.auth_emulator_host.as_deref(),
            AUTH_EMULATOR_ENV,
        );
        // The Auth emulator serves the API under its production host name
        let base_url = if endpoint.emulator {
            format!("{}/identitytoolkit.googleapis.com", endpoint.base_url)
        } else {
            endpoint.base_url.clone()
        };
        Ok(FirebaseAuth::new(self.transport(&endpoint)?, base_url, self.project_id()))
    }

    pub fn firestore(&self) -> Result<Firestore> {
        let endpoint = Endpoint::resolve(
            &self.config.firestore_url,
            self.config.firestore_emulator_host.as_deref(),
            FIRESTORE_EMULATOR_ENV,
        );
        Ok(Firestore::new(
            self.transport(&endpoint)?,
            &endpoint.base_url,
            self.project_id(),
            self.config.page_size,
        ))
    }

    pub fn storage(&self) -> Result<CloudStorage> {
        let endpoint = Endpoint::resolve(
            &self.config.storage_url,
            self.config.storage_emulator_host.as_deref(),
            STORAGE_EMULATOR_ENV,
        );
        Ok(CloudStorage::new(
            self.transport(&endpoint)?,
            &endpoint.base_url,
            self.bucket(),
            self.config.page_size,
        ))
    }
}
