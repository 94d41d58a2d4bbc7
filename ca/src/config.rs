//! careadmin configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::labels::OptionLabelMap;
use crate::schema;

/// Main careadmin configuration
///
/// Everything a run needs is passed explicitly from here into the jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service-account JSON file; the project id is read from it
    #[serde(rename = "credentials-path")]
    pub credentials_path: PathBuf,

    /// Collection read by the rewrite passes
    #[serde(rename = "source-collection")]
    pub source_collection: String,

    /// Collection written by migrations
    #[serde(rename = "destination-collection")]
    pub destination_collection: String,

    /// JSON array of user records for seeding and migration
    #[serde(rename = "bulk-source-path")]
    pub bulk_source_path: PathBuf,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    pub firebase: FirebaseConfig,

    pub seed: SeedConfig,

    pub migrate: MigrateConfig,

    pub photos: PhotosConfig,

    pub sessions: SessionsConfig,

    pub labels: LabelsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("firebase-key.json"),
            source_collection: "test1".to_string(),
            destination_collection: "users_new".to_string(),
            bulk_source_path: PathBuf::from("users.json"),
            log_level: None,
            firebase: FirebaseConfig::default(),
            seed: SeedConfig::default(),
            migrate: MigrateConfig::default(),
            photos: PhotosConfig::default(),
            sessions: SessionsConfig::default(),
            labels: LabelsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: ./careadmin.yml
        let local_config = PathBuf::from("careadmin.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/careadmin/careadmin.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("careadmin").join("careadmin.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = config_path.cloned().or_else(|| {
            let local = PathBuf::from("careadmin.yml");
            if local.exists() {
                return Some(local);
            }
            dirs::config_dir()
                .map(|d| d.join("careadmin").join("careadmin.yml"))
                .filter(|p| p.exists())
        })?;

        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Check values that would otherwise fail halfway through a batch
    pub fn validate(&self) -> Result<()> {
        if self.source_collection.is_empty() || self.destination_collection.is_empty() {
            return Err(eyre::eyre!("Collection names must not be empty"));
        }
        if self.firebase.page_size == 0 {
            return Err(eyre::eyre!("firebase.page-size must be greater than zero"));
        }
        for (name, table) in [("care-types", &self.labels.care_types), ("tasks", &self.labels.tasks)] {
            if let Some(table) = table {
                table
                    .check_idempotent()
                    .map_err(|e| eyre::eyre!("labels.{}: {}", name, e))?;
            }
        }
        Ok(())
    }
}

/// Firebase endpoints and request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirebaseConfig {
    /// Storage bucket holding profile photos; defaults to `<project>.firebasestorage.app`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// Environment variable holding an OAuth2 access token
    #[serde(rename = "access-token-env")]
    pub access_token_env: String,

    #[serde(rename = "auth-url")]
    pub auth_url: String,

    #[serde(rename = "firestore-url")]
    pub firestore_url: String,

    #[serde(rename = "storage-url")]
    pub storage_url: String,

    /// Host used in public download URLs
    #[serde(rename = "download-host")]
    pub download_host: String,

    /// Emulator hosts (`host:port`); the FIRESTORE_EMULATOR_HOST style variables also work
    #[serde(rename = "auth-emulator-host", skip_serializing_if = "Option::is_none")]
    pub auth_emulator_host: Option<String>,

    #[serde(rename = "firestore-emulator-host", skip_serializing_if = "Option::is_none")]
    pub firestore_emulator_host: Option<String>,

    #[serde(rename = "storage-emulator-host", skip_serializing_if = "Option::is_none")]
    pub storage_emulator_host: Option<String>,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Documents or objects requested per page when streaming
    #[serde(rename = "page-size")]
    pub page_size: u32,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            access_token_env: "GOOGLE_OAUTH_ACCESS_TOKEN".to_string(),
            auth_url: "https://identitytoolkit.googleapis.com".to_string(),
            firestore_url: "https://firestore.googleapis.com".to_string(),
            storage_url: "https://storage.googleapis.com".to_string(),
            download_host: "firebasestorage.googleapis.com".to_string(),
            auth_emulator_host: None,
            firestore_emulator_host: None,
            storage_emulator_host: None,
            timeout_ms: 30_000,
            page_size: 300,
        }
    }
}

/// Test-account seeding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Collection the seeded documents are written to
    pub collection: String,

    /// Password given to every seeded account
    pub password: String,

    /// Built-in schema applied before writing
    pub schema: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            collection: "test1".to_string(),
            password: "asdfgh".to_string(),
            schema: schema::LEGACY_V1.to_string(),
        }
    }
}

/// User migration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Built-in schema applied before writing
    pub schema: String,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            schema: schema::USERS_V2.to_string(),
        }
    }
}

/// Profile photo listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotosConfig {
    /// Object name prefix to list
    pub prefix: String,
}

impl Default for PhotosConfig {
    fn default() -> Self {
        Self {
            prefix: "test1profilePhotos/".to_string(),
        }
    }
}

/// Session note rewriting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub collection: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            collection: "sessions_test1".to_string(),
        }
    }
}

/// Optional replacements for the built-in label tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    #[serde(rename = "care-types", skip_serializing_if = "Option::is_none")]
    pub care_types: Option<OptionLabelMap>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<OptionLabelMap>,
}

impl LabelsConfig {
    pub fn care_types(&self) -> OptionLabelMap {
        self.care_types.clone().unwrap_or_else(OptionLabelMap::care_types)
    }

    pub fn tasks(&self) -> OptionLabelMap {
        self.tasks.clone().unwrap_or_else(OptionLabelMap::tasks)
    }
}
