//! Service-account credentials file

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ServiceError;

/// The parts of a service-account key the jobs use
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    #[serde(default)]
    pub client_email: String,
}

impl ServiceAccount {
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ServiceError::Credentials(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ServiceError> {
        let account: Self = serde_json::from_str(content)?;
        if account.project_id.is_empty() {
            return Err(ServiceError::Credentials("project_id is empty".to_string()));
        }
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_account() {
        let account = ServiceAccount::parse(
            r#"{"type": "service_account", "project_id": "amicare-3e988", "client_email": "admin@amicare.iam", "private_key": "..."}"#,
        )
        .unwrap();
        assert_eq!(account.project_id, "amicare-3e988");
        assert_eq!(account.client_email, "admin@amicare.iam");
    }

    #[test]
    fn test_missing_or_empty_project() {
        assert!(matches!(
            ServiceAccount::parse(r#"{"client_email": "x"}"#),
            Err(ServiceError::Json(_))
        ));
        assert!(matches!(
            ServiceAccount::parse(r#"{"project_id": ""}"#),
            Err(ServiceError::Credentials(_))
        ));
    }

    #[test]
    fn test_unreadable_file() {
        let err = ServiceAccount::load(Path::new("/nonexistent/key.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/key.json"));
    }
}
