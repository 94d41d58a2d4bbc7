//! Error types for remapping, label rewriting and backend calls

use thiserror::Error;

/// Errors raised while applying a target schema to a single record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemapError {
    #[error("Record {natural_key}: missing required field '{field}'")]
    MissingRequiredField { field: String, natural_key: String },

    #[error("Record {natural_key}: field '{field}' must be a mapping")]
    NotAMapping { field: String, natural_key: String },
}

impl RemapError {
    /// Dotted path of the offending field
    pub fn field(&self) -> &str {
        match self {
            RemapError::MissingRequiredField { field, .. } => field,
            RemapError::NotAMapping { field, .. } => field,
        }
    }
}

/// Errors raised by the option label rewriter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("Unsupported shape for label rewrite: expected a string or a list of strings, found {found}")]
    UnsupportedShape { found: String },
}

/// Errors returned by the identity, document and object services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("No account exists for {email}")]
    NotFound { email: String },

    #[error("An account already exists for {email}")]
    AccountExists { email: String },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Credentials error: {0}")]
    Credentials(String),
}

/// A record-scoped failure, tallied by the batch jobs and never fatal to the batch
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Remap(#[from] RemapError),

    #[error("{key}: {source}")]
    Rewrite {
        key: String,
        #[source]
        source: RewriteError,
    },

    #[error("Record {natural_key}: no account found for email {email}")]
    NotFound { natural_key: String, email: String },

    #[error("Record {natural_key}: an account already exists for email {email}")]
    AccountExists { natural_key: String, email: String },

    #[error("Failed to write {collection}/{key}: {message}")]
    StoreWrite {
        collection: String,
        key: String,
        message: String,
    },

    #[error("Record {natural_key}: {source}")]
    Service {
        natural_key: String,
        #[source]
        source: ServiceError,
    },
}

impl RecordError {
    /// Map an identity-service failure for the record with the given natural key
    pub fn from_identity(natural_key: &str, err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { email } => RecordError::NotFound {
                natural_key: natural_key.to_string(),
                email,
            },
            ServiceError::AccountExists { email } => RecordError::AccountExists {
                natural_key: natural_key.to_string(),
                email,
            },
            other => RecordError::Service {
                natural_key: natural_key.to_string(),
                source: other,
            },
        }
    }

    /// Map a document-store write failure
    pub fn store_write(collection: &str, key: &str, err: ServiceError) -> Self {
        RecordError::StoreWrite {
            collection: collection.to_string(),
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message_names_field_and_key() {
        let err = RemapError::MissingRequiredField {
            field: "address.city".to_string(),
            natural_key: "a@x.com".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("address.city"));
        assert!(msg.contains("a@x.com"));
        assert_eq!(err.field(), "address.city");
    }

    #[test]
    fn test_from_identity_keeps_not_found_distinct() {
        let err = RecordError::from_identity(
            "ghost@x.com",
            ServiceError::NotFound {
                email: "ghost@x.com".to_string(),
            },
        );
        assert!(matches!(err, RecordError::NotFound { .. }));

        let err = RecordError::from_identity(
            "a@x.com",
            ServiceError::AccountExists {
                email: "a@x.com".to_string(),
            },
        );
        assert!(matches!(err, RecordError::AccountExists { .. }));

        let err = RecordError::from_identity("#3", ServiceError::InvalidResponse("bad".to_string()));
        assert!(matches!(err, RecordError::Service { .. }));
    }

    #[test]
    fn test_store_write_message() {
        let err = RecordError::store_write(
            "users_new",
            "uid-1",
            ServiceError::Api {
                status: 403,
                message: "PERMISSION_DENIED".to_string(),
            },
        );

        let msg = err.to_string();
        assert!(msg.contains("users_new/uid-1"));
        assert!(msg.contains("403"));
    }
}
