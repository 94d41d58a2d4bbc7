//! Seeding and migrating user documents from the bulk source

use tracing::{debug, info, warn};

use super::{BatchReport, Outcome, require_email};
use crate::backend::{DocumentStore, IdentityService};
use crate::error::RecordError;
use crate::schema::{self, Record, TargetSchema};

/// How the destination key of a user document is obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountMode {
    /// Look up the existing account by email
    Resolve,
    /// Create a new account with this password; an existing email is an error
    Create { password: String },
}

/// Remap every bulk record and write it under its account id
pub struct UserLoad<'a> {
    pub identity: &'a dyn IdentityService,
    pub store: &'a dyn DocumentStore,
    pub schema: &'a TargetSchema,
    pub collection: &'a str,
    pub accounts: AccountMode,
}

impl UserLoad<'_> {
    pub async fn run(&self, records: &[Record]) -> BatchReport {
        info!(
            count = records.len(),
            schema = %self.schema.name,
            collection = %self.collection,
            creating = matches!(self.accounts, AccountMode::Create { .. }),
            "Loading users"
        );
        let mut report = BatchReport::default();

        for (index, record) in records.iter().enumerate() {
            let natural_key = schema::natural_key(record, index);
            let outcome = self.load_one(record, &natural_key).await;
            if let Err(e) = &outcome {
                warn!(%natural_key, error = %e, "Skipping record");
            }
            report.tally(&outcome);
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "Finished loading users"
        );
        report
    }

    /// Remap first, so a schema violation never leaves an orphan account behind
    async fn load_one(&self, record: &Record, natural_key: &str) -> Result<Outcome, RecordError> {
        let destination = schema::remap(record, self.schema, natural_key)?;
        let email = require_email(record, natural_key)?;

        let uid = match &self.accounts {
            AccountMode::Resolve => self.identity.resolve_by_email(email).await,
            AccountMode::Create { password } => self.identity.create_account(email, password).await,
        }
        .map_err(|e| RecordError::from_identity(natural_key, e))?;
        debug!(%natural_key, %uid, "load_one: account id obtained");

        self.store
            .set_document(self.collection, &uid, &destination)
            .await
            .map_err(|e| RecordError::store_write(self.collection, &uid, e))?;

        info!(%natural_key, %uid, collection = %self.collection, "Wrote user document");
        Ok(Outcome::Written)
    }
}

/// Resolve each record's account by email and write the remapped record under it
pub async fn migrate_users(
    identity: &dyn IdentityService,
    store: &dyn DocumentStore,
    records: &[Record],
    schema: &TargetSchema,
    collection: &str,
) -> BatchReport {
    UserLoad {
        identity,
        store,
        schema,
        collection,
        accounts: AccountMode::Resolve,
    }
    .run(records)
    .await
}

/// Create an account per record and write the remapped record under the new uid
pub async fn seed_users(
    identity: &dyn IdentityService,
    store: &dyn DocumentStore,
    records: &[Record],
    schema: &TargetSchema,
    collection: &str,
    password: &str,
) -> BatchReport {
    UserLoad {
        identity,
        store,
        schema,
        collection,
        accounts: AccountMode::Create {
            password: password.to_string(),
        },
    }
    .run(records)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryDocumentStore, MemoryIdentity};
    use crate::schema::{FieldSpec, users_v2};
    use serde_json::{Value, json};

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn slim_schema() -> TargetSchema {
        TargetSchema::new(
            "slim",
            vec![
                FieldSpec::required("email"),
                FieldSpec::required("firstName"),
                FieldSpec::optional("bio"),
            ],
        )
    }

    #[tokio::test]
    async fn test_resolve_mode_writes_under_existing_uid() {
        let identity = MemoryIdentity::new().with_account("a@x.com", "uid-a");
        let store = MemoryDocumentStore::new();
        let schema = slim_schema();
        let load = UserLoad {
            identity: &identity,
            store: &store,
            schema: &schema,
            collection: "users_new",
            accounts: AccountMode::Resolve,
        };

        let report = load
            .run(&[record(json!({"email": "a@x.com", "firstName": "Ann", "age": 30, "bio": ""}))])
            .await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(
            store.document("users_new", "uid-a").await.unwrap(),
            record(json!({"email": "a@x.com", "firstName": "Ann"}))
        );
    }

    #[tokio::test]
    async fn test_scenario_d_unknown_email_writes_nothing() {
        let identity = MemoryIdentity::new();
        let store = MemoryDocumentStore::new();
        let schema = slim_schema();
        let load = UserLoad {
            identity: &identity,
            store: &store,
            schema: &schema,
            collection: "users_new",
            accounts: AccountMode::Resolve,
        };

        let report = load
            .run(&[record(json!({"email": "ghost@x.com", "firstName": "Casper"}))])
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 0);
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_mode_rejects_existing_email_without_retry() {
        let identity = MemoryIdentity::new().with_account("a@x.com", "uid-a");
        let store = MemoryDocumentStore::new();
        let schema = slim_schema();
        let load = UserLoad {
            identity: &identity,
            store: &store,
            schema: &schema,
            collection: "test1",
            accounts: AccountMode::Create {
                password: "asdfgh".to_string(),
            },
        };

        let outcome = load
            .load_one(&record(json!({"email": "a@x.com", "firstName": "Ann"})), "a@x.com")
            .await;
        assert!(matches!(outcome, Err(RecordError::AccountExists { .. })));

        let report = load
            .run(&[
                record(json!({"email": "a@x.com", "firstName": "Ann"})),
                record(json!({"email": "b@x.com", "firstName": "Bo"})),
            ])
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 1);
        let uid = identity.uid_for("b@x.com").await.unwrap();
        assert_eq!(store.document("test1", &uid).await.unwrap()["firstName"], json!("Bo"));
    }

    #[tokio::test]
    async fn test_schema_violation_creates_no_account() {
        let identity = MemoryIdentity::new();
        let store = MemoryDocumentStore::new();
        let schema = users_v2();
        let load = UserLoad {
            identity: &identity,
            store: &store,
            schema: &schema,
            collection: "test1",
            accounts: AccountMode::Create {
                password: "pw".to_string(),
            },
        };

        let report = load.run(&[record(json!({"email": "a@x.com", "firstName": "Ann"}))]).await;

        assert_eq!(report.failed, 1);
        assert_eq!(identity.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_record_scoped() {
        let identity = MemoryIdentity::new()
            .with_account("a@x.com", "uid-a")
            .with_account("b@x.com", "uid-b");
        let store = MemoryDocumentStore::new();
        store.fail_writes_to("uid-a").await;
        let schema = slim_schema();
        let load = UserLoad {
            identity: &identity,
            store: &store,
            schema: &schema,
            collection: "users_new",
            accounts: AccountMode::Resolve,
        };

        let outcome = load
            .load_one(&record(json!({"email": "a@x.com", "firstName": "Ann"})), "a@x.com")
            .await;
        assert!(matches!(outcome, Err(RecordError::StoreWrite { .. })));

        let report = load
            .run(&[
                record(json!({"email": "a@x.com", "firstName": "Ann"})),
                record(json!({"email": "b@x.com", "firstName": "Bo"})),
            ])
            .await;
        assert_eq!((report.succeeded, report.failed), (1, 1));
    }
}
