//! End-to-end job tests over the in-process backends

use async_trait::async_trait;
use careadmin::backend::dry_run::{DryRunStore, PlannedWrite};
use careadmin::backend::memory::{MemoryDocumentStore, MemoryIdentity};
use careadmin::backend::{DocumentPage, DocumentStore, FieldUpdate};
use careadmin::batch::{self, AccountMode, UserLoad};
use careadmin::schema::{self, Record};
use careadmin::{OptionLabelMap, ServiceError};
use serde_json::{Value, json};

fn record(value: Value) -> Record {
    value.as_object().cloned().expect("object")
}

/// A complete user as exported from the old app
fn exported_user(email: &str) -> Record {
    record(json!({
        "firstName": "Ann",
        "lastName": "Lee",
        "dob": "1983-04-02",
        "age": 41,
        "gender": "",
        "address": {
            "fullAddress": "1 Rd, Toronto, ON M5V 1A1, Canada",
            "street": "1 Rd",
            "city": "Toronto",
            "province": "ON",
            "country": "Canada",
            "postalCode": "M5V 1A1",
            "unit": "4B"
        },
        "phone": "+14165550100",
        "email": email,
        "isPsw": true,
        "profilePhotoUrl": null,
        "rate": 32,
        "idVerified": false,
        "emailVerified": true,
        "phoneVerified": false,
        "hasProfilePhoto": false,
        "carePreferences": {
            "lookingForSelf": true,
            "careType": ["Option 1"],
            "tasks": [],
            "availability": null
        },
        "bio": "Hello",
        "onboardingComplete": true,
        "stripeAccountId": "",
        "lastSeen": "2024-01-01"
    }))
}

// =============================================================================
// Migration and seeding
// =============================================================================

#[tokio::test]
async fn test_migrate_users_v2_is_sparse_and_drops_age() {
    let identity = MemoryIdentity::new()
        .with_account("a@x.com", "uid-a")
        .with_account("b@x.com", "uid-b");
    let store = MemoryDocumentStore::new();
    let target = schema::users_v2();

    let mut missing_email = exported_user("c@x.com");
    missing_email.remove("email");

    let records = [
        exported_user("a@x.com"),
        missing_email,
        exported_user("ghost@x.com"),
        exported_user("b@x.com"),
    ];
    let report = batch::migrate_users(&identity, &store, &records, &target, "users_new").await;

    assert_eq!((report.succeeded, report.failed, report.skipped), (2, 2, 0));
    assert_eq!(store.len("users_new").await, 2);

    let written = store.document("users_new", "uid-a").await.expect("written");
    assert!(!written.contains_key("age"));
    assert!(!written.contains_key("gender"));
    assert!(!written.contains_key("profilePhotoUrl"));
    assert!(!written.contains_key("stripeAccountId"));
    assert!(!written.contains_key("lastSeen"));
    assert!(!written["address"].as_object().expect("address").contains_key("unit"));
    assert_eq!(
        written["carePreferences"],
        json!({"lookingForSelf": true, "careType": ["Option 1"], "tasks": []})
    );
    assert_eq!(written["rate"], json!(32));
}

#[tokio::test]
async fn test_seed_legacy_v1_creates_accounts_and_fills_defaults() {
    let identity = MemoryIdentity::new();
    let store = MemoryDocumentStore::new();
    let target = schema::legacy_v1();

    let records = [exported_user("a@x.com"), exported_user("a@x.com")];
    let report = batch::seed_users(&identity, &store, &records, &target, "test1", "asdfgh").await;

    assert_eq!((report.succeeded, report.failed), (1, 1));
    assert_eq!(identity.account_count().await, 1);

    let uid = identity.uid_for("a@x.com").await.expect("account");
    let written = store.document("test1", &uid).await.expect("written");
    assert_eq!(written["age"], json!(41));
    // present but null: the default only fills a missing key
    assert_eq!(written["profilePhotoUrl"], Value::Null);
    assert_eq!(written["stripeAccountId"], json!(""));
    assert_eq!(written["carePreferences"]["availability"], Value::Null);
}

#[tokio::test]
async fn test_dry_run_seed_plans_without_writing() {
    let identity = MemoryIdentity::new();
    let scratch = MemoryDocumentStore::new();
    let store = DryRunStore::new(&scratch);
    let target = schema::legacy_v1();

    let report = UserLoad {
        identity: &identity,
        store: &store,
        schema: &target,
        collection: "test1",
        accounts: AccountMode::Create {
            password: "pw".to_string(),
        },
    }
    .run(&[exported_user("a@x.com"), exported_user("b@x.com")])
    .await;

    assert_eq!(report.succeeded, 2);
    assert_eq!(scratch.write_count().await, 0);
    let planned = store.planned().await;
    assert_eq!(planned.len(), 2);
    assert!(matches!(&planned[0], PlannedWrite::Set { collection, .. } if collection == "test1"));
}

// =============================================================================
// Rewrite passes
// =============================================================================

/// Serves one page from an inner store, then fails
struct FlakyListing {
    inner: MemoryDocumentStore,
}

#[async_trait]
impl DocumentStore for FlakyListing {
    async fn set_document(&self, collection: &str, key: &str, record: &Record) -> Result<(), ServiceError> {
        self.inner.set_document(collection, key, record).await
    }

    async fn update_fields(&self, collection: &str, key: &str, updates: &[FieldUpdate]) -> Result<(), ServiceError> {
        self.inner.update_fields(collection, key, updates).await
    }

    async fn list_documents(&self, collection: &str, page_token: Option<&str>) -> Result<DocumentPage, ServiceError> {
        match page_token {
            None => self.inner.list_documents(collection, None).await,
            Some(_) => Err(ServiceError::Api {
                status: 503,
                message: "backend unavailable".to_string(),
            }),
        }
    }
}

#[tokio::test]
async fn test_interrupted_pass_keeps_processed_counts() {
    let inner = MemoryDocumentStore::with_page_size(2);
    for (key, note) in [("s1", "Option 1"), ("s2", "Option 2"), ("s3", "Option 3")] {
        inner
            .set_document("sessions_test1", key, &record(json!({"note": note})))
            .await
            .expect("seed");
    }
    let store = FlakyListing { inner };

    let report = batch::rewrite_session_notes(&store, "sessions_test1", &OptionLabelMap::tasks()).await;

    assert_eq!(report.succeeded, 2);
    assert!(!report.is_complete());
    assert!(report.interrupted.as_deref().is_some_and(|r| r.contains("503")));
    assert_eq!(
        store.inner.document("sessions_test1", "s3").await.expect("doc")["note"],
        json!("Option 3")
    );
}

#[tokio::test]
async fn test_scenario_c_note_with_custom_text() {
    let store = MemoryDocumentStore::new();
    store
        .set_document(
            "sessions_test1",
            "s1",
            &record(json!({"note": "Option 1, Option 3, Custom Note", "caregiverId": "uid-a"})),
        )
        .await
        .expect("seed");
    let tasks = OptionLabelMap::new([("Option 1", "Bathing Assistance"), ("Option 3", "Grooming Support")]);

    let report = batch::rewrite_session_notes(&store, "sessions_test1", &tasks).await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(
        store.document("sessions_test1", "s1").await.expect("doc"),
        record(json!({"note": "Bathing Assistance, Grooming Support, Custom Note", "caregiverId": "uid-a"}))
    );
}

#[tokio::test]
async fn test_dry_run_rewrite_reads_through() {
    let inner = MemoryDocumentStore::new();
    inner
        .set_document(
            "test1",
            "uid-a",
            &record(json!({"carePreferences": {"careType": ["Option 6"], "tasks": ["Option 7"]}})),
        )
        .await
        .expect("seed");
    let store = DryRunStore::new(&inner);

    let report = batch::rewrite_care_preferences(
        &store,
        "test1",
        &OptionLabelMap::care_types(),
        &OptionLabelMap::tasks(),
    )
    .await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(
        store.planned().await,
        vec![PlannedWrite::Update {
            collection: "test1".to_string(),
            key: "uid-a".to_string(),
            updates: vec![
                FieldUpdate::new("carePreferences.careType", json!(["Companionship"])),
                FieldUpdate::new("carePreferences.tasks", json!(["Medication Reminders"])),
            ],
        }]
    );
    assert_eq!(
        inner.document("test1", "uid-a").await.expect("doc")["carePreferences"]["careType"],
        json!(["Option 6"])
    );
}
