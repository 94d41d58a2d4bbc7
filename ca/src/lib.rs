//! careadmin - batch admin jobs for a care-matching backend
//!
//! Loads user records from a bulk JSON export, reshapes them through an
//! allow-list [`TargetSchema`], and writes them to Firestore under the uid of
//! the matching Firebase Auth account. Also rewrites legacy option codes into
//! labels in stored documents, and lists photo download URLs.
//!
//! # Example
//!
//! ```ignore
//! use careadmin::backend::memory::{MemoryDocumentStore, MemoryIdentity};
//! use careadmin::batch::{AccountMode, UserLoad};
//!
//! let records = careadmin::source::load_records("users.json".as_ref())?;
//! let schema = careadmin::schema::users_v2();
//! let report = UserLoad {
//!     identity: &MemoryIdentity::new(),
//!     store: &MemoryDocumentStore::new(),
//!     schema: &schema,
//!     collection: "users_new",
//!     accounts: AccountMode::Resolve,
//! }
//! .run(&records)
//! .await;
//! println!("{}", report);
//! ```

pub mod backend;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod labels;
pub mod schema;
pub mod source;

pub use batch::BatchReport;
pub use config::Config;
pub use error::{RecordError, RemapError, RewriteError, ServiceError};
pub use labels::OptionLabelMap;
pub use schema::{FieldSpec, Presence, Record, TargetSchema};
