//! Embedded document store
//!
//! A file-backed, single-process document store:
//! - One append-only JSON-lines file per collection
//! - Generated `_id` identities
//! - In-memory filtering, sorting and paging
//! - Periodic compaction while a collection is open

pub mod datastore;
pub mod error;
pub mod persistence;
pub mod query;

pub use datastore::{validate_collection_name, Datastore, DatastoreOptions, UpdateOptions};
pub use error::NoSqlError;
pub use persistence::ID_FIELD;
pub use query::{Cursor, Filter, FilterOp};
