//! AirQuery - Fluent query builder and active records over interchangeable
//! storage engines.
//!
//! One declarative query state is translated per engine:
//! - relational: SQL text executed over a fresh connection per call
//! - embedded: filters and cursor options on a local file-backed store
//! - remote document: connection settings only, every operation unsupported
//!
//! ```no_run
//! use airquery::{Config, Database};
//!
//! # async fn run() -> airquery::StoreResult<()> {
//! let db = Database::new(&Config::default())?;
//! let rows = db.select_table("*", "users").filter_eq("name", "alice").fetch_all().await?;
//! println!("{} matching users", rows.len());
//! # Ok(())
//! # }
//! ```

pub mod engine;

pub use engine::{
    ActiveRecord, Condition, Config, Database, FilterClause, Model, ModelSchema, Page, QueryBuilder,
    Record, SortDirection, SortSpec, StorageEngine, StoreError, StoreResult,
};
