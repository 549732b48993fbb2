// AirQuery Engine - Core module structure
pub mod adapter;
pub mod builder;
pub mod config;
pub mod error;
pub mod model;
pub mod nosql;
pub mod query;

pub use builder::{Database, QueryBuilder};
pub use config::{Config, StorageEngine};
pub use error::{StoreError, StoreResult};
pub use model::{ActiveRecord, Model, ModelSchema};
pub use query::{Condition, FilterClause, Page, Record, SortDirection, SortSpec};
