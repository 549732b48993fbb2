//! Engine Adapter Layer
//!
//! Provides a trait-based abstraction over the storage engines.
//! Each adapter translates a [`QueryState`] into its engine's native request
//! and executes it. Capabilities an engine lacks fail with
//! [`StoreError::UnsupportedFeature`] instead of returning empty results.

pub mod dialect;
pub mod document;
pub mod embedded;
pub mod relational;
pub mod sqlite;

pub use dialect::{DialectGenerator, SqlDialect};
pub use document::DocumentAdapter;
pub use embedded::EmbeddedAdapter;
pub use relational::RelationalAdapter;
pub use sqlite::SqliteConnector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::config::{Config, ConfigError, StorageEngine};
use super::error::{StoreError, StoreResult};
use super::query::{QueryState, Record};

/// Translate-and-execute contract every engine implements
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Which engine this adapter drives
    fn engine(&self) -> StorageEngine;

    /// Name of the engine's native identity field
    fn identity_field(&self) -> &'static str;

    /// Rows matching the query, in the engine's native shape
    async fn select(&self, _query: &QueryState) -> StoreResult<Vec<Record>> {
        Err(StoreError::unsupported_feature(self.engine(), "select"))
    }

    /// Insert rows and return their identities in input order
    async fn insert(&self, _query: &QueryState, _rows: Vec<Record>) -> StoreResult<Vec<Value>> {
        Err(StoreError::unsupported_feature(self.engine(), "insert"))
    }

    /// Update one matching row; true when exactly one was modified
    async fn update(&self, _query: &QueryState, _patch: Record) -> StoreResult<bool> {
        Err(StoreError::unsupported_feature(self.engine(), "update"))
    }

    /// Delete every matching row; true when at least one was removed
    async fn delete(&self, _query: &QueryState) -> StoreResult<bool> {
        Err(StoreError::unsupported_feature(self.engine(), "delete"))
    }

    /// Number of matching rows
    async fn count(&self, _query: &QueryState) -> StoreResult<u64> {
        Err(StoreError::unsupported_feature(self.engine(), "count"))
    }

    /// Tables or collections of the configured database
    async fn list_tables(&self) -> StoreResult<Vec<String>> {
        Err(StoreError::unsupported_feature(self.engine(), "list tables"))
    }
}

/// Opens raw SQL connections; one connection per execute call
#[async_trait]
pub trait SqlConnector: Send + Sync {
    fn dialect(&self) -> SqlDialect;

    async fn connect(&self) -> StoreResult<Box<dyn SqlConnection>>;
}

/// A single open SQL connection
#[async_trait]
pub trait SqlConnection: Send {
    /// Execute a statement that returns rows
    async fn query(&mut self, sql: &str) -> StoreResult<QueryResult>;

    /// Execute a statement that modifies data
    async fn execute(&mut self, sql: &str) -> StoreResult<ExecResult>;

    /// Release the connection
    async fn close(self: Box<Self>) -> StoreResult<()>;
}

/// Result from a SELECT-type query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Zip each row with the column names
    pub fn into_records(self) -> Vec<Record> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect()
    }
}

/// Result from an INSERT/UPDATE/DELETE-type statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    pub affected_rows: u64,
    pub last_insert_id: Option<i64>,
    pub execution_time_ms: u64,
}

/// Build the adapter for the configured engine
pub fn from_config(config: &Config) -> StoreResult<Arc<dyn EngineAdapter>> {
    config.validate()?;

    let adapter: Arc<dyn EngineAdapter> = match config.storage_engine {
        StorageEngine::Relational => {
            let connector: Arc<dyn SqlConnector> = match config.relational.dialect {
                SqlDialect::Sqlite => Arc::new(SqliteConnector::from_config(&config.relational)?),
                SqlDialect::Mysql => {
                    return Err(ConfigError::Invalid {
                        field: "relational.dialect",
                        reason: "mysql needs a connector, use Database::with_sql_connector".to_string(),
                    }
                    .into())
                }
            };
            Arc::new(RelationalAdapter::new(&config.relational, connector))
        }
        StorageEngine::DocumentRemote => Arc::new(DocumentAdapter::new(&config.document)?),
        StorageEngine::DocumentEmbedded => Arc::new(EmbeddedAdapter::new(config.embedded_root()?)),
    };

    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_result_into_records() {
        let result = QueryResult {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![vec![json!(1), json!("a")], vec![json!(2), json!("b")]],
            execution_time_ms: 0,
        };

        let records = result.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("name"), Some(&json!("b")));
        assert_eq!(records[0].keys().next().map(String::as_str), Some("id"));
    }

    #[test]
    fn test_mysql_requires_connector() {
        let mut config = Config::default();
        config.storage_engine = StorageEngine::Relational;
        config.relational.host = "localhost".to_string();
        config.relational.database = "app".to_string();

        assert!(matches!(
            from_config(&config),
            Err(StoreError::Config(ConfigError::Invalid { field: "relational.dialect", .. }))
        ));
    }
}
