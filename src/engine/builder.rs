//! Fluent query builder
//!
//! A [`Database`] binds one engine adapter, selected once from configuration.
//! Each [`QueryBuilder`] it hands out owns a fresh [`QueryState`]; chain
//! methods only mutate that state and terminal methods consume the builder.

use serde_json::Value;
use std::sync::Arc;

use super::adapter::{self, EngineAdapter, RelationalAdapter, SqlConnector};
use super::config::{Config, StorageEngine};
use super::error::{StoreError, StoreResult};
use super::query::{normalize_identity, FilterClause, QueryState, Record, Rows, SortSpec, IDENTITY_FIELD};

/// Handle on a configured storage engine
#[derive(Clone)]
pub struct Database {
    adapter: Arc<dyn EngineAdapter>,
}

impl Database {
    /// Build the adapter for the configured engine
    pub fn new(config: &Config) -> StoreResult<Self> {
        Ok(Self {
            adapter: adapter::from_config(config)?,
        })
    }

    /// Relational engine driven by an external SQL client
    pub fn with_sql_connector(config: &Config, connector: Arc<dyn SqlConnector>) -> StoreResult<Self> {
        if config.storage_engine != StorageEngine::Relational {
            return Err(StoreError::UnsupportedOperation(format!(
                "a SQL connector cannot drive the {} engine",
                config.storage_engine
            )));
        }
        config.validate()?;
        Ok(Self::with_adapter(Arc::new(RelationalAdapter::new(
            &config.relational,
            connector,
        ))))
    }

    pub fn with_adapter(adapter: Arc<dyn EngineAdapter>) -> Self {
        Self { adapter }
    }

    pub fn engine(&self) -> StorageEngine {
        self.adapter.engine()
    }

    /// True when the engine replaces caller-supplied identities with its own
    pub fn assigns_identity(&self) -> bool {
        self.adapter.identity_field() != IDENTITY_FIELD
    }

    /// Start a query with an empty state
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder {
            adapter: Arc::clone(&self.adapter),
            state: QueryState::default(),
        }
    }

    /// Shorthand for `query().select_table(projection, table)`
    pub fn select_table(&self, projection: &str, table: &str) -> QueryBuilder {
        self.query().select_table(projection, table)
    }

    /// Tables or collections of the configured database
    pub async fn list_tables(&self) -> StoreResult<Vec<String>> {
        self.query().list_tables().await
    }
}

/// A single pending query
pub struct QueryBuilder {
    adapter: Arc<dyn EngineAdapter>,
    state: QueryState,
}

impl QueryBuilder {
    pub fn select_table(mut self, projection: &str, table: &str) -> Self {
        self.state.projection = projection.to_string();
        self.state.table = Some(table.to_string());
        self
    }

    /// Add a filter clause; a later clause on the same field replaces it
    pub fn filter(mut self, field: &str, clause: FilterClause) -> Self {
        self.state.add_filter(field, clause);
        self
    }

    /// Equality filter
    pub fn filter_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterClause::eq(value))
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.state.sort = Some(sort);
        self
    }

    /// Limit is raised to at least one; offset counts only when positive
    pub fn limit_offset(mut self, limit: u64, offset: u64) -> Self {
        self.state.limit = Some(limit.max(1));
        self.state.offset = Some(offset);
        self
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// Consume the builder, returning the accumulated state
    pub fn into_state(self) -> QueryState {
        self.state
    }

    /// First matching record, or None
    pub async fn fetch(mut self) -> StoreResult<Option<Record>> {
        self.state.limit = Some(1);
        let rows = self.adapter.select(&self.state).await?;
        let native = self.adapter.identity_field();
        Ok(rows.into_iter().next().map(|row| normalize_identity(row, native)))
    }

    /// Every matching record, in engine order
    pub async fn fetch_all(self) -> StoreResult<Vec<Record>> {
        let rows = self.adapter.select(&self.state).await?;
        let native = self.adapter.identity_field();
        Ok(rows.into_iter().map(|row| normalize_identity(row, native)).collect())
    }

    pub async fn count(self) -> StoreResult<u64> {
        self.adapter.count(&self.state).await
    }

    /// Insert one record or a sequence; identities come back in input order
    pub async fn insert(self, rows: impl Into<Rows>) -> StoreResult<Vec<Value>> {
        let Rows(rows) = rows.into();
        self.adapter.insert(&self.state, rows).await
    }

    /// Update one record matching the filters
    pub async fn update(self, row: Record) -> StoreResult<bool> {
        self.adapter.update(&self.state, row).await
    }

    /// Delete every record matching the filters
    pub async fn delete(self) -> StoreResult<bool> {
        self.adapter.delete(&self.state).await
    }

    pub async fn list_tables(self) -> StoreResult<Vec<String>> {
        self.adapter.list_tables().await
    }
}
