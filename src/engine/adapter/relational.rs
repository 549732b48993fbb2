//! Relational Adapter
//!
//! Translates query state into SQL text and executes it through a
//! [`SqlConnector`]. Each execute call owns a full connect/disconnect cycle.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::dialect::DialectGenerator;
use super::{EngineAdapter, ExecResult, QueryResult, SqlConnector};
use crate::engine::config::{RelationalConfig, StorageEngine};
use crate::engine::error::{StoreError, StoreResult};
use crate::engine::query::{strip_identity, Condition, QueryState, Record, IDENTITY_FIELD};

pub struct RelationalAdapter {
    database: String,
    generator: DialectGenerator,
    connector: Arc<dyn SqlConnector>,
}

impl RelationalAdapter {
    pub fn new(config: &RelationalConfig, connector: Arc<dyn SqlConnector>) -> Self {
        Self {
            database: config.database.clone(),
            generator: DialectGenerator::new(connector.dialect()),
            connector,
        }
    }

    /// `SELECT <projection> FROM <table> [WHERE ..] [LIMIT n [OFFSET m]]`
    pub fn build_select(&self, query: &QueryState) -> StoreResult<String> {
        let mut sql = format!(
            "SELECT {} FROM {}",
            query.projection,
            self.generator.quote_ident(query.table()?)
        );
        sql.push_str(&self.build_where(query)?);

        if query.sort.is_some() {
            debug!("sorting is not applied by the relational engine");
        }

        if let Some(limit) = query.effective_limit() {
            sql.push_str(&format!(" LIMIT {}", limit));
            if let Some(offset) = query.effective_offset() {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }

        Ok(sql)
    }

    /// One INSERT statement per row
    pub fn build_insert(&self, query: &QueryState, rows: &[Record]) -> StoreResult<Vec<String>> {
        let table = self.generator.quote_ident(query.table()?);

        let statements: Vec<String> = rows
            .iter()
            .map(|row| {
                let columns: Vec<String> =
                    row.keys().map(|c| self.generator.quote_ident(c)).collect();
                let values: Vec<String> =
                    row.values().map(|v| self.generator.escape_literal(v)).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({});",
                    table,
                    columns.join(", "),
                    values.join(", ")
                )
            })
            .collect();

        Ok(statements)
    }

    pub fn build_update(&self, query: &QueryState, patch: &Record) -> StoreResult<String> {
        let assignments: Vec<String> = patch
            .iter()
            .map(|(column, value)| {
                format!(
                    "{} = {}",
                    self.generator.quote_ident(column),
                    self.generator.escape_literal(value)
                )
            })
            .collect();

        if assignments.is_empty() {
            return Err(StoreError::Query("update without any field to set".to_string()));
        }

        Ok(format!(
            "UPDATE {} SET {}{}",
            self.generator.quote_ident(query.table()?),
            assignments.join(", "),
            self.build_where(query)?
        ))
    }

    pub fn build_delete(&self, query: &QueryState) -> StoreResult<String> {
        Ok(format!(
            "DELETE FROM {}{}",
            self.generator.quote_ident(query.table()?),
            self.build_where(query)?
        ))
    }

    pub fn build_count(&self, query: &QueryState) -> StoreResult<String> {
        Ok(format!(
            "SELECT COUNT(*) AS count FROM {}{}",
            self.generator.quote_ident(query.table()?),
            self.build_where(query)?
        ))
    }

    fn build_where(&self, query: &QueryState) -> StoreResult<String> {
        let mut clauses = Vec::with_capacity(query.filters.len());

        for (field, clause) in &query.filters {
            match clause.condition {
                Condition::Equal => clauses.push(self.generator.equals(field, &clause.value)),
                other => {
                    return Err(StoreError::UnsupportedOperation(format!(
                        "{} condition on the relational engine",
                        other
                    )))
                }
            }
        }

        if clauses.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!(" WHERE {}", clauses.join(" AND ")))
        }
    }

    /// Run a row-returning statement on a fresh connection
    pub async fn query(&self, sql: &str) -> StoreResult<QueryResult> {
        debug!(sql, "relational query");
        let mut conn = self.connector.connect().await?;
        let result = conn.query(sql).await;
        conn.close().await?;
        result
    }

    /// Run a single statement on a fresh connection
    pub async fn execute(&self, sql: &str) -> StoreResult<ExecResult> {
        let mut results = self.execute_batch(&[sql]).await?;
        results
            .pop()
            .ok_or_else(|| StoreError::Query("empty statement".to_string()))
    }

    /// Run statements in order on one connection, skipping empty ones.
    /// A failing statement aborts the rest; earlier ones stay applied.
    pub async fn execute_batch(&self, statements: &[&str]) -> StoreResult<Vec<ExecResult>> {
        let mut conn = self.connector.connect().await?;
        let mut results = Vec::with_capacity(statements.len());

        for statement in statements.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            debug!(sql = statement, "relational execute");
            match conn.execute(statement).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    conn.close().await.ok();
                    return Err(e);
                }
            }
        }

        conn.close().await?;
        Ok(results)
    }
}

#[async_trait]
impl EngineAdapter for RelationalAdapter {
    fn engine(&self) -> StorageEngine {
        StorageEngine::Relational
    }

    fn identity_field(&self) -> &'static str {
        IDENTITY_FIELD
    }

    async fn select(&self, query: &QueryState) -> StoreResult<Vec<Record>> {
        let sql = self.build_select(query)?;
        Ok(self.query(&sql).await?.into_records())
    }

    async fn insert(&self, query: &QueryState, rows: Vec<Record>) -> StoreResult<Vec<Value>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let statements = self.build_insert(query, &rows)?;
        let statements: Vec<&str> = statements.iter().map(String::as_str).collect();
        let results = self.execute_batch(&statements).await?;

        Ok(results
            .into_iter()
            .map(|r| r.last_insert_id.map(Value::from).unwrap_or(Value::Null))
            .collect())
    }

    async fn update(&self, query: &QueryState, mut patch: Record) -> StoreResult<bool> {
        strip_identity(&mut patch, IDENTITY_FIELD);
        let sql = self.build_update(query, &patch)?;
        Ok(self.execute(&sql).await?.affected_rows == 1)
    }

    async fn delete(&self, query: &QueryState) -> StoreResult<bool> {
        let sql = self.build_delete(query)?;
        Ok(self.execute(&sql).await?.affected_rows >= 1)
    }

    async fn count(&self, query: &QueryState) -> StoreResult<u64> {
        let sql = self.build_count(query)?;
        let records = self.query(&sql).await?.into_records();

        let count = records
            .first()
            .and_then(|row| row.get("count"))
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .ok_or_else(|| StoreError::Query("count query returned no value".to_string()))?;
        Ok(count)
    }

    async fn list_tables(&self) -> StoreResult<Vec<String>> {
        let sql = self.generator.list_tables(&self.database);
        let records = self.query(&sql).await?.into_records();

        Ok(records
            .iter()
            .filter_map(|row| row.get("table_name").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }
}
