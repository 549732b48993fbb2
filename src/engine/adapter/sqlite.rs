//! SQLite Connector
//!
//! Implements SqlConnector for SQLite using rusqlite.
//! Every connect() opens the database file fresh; there is no pooling.

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::dialect::SqlDialect;
use super::{ExecResult, QueryResult, SqlConnection, SqlConnector};
use crate::engine::config::{ConfigError, RelationalConfig};
use crate::engine::error::{StoreError, StoreResult};

pub struct SqliteConnector {
    db_path: PathBuf,
}

impl SqliteConnector {
    pub fn new(db_path: &Path) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
        }
    }

    pub fn from_config(config: &RelationalConfig) -> Result<Self, ConfigError> {
        let path = config.path.as_deref().ok_or_else(|| ConfigError::Invalid {
            field: "relational.path",
            reason: "database file is required for sqlite".to_string(),
        })?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }
}

#[async_trait]
impl SqlConnector for SqliteConnector {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    async fn connect(&self) -> StoreResult<Box<dyn SqlConnection>> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let conn = rusqlite::Connection::open(&self.db_path)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Box::new(SqliteConnection { conn }))
    }
}

pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Convert a rusqlite ValueRef to serde_json Value
    fn value_ref_to_json(val: ValueRef<'_>) -> Value {
        match val {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => json!(i),
            ValueRef::Real(f) => json!(f),
            ValueRef::Text(t) => json!(String::from_utf8_lossy(t).to_string()),
            ValueRef::Blob(b) => json!(format!("BLOB({} bytes)", b.len())),
        }
    }
}

#[async_trait]
impl SqlConnection for SqliteConnection {
    async fn query(&mut self, sql: &str) -> StoreResult<QueryResult> {
        let start = Instant::now();

        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let width = columns.len();

        let rows = stmt
            .query_map([], |row| {
                let mut vals = Vec::with_capacity(width);
                for i in 0..width {
                    vals.push(Self::value_ref_to_json(row.get_ref(i)?));
                }
                Ok(vals)
            })
            .map_err(|e| StoreError::Query(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(QueryResult {
            columns,
            rows,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn execute(&mut self, sql: &str) -> StoreResult<ExecResult> {
        let start = Instant::now();

        let affected = self
            .conn
            .execute(sql, [])
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(ExecResult {
            affected_rows: affected as u64,
            last_insert_id: Some(self.conn.last_insert_rowid()),
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn close(self: Box<Self>) -> StoreResult<()> {
        self.conn
            .close()
            .map_err(|(_, e)| StoreError::Connection(e.to_string()))
    }
}
