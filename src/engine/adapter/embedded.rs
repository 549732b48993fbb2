//! Embedded Document Adapter
//!
//! Translates query state into filters and cursor options for the embedded
//! store. A collection handle is opened fresh for every terminal call.

use async_trait::async_trait;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

use super::EngineAdapter;
use crate::engine::config::StorageEngine;
use crate::engine::error::{StoreError, StoreResult};
use crate::engine::nosql::{
    validate_collection_name, Cursor, Datastore, DatastoreOptions, Filter, UpdateOptions, ID_FIELD,
};
use crate::engine::query::{strip_identity, Condition, QueryState, Record, SortDirection, IDENTITY_FIELD};

const COLLECTION_EXTENSION: &str = "db";

pub struct EmbeddedAdapter {
    directory: PathBuf,
    options: DatastoreOptions,
}

impl EmbeddedAdapter {
    /// Collections live as `<directory>/<name>.db`
    pub fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            options: DatastoreOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DatastoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn collection_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{}.{}", name, COLLECTION_EXTENSION))
    }

    /// Open (creating if absent) the collection the query targets
    pub fn open_collection(&self, query: &QueryState) -> StoreResult<Datastore> {
        let name = query.table()?;
        validate_collection_name(name)?;
        Ok(Datastore::open(&self.collection_path(name), &self.options)?)
    }

    /// Filters with `id` rewritten to the native identity field
    pub fn build_filter(&self, query: &QueryState) -> StoreResult<Vec<Filter>> {
        query
            .filters
            .iter()
            .map(|(field, clause)| {
                let field = native_field(field);
                match clause.condition {
                    Condition::Equal => Ok(Filter::eq(field, clause.value.clone())),
                    Condition::Like => {
                        let pattern = match &clause.value {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        Ok(Filter::regex(field, &pattern)?)
                    }
                }
            })
            .collect()
    }

    pub fn apply_sort(&self, cursor: Cursor, query: &QueryState) -> Cursor {
        match &query.sort {
            Some(sort) => cursor.sort(native_field(&sort.field), sort.direction == SortDirection::Desc),
            None => cursor,
        }
    }

    pub fn apply_limit_offset(&self, mut cursor: Cursor, query: &QueryState) -> Cursor {
        if let Some(limit) = query.effective_limit() {
            cursor = cursor.limit(limit as usize);
            if let Some(offset) = query.effective_offset() {
                cursor = cursor.skip(offset as usize);
            }
        }
        cursor
    }

    fn apply_projection(&self, cursor: Cursor, query: &QueryState) -> Cursor {
        let projection = query.projection.trim();
        if projection.is_empty() || projection == "*" {
            return cursor;
        }
        let fields = projection
            .split(',')
            .map(|f| native_field(f.trim()).to_string())
            .filter(|f| !f.is_empty())
            .collect();
        cursor.project(fields)
    }

    fn build_cursor(&self, query: &QueryState) -> StoreResult<Cursor> {
        let cursor = Cursor::new(self.build_filter(query)?);
        let cursor = self.apply_sort(cursor, query);
        let cursor = self.apply_limit_offset(cursor, query);
        Ok(self.apply_projection(cursor, query))
    }
}

fn native_field(field: &str) -> &str {
    if field == IDENTITY_FIELD {
        ID_FIELD
    } else {
        field
    }
}

#[async_trait]
impl EngineAdapter for EmbeddedAdapter {
    fn engine(&self) -> StorageEngine {
        StorageEngine::DocumentEmbedded
    }

    fn identity_field(&self) -> &'static str {
        ID_FIELD
    }

    async fn select(&self, query: &QueryState) -> StoreResult<Vec<Record>> {
        let cursor = self.build_cursor(query)?;
        let store = self.open_collection(query)?;
        Ok(store.find(&cursor))
    }

    async fn insert(&self, query: &QueryState, mut rows: Vec<Record>) -> StoreResult<Vec<Value>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        for row in rows.iter_mut() {
            strip_identity(row, ID_FIELD);
        }

        let mut store = self.open_collection(query)?;
        Ok(store.insert(rows)?)
    }

    async fn update(&self, query: &QueryState, mut patch: Record) -> StoreResult<bool> {
        strip_identity(&mut patch, ID_FIELD);
        let filters = self.build_filter(query)?;

        let mut store = self.open_collection(query)?;
        let options = UpdateOptions { multi: false, upsert: false };
        Ok(store.update(&filters, &patch, options)? == 1)
    }

    async fn delete(&self, query: &QueryState) -> StoreResult<bool> {
        let filters = self.build_filter(query)?;
        let mut store = self.open_collection(query)?;
        Ok(store.remove(&filters, true)? >= 1)
    }

    async fn count(&self, query: &QueryState) -> StoreResult<u64> {
        let filters = self.build_filter(query)?;
        let store = self.open_collection(query)?;
        Ok(store.count(&filters) as u64)
    }

    async fn list_tables(&self) -> StoreResult<Vec<String>> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }

        let mut collections = Vec::new();
        for entry in fs::read_dir(&self.directory).map_err(|e| StoreError::NoSql(e.into()))? {
            let path = entry.map_err(|e| StoreError::NoSql(e.into()))?.path();
            if path.is_file() && path.extension().map(|e| e == COLLECTION_EXTENSION).unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    collections.push(stem.to_string_lossy().to_string());
                }
            }
        }

        collections.sort();
        Ok(collections)
    }
}
