//! Store Error Types

use thiserror::Error;

use super::config::{ConfigError, StorageEngine};
use super::nosql::NoSqlError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("{feature} is not implemented for the {engine} engine")]
    UnsupportedFeature {
        engine: StorageEngine,
        feature: &'static str,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("No table or collection selected")]
    MissingTable,

    #[error("Embedded store error: {0}")]
    NoSql(#[from] NoSqlError),
}

impl StoreError {
    pub fn unsupported_feature(engine: StorageEngine, feature: &'static str) -> Self {
        StoreError::UnsupportedFeature { engine, feature }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
