//! Embedded Store Error Types

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NoSqlError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid collection name: {0}")]
    InvalidCollectionName(String),

    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Document is not an object: {0}")]
    NotAnObject(String),
}

pub type Result<T> = std::result::Result<T, NoSqlError>;
