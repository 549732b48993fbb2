//! Remote Document Adapter
//!
//! Holds the connection settings for a remote document database. No
//! translation path is defined for this engine yet, so every capability keeps
//! the trait default and fails with `UnsupportedFeature`.

use async_trait::async_trait;

use super::EngineAdapter;
use crate::engine::config::{ConfigError, DocumentConfig, StorageEngine};
use crate::engine::nosql::ID_FIELD;

pub struct DocumentAdapter {
    url: String,
}

impl DocumentAdapter {
    pub fn new(config: &DocumentConfig) -> Result<Self, ConfigError> {
        let url = config.url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid {
                field: "document.url",
                reason: "connection url is required".to_string(),
            });
        }
        if !url.contains("://") {
            return Err(ConfigError::Invalid {
                field: "document.url",
                reason: format!("{:?} is not a connection url", url),
            });
        }

        Ok(Self { url: url.to_string() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EngineAdapter for DocumentAdapter {
    fn engine(&self) -> StorageEngine {
        StorageEngine::DocumentRemote
    }

    fn identity_field(&self) -> &'static str {
        ID_FIELD
    }
}
