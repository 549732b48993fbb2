//! AirQuery Configuration Module
//! Handles loading and validating the storage configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::adapter::dialect::SqlDialect;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid config format: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Storage engine a database handle is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageEngine {
    #[serde(rename = "relational", alias = "mysql")]
    Relational,
    #[serde(rename = "document", alias = "mongodb")]
    DocumentRemote,
    #[serde(rename = "embedded", alias = "nedb")]
    DocumentEmbedded,
}

impl std::fmt::Display for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageEngine::Relational => write!(f, "relational"),
            StorageEngine::DocumentRemote => write!(f, "document"),
            StorageEngine::DocumentEmbedded => write!(f, "embedded"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage_engine: StorageEngine,
    #[serde(default)]
    pub relational: RelationalConfig,
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub embedded: EmbeddedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalConfig {
    #[serde(default = "default_dialect")]
    pub dialect: SqlDialect,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub ssl: bool,
    /// Database file, SQLite only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentConfig {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedConfig {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Overrides the platform application data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_root: Option<PathBuf>,
}

fn default_dialect() -> SqlDialect {
    SqlDialect::Mysql
}

fn default_port() -> u16 {
    3312
}

fn default_directory() -> PathBuf {
    PathBuf::from("var").join("nedb")
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            host: String::new(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
            database: String::new(),
            ssl: false,
            path: None,
        }
    }
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            data_root: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_engine: StorageEngine::DocumentEmbedded,
            relational: RelationalConfig::default(),
            document: DocumentConfig::default(),
            embedded: EmbeddedConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Embedded store with an explicit data root
    pub fn embedded(data_root: &Path) -> Self {
        Self {
            embedded: EmbeddedConfig {
                data_root: Some(data_root.to_path_buf()),
                ..EmbeddedConfig::default()
            },
            ..Self::default()
        }
    }

    /// Relational engine backed by a SQLite file
    pub fn sqlite(path: &Path) -> Self {
        Self {
            storage_engine: StorageEngine::Relational,
            relational: RelationalConfig {
                dialect: SqlDialect::Sqlite,
                database: "main".to_string(),
                path: Some(path.to_path_buf()),
                ..RelationalConfig::default()
            },
            ..Self::default()
        }
    }

    /// Checks the section belonging to the selected engine
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.storage_engine {
            StorageEngine::Relational => {
                let db = &self.relational;
                if db.database.trim().is_empty() {
                    return Err(invalid("relational.database", "database name is required"));
                }
                match db.dialect {
                    SqlDialect::Mysql if db.host.trim().is_empty() => {
                        Err(invalid("relational.host", "host is required"))
                    }
                    SqlDialect::Sqlite if db.path.is_none() => {
                        Err(invalid("relational.path", "database file is required for sqlite"))
                    }
                    _ => Ok(()),
                }
            }
            StorageEngine::DocumentRemote => {
                if self.document.url.trim().is_empty() {
                    return Err(invalid("document.url", "connection url is required"));
                }
                Ok(())
            }
            StorageEngine::DocumentEmbedded => {
                if self.embedded.directory.as_os_str().is_empty() {
                    return Err(invalid("embedded.directory", "storage directory is required"));
                }
                Ok(())
            }
        }
    }

    /// Directory holding the embedded collection files
    pub fn embedded_root(&self) -> Result<PathBuf, ConfigError> {
        let root = match &self.embedded.data_root {
            Some(root) => root.clone(),
            None => dirs::data_dir()
                .map(|dir| dir.join("airquery"))
                .ok_or_else(|| invalid("embedded.data_root", "no application data directory on this platform"))?,
        };
        Ok(root.join(&self.embedded.directory))
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_is_embedded() {
        let config = Config::default();
        assert_eq!(config.storage_engine, StorageEngine::DocumentEmbedded);
        assert_eq!(config.relational.port, 3312);
        assert_eq!(config.embedded.directory, PathBuf::from("var").join("nedb"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_aliases() {
        let config: Config = serde_json::from_str(r#"{"storage_engine": "nedb"}"#).unwrap();
        assert_eq!(config.storage_engine, StorageEngine::DocumentEmbedded);

        let config: Config = serde_json::from_str(r#"{"storage_engine": "mongodb"}"#).unwrap();
        assert_eq!(config.storage_engine, StorageEngine::DocumentRemote);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.storage_engine = StorageEngine::DocumentRemote;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "document.url", .. })
        ));

        config.storage_engine = StorageEngine::Relational;
        config.relational.database = "app".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "relational.host", .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("airquery.config.json");

        let mut config = Config::sqlite(&dir.path().join("app.db"));
        config.relational.password = "secret".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.storage_engine, StorageEngine::Relational);
        assert_eq!(loaded.relational.dialect, SqlDialect::Sqlite);
        assert!(loaded.relational.password.is_empty());
    }

    #[test]
    fn test_embedded_root() {
        let dir = tempdir().unwrap();
        let config = Config::embedded(dir.path());
        assert_eq!(
            config.embedded_root().unwrap(),
            dir.path().join("var").join("nedb")
        );
    }
}
