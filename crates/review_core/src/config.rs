//! Store configuration loaded from the environment.
//!
//! # Responsibility
//! - Resolve database paths, collection name and logging settings.
//! - Optionally read a local `.env` file before consulting the process
//!   environment.
//!
//! # Invariants
//! - Unset variables fall back to documented defaults.
//! - Set-but-blank values are rejected instead of silently defaulted.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DIRECTORY_DB: &str = "REVIEW_DIRECTORY_DB";
pub const ENV_DOCUMENT_DB: &str = "REVIEW_DOCUMENT_DB";
pub const ENV_COLLECTION: &str = "REVIEW_COLLECTION";
pub const ENV_LOG_LEVEL: &str = "REVIEW_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "REVIEW_LOG_DIR";

pub const DEFAULT_DIRECTORY_DB: &str = "company.db";
pub const DEFAULT_DOCUMENT_DB: &str = "reviews.db";
pub const DEFAULT_COLLECTION: &str = "reviews";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Blank(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank(name) => write!(f, "environment variable `{name}` is set but blank"),
        }
    }
}

impl Error for ConfigError {}

/// Settings needed to open both stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub directory_db_path: PathBuf,
    pub document_db_path: PathBuf,
    pub collection: String,
    pub log_level: String,
    /// Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory_db_path: PathBuf::from(DEFAULT_DIRECTORY_DB),
            document_db_path: PathBuf::from(DEFAULT_DOCUMENT_DB),
            collection: DEFAULT_COLLECTION.to_string(),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl StoreConfig {
    /// Loads `.env` (when present) and then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves settings through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &'static str| -> Result<Option<String>, ConfigError> {
            match lookup(name) {
                Some(value) if value.trim().is_empty() => Err(ConfigError::Blank(name)),
                Some(value) => Ok(Some(value.trim().to_string())),
                None => Ok(None),
            }
        };

        let defaults = Self::default();
        Ok(Self {
            directory_db_path: read(ENV_DIRECTORY_DB)?
                .map_or(defaults.directory_db_path, PathBuf::from),
            document_db_path: read(ENV_DOCUMENT_DB)?
                .map_or(defaults.document_db_path, PathBuf::from),
            collection: read(ENV_COLLECTION)?.unwrap_or(defaults.collection),
            log_level: read(ENV_LOG_LEVEL)?.unwrap_or(defaults.log_level),
            log_dir: read(ENV_LOG_DIR)?.map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StoreConfig, DEFAULT_COLLECTION, ENV_COLLECTION, ENV_DOCUMENT_DB};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn unset_variables_use_defaults() {
        let config = StoreConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.collection, DEFAULT_COLLECTION);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn set_variables_override_defaults() {
        let config = StoreConfig::from_lookup(lookup_from(&[
            (ENV_DOCUMENT_DB, " /tmp/reviews-test.db "),
            (ENV_COLLECTION, "engineering_reviews"),
        ]))
        .unwrap();
        assert_eq!(config.document_db_path, PathBuf::from("/tmp/reviews-test.db"));
        assert_eq!(config.collection, "engineering_reviews");
    }

    #[test]
    fn blank_variables_are_rejected() {
        let err = StoreConfig::from_lookup(lookup_from(&[(ENV_COLLECTION, "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Blank(ENV_COLLECTION));
    }
}
