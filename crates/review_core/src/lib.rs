//! Hybrid review store core.
//! Validates and persists performance reviews in a schemaless document store
//! while checking employee references against a separate relational store.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, SystemClock};
pub use config::{ConfigError, StoreConfig};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::review::{
    parse_review_date, DocumentId, EmployeeId, ExtensionValue, Extensions, ReviewCandidate,
    ReviewDocument, ReviewNumber, ReviewPatch, ReviewValidationError, StandardField,
};
pub use repo::document_store::{
    Condition, Document, DocumentQuery, DocumentStore, SortField, SqliteDocumentStore,
    StoreError, StoreResult, StoredDocument,
};
pub use repo::employee_directory::{
    DirectoryError, DirectoryResult, EmployeeDirectory, SqliteEmployeeDirectory,
};
pub use repo::review_repo::{
    ReviewError, ReviewErrorKind, ReviewReceipt, ReviewRepository, ReviewResult,
};
pub use service::review_aggregator::{
    FieldSelector, FrequencyEntry, RatingSummary, ReviewAggregator, DEFAULT_TOP_GOALS_LIMIT,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
