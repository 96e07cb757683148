//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open both configured stores and print a short review summary.
//! - Keep output deterministic for quick local sanity checks.

use review_core::db::{open_directory_db, open_document_db};
use review_core::{
    init_logging_from_config, ReviewAggregator, ReviewRepository, SqliteDocumentStore,
    SqliteEmployeeDirectory, StoreConfig, DEFAULT_TOP_GOALS_LIMIT,
};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("review_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = StoreConfig::from_env()?;
    init_logging_from_config(&config)?;

    let directory_conn = open_directory_db(&config.directory_db_path)?;
    let document_conn = open_document_db(&config.document_db_path)?;
    let repo = ReviewRepository::new(
        SqliteEmployeeDirectory::new(&directory_conn),
        SqliteDocumentStore::new(&document_conn, config.collection.as_str()),
    );
    let aggregator = ReviewAggregator::new(&repo);

    println!("review_core version={}", review_core::core_version());
    println!("collection={}", config.collection);
    println!("reviews={}", repo.count()?);
    for entry in aggregator.top_goals(DEFAULT_TOP_GOALS_LIMIT)? {
        println!("goal count={} value={}", entry.count, entry.value);
    }
    log::info!("event=cli_summary module=cli status=ok");
    Ok(())
}
