//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory connections for the directory and document stores.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have their store's migrations fully applied.
//! - Document store connections expose `unicode_lower(text)`.

use super::migrations::{apply_migrations, Schema};
use super::{DbResult, UNICODE_LOWER_FUNCTION};
use log::{error, info};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens the employee directory database file and applies pending migrations.
pub fn open_directory_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with(Schema::Directory, "file", || Connection::open(path))
}

/// Opens an in-memory employee directory database.
pub fn open_directory_db_in_memory() -> DbResult<Connection> {
    open_with(Schema::Directory, "memory", Connection::open_in_memory)
}

/// Opens the review document database file and applies pending migrations.
///
/// # Side effects
/// - Performs connection bootstrap and migration checks.
/// - Emits `db_open` logging events with duration and status.
pub fn open_document_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with(Schema::Documents, "file", || Connection::open(path))
}

/// Opens an in-memory review document database.
pub fn open_document_db_in_memory() -> DbResult<Connection> {
    open_with(Schema::Documents, "memory", Connection::open_in_memory)
}

fn open_with(
    schema: Schema,
    mode: &str,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let store = schema.name();
    info!("event=db_open module=db status=start store={store} mode={mode}");

    let mut conn = match connect() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error store={store} mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, schema) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok store={store} mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error store={store} mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, schema: Schema) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    if schema == Schema::Documents {
        register_unicode_lower(conn)?;
    }
    apply_migrations(conn, schema)?;
    Ok(())
}

/// SQLite's built-in `lower()` folds ASCII letters only.
fn register_unicode_lower(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        UNICODE_LOWER_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            Ok(match ctx.get_raw(0) {
                ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).to_lowercase()),
                _ => None,
            })
        },
    )
}
