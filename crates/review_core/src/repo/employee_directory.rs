//! Employee directory boundary.
//!
//! # Responsibility
//! - Answer whether an employee identifier exists in the relational store.
//!
//! # Invariants
//! - The review core only reads the directory; it never creates, renames or
//!   deletes employee rows.
//! - Existence is checked, not enforced: the directory and the document store
//!   share no transaction, so an employee may disappear between the check and
//!   a review insert.

use crate::db::DbError;
use crate::model::review::EmployeeId;
use rusqlite::{Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Directory lookup failure.
#[derive(Debug)]
pub enum DirectoryError {
    Db(DbError),
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "employee directory unavailable: {err}"),
        }
    }
}

impl Error for DirectoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for DirectoryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Read-only view of valid employee identifiers.
pub trait EmployeeDirectory {
    fn exists(&self, employee_id: EmployeeId) -> DirectoryResult<bool>;
}

impl<T: EmployeeDirectory + ?Sized> EmployeeDirectory for &T {
    fn exists(&self, employee_id: EmployeeId) -> DirectoryResult<bool> {
        (**self).exists(employee_id)
    }
}

/// SQLite-backed directory over the `employees` table.
pub struct SqliteEmployeeDirectory<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEmployeeDirectory<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EmployeeDirectory for SqliteEmployeeDirectory<'_> {
    fn exists(&self, employee_id: EmployeeId) -> DirectoryResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM employees WHERE employee_id = ?1;",
                [employee_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
