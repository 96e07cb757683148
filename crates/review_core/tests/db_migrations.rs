use review_core::db::migrations::{latest_version, Schema};
use review_core::db::{
    open_directory_db, open_directory_db_in_memory, open_document_db,
    open_document_db_in_memory, DbError,
};
use rusqlite::Connection;

#[test]
fn directory_db_in_memory_applies_all_migrations() {
    let conn = open_directory_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version(Schema::Directory));
    assert_table_exists(&conn, "employees");
    assert_table_exists(&conn, "projects");
    assert_table_exists(&conn, "employee_projects");
    assert_table_missing(&conn, "documents");
}

#[test]
fn document_db_in_memory_applies_all_migrations() {
    let conn = open_document_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version(Schema::Documents));
    assert_table_exists(&conn, "documents");
    assert_table_exists(&conn, "sequences");
    assert_table_missing(&conn, "employees");
}

#[test]
fn opening_same_databases_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let directory_path = dir.path().join("company.db");
    let document_path = dir.path().join("reviews.db");

    drop(open_directory_db(&directory_path).unwrap());
    drop(open_document_db(&document_path).unwrap());

    let directory = open_directory_db(&directory_path).unwrap();
    let documents = open_document_db(&document_path).unwrap();
    assert_eq!(schema_version(&directory), latest_version(Schema::Directory));
    assert_eq!(schema_version(&documents), latest_version(Schema::Documents));
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_document_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version(Schema::Documents));
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn table_exists(conn: &Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    exists == 1
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert!(table_exists(conn, table_name), "table {table_name} does not exist");
}

fn assert_table_missing(conn: &Connection, table_name: &str) {
    assert!(!table_exists(conn, table_name), "table {table_name} should not exist");
}
