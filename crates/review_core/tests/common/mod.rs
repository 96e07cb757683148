#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use review_core::db::{open_directory_db_in_memory, open_document_db_in_memory};
use review_core::{
    Clock, ReviewCandidate, ReviewRepository, SqliteDocumentStore, SqliteEmployeeDirectory,
};
use rusqlite::{params, Connection};
use std::cell::Cell;

pub const COLLECTION: &str = "reviews";

/// Fixed "today"; `now` advances one second per call.
pub struct TestClock {
    today: NaiveDate,
    base: DateTime<Utc>,
    ticks: Cell<i64>,
}

impl TestClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            base: Utc.with_ymd_and_hms(2024, 6, 30, 9, 0, 0).unwrap(),
            ticks: Cell::new(0),
        }
    }
}

impl Clock for TestClock {
    fn today(&self) -> NaiveDate {
        self.today
    }

    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.get();
        self.ticks.set(tick + 1);
        self.base + Duration::seconds(tick)
    }
}

pub type TestRepository<'a> =
    ReviewRepository<SqliteEmployeeDirectory<'a>, SqliteDocumentStore<'a>, &'a TestClock>;

/// Two independent in-memory stores plus a deterministic clock.
///
/// Employees 1, 2 and 3 exist in the directory.
pub struct Fixture {
    pub directory: Connection,
    pub documents: Connection,
    pub clock: TestClock,
}

impl Fixture {
    pub fn new() -> Self {
        let fixture = Self {
            directory: open_directory_db_in_memory().unwrap(),
            documents: open_document_db_in_memory().unwrap(),
            clock: TestClock::new(date("2024-06-30")),
        };
        for (first, last) in [("Ada", "Lovelace"), ("Grace", "Hopper"), ("Alan", "Turing")] {
            fixture.add_employee(first, last);
        }
        fixture
    }

    pub fn repo(&self) -> TestRepository<'_> {
        ReviewRepository::with_clock(
            SqliteEmployeeDirectory::new(&self.directory),
            SqliteDocumentStore::new(&self.documents, COLLECTION),
            &self.clock,
        )
    }

    pub fn add_employee(&self, first: &str, last: &str) -> i64 {
        self.directory
            .execute(
                "INSERT INTO employees (first_name, last_name, email, hire_date)
                 VALUES (?1, ?2, ?3, '2020-01-01');",
                params![
                    first,
                    last,
                    format!("{}.{}@example.com", first, last).to_lowercase()
                ],
            )
            .unwrap();
        self.directory.last_insert_rowid()
    }

    pub fn document_count(&self) -> i64 {
        self.documents
            .query_row("SELECT COUNT(*) FROM documents;", [], |row| row.get(0))
            .unwrap()
    }
}

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

pub fn candidate(employee_id: i64, review_date: &str, reviewer: &str, rating: f64) -> ReviewCandidate {
    ReviewCandidate::new(employee_id, date(review_date), reviewer, rating)
}
