//! Schemaless document store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist arbitrarily shaped JSON documents in a named collection, keyed
//!   by an opaque `_id` and an application `review_number`.
//! - Push filters and sort keys down to SQLite JSON1 functions.
//! - Own named sequence counters used to allocate review numbers.
//!
//! # Invariants
//! - `_id` is assigned by the store at insert time and never changes.
//! - `review_number` is unique within a collection.
//! - Partial updates only touch the named top-level fields.
//! - Connections come from `open_document_db*`, which registers the
//!   `unicode_lower` function used by case-insensitive filters.
//! - Sequence counters advance even when the following insert fails; gaps
//!   are possible.

use crate::db::{DbError, UNICODE_LOWER_FUNCTION};
use crate::model::review::{DocumentId, ReviewNumber, FIELD_ID};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::Value as JsonValue;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// One schemaless record body.
pub type Document = serde_json::Map<String, JsonValue>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Document store failure.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Encode(serde_json::Error),
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "failed to encode document: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted document: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Document as returned by store reads.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub review_number: ReviewNumber,
    /// Full body, including `_id`.
    pub body: Document,
}

/// Filter condition over one top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals { field: String, value: Value },
    /// Case-insensitive substring match on a text field.
    ContainsIgnoreCase { field: String, needle: String },
    /// Inclusive on both bounds.
    Between { field: String, low: Value, high: Value },
}

impl Condition {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn contains_ignore_case(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::ContainsIgnoreCase {
            field: field.into(),
            needle: needle.into(),
        }
    }

    pub fn between(
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::Between {
            field: field.into(),
            low: low.into(),
            high: high.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortField {
    /// Top-level body field.
    Body(String),
    ReviewNumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

/// Filter, sort and limit options for `DocumentStore::find`.
///
/// Without sort keys, documents come back in `review_number` order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub conditions: Vec<Condition>,
    pub sort: Vec<SortKey>,
    pub limit: Option<u32>,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn sort_asc(mut self, field: SortField) -> Self {
        self.sort.push(SortKey {
            field,
            descending: false,
        });
        self
    }

    pub fn sort_desc(mut self, field: SortField) -> Self {
        self.sort.push(SortKey {
            field,
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Operations the review repository needs from a document store.
pub trait DocumentStore {
    /// Advances the named counter and returns its new value (first call: 1).
    fn next_sequence(&self, name: &str) -> StoreResult<u64>;
    /// Inserts one document and returns the assigned `_id`.
    fn insert_one(&self, review_number: ReviewNumber, body: &Document) -> StoreResult<DocumentId>;
    fn find(&self, query: &DocumentQuery) -> StoreResult<Vec<StoredDocument>>;
    fn find_one_by_number(
        &self,
        review_number: ReviewNumber,
    ) -> StoreResult<Option<StoredDocument>>;
    /// Sets and removes top-level fields. Returns `false` when `id` is absent.
    fn update_fields(
        &self,
        id: DocumentId,
        set: &Document,
        unset: &[String],
    ) -> StoreResult<bool>;
    /// Returns `false` when `id` is absent.
    fn delete_one(&self, id: DocumentId) -> StoreResult<bool>;
    fn count(&self, conditions: &[Condition]) -> StoreResult<u64>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for &T {
    fn next_sequence(&self, name: &str) -> StoreResult<u64> {
        (**self).next_sequence(name)
    }

    fn insert_one(&self, review_number: ReviewNumber, body: &Document) -> StoreResult<DocumentId> {
        (**self).insert_one(review_number, body)
    }

    fn find(&self, query: &DocumentQuery) -> StoreResult<Vec<StoredDocument>> {
        (**self).find(query)
    }

    fn find_one_by_number(
        &self,
        review_number: ReviewNumber,
    ) -> StoreResult<Option<StoredDocument>> {
        (**self).find_one_by_number(review_number)
    }

    fn update_fields(
        &self,
        id: DocumentId,
        set: &Document,
        unset: &[String],
    ) -> StoreResult<bool> {
        (**self).update_fields(id, set, unset)
    }

    fn delete_one(&self, id: DocumentId) -> StoreResult<bool> {
        (**self).delete_one(id)
    }

    fn count(&self, conditions: &[Condition]) -> StoreResult<u64> {
        (**self).count(conditions)
    }
}

const DOCUMENT_SELECT_SQL: &str = "SELECT object_id, review_number, body FROM documents";

/// SQLite-backed document collection.
pub struct SqliteDocumentStore<'conn> {
    conn: &'conn Connection,
    collection: String,
}

impl<'conn> SqliteDocumentStore<'conn> {
    pub fn new(conn: &'conn Connection, collection: impl Into<String>) -> Self {
        Self {
            conn,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl DocumentStore for SqliteDocumentStore<'_> {
    fn next_sequence(&self, name: &str) -> StoreResult<u64> {
        let value: i64 = self.conn.query_row(
            "INSERT INTO sequences (name, value) VALUES (?1, 1)
             ON CONFLICT(name) DO UPDATE SET value = value + 1
             RETURNING value;",
            [format!("{}:{name}", self.collection)],
            |row| row.get(0),
        )?;
        u64::try_from(value)
            .map_err(|_| StoreError::InvalidData(format!("negative sequence value `{value}`")))
    }

    fn insert_one(&self, review_number: ReviewNumber, body: &Document) -> StoreResult<DocumentId> {
        let id = Uuid::new_v4();
        let mut body = body.clone();
        body.insert(FIELD_ID.to_string(), JsonValue::String(id.to_string()));

        self.conn.execute(
            "INSERT INTO documents (object_id, collection, review_number, body)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                id.to_string(),
                self.collection.as_str(),
                number_to_db(review_number)?,
                serde_json::to_string(&body)?,
            ],
        )?;

        Ok(id)
    }

    fn find(&self, query: &DocumentQuery) -> StoreResult<Vec<StoredDocument>> {
        let mut sql = format!("{DOCUMENT_SELECT_SQL} WHERE collection = ?");
        let mut bind_values = vec![Value::Text(self.collection.clone())];
        push_conditions(&mut sql, &mut bind_values, &query.conditions);

        let mut order_terms = Vec::with_capacity(query.sort.len() + 1);
        for key in &query.sort {
            let direction = if key.descending { "DESC" } else { "ASC" };
            match &key.field {
                SortField::Body(field) => {
                    order_terms.push(format!("json_extract(body, ?) {direction}"));
                    bind_values.push(Value::Text(json_path(field)));
                }
                SortField::ReviewNumber => order_terms.push(format!("review_number {direction}")),
            }
        }
        if !query
            .sort
            .iter()
            .any(|key| key.field == SortField::ReviewNumber)
        {
            order_terms.push("review_number ASC".to_string());
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_terms.join(", "));

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_document_row(row)?);
        }

        Ok(documents)
    }

    fn find_one_by_number(
        &self,
        review_number: ReviewNumber,
    ) -> StoreResult<Option<StoredDocument>> {
        let mut stmt = self.conn.prepare(&format!(
            "{DOCUMENT_SELECT_SQL} WHERE collection = ?1 AND review_number = ?2;"
        ))?;
        let mut rows = stmt.query(params![
            self.collection.as_str(),
            number_to_db(review_number)?
        ])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_document_row(row)?));
        }

        Ok(None)
    }

    fn update_fields(
        &self,
        id: DocumentId,
        set: &Document,
        unset: &[String],
    ) -> StoreResult<bool> {
        let mut expression = String::from("body");
        let mut bind_values = Vec::new();

        if !set.is_empty() {
            let mut call = format!("json_set({expression}");
            for (field, value) in set {
                call.push_str(", ?, json(?)");
                bind_values.push(Value::Text(json_path(field)));
                bind_values.push(Value::Text(serde_json::to_string(value)?));
            }
            call.push(')');
            expression = call;
        }

        if !unset.is_empty() {
            let mut call = format!("json_remove({expression}");
            for field in unset {
                call.push_str(", ?");
                bind_values.push(Value::Text(json_path(field)));
            }
            call.push(')');
            expression = call;
        }

        bind_values.push(Value::Text(self.collection.clone()));
        bind_values.push(Value::Text(id.to_string()));
        let changed = self.conn.execute(
            &format!(
                "UPDATE documents SET body = {expression} WHERE collection = ? AND object_id = ?;"
            ),
            params_from_iter(bind_values),
        )?;

        Ok(changed > 0)
    }

    fn delete_one(&self, id: DocumentId) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND object_id = ?2;",
            params![self.collection.as_str(), id.to_string()],
        )?;

        Ok(changed > 0)
    }

    fn count(&self, conditions: &[Condition]) -> StoreResult<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM documents WHERE collection = ?");
        let mut bind_values = vec![Value::Text(self.collection.clone())];
        push_conditions(&mut sql, &mut bind_values, conditions);

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| StoreError::InvalidData(format!("negative document count `{count}`")))
    }
}

fn push_conditions(sql: &mut String, bind_values: &mut Vec<Value>, conditions: &[Condition]) {
    for condition in conditions {
        match condition {
            Condition::Equals { field, value } => {
                sql.push_str(" AND json_extract(body, ?) = ?");
                bind_values.push(Value::Text(json_path(field)));
                bind_values.push(value.clone());
            }
            Condition::ContainsIgnoreCase { field, needle } => {
                sql.push_str(&format!(
                    " AND instr({UNICODE_LOWER_FUNCTION}(json_extract(body, ?)), {UNICODE_LOWER_FUNCTION}(?)) > 0"
                ));
                bind_values.push(Value::Text(json_path(field)));
                bind_values.push(Value::Text(needle.clone()));
            }
            Condition::Between { field, low, high } => {
                sql.push_str(" AND json_extract(body, ?) BETWEEN ? AND ?");
                bind_values.push(Value::Text(json_path(field)));
                bind_values.push(low.clone());
                bind_values.push(high.clone());
            }
        }
    }
}

/// Quoted JSON path for one top-level field, e.g. `$."review_date"`.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

fn number_to_db(review_number: ReviewNumber) -> StoreResult<i64> {
    i64::try_from(review_number).map_err(|_| {
        StoreError::InvalidData(format!("review number `{review_number}` exceeds i64 range"))
    })
}

fn parse_document_row(row: &Row<'_>) -> StoreResult<StoredDocument> {
    let id_text: String = row.get("object_id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid object id `{id_text}` in documents.object_id"))
    })?;

    let number: i64 = row.get("review_number")?;
    let review_number = ReviewNumber::try_from(number).map_err(|_| {
        StoreError::InvalidData(format!(
            "invalid review number `{number}` in documents.review_number"
        ))
    })?;

    let body_text: String = row.get("body")?;
    let body = match serde_json::from_str::<JsonValue>(&body_text) {
        Ok(JsonValue::Object(body)) => body,
        Ok(_) | Err(_) => {
            return Err(StoreError::InvalidData(format!(
                "document `{id_text}` body is not a JSON object"
            )));
        }
    };

    Ok(StoredDocument {
        id,
        review_number,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::json_path;

    #[test]
    fn json_path_quotes_field_names() {
        assert_eq!(json_path("review_date"), "$.\"review_date\"");
        assert_eq!(json_path("team size"), "$.\"team size\"");
    }
}
