//! Review repository: validation, CRUD and cross-store consistency checks.
//!
//! # Responsibility
//! - Validate review submissions and patches, including the employee
//!   existence check against the directory.
//! - Allocate review numbers and persist review documents.
//! - Provide the filtered and sorted read paths used by callers and the
//!   aggregator.
//!
//! # Invariants
//! - Nothing is written unless every validation step passed.
//! - Validation order on submit: employee, rating, date, reviewer, extensions.
//! - `created_at`, `_id` and `review_number` are never modified by updates.
//! - A review number is consumed by every insert attempt that reaches the
//!   store; a failed insert leaves a gap in the sequence.
//! - The employee check and the insert are not atomic. An employee removed
//!   from the directory in between still gets the review.

use crate::clock::{Clock, SystemClock};
use crate::model::review::{
    normalize_extensions, normalize_text, validate_extension_key, validate_extensions,
    validate_rating, validate_review_date, validate_reviewer_name, DocumentId, EmployeeId,
    ReviewCandidate, ReviewDocument, ReviewNumber, ReviewPatch, ReviewValidationError,
    StandardField, FIELD_CREATED_AT, FIELD_EMPLOYEE_ID, FIELD_EXTENSIONS, FIELD_ID,
    FIELD_OVERALL_RATING, FIELD_REVIEWER_NAME, FIELD_REVIEW_DATE,
};
use crate::repo::document_store::{
    Condition, Document, DocumentQuery, DocumentStore, SortField, StoreError, StoredDocument,
};
use crate::repo::employee_directory::{DirectoryError, EmployeeDirectory};
use chrono::NaiveDate;
use log::{error, info, warn};
use rusqlite::types::Value;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Counter name used for review number allocation.
pub const REVIEW_NUMBER_SEQUENCE: &str = "review_number";

pub type ReviewResult<T> = Result<T, ReviewError>;

/// Caller-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewErrorKind {
    UnknownEmployee,
    RatingOutOfRange,
    InvalidDate,
    MissingField,
    InvalidExtension,
    InvalidRange,
    NotFound,
    NoReviews,
    StoreUnavailable,
}

impl ReviewErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownEmployee => "unknown_employee",
            Self::RatingOutOfRange => "rating_out_of_range",
            Self::InvalidDate => "invalid_date",
            Self::MissingField => "missing_field",
            Self::InvalidExtension => "invalid_extension",
            Self::InvalidRange => "invalid_range",
            Self::NotFound => "not_found",
            Self::NoReviews => "no_reviews",
            Self::StoreUnavailable => "store_unavailable",
        }
    }

    /// Whether the caller can recover by correcting input.
    pub fn is_validation(self) -> bool {
        matches!(
            self,
            Self::UnknownEmployee
                | Self::RatingOutOfRange
                | Self::InvalidDate
                | Self::MissingField
                | Self::InvalidExtension
                | Self::InvalidRange
        )
    }
}

impl Display for ReviewErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review repository error. `kind()` classifies, `Display` explains.
#[derive(Debug)]
pub enum ReviewError {
    UnknownEmployee(EmployeeId),
    Validation(ReviewValidationError),
    InvalidRange { start: NaiveDate, end: NaiveDate },
    NotFound(ReviewNumber),
    NoReviews(EmployeeId),
    DirectoryUnavailable(DirectoryError),
    StoreUnavailable(StoreError),
}

impl ReviewError {
    pub fn kind(&self) -> ReviewErrorKind {
        match self {
            Self::UnknownEmployee(_) => ReviewErrorKind::UnknownEmployee,
            Self::Validation(err) => match err {
                ReviewValidationError::RatingOutOfRange(_) => ReviewErrorKind::RatingOutOfRange,
                ReviewValidationError::FutureReviewDate { .. }
                | ReviewValidationError::UnparseableReviewDate(_) => ReviewErrorKind::InvalidDate,
                ReviewValidationError::MissingField(_) => ReviewErrorKind::MissingField,
                ReviewValidationError::ReservedExtensionKey(_)
                | ReviewValidationError::InvalidExtensionKey(_)
                | ReviewValidationError::NonFiniteExtensionNumber(_) => {
                    ReviewErrorKind::InvalidExtension
                }
            },
            Self::InvalidRange { .. } => ReviewErrorKind::InvalidRange,
            Self::NotFound(_) => ReviewErrorKind::NotFound,
            Self::NoReviews(_) => ReviewErrorKind::NoReviews,
            Self::DirectoryUnavailable(_) | Self::StoreUnavailable(_) => {
                ReviewErrorKind::StoreUnavailable
            }
        }
    }
}

impl Display for ReviewError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEmployee(id) => write!(f, "employee {id} does not exist"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidRange { start, end } => {
                write!(f, "start date {start} is after end date {end}")
            }
            Self::NotFound(number) => write!(f, "review {number} not found"),
            Self::NoReviews(id) => write!(f, "no reviews found for employee {id}"),
            Self::DirectoryUnavailable(err) => write!(f, "{err}"),
            Self::StoreUnavailable(err) => write!(f, "review store unavailable: {err}"),
        }
    }
}

impl Error for ReviewError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::DirectoryUnavailable(err) => Some(err),
            Self::StoreUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ReviewValidationError> for ReviewError {
    fn from(value: ReviewValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DirectoryError> for ReviewError {
    fn from(value: DirectoryError) -> Self {
        Self::DirectoryUnavailable(value)
    }
}

impl From<StoreError> for ReviewError {
    fn from(value: StoreError) -> Self {
        Self::StoreUnavailable(value)
    }
}

/// Identifiers assigned to a newly submitted review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewReceipt {
    pub id: DocumentId,
    pub review_number: ReviewNumber,
}

/// Review repository over an employee directory and a document store.
pub struct ReviewRepository<D, S, C = SystemClock> {
    directory: D,
    store: S,
    clock: C,
}

impl<D: EmployeeDirectory, S: DocumentStore> ReviewRepository<D, S> {
    pub fn new(directory: D, store: S) -> Self {
        Self::with_clock(directory, store, SystemClock)
    }
}

impl<D: EmployeeDirectory, S: DocumentStore, C: Clock> ReviewRepository<D, S, C> {
    pub fn with_clock(directory: D, store: S, clock: C) -> Self {
        Self {
            directory,
            store,
            clock,
        }
    }

    /// Validates and persists a new review.
    ///
    /// # Errors
    /// - `UnknownEmployee`, `RatingOutOfRange`, `InvalidDate`, `MissingField`,
    ///   `InvalidExtension` for rejected input; nothing is written.
    /// - `StoreUnavailable` when either backing store fails.
    pub fn submit(&self, candidate: ReviewCandidate) -> ReviewResult<ReviewReceipt> {
        if let Err(err) = self.validate_candidate(&candidate) {
            log_rejected("review_submit", &err);
            return Err(err);
        }

        let review_number = self.store.next_sequence(REVIEW_NUMBER_SEQUENCE)?;
        let document =
            ReviewDocument::from_candidate(Uuid::nil(), review_number, candidate, self.clock.now());
        let mut body = encode_document(&document)?;
        // The store assigns `_id`.
        body.remove(FIELD_ID);

        let id = match self.store.insert_one(review_number, &body) {
            Ok(id) => id,
            Err(err) => {
                error!(
                    "event=review_submit module=review status=error review_number={} error_code=insert_failed error={}",
                    review_number, err
                );
                return Err(err.into());
            }
        };

        info!(
            "event=review_submit module=review status=ok review_number={} employee_id={}",
            review_number, document.employee_id
        );
        Ok(ReviewReceipt { id, review_number })
    }

    /// Gets one review by number.
    pub fn get(&self, review_number: ReviewNumber) -> ReviewResult<ReviewDocument> {
        let stored = self
            .store
            .find_one_by_number(review_number)?
            .ok_or(ReviewError::NotFound(review_number))?;
        decode_document(stored)
    }

    /// Lists an employee's reviews by `review_date` then review number.
    ///
    /// Unknown employees and employees without reviews both yield an empty list.
    pub fn get_for_employee(&self, employee_id: EmployeeId) -> ReviewResult<Vec<ReviewDocument>> {
        self.find(
            DocumentQuery::new()
                .filter(employee_condition(employee_id))
                .sort_asc(SortField::Body(FIELD_REVIEW_DATE.to_string()))
                .sort_asc(SortField::ReviewNumber),
        )
    }

    /// Number of reviews in the collection.
    pub fn count(&self) -> ReviewResult<u64> {
        Ok(self.store.count(&[])?)
    }

    pub fn count_for_employee(&self, employee_id: EmployeeId) -> ReviewResult<u64> {
        Ok(self.store.count(&[employee_condition(employee_id)])?)
    }

    /// Unweighted mean of an employee's ratings, rounded to three decimals.
    pub fn average_rating(&self, employee_id: EmployeeId) -> ReviewResult<f64> {
        let reviews = self.get_for_employee(employee_id)?;
        if reviews.is_empty() {
            return Err(ReviewError::NoReviews(employee_id));
        }

        let total: f64 = reviews.iter().map(|review| review.overall_rating).sum();
        Ok(round_rating(total / reviews.len() as f64))
    }

    /// Applies the named fields of `patch` and returns the updated review.
    ///
    /// # Contract
    /// - Unnamed fields, including unnamed extension entries, are preserved.
    /// - Touched required fields are re-validated with the submit rules.
    /// - An empty patch changes nothing.
    pub fn update(
        &self,
        review_number: ReviewNumber,
        patch: &ReviewPatch,
    ) -> ReviewResult<ReviewDocument> {
        let current = self.get(review_number)?;
        if patch.is_empty() {
            return Ok(current);
        }

        if let Err(err) = self.validate_patch(patch) {
            log_rejected("review_update", &err);
            return Err(err);
        }

        let (set, unset) = build_update(&current, patch)?;
        if !self.store.update_fields(current.id, &set, &unset)? {
            return Err(ReviewError::NotFound(review_number));
        }

        info!(
            "event=review_update module=review status=ok review_number={} fields_set={} fields_unset={}",
            review_number,
            set.len(),
            unset.len()
        );
        self.get(review_number)
    }

    /// Permanently removes a review.
    ///
    /// Deleting the same number twice fails with `NotFound` the second time.
    pub fn delete(&self, review_number: ReviewNumber) -> ReviewResult<()> {
        let stored = self
            .store
            .find_one_by_number(review_number)?
            .ok_or(ReviewError::NotFound(review_number))?;
        if !self.store.delete_one(stored.id)? {
            return Err(ReviewError::NotFound(review_number));
        }

        info!(
            "event=review_delete module=review status=ok review_number={}",
            review_number
        );
        Ok(())
    }

    /// Most recently created reviews first.
    pub fn recent(&self, limit: u32) -> ReviewResult<Vec<ReviewDocument>> {
        self.find(
            DocumentQuery::new()
                .sort_desc(SortField::Body(FIELD_CREATED_AT.to_string()))
                .sort_desc(SortField::ReviewNumber)
                .limit(limit),
        )
    }

    /// Reviews whose reviewer name contains `name`, ignoring case.
    pub fn by_reviewer(&self, name: &str) -> ReviewResult<Vec<ReviewDocument>> {
        validate_reviewer_name(name)?;
        self.find(
            newest_review_date_first()
                .filter(Condition::contains_ignore_case(FIELD_REVIEWER_NAME, name.trim())),
        )
    }

    /// Reviews dated within `[start, end]`.
    pub fn by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ReviewResult<Vec<ReviewDocument>> {
        if start > end {
            return Err(ReviewError::InvalidRange { start, end });
        }
        self.find(newest_review_date_first().filter(Condition::between(
            FIELD_REVIEW_DATE,
            start.to_string(),
            end.to_string(),
        )))
    }

    /// Every review, newest `review_date` first.
    pub fn all(&self, limit: Option<u32>) -> ReviewResult<Vec<ReviewDocument>> {
        let mut query = newest_review_date_first();
        query.limit = limit;
        self.find(query)
    }

    /// Every review in review-number order.
    pub fn scan(&self) -> ReviewResult<Vec<ReviewDocument>> {
        self.find(DocumentQuery::new())
    }

    fn find(&self, query: DocumentQuery) -> ReviewResult<Vec<ReviewDocument>> {
        self.store
            .find(&query)?
            .into_iter()
            .map(decode_document)
            .collect()
    }

    fn ensure_employee_exists(&self, employee_id: EmployeeId) -> ReviewResult<()> {
        if !self.directory.exists(employee_id)? {
            return Err(ReviewError::UnknownEmployee(employee_id));
        }
        Ok(())
    }

    fn validate_candidate(&self, candidate: &ReviewCandidate) -> ReviewResult<()> {
        self.ensure_employee_exists(candidate.employee_id)?;
        validate_rating(candidate.overall_rating)?;
        validate_review_date(candidate.review_date, self.clock.today())?;
        validate_reviewer_name(&candidate.reviewer_name)?;
        validate_extensions(&candidate.extensions)?;
        Ok(())
    }

    fn validate_patch(&self, patch: &ReviewPatch) -> ReviewResult<()> {
        if let Some(employee_id) = patch.employee_id {
            self.ensure_employee_exists(employee_id)?;
        }
        if let Some(rating) = patch.overall_rating {
            validate_rating(rating)?;
        }
        if let Some(review_date) = patch.review_date {
            validate_review_date(review_date, self.clock.today())?;
        }
        if let Some(name) = patch.reviewer_name.as_deref() {
            validate_reviewer_name(name)?;
        }
        validate_extensions(&patch.set_extensions)?;
        for key in &patch.remove_extensions {
            validate_extension_key(key)?;
        }
        Ok(())
    }
}

fn employee_condition(employee_id: EmployeeId) -> Condition {
    Condition::equals(FIELD_EMPLOYEE_ID, Value::Integer(employee_id))
}

fn newest_review_date_first() -> DocumentQuery {
    DocumentQuery::new()
        .sort_desc(SortField::Body(FIELD_REVIEW_DATE.to_string()))
        .sort_desc(SortField::ReviewNumber)
}

/// Rounds a rating statistic to three decimals.
pub(crate) fn round_rating(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn log_rejected(event: &str, err: &ReviewError) {
    warn!(
        "event={} module=review status=rejected error_code={}",
        event,
        err.kind()
    );
}

fn build_update(
    current: &ReviewDocument,
    patch: &ReviewPatch,
) -> ReviewResult<(Document, Vec<String>)> {
    let mut set = Document::new();
    let mut unset = Vec::new();

    if let Some(employee_id) = patch.employee_id {
        set.insert(FIELD_EMPLOYEE_ID.to_string(), to_json(&employee_id)?);
    }
    if let Some(review_date) = patch.review_date {
        set.insert(FIELD_REVIEW_DATE.to_string(), to_json(&review_date)?);
    }
    if let Some(name) = patch.reviewer_name.as_deref() {
        set.insert(FIELD_REVIEWER_NAME.to_string(), to_json(name.trim())?);
    }
    if let Some(rating) = patch.overall_rating {
        set.insert(FIELD_OVERALL_RATING.to_string(), to_json(&rating)?);
    }

    for field in StandardField::ALL {
        let Some(value) = patch.standard_field(field) else {
            continue;
        };
        match normalize_text(Some(value.to_string())) {
            Some(text) => {
                set.insert(field.as_str().to_string(), JsonValue::String(text));
            }
            None => unset.push(field.as_str().to_string()),
        }
    }

    if !patch.set_extensions.is_empty() || !patch.remove_extensions.is_empty() {
        let mut extensions = current.extensions.clone();
        for key in &patch.remove_extensions {
            extensions.remove(key);
        }
        extensions.extend(normalize_extensions(patch.set_extensions.clone()));

        if extensions.is_empty() {
            unset.push(FIELD_EXTENSIONS.to_string());
        } else {
            set.insert(FIELD_EXTENSIONS.to_string(), to_json(&extensions)?);
        }
    }

    Ok((set, unset))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> ReviewResult<JsonValue> {
    serde_json::to_value(value).map_err(|err| StoreError::Encode(err).into())
}

fn encode_document(document: &ReviewDocument) -> ReviewResult<Document> {
    match to_json(document)? {
        JsonValue::Object(body) => Ok(body),
        _ => Err(StoreError::InvalidData("review did not encode to an object".to_string()).into()),
    }
}

fn decode_document(stored: StoredDocument) -> ReviewResult<ReviewDocument> {
    let document: ReviewDocument = serde_json::from_value(JsonValue::Object(stored.body))
        .map_err(|err| {
            StoreError::InvalidData(format!(
                "review {} does not match the review shape: {err}",
                stored.review_number
            ))
        })?;

    if document.id != stored.id || document.review_number != stored.review_number {
        return Err(StoreError::InvalidData(format!(
            "review {} body identity does not match its index columns",
            stored.review_number
        ))
        .into());
    }

    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::{round_rating, ReviewError, ReviewErrorKind};
    use crate::model::review::ReviewValidationError;

    #[test]
    fn round_rating_keeps_three_decimals() {
        assert_eq!(round_rating(4.0), 4.0);
        assert_eq!(round_rating(11.0 / 3.0), 3.667);
    }

    #[test]
    fn validation_errors_map_to_taxonomy_kinds() {
        let err = ReviewError::from(ReviewValidationError::MissingField("reviewer_name"));
        assert_eq!(err.kind(), ReviewErrorKind::MissingField);
        assert!(err.kind().is_validation());

        let err = ReviewError::from(ReviewValidationError::ReservedExtensionKey(
            "comments".to_string(),
        ));
        assert_eq!(err.kind(), ReviewErrorKind::InvalidExtension);

        assert!(!ReviewErrorKind::NotFound.is_validation());
        assert_eq!(ReviewErrorKind::StoreUnavailable.as_str(), "store_unavailable");
    }
}
