//! Review document model.
//!
//! # Responsibility
//! - Define the persisted review document, submission candidates and
//!   partial-update patches.
//! - Provide the field validation helpers used by submit and update paths.
//!
//! # Invariants
//! - `overall_rating` stays within `[MIN_RATING, MAX_RATING]`.
//! - `review_date` is never later than the validating clock's today.
//! - Extension keys never collide with required, standard or system fields.
//! - `created_at` is stored with microsecond precision so its serialized
//!   form sorts lexically.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Employee identifier issued by the employee directory.
pub type EmployeeId = i64;

/// Application-level review sequence number.
pub type ReviewNumber = u64;

/// Store-assigned opaque document identifier.
pub type DocumentId = Uuid;

/// Role-specific fields that vary between review documents.
pub type Extensions = BTreeMap<String, ExtensionValue>;

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

/// Accepted textual form of `review_date`.
pub const REVIEW_DATE_FORMAT: &str = "%Y-%m-%d";

pub const FIELD_ID: &str = "_id";
pub const FIELD_REVIEW_NUMBER: &str = "review_number";
pub const FIELD_EMPLOYEE_ID: &str = "employee_id";
pub const FIELD_REVIEW_DATE: &str = "review_date";
pub const FIELD_REVIEWER_NAME: &str = "reviewer_name";
pub const FIELD_OVERALL_RATING: &str = "overall_rating";
pub const FIELD_EXTENSIONS: &str = "extensions";
pub const FIELD_CREATED_AT: &str = "created_at";

/// Field names an extension key may never take.
pub const RESERVED_FIELDS: &[&str] = &[
    FIELD_ID,
    FIELD_REVIEW_NUMBER,
    FIELD_EMPLOYEE_ID,
    FIELD_REVIEW_DATE,
    FIELD_REVIEWER_NAME,
    FIELD_OVERALL_RATING,
    "strengths",
    "areas_for_improvement",
    "comments",
    "goals_for_next_period",
    FIELD_EXTENSIONS,
    FIELD_CREATED_AT,
];

// No `$` prefix, no `.`, no control characters.
static EXTENSION_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^$.\p{Cc}][^.\p{Cc}]*$").expect("valid extension key regex"));

/// Optional free-text fields every review may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardField {
    Strengths,
    AreasForImprovement,
    Comments,
    GoalsForNextPeriod,
}

impl StandardField {
    pub const ALL: [Self; 4] = [
        Self::Strengths,
        Self::AreasForImprovement,
        Self::Comments,
        Self::GoalsForNextPeriod,
    ];

    /// Persisted document field name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strengths => "strengths",
            Self::AreasForImprovement => "areas_for_improvement",
            Self::Comments => "comments",
            Self::GoalsForNextPeriod => "goals_for_next_period",
        }
    }
}

/// Value of one extension attribute.
///
/// Mirrors the native value types of the document store. Integers are tried
/// before reals so whole numbers keep their integer form on read-back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    List(Vec<ExtensionValue>),
    Map(BTreeMap<String, ExtensionValue>),
}

impl ExtensionValue {
    /// Returns the text payload, or `None` for non-text values.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    fn normalized(self) -> Self {
        match self {
            Self::Text(value) => Self::Text(value.trim().to_string()),
            Self::List(items) => Self::List(items.into_iter().map(Self::normalized).collect()),
            Self::Map(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, value.normalized()))
                    .collect(),
            ),
            other => other,
        }
    }
}

impl From<&str> for ExtensionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ExtensionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ExtensionValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ExtensionValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ExtensionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<ExtensionValue>> From<Vec<T>> for ExtensionValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

/// Persisted review document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDocument {
    /// Opaque store identifier.
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub review_number: ReviewNumber,
    pub employee_id: EmployeeId,
    pub review_date: NaiveDate,
    pub reviewer_name: String,
    pub overall_rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strengths: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub areas_for_improvement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals_for_next_period: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: Extensions,
    /// Set once at insertion.
    #[serde(with = "created_at_format")]
    pub created_at: DateTime<Utc>,
}

impl ReviewDocument {
    /// Builds the document persisted for a validated candidate.
    pub fn from_candidate(
        id: DocumentId,
        review_number: ReviewNumber,
        candidate: ReviewCandidate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            review_number,
            employee_id: candidate.employee_id,
            review_date: candidate.review_date,
            reviewer_name: candidate.reviewer_name.trim().to_string(),
            overall_rating: candidate.overall_rating,
            strengths: normalize_text(candidate.strengths),
            areas_for_improvement: normalize_text(candidate.areas_for_improvement),
            comments: normalize_text(candidate.comments),
            goals_for_next_period: normalize_text(candidate.goals_for_next_period),
            extensions: normalize_extensions(candidate.extensions),
            created_at,
        }
    }

    pub fn standard_field(&self, field: StandardField) -> Option<&str> {
        let value = match field {
            StandardField::Strengths => &self.strengths,
            StandardField::AreasForImprovement => &self.areas_for_improvement,
            StandardField::Comments => &self.comments,
            StandardField::GoalsForNextPeriod => &self.goals_for_next_period,
        };
        value.as_deref()
    }

    pub fn extension(&self, key: &str) -> Option<&ExtensionValue> {
        self.extensions.get(key)
    }
}

/// Fully-formed submission input.
///
/// Interactive collection of missing values is a caller concern; this type
/// always carries every required attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewCandidate {
    pub employee_id: EmployeeId,
    pub review_date: NaiveDate,
    pub reviewer_name: String,
    pub overall_rating: f64,
    pub strengths: Option<String>,
    pub areas_for_improvement: Option<String>,
    pub comments: Option<String>,
    pub goals_for_next_period: Option<String>,
    pub extensions: Extensions,
}

impl ReviewCandidate {
    pub fn new(
        employee_id: EmployeeId,
        review_date: NaiveDate,
        reviewer_name: impl Into<String>,
        overall_rating: f64,
    ) -> Self {
        Self {
            employee_id,
            review_date,
            reviewer_name: reviewer_name.into(),
            overall_rating,
            strengths: None,
            areas_for_improvement: None,
            comments: None,
            goals_for_next_period: None,
            extensions: Extensions::new(),
        }
    }

    pub fn with_standard(mut self, field: StandardField, value: impl Into<String>) -> Self {
        let value = Some(value.into());
        match field {
            StandardField::Strengths => self.strengths = value,
            StandardField::AreasForImprovement => self.areas_for_improvement = value,
            StandardField::Comments => self.comments = value,
            StandardField::GoalsForNextPeriod => self.goals_for_next_period = value,
        }
        self
    }

    pub fn with_extension(
        mut self,
        key: impl Into<String>,
        value: impl Into<ExtensionValue>,
    ) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }
}

/// Partial update for an existing review.
///
/// `None` leaves the field untouched. A standard text field set to a blank
/// string is removed from the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewPatch {
    pub employee_id: Option<EmployeeId>,
    pub review_date: Option<NaiveDate>,
    pub reviewer_name: Option<String>,
    pub overall_rating: Option<f64>,
    pub strengths: Option<String>,
    pub areas_for_improvement: Option<String>,
    pub comments: Option<String>,
    pub goals_for_next_period: Option<String>,
    /// Extension entries to insert or replace.
    pub set_extensions: Extensions,
    /// Extension keys to remove.
    pub remove_extensions: Vec<String>,
}

impl ReviewPatch {
    pub fn is_empty(&self) -> bool {
        self.employee_id.is_none()
            && self.review_date.is_none()
            && self.reviewer_name.is_none()
            && self.overall_rating.is_none()
            && StandardField::ALL
                .iter()
                .all(|field| self.standard_field(*field).is_none())
            && self.set_extensions.is_empty()
            && self.remove_extensions.is_empty()
    }

    pub fn standard_field(&self, field: StandardField) -> Option<&str> {
        let value = match field {
            StandardField::Strengths => &self.strengths,
            StandardField::AreasForImprovement => &self.areas_for_improvement,
            StandardField::Comments => &self.comments,
            StandardField::GoalsForNextPeriod => &self.goals_for_next_period,
        };
        value.as_deref()
    }

    pub fn with_standard(mut self, field: StandardField, value: impl Into<String>) -> Self {
        let value = Some(value.into());
        match field {
            StandardField::Strengths => self.strengths = value,
            StandardField::AreasForImprovement => self.areas_for_improvement = value,
            StandardField::Comments => self.comments = value,
            StandardField::GoalsForNextPeriod => self.goals_for_next_period = value,
        }
        self
    }

    pub fn with_extension(
        mut self,
        key: impl Into<String>,
        value: impl Into<ExtensionValue>,
    ) -> Self {
        self.set_extensions.insert(key.into(), value.into());
        self
    }

    pub fn without_extension(mut self, key: impl Into<String>) -> Self {
        self.remove_extensions.push(key.into());
        self
    }
}

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewValidationError {
    RatingOutOfRange(f64),
    FutureReviewDate { review_date: NaiveDate, today: NaiveDate },
    UnparseableReviewDate(String),
    MissingField(&'static str),
    ReservedExtensionKey(String),
    InvalidExtensionKey(String),
    NonFiniteExtensionNumber(String),
}

impl Display for ReviewValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RatingOutOfRange(rating) => write!(
                f,
                "overall rating {rating} must be between {MIN_RATING:.1} and {MAX_RATING:.1}"
            ),
            Self::FutureReviewDate { review_date, today } => write!(
                f,
                "review date {review_date} cannot be in the future (today is {today})"
            ),
            Self::UnparseableReviewDate(value) => {
                write!(f, "review date `{value}` is not a valid YYYY-MM-DD date")
            }
            Self::MissingField(field) => write!(f, "{field} must be a non-empty string"),
            Self::ReservedExtensionKey(key) => write!(
                f,
                "extension key `{key}` collides with a standard review field"
            ),
            Self::InvalidExtensionKey(key) => write!(
                f,
                "extension key `{key}` must be non-empty and contain no `.`, leading `$` or control characters"
            ),
            Self::NonFiniteExtensionNumber(path) => {
                write!(f, "extension `{path}` holds a NaN or infinite number")
            }
        }
    }
}

impl Error for ReviewValidationError {}

/// Parses a `YYYY-MM-DD` review date.
pub fn parse_review_date(value: &str) -> Result<NaiveDate, ReviewValidationError> {
    NaiveDate::parse_from_str(value.trim(), REVIEW_DATE_FORMAT)
        .map_err(|_| ReviewValidationError::UnparseableReviewDate(value.to_string()))
}

pub fn validate_rating(rating: f64) -> Result<(), ReviewValidationError> {
    // NaN fails both comparisons.
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(ReviewValidationError::RatingOutOfRange(rating))
    }
}

pub fn validate_review_date(
    review_date: NaiveDate,
    today: NaiveDate,
) -> Result<(), ReviewValidationError> {
    if review_date > today {
        return Err(ReviewValidationError::FutureReviewDate { review_date, today });
    }
    Ok(())
}

pub fn validate_reviewer_name(name: &str) -> Result<(), ReviewValidationError> {
    if name.trim().is_empty() {
        return Err(ReviewValidationError::MissingField(FIELD_REVIEWER_NAME));
    }
    Ok(())
}

pub fn validate_extension_key(key: &str) -> Result<(), ReviewValidationError> {
    if RESERVED_FIELDS.contains(&key) {
        return Err(ReviewValidationError::ReservedExtensionKey(key.to_string()));
    }
    if !EXTENSION_KEY_RE.is_match(key) {
        return Err(ReviewValidationError::InvalidExtensionKey(key.to_string()));
    }
    Ok(())
}

/// Validates keys and values of an extension map.
///
/// Standard field names are reserved at the top level only. Key syntax and
/// finite numbers are enforced at every nesting depth.
pub fn validate_extensions(extensions: &Extensions) -> Result<(), ReviewValidationError> {
    for (key, value) in extensions {
        validate_extension_key(key)?;
        validate_extension_value(key, value)?;
    }
    Ok(())
}

fn validate_extension_value(
    path: &str,
    value: &ExtensionValue,
) -> Result<(), ReviewValidationError> {
    match value {
        ExtensionValue::Number(number) if !number.is_finite() => Err(
            ReviewValidationError::NonFiniteExtensionNumber(path.to_string()),
        ),
        ExtensionValue::List(items) => items
            .iter()
            .try_for_each(|item| validate_extension_value(path, item)),
        ExtensionValue::Map(entries) => entries.iter().try_for_each(|(key, nested)| {
            let nested_path = format!("{path}.{key}");
            if !EXTENSION_KEY_RE.is_match(key) {
                return Err(ReviewValidationError::InvalidExtensionKey(nested_path));
            }
            validate_extension_value(&nested_path, nested)
        }),
        _ => Ok(()),
    }
}

/// Trims text and maps blank values to `None`.
pub fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

pub(crate) fn normalize_extensions(extensions: Extensions) -> Extensions {
    extensions
        .into_iter()
        .map(|(key, value)| (key, value.normalized()))
        .collect()
}

pub(crate) mod created_at_format {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&text)
            .map(|value| value.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        normalize_text, parse_review_date, validate_extension_key, validate_extensions,
        validate_rating, ExtensionValue, Extensions, ReviewValidationError,
    };

    #[test]
    fn rating_bounds_are_inclusive() {
        assert!(validate_rating(1.0).is_ok());
        assert!(validate_rating(5.0).is_ok());
        assert_eq!(
            validate_rating(5.01).unwrap_err(),
            ReviewValidationError::RatingOutOfRange(5.01)
        );
        assert!(validate_rating(f64::NAN).is_err());
    }

    #[test]
    fn extension_keys_reject_reserved_and_unsafe_names() {
        assert!(validate_extension_key("technical_skills").is_ok());
        assert!(validate_extension_key("team size").is_ok());
        assert!(matches!(
            validate_extension_key("overall_rating"),
            Err(ReviewValidationError::ReservedExtensionKey(_))
        ));
        for key in ["", "$set", "a.b", "tab\there"] {
            assert!(
                matches!(
                    validate_extension_key(key),
                    Err(ReviewValidationError::InvalidExtensionKey(_))
                ),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn extension_validation_checks_nested_keys_and_numbers() {
        let mut nested = Extensions::new();
        nested.insert("employee_id".to_string(), ExtensionValue::Integer(3));
        nested.insert("weight".to_string(), ExtensionValue::Number(0.5));
        let mut extensions = Extensions::new();
        extensions.insert("scores".to_string(), ExtensionValue::Map(nested.clone()));
        assert!(validate_extensions(&extensions).is_ok());

        nested.insert("a.b".to_string(), ExtensionValue::Bool(true));
        extensions.insert("scores".to_string(), ExtensionValue::Map(nested));
        assert_eq!(
            validate_extensions(&extensions).unwrap_err(),
            ReviewValidationError::InvalidExtensionKey("scores.a.b".to_string())
        );

        let mut extensions = Extensions::new();
        extensions.insert(
            "history".to_string(),
            ExtensionValue::List(vec![
                ExtensionValue::Number(1.5),
                ExtensionValue::Number(f64::INFINITY),
            ]),
        );
        assert_eq!(
            validate_extensions(&extensions).unwrap_err(),
            ReviewValidationError::NonFiniteExtensionNumber("history".to_string())
        );
    }

    #[test]
    fn normalize_text_trims_and_drops_blank_values() {
        assert_eq!(normalize_text(Some("  focus  ".into())).as_deref(), Some("focus"));
        assert_eq!(normalize_text(Some("   ".into())), None);
        assert_eq!(normalize_text(None), None);
    }

    #[test]
    fn parse_review_date_requires_iso_format() {
        assert!(parse_review_date("2024-01-15").is_ok());
        assert!(matches!(
            parse_review_date("15/01/2024"),
            Err(ReviewValidationError::UnparseableReviewDate(_))
        ));
    }
}
