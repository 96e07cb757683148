//! Review analytics service.
//!
//! # Responsibility
//! - Build frequency tables and rating summaries from repository reads.
//!
//! # Invariants
//! - Holds no state of its own; every call re-reads the repository.
//! - Frequency tables are exact-string buckets sorted by count descending,
//!   ties kept in first-seen order.
//! - Documents without the selected field, or with a non-text value for it,
//!   are skipped rather than counted as empty text.

use crate::clock::{Clock, SystemClock};
use crate::model::review::{EmployeeId, ReviewDocument, StandardField};
use crate::repo::document_store::DocumentStore;
use crate::repo::employee_directory::EmployeeDirectory;
use crate::repo::review_repo::{round_rating, ReviewError, ReviewRepository, ReviewResult};
use chrono::NaiveDate;
use std::collections::HashMap;

pub const DEFAULT_TOP_GOALS_LIMIT: usize = 5;

/// Text field a frequency table is built over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldSelector {
    Standard(StandardField),
    /// Extension attribute holding text.
    Extension(String),
}

impl FieldSelector {
    pub fn extension(key: impl Into<String>) -> Self {
        Self::Extension(key.into())
    }

    fn text<'doc>(&self, review: &'doc ReviewDocument) -> Option<&'doc str> {
        match self {
            Self::Standard(field) => review.standard_field(*field),
            Self::Extension(key) => review.extension(key).and_then(|value| value.as_text()),
        }
    }
}

impl From<StandardField> for FieldSelector {
    fn from(value: StandardField) -> Self {
        Self::Standard(value)
    }
}

/// One bucket of a frequency table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyEntry {
    pub value: String,
    pub count: usize,
}

/// Rating statistics for one employee.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingSummary {
    pub employee_id: EmployeeId,
    pub review_count: usize,
    /// Rounded to three decimals.
    pub average_rating: f64,
    pub min_rating: f64,
    pub max_rating: f64,
    pub latest_review_date: NaiveDate,
}

/// Read-only analytics over a review repository.
pub struct ReviewAggregator<'repo, D, S, C = SystemClock> {
    repo: &'repo ReviewRepository<D, S, C>,
}

impl<'repo, D: EmployeeDirectory, S: DocumentStore, C: Clock> ReviewAggregator<'repo, D, S, C> {
    pub fn new(repo: &'repo ReviewRepository<D, S, C>) -> Self {
        Self { repo }
    }

    /// Counts distinct values of `selector` across all reviews.
    pub fn frequency_table(&self, selector: &FieldSelector) -> ReviewResult<Vec<FrequencyEntry>> {
        let reviews = self.repo.scan()?;
        Ok(count_values(reviews.iter().filter_map(|review| selector.text(review))))
    }

    /// Counts distinct values of `selector` across one employee's reviews.
    pub fn frequency_table_for_employee(
        &self,
        employee_id: EmployeeId,
        selector: &FieldSelector,
    ) -> ReviewResult<Vec<FrequencyEntry>> {
        let reviews = self.repo.get_for_employee(employee_id)?;
        Ok(count_values(reviews.iter().filter_map(|review| selector.text(review))))
    }

    /// Most frequent `goals_for_next_period` values across all reviews.
    pub fn top_goals(&self, limit: usize) -> ReviewResult<Vec<FrequencyEntry>> {
        let mut table = self.frequency_table(&StandardField::GoalsForNextPeriod.into())?;
        table.truncate(limit);
        Ok(table)
    }

    pub fn top_goals_for_employee(
        &self,
        employee_id: EmployeeId,
        limit: usize,
    ) -> ReviewResult<Vec<FrequencyEntry>> {
        let mut table = self.frequency_table_for_employee(
            employee_id,
            &StandardField::GoalsForNextPeriod.into(),
        )?;
        table.truncate(limit);
        Ok(table)
    }

    /// # Errors
    /// - `NoReviews` when the employee has no reviews.
    pub fn rating_summary(&self, employee_id: EmployeeId) -> ReviewResult<RatingSummary> {
        let reviews = self.repo.get_for_employee(employee_id)?;
        let Some(latest) = reviews.last() else {
            return Err(ReviewError::NoReviews(employee_id));
        };

        let ratings = reviews.iter().map(|review| review.overall_rating);
        let total: f64 = ratings.clone().sum();
        Ok(RatingSummary {
            employee_id,
            review_count: reviews.len(),
            average_rating: round_rating(total / reviews.len() as f64),
            min_rating: ratings.clone().fold(f64::INFINITY, f64::min),
            max_rating: ratings.fold(f64::NEG_INFINITY, f64::max),
            // Reviews come back ordered by review_date ascending.
            latest_review_date: latest.review_date,
        })
    }
}

fn count_values<'a>(values: impl Iterator<Item = &'a str>) -> Vec<FrequencyEntry> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut table: Vec<FrequencyEntry> = Vec::new();

    for value in values {
        match positions.get(value) {
            Some(&index) => table[index].count += 1,
            None => {
                positions.insert(value, table.len());
                table.push(FrequencyEntry {
                    value: value.to_string(),
                    count: 1,
                });
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    table.sort_by(|left, right| right.count.cmp(&left.count));
    table
}

#[cfg(test)]
mod tests {
    use super::count_values;

    #[test]
    fn count_values_orders_by_count_then_first_seen() {
        let table = count_values(["b", "a", "c", "a", "c", "d"].into_iter());
        let flat: Vec<(&str, usize)> = table
            .iter()
            .map(|entry| (entry.value.as_str(), entry.count))
            .collect();
        assert_eq!(flat, vec![("a", 2), ("c", 2), ("b", 1), ("d", 1)]);
    }

    #[test]
    fn count_values_is_exact_string_match() {
        let table = count_values(["Teamwork", "teamwork", "Teamwork."].into_iter());
        assert_eq!(table.len(), 3);
        assert!(table.iter().all(|entry| entry.count == 1));
    }
}
