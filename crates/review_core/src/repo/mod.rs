//! Repository layer: storage boundaries and the review repository.
//!
//! # Responsibility
//! - Define the employee directory and document store contracts.
//! - Isolate SQLite query details from review validation and analytics.
//!
//! # Invariants
//! - Review writes validate fully before touching the document store.
//! - Repository APIs return semantic errors (`NotFound`, `NoReviews`) in
//!   addition to store transport errors.

pub mod document_store;
pub mod employee_directory;
pub mod review_repo;
