//! Review domain model.
//!
//! # Responsibility
//! - Define the canonical review document shape shared by repository and
//!   aggregator code.
//! - Keep field-level validation rules next to the data they guard.
//!
//! # Invariants
//! - Every persisted review is identified by both a stable `DocumentId` and a
//!   strictly increasing `ReviewNumber`.
//! - Deletion is permanent; there are no tombstones.

pub mod review;
