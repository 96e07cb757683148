//! Read-side services built on the review repository.

pub mod review_aggregator;
