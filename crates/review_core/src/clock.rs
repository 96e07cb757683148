//! Time source for validation and creation stamps.
//!
//! # Invariants
//! - `now()` values are truncated to microseconds, matching the persisted
//!   `created_at` precision, so a returned document equals its read-back.

use chrono::{DateTime, Local, NaiveDate, SubsecRound, Utc};

/// Supplies "today" for review-date checks and "now" for `created_at`.
pub trait Clock {
    fn today(&self) -> NaiveDate;
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time. `today` follows the local calendar.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }

    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
