//! Error types for calendar queries.
//!
//! Every query failure carries the window bounds that were searched so a
//! miss can be diagnosed from logs without replaying broker API state.

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Errors that can occur when querying the market calendar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    /// The requested date is not inside the indexed window.
    #[error("date {date} outside calendar window [{window_start}, {window_end}]")]
    DayNotFound {
        /// The date that was looked up.
        date: NaiveDate,
        /// First indexed date.
        window_start: NaiveDate,
        /// Last indexed date.
        window_end: NaiveDate,
    },

    /// A state query ran past the end of the indexed window.
    ///
    /// Recoverable: rebuild the calendar with a wider window and retry.
    #[error(
        "state query from {from} (n_future={n_future}) exhausted calendar window ending {window_end}"
    )]
    OutOfWindow {
        /// Instant the query started from.
        from: NaiveDateTime,
        /// Requested segment offset.
        n_future: usize,
        /// Last indexed date.
        window_end: NaiveDate,
    },

    /// No open trading day exists after the given date within the window.
    ///
    /// Recoverable: rebuild the calendar with a wider window and retry.
    #[error("no open trading day after {after} within calendar window ending {window_end}")]
    NoOpenDayFound {
        /// The exclusive lower bound of the search.
        after: NaiveDate,
        /// Last indexed date.
        window_end: NaiveDate,
    },

    /// The calendar holds no days at all.
    #[error("calendar window is empty")]
    EmptyWindow,

    /// A day record violated the session-boundary invariants.
    #[error("invalid calendar day {date}: {reason}")]
    InvalidDay {
        /// Date of the offending record.
        date: NaiveDate,
        /// What was wrong with it.
        reason: String,
    },
}

impl CalendarError {
    /// Creates an invalid-day error.
    pub fn invalid_day(date: NaiveDate, reason: impl Into<String>) -> Self {
        Self::InvalidDay {
            date,
            reason: reason.into(),
        }
    }

    /// Returns true if the error can be resolved by widening the window.
    #[must_use]
    pub fn is_window_exhaustion(&self) -> bool {
        matches!(
            self,
            Self::OutOfWindow { .. } | Self::NoOpenDayFound { .. } | Self::DayNotFound { .. }
        )
    }
}

/// Result type alias for calendar operations.
pub type Result<T> = std::result::Result<T, CalendarError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_not_found_display_includes_window() {
        let err = CalendarError::DayNotFound {
            date: date(2024, 9, 1),
            window_start: date(2024, 1, 1),
            window_end: date(2024, 6, 30),
        };
        let msg = err.to_string();
        assert!(msg.contains("2024-09-01"));
        assert!(msg.contains("2024-01-01"));
        assert!(msg.contains("2024-06-30"));
    }

    #[test]
    fn window_exhaustion_classification() {
        let exhausted = CalendarError::NoOpenDayFound {
            after: date(2024, 6, 28),
            window_end: date(2024, 6, 30),
        };
        assert!(exhausted.is_window_exhaustion());

        let invalid = CalendarError::invalid_day(date(2024, 3, 15), "open after close");
        assert!(!invalid.is_window_exhaustion());
    }
}
