//! Exchange calendar and market-state timeline for the position-close loop.
//!
//! This crate turns a sparse list of per-day trading-session records into a
//! queryable timeline:
//!
//! - [`CalendarDay`] — one day's session boundaries, validated at construction
//! - [`segment_day`] — derives the ordered tradeable/non-tradeable segments
//! - [`MarketCalendar`] — rolling window of days with O(1) date lookup and
//!   "what segment is active / next" queries
//! - [`classify_instant`] — pure per-tick decision: should trading logic run
//!   now, and how long should the loop sleep
//!
//! Pure logic only: no IO, no wall clock. All instants are naive Eastern
//! wall-clock times matching the brokerage calendar feed; the host loop is
//! responsible for capturing a single `now` per iteration.
//!
//! # Example
//!
//! ```
//! use autoclose_calendar::{
//!     classify_instant, CalendarDay, MarketCalendar, SessionHours, TickKind,
//! };
//! use chrono::{NaiveDate, NaiveTime};
//!
//! let session = SessionHours::new(
//!     NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
//!     NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
//! )
//! .unwrap();
//! let day = CalendarDay::open(
//!     NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
//!     "Market is open",
//!     None,
//!     session,
//!     None,
//! )
//! .unwrap();
//! let calendar = MarketCalendar::new(vec![day]);
//!
//! let noon = NaiveDate::from_ymd_opt(2024, 3, 15)
//!     .unwrap()
//!     .and_hms_opt(12, 0, 0)
//!     .unwrap();
//! let decision = classify_instant(&calendar, noon, 0).unwrap();
//! assert_eq!(decision.kind, TickKind::Open);
//! ```

pub mod calendar;
pub mod day;
pub mod error;
pub mod scheduler;
pub mod segment;

pub use calendar::MarketCalendar;
pub use day::{CalendarDay, DayStatus, SessionHours};
pub use error::{CalendarError, Result};
pub use scheduler::{
    classify_instant, idle_before_open, idle_open, TickDecision, TickKind, IDLE_DORMANT,
    IDLE_OPEN_NO_POSITIONS, IDLE_OPEN_WITH_POSITIONS,
};
pub use segment::{segment_day, MarketState, SegmentKind};
