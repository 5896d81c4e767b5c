//! One exchange trading day and its session boundaries.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{CalendarError, Result};

/// Whether the exchange trades at all on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    /// Regular or shortened trading day.
    Open,
    /// Weekend, holiday, or other full-day closure.
    Closed,
}

impl DayStatus {
    /// Parses the broker's status string. Anything unrecognized is treated
    /// as closed, the conservative reading for trading decisions.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "open" => Self::Open,
            "closed" => Self::Closed,
            other => {
                tracing::warn!(status = other, "Unrecognized day status, treating as closed");
                Self::Closed
            }
        }
    }
}

/// Start/end wall-clock boundaries of one session within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHours {
    /// Session start time (inclusive).
    pub start: NaiveTime,
    /// Session end time (exclusive).
    pub end: NaiveTime,
}

impl SessionHours {
    /// Creates session hours, rejecting inverted intervals.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }
}

/// One exchange trading day's session boundaries.
///
/// Immutable after construction: built once per fetched month and held for
/// the life of the calendar window. All times are naive Eastern wall-clock,
/// matching the brokerage calendar feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    date: NaiveDate,
    status: DayStatus,
    description: String,
    premarket: Option<SessionHours>,
    session: Option<SessionHours>,
    postmarket: Option<SessionHours>,
}

impl CalendarDay {
    /// Creates an open trading day.
    ///
    /// # Errors
    /// Returns `InvalidDay` if the regular session is inverted, or if a
    /// premarket/postmarket session does not nest around it.
    pub fn open(
        date: NaiveDate,
        description: impl Into<String>,
        premarket: Option<SessionHours>,
        session: SessionHours,
        postmarket: Option<SessionHours>,
    ) -> Result<Self> {
        if session.start > session.end {
            return Err(CalendarError::invalid_day(
                date,
                format!("market open {} after close {}", session.start, session.end),
            ));
        }
        if let Some(pre) = premarket {
            if pre.start > session.start {
                return Err(CalendarError::invalid_day(
                    date,
                    format!("premarket start {} after market open {}", pre.start, session.start),
                ));
            }
        }
        if let Some(post) = postmarket {
            if post.end < session.end {
                return Err(CalendarError::invalid_day(
                    date,
                    format!("postmarket end {} before market close {}", post.end, session.end),
                ));
            }
        }
        Ok(Self {
            date,
            status: DayStatus::Open,
            description: description.into(),
            premarket,
            session: Some(session),
            postmarket,
        })
    }

    /// Creates a fully closed day (weekend/holiday).
    pub fn closed(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            date,
            status: DayStatus::Closed,
            description: description.into(),
            premarket: None,
            session: None,
            postmarket: None,
        }
    }

    /// Calendar date of this day.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Trading status of this day.
    #[must_use]
    pub fn status(&self) -> DayStatus {
        self.status
    }

    /// Broker description, e.g. "Market is open" or the holiday name.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns true if the exchange trades on this day.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == DayStatus::Open
    }

    /// Regular session hours, present only on open days.
    #[must_use]
    pub fn session(&self) -> Option<SessionHours> {
        self.session
    }

    /// Premarket session hours, if the day has one.
    #[must_use]
    pub fn premarket(&self) -> Option<SessionHours> {
        self.premarket
    }

    /// Postmarket session hours, if the day has one.
    #[must_use]
    pub fn postmarket(&self) -> Option<SessionHours> {
        self.postmarket
    }

    /// Regular session open as a full timestamp on this date.
    #[must_use]
    pub fn market_open(&self) -> Option<NaiveDateTime> {
        self.session.map(|s| self.date.and_time(s.start))
    }

    /// Regular session close as a full timestamp on this date.
    #[must_use]
    pub fn market_close(&self) -> Option<NaiveDateTime> {
        self.session.map(|s| self.date.and_time(s.end))
    }

    /// Returns true if this open day starts later than the usual 09:30.
    #[must_use]
    pub fn late_open(&self) -> Option<bool> {
        let usual = NaiveTime::from_hms_opt(9, 30, 0).expect("valid time");
        self.session.map(|s| s.start > usual)
    }

    /// Returns true if this open day closes earlier than the usual 16:00.
    #[must_use]
    pub fn early_close(&self) -> Option<bool> {
        let usual = NaiveTime::from_hms_opt(16, 0, 0).expect("valid time");
        self.session.map(|s| s.end < usual)
    }
}

impl PartialOrd for CalendarDay {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CalendarDay {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.date.cmp(&other.date)
    }
}
