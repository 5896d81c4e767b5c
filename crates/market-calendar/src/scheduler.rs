//! Poll-loop scheduling — classify an instant and pick an idle duration.
//!
//! This is the operational heart of the control loop: coarse polling far
//! from market open, fine polling near it, so reaction latency at the open
//! stays bounded while API load stays low. Classification is pure; the
//! caller captures one instant per iteration and passes it in.

use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::calendar::MarketCalendar;
use crate::error::Result;

/// Idle used after the close, on non-trading days, and on window misses.
pub const IDLE_DORMANT: Duration = Duration::from_secs(3600);

/// Idle during the open session with at least one position held.
pub const IDLE_OPEN_WITH_POSITIONS: Duration = Duration::from_secs(5);

/// Idle during the open session with no positions held.
pub const IDLE_OPEN_NO_POSITIONS: Duration = Duration::from_secs(15);

/// How the current instant relates to today's trading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickKind {
    /// Open trading day, before the session starts.
    BeforeOpen,
    /// Inside the regular session — evaluate positions.
    Open,
    /// Open trading day, after the session ended.
    AfterClose,
    /// Weekend or holiday.
    NonTradingDay,
    /// Source data placed the instant nowhere; defensive branch for
    /// malformed feeds, not reachable with validated days.
    Mismatch,
}

/// One iteration's decision: what the tick is and how long to idle after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickDecision {
    /// Classification of the instant.
    pub kind: TickKind,
    /// How long the loop should sleep before the next tick.
    pub idle: Duration,
}

/// Idle tier for the pre-open countdown.
///
/// Tiers (seconds until open → idle): ≥7200→3600, ≥3600→1800, ≥1800→900,
/// ≥900→300, ≥300→60, ≥60→30, else 5.
#[must_use]
pub fn idle_before_open(secs_until_open: i64) -> Duration {
    let idle = match secs_until_open {
        s if s >= 7200 => 3600,
        s if s >= 3600 => 1800,
        s if s >= 1800 => 900,
        s if s >= 900 => 300,
        s if s >= 300 => 60,
        s if s >= 60 => 30,
        _ => 5,
    };
    Duration::from_secs(idle)
}

/// Idle tier for the open session, keyed on held positions.
#[must_use]
pub fn idle_open(open_positions: usize) -> Duration {
    if open_positions > 0 {
        IDLE_OPEN_WITH_POSITIONS
    } else {
        IDLE_OPEN_NO_POSITIONS
    }
}

/// Classifies `now` against today's calendar day and returns the tick kind
/// plus idle duration. `open_positions` is the caller's current count of
/// held positions (0 when unknown); it only affects the `Open` idle.
///
/// # Errors
/// Returns `DayNotFound` when `now` falls outside the calendar window; the
/// caller should rebuild the window and retry.
pub fn classify_instant(
    calendar: &MarketCalendar,
    now: NaiveDateTime,
    open_positions: usize,
) -> Result<TickDecision> {
    let today = calendar.day(now.date())?;

    let (open, close) = match (today.market_open(), today.market_close()) {
        (Some(open), Some(close)) if today.is_open() => (open, close),
        _ => {
            return Ok(TickDecision {
                kind: TickKind::NonTradingDay,
                idle: IDLE_DORMANT,
            });
        }
    };

    let decision = if open <= now && now < close {
        TickDecision {
            kind: TickKind::Open,
            idle: idle_open(open_positions),
        }
    } else if now <= open {
        let secs_until_open = (open - now).num_seconds();
        tracing::debug!(secs_until_open, "Before market open");
        TickDecision {
            kind: TickKind::BeforeOpen,
            idle: idle_before_open(secs_until_open),
        }
    } else if now >= close {
        TickDecision {
            kind: TickKind::AfterClose,
            idle: IDLE_DORMANT,
        }
    } else {
        tracing::warn!(
            date = %today.date(),
            status = ?today.status(),
            description = today.description(),
            market_open = %open,
            market_close = %close,
            now = %now,
            "Day status and session times disagree"
        );
        TickDecision {
            kind: TickKind::Mismatch,
            idle: Duration::ZERO,
        }
    };

    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day::{CalendarDay, SessionHours};
    use crate::error::CalendarError;
    use chrono::{NaiveDate, NaiveTime};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    /// March 2024 slice: Fri 15th open 09:30–16:00, weekend, Mon 18th open.
    fn march_calendar() -> MarketCalendar {
        let open = |d| {
            CalendarDay::open(
                d,
                "Market is open",
                SessionHours::new(time(4, 0), time(9, 30)),
                SessionHours::new(time(9, 30), time(16, 0)).unwrap(),
                SessionHours::new(time(16, 0), time(20, 0)),
            )
            .unwrap()
        };
        MarketCalendar::new(vec![
            open(date(2024, 3, 15)),
            CalendarDay::closed(date(2024, 3, 16), "Market is closed"),
            CalendarDay::closed(date(2024, 3, 17), "Market is closed"),
            open(date(2024, 3, 18)),
        ])
    }

    #[test]
    fn before_open_90_minutes_out_idles_30_minutes() {
        let cal = march_calendar();
        let now = date(2024, 3, 15).and_time(time(8, 0));
        let d = classify_instant(&cal, now, 0).unwrap();
        assert_eq!(d.kind, TickKind::BeforeOpen);
        assert_eq!(d.idle, Duration::from_secs(1800));
    }

    #[test]
    fn before_open_tier_boundaries() {
        assert_eq!(idle_before_open(7200), Duration::from_secs(3600));
        assert_eq!(idle_before_open(7199), Duration::from_secs(1800));
        assert_eq!(idle_before_open(3600), Duration::from_secs(1800));
        assert_eq!(idle_before_open(3599), Duration::from_secs(900));
        assert_eq!(idle_before_open(1800), Duration::from_secs(900));
        assert_eq!(idle_before_open(900), Duration::from_secs(300));
        assert_eq!(idle_before_open(300), Duration::from_secs(60));
        assert_eq!(idle_before_open(60), Duration::from_secs(30));
        assert_eq!(idle_before_open(59), Duration::from_secs(5));
        assert_eq!(idle_before_open(0), Duration::from_secs(5));
    }

    #[test]
    fn at_open_with_and_without_positions() {
        let cal = march_calendar();
        let now = date(2024, 3, 15).and_time(time(9, 30));

        let without = classify_instant(&cal, now, 0).unwrap();
        assert_eq!(without.kind, TickKind::Open);
        assert_eq!(without.idle, Duration::from_secs(15));

        let with = classify_instant(&cal, now, 2).unwrap();
        assert_eq!(with.kind, TickKind::Open);
        assert_eq!(with.idle, Duration::from_secs(5));
    }

    #[test]
    fn just_after_close_idles_an_hour() {
        let cal = march_calendar();
        let now = date(2024, 3, 15).and_time(time(16, 1));
        let d = classify_instant(&cal, now, 0).unwrap();
        assert_eq!(d.kind, TickKind::AfterClose);
        assert_eq!(d.idle, Duration::from_secs(3600));
    }

    #[test]
    fn exactly_at_close_is_after_close() {
        let cal = march_calendar();
        let now = date(2024, 3, 15).and_time(time(16, 0));
        let d = classify_instant(&cal, now, 3).unwrap();
        assert_eq!(d.kind, TickKind::AfterClose);
    }

    #[test]
    fn weekend_is_non_trading_day() {
        let cal = march_calendar();
        let now = date(2024, 3, 16).and_time(time(11, 0));
        let d = classify_instant(&cal, now, 0).unwrap();
        assert_eq!(d.kind, TickKind::NonTradingDay);
        assert_eq!(d.idle, IDLE_DORMANT);
    }

    #[test]
    fn outside_window_surfaces_error() {
        let cal = march_calendar();
        let now = date(2025, 1, 6).and_time(time(9, 30));
        let err = classify_instant(&cal, now, 0).unwrap_err();
        assert!(matches!(err, CalendarError::DayNotFound { .. }));
    }
}
