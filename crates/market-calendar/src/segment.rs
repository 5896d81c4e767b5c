//! Market-state segmentation — one day's timeline of named segments.
//!
//! Derived, never persisted: segments are recomputed from a [`CalendarDay`]
//! on demand. For an open day the 24 hours split into five contiguous
//! half-open segments; a closed day is a single non-tradeable segment.

use chrono::{Days, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::day::CalendarDay;

/// Names for the segments of a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Midnight until premarket opens.
    PrePremarket,
    /// Premarket session.
    Premarket,
    /// Regular session — the only tradeable segment.
    Open,
    /// Postmarket session.
    Postmarket,
    /// After postmarket closes until midnight.
    PostPostmarket,
    /// Whole-day segment for closed days.
    ClosedAllDay,
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::PrePremarket => "prepremarket",
            Self::Premarket => "premarket",
            Self::Open => "open",
            Self::Postmarket => "postmarket",
            Self::PostPostmarket => "postpostmarket",
            Self::ClosedAllDay => "closed-all-day",
        };
        f.write_str(name)
    }
}

/// One named segment of a trading day: the half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketState {
    /// Which segment of the day this is.
    pub kind: SegmentKind,
    /// Whether position evaluation and order logic may run in this segment.
    pub tradeable: bool,
    /// Segment start (inclusive).
    pub start: NaiveDateTime,
    /// Segment end (exclusive).
    pub end: NaiveDateTime,
}

impl MarketState {
    /// Returns true if `instant` falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Returns true if the segment is zero-length (a collapsed boundary).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Derives the ordered segment list for one day.
///
/// Open days yield exactly five segments covering `[00:00, 24:00)`; missing
/// premarket/postmarket boundaries collapse onto the regular session so the
/// corresponding segment is zero-length rather than inverted. Closed days
/// (and days with malformed open status) yield one non-tradeable segment.
#[must_use]
pub fn segment_day(day: &CalendarDay) -> Vec<MarketState> {
    let day_start = day.date().and_hms_opt(0, 0, 0).expect("midnight exists");
    let day_end = day_start + Days::new(1);

    let session = match day.session().filter(|_| day.is_open()) {
        Some(s) => s,
        None => {
            return vec![MarketState {
                kind: SegmentKind::ClosedAllDay,
                tradeable: false,
                start: day_start,
                end: day_end,
            }];
        }
    };

    let open = day.date().and_time(session.start);
    let close = day.date().and_time(session.end);
    // Missing or inconsistent boundaries collapse onto the regular session.
    let premarket_open = day
        .premarket()
        .map(|p| day.date().and_time(p.start))
        .unwrap_or(open)
        .clamp(day_start, open);
    let postmarket_close = day
        .postmarket()
        .map(|p| day.date().and_time(p.end))
        .unwrap_or(close)
        .clamp(close, day_end);

    let boundaries = [
        day_start,
        premarket_open,
        open,
        close,
        postmarket_close,
        day_end,
    ];
    let kinds = [
        SegmentKind::PrePremarket,
        SegmentKind::Premarket,
        SegmentKind::Open,
        SegmentKind::Postmarket,
        SegmentKind::PostPostmarket,
    ];

    kinds
        .iter()
        .zip(boundaries.windows(2))
        .map(|(&kind, pair)| MarketState {
            kind,
            tradeable: kind == SegmentKind::Open,
            start: pair[0],
            end: pair[1],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day::SessionHours;
    use chrono::{NaiveDate, NaiveTime};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn full_open_day() -> CalendarDay {
        CalendarDay::open(
            date(2024, 3, 15),
            "Market is open",
            SessionHours::new(time(4, 0), time(9, 30)),
            SessionHours::new(time(9, 30), time(16, 0)).unwrap(),
            SessionHours::new(time(16, 0), time(20, 0)),
        )
        .unwrap()
    }

    #[test]
    fn open_day_yields_five_contiguous_segments() {
        let segments = segment_day(&full_open_day());
        assert_eq!(segments.len(), 5);

        // Contiguous and covering exactly [00:00, 24:00).
        assert_eq!(segments[0].start, date(2024, 3, 15).and_time(time(0, 0)));
        assert_eq!(
            segments.last().unwrap().end,
            date(2024, 3, 16).and_time(time(0, 0))
        );
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn exactly_one_tradeable_segment_matching_session() {
        let segments = segment_day(&full_open_day());
        let tradeable: Vec<_> = segments.iter().filter(|s| s.tradeable).collect();
        assert_eq!(tradeable.len(), 1);
        assert_eq!(tradeable[0].kind, SegmentKind::Open);
        assert_eq!(tradeable[0].start, date(2024, 3, 15).and_time(time(9, 30)));
        assert_eq!(tradeable[0].end, date(2024, 3, 15).and_time(time(16, 0)));
    }

    #[test]
    fn closed_day_yields_single_full_day_segment() {
        let day = CalendarDay::closed(date(2024, 3, 16), "Market is closed");
        let segments = segment_day(&day);
        assert_eq!(segments.len(), 1);
        let only = segments[0];
        assert_eq!(only.kind, SegmentKind::ClosedAllDay);
        assert!(!only.tradeable);
        assert_eq!(only.start, date(2024, 3, 16).and_time(time(0, 0)));
        assert_eq!(only.end, date(2024, 3, 17).and_time(time(0, 0)));
    }

    #[test]
    fn missing_premarket_collapses_to_zero_length() {
        let day = CalendarDay::open(
            date(2024, 3, 15),
            "Market is open",
            None,
            SessionHours::new(time(9, 30), time(16, 0)).unwrap(),
            None,
        )
        .unwrap();
        let segments = segment_day(&day);
        assert_eq!(segments.len(), 5);
        assert!(segments[1].is_empty(), "premarket should collapse");
        assert!(segments[3].is_empty(), "postmarket should collapse");
        // Coverage still holds.
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn half_open_membership() {
        let segments = segment_day(&full_open_day());
        let open = segments[2];
        assert!(open.contains(date(2024, 3, 15).and_time(time(9, 30))));
        assert!(open.contains(date(2024, 3, 15).and_time(time(15, 59))));
        assert!(!open.contains(date(2024, 3, 15).and_time(time(16, 0))));
    }

    #[test]
    fn segment_kind_display_names() {
        assert_eq!(SegmentKind::Open.to_string(), "open");
        assert_eq!(SegmentKind::ClosedAllDay.to_string(), "closed-all-day");
    }
}
