//! Rolling-window calendar index and time-based state queries.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::day::CalendarDay;
use crate::error::{CalendarError, Result};
use crate::segment::{segment_day, MarketState};

/// Ordered collection of calendar days over a multi-month rolling window.
///
/// Days are deduplicated by date and sorted ascending at construction; a
/// date index is built once so `day()` lookups are O(1). The calendar is
/// read-only after construction and safe to share by reference.
#[derive(Debug, Clone)]
pub struct MarketCalendar {
    days: Vec<CalendarDay>,
    index: HashMap<NaiveDate, usize>,
}

impl MarketCalendar {
    /// Builds a calendar from fetched days, sorting and deduplicating by
    /// date. Overlapping month fetches are expected; the first record for a
    /// date wins.
    #[must_use]
    pub fn new(mut days: Vec<CalendarDay>) -> Self {
        days.sort();
        days.dedup_by_key(|d| d.date());
        let index = days
            .iter()
            .enumerate()
            .map(|(i, d)| (d.date(), i))
            .collect();
        Self { days, index }
    }

    /// Number of indexed days.
    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// Returns true if no days are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// First and last indexed dates.
    ///
    /// # Errors
    /// Returns `EmptyWindow` if the calendar holds no days.
    pub fn window(&self) -> Result<(NaiveDate, NaiveDate)> {
        match (self.days.first(), self.days.last()) {
            (Some(first), Some(last)) => Ok((first.date(), last.date())),
            _ => Err(CalendarError::EmptyWindow),
        }
    }

    /// Looks up the day for a date.
    ///
    /// # Errors
    /// Returns `DayNotFound` (with the window bounds) if the date is not
    /// covered, or `EmptyWindow` if nothing is indexed.
    pub fn day(&self, date: NaiveDate) -> Result<&CalendarDay> {
        let (window_start, window_end) = self.window()?;
        self.index
            .get(&date)
            .map(|&i| &self.days[i])
            .ok_or(CalendarError::DayNotFound {
                date,
                window_start,
                window_end,
            })
    }

    /// All market-state segments across the window whose start is at or
    /// after `from`, ascending.
    ///
    /// The sequence is recomputed on every call (restartable, not a consumed
    /// stream) and is finite, bounded by the window size. Zero-length
    /// segments from collapsed premarket/postmarket boundaries are skipped
    /// so consecutive starts are strictly increasing.
    pub fn future_states(
        &self,
        from: NaiveDateTime,
    ) -> impl Iterator<Item = MarketState> + '_ {
        self.days
            .iter()
            .filter(move |d| d.date() >= from.date())
            .flat_map(|d| segment_day(d))
            .filter(move |s| !s.is_empty() && s.start >= from)
    }

    /// The `n_future`-th segment starting at or after `from`.
    ///
    /// # Errors
    /// Returns `OutOfWindow` if fewer than `n_future + 1` segments remain.
    pub fn state(&self, from: NaiveDateTime, n_future: usize) -> Result<MarketState> {
        self.future_states(from)
            .nth(n_future)
            .ok_or_else(|| self.out_of_window(from, n_future))
    }

    /// The `n_future`-th tradeable segment starting at or after `from`.
    ///
    /// # Errors
    /// Returns `OutOfWindow` if the window holds too few tradeable segments.
    pub fn tradeable_state(&self, from: NaiveDateTime, n_future: usize) -> Result<MarketState> {
        self.future_states(from)
            .filter(|s| s.tradeable)
            .nth(n_future)
            .ok_or_else(|| self.out_of_window(from, n_future))
    }

    /// The `n_future`-th non-tradeable segment starting at or after `from`.
    ///
    /// # Errors
    /// Returns `OutOfWindow` if the window holds too few such segments.
    pub fn non_tradeable_state(
        &self,
        from: NaiveDateTime,
        n_future: usize,
    ) -> Result<MarketState> {
        self.future_states(from)
            .filter(|s| !s.tradeable)
            .nth(n_future)
            .ok_or_else(|| self.out_of_window(from, n_future))
    }

    /// Earliest open trading day strictly after `after`.
    ///
    /// # Errors
    /// Returns `NoOpenDayFound` if the window is exhausted first; the caller
    /// should rebuild with a wider window and retry.
    pub fn next_open_day(&self, after: NaiveDate) -> Result<&CalendarDay> {
        let (_, window_end) = self.window()?;
        self.days
            .iter()
            .find(|d| d.date() > after && d.is_open())
            .ok_or(CalendarError::NoOpenDayFound { after, window_end })
    }

    fn out_of_window(&self, from: NaiveDateTime, n_future: usize) -> CalendarError {
        match self.window() {
            Ok((_, window_end)) => CalendarError::OutOfWindow {
                from,
                n_future,
                window_end,
            },
            Err(e) => e,
        }
    }
}
