//! Calendar-week arithmetic deciding when the cached snapshot is stale.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Weekday};

/// Returns the Monday of the ISO week containing `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let back = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(back)).unwrap_or(date)
}

/// Returns `true` if both dates fall in the same Monday-aligned week.
#[must_use]
pub fn same_week(d1: NaiveDate, d2: NaiveDate) -> bool {
    week_start(d1) == week_start(d2)
}

/// Returns `true` if `date` is a Sunday.
#[must_use]
pub fn is_sunday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sun
}

/// Decides whether the schedule must be fetched again.
///
/// - No cached snapshot: always refresh.
/// - Sunday: never refresh once a snapshot exists.
/// - Otherwise: refresh iff `now` and `last_updated_at` are in different weeks.
///
/// The Sunday rule means a snapshot taken in an earlier week is kept through
/// Sunday and only replaced on Monday, while [`resolve_current_week_index`]
/// already previews the next week on that Sunday.
#[must_use]
pub fn needs_refresh(
    has_cached_snapshot: bool,
    now: NaiveDateTime,
    last_updated_at: NaiveDateTime,
) -> bool {
    if !has_cached_snapshot {
        return true;
    }
    if is_sunday(now.date()) {
        return false;
    }
    !same_week(now.date(), last_updated_at.date())
}

/// Resolves which week to present as current.
///
/// On a Sunday the following week is previewed when one exists.
#[must_use]
pub fn resolve_current_week_index(base_index: usize, week_count: usize, is_sunday: bool) -> usize {
    match base_index.checked_add(1) {
        Some(next) if is_sunday && next < week_count => next,
        _ => base_index,
    }
}
