// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ISO-8601 week resolution.
//!
//! Weeks run Monday through Sunday; week 1 is the week containing the
//! year's first Thursday. The ISO week-year can differ from the calendar
//! year around the new year boundary, which is why weekly aggregates are
//! keyed by the ISO pair and not the calendar year.
//!
//! All bounds are UTC: `week_start` is Monday 00:00:00.000 and `week_end`
//! is Sunday 23:59:59.999.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};

/// Resolved ISO week for an instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeekBounds {
    /// ISO week-year (not necessarily the calendar year)
    pub iso_year: i32,
    /// ISO week number, 1..=53
    pub iso_week: u32,
    /// Monday 00:00:00.000 UTC
    pub week_start: DateTime<Utc>,
    /// Sunday 23:59:59.999 UTC
    pub week_end: DateTime<Utc>,
}

/// Resolve the ISO week containing `instant`.
pub fn week_of(instant: DateTime<Utc>) -> WeekBounds {
    let iso = instant.date_naive().iso_week();
    let iso_year = iso.year();
    let iso_week = iso.week();

    // The (year, week) pair came from a real date, so Monday of that week
    // always exists.
    let monday = NaiveDate::from_isoywd_opt(iso_year, iso_week, Weekday::Mon)
        .unwrap_or_else(|| instant.date_naive());

    let week_start = Utc.from_utc_datetime(&monday.and_hms_opt(0, 0, 0).unwrap_or_default());
    let week_end = week_start + Duration::days(7) - Duration::milliseconds(1);

    WeekBounds {
        iso_year,
        iso_week,
        week_start,
        week_end,
    }
}
