// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-ISO-week rollup of a user's riding, for the weekly graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Ride;
use crate::stats::WeekBounds;

/// Weekly rollup stored in Firestore.
///
/// One document per (user_id, iso_year, iso_week); the triple is encoded
/// into the document ID (see [`WeeklyAggregate::doc_id`]) so the store
/// structurally cannot hold two rollups for the same week. Created lazily
/// on the first ride of a week and retained forever for historical graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAggregate {
    /// Owning user ID
    pub user_id: u64,
    /// ISO week-year (can differ from the calendar year at year boundaries)
    pub iso_year: i32,
    /// ISO week number, 1..=53
    pub iso_week: u32,
    /// Total distance this week (km)
    #[serde(default)]
    pub total_distance_km: f64,
    /// Number of rides this week
    #[serde(default)]
    pub total_rides: u32,
    /// Coins earned this week
    #[serde(default)]
    pub total_coins: i64,
    /// Total moving time this week (seconds)
    #[serde(default)]
    pub total_moving_time_secs: u64,
    /// Distance-weighted average speed (km/h), recomputed from the totals
    /// on every update, never accumulated independently
    #[serde(default)]
    pub average_speed_kmh: f64,
    /// Monday 00:00:00.000 UTC, fixed at creation
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub week_start: DateTime<Utc>,
    /// Sunday 23:59:59.999 UTC, fixed at creation
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub week_end: DateTime<Utc>,
}

impl WeeklyAggregate {
    /// A zeroed rollup for the given user and resolved week.
    pub fn new(user_id: u64, bounds: &WeekBounds) -> Self {
        Self {
            user_id,
            iso_year: bounds.iso_year,
            iso_week: bounds.iso_week,
            total_distance_km: 0.0,
            total_rides: 0,
            total_coins: 0,
            total_moving_time_secs: 0,
            average_speed_kmh: 0.0,
            week_start: bounds.week_start,
            week_end: bounds.week_end,
        }
    }

    /// Firestore document ID for a weekly rollup.
    pub fn doc_id(user_id: u64, iso_year: i32, iso_week: u32) -> String {
        format!("{}_{}_{}", user_id, iso_year, iso_week)
    }

    /// Fold a ride into the weekly totals and re-derive the average speed.
    pub fn apply_ride(&mut self, ride: &Ride) {
        self.total_distance_km += ride.distance_km;
        self.total_rides += 1;
        self.total_coins += ride.coins_earned;
        self.total_moving_time_secs += u64::from(ride.moving_time_secs);

        // 0, never NaN or infinity, when no moving time has accumulated
        self.average_speed_kmh = if self.total_moving_time_secs == 0 {
            0.0
        } else {
            self.total_distance_km / (self.total_moving_time_secs as f64 / 3600.0)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::week_of;
    use chrono::TimeZone;

    fn make_ride(id: u64, distance: f64, speed: f64, time: u32) -> Ride {
        Ride {
            ride_id: id,
            user_id: 42,
            name: format!("Test Ride {}", id),
            distance_km: distance,
            average_speed_kmh: speed,
            moving_time_secs: time,
            elevation_gained_m: 50.0,
            activity_date: Utc.with_ymd_and_hms(2024, 7, 10, 10, 0, 0).unwrap(),
            coins_earned: crate::stats::compute_coins(distance, speed),
            created_at: "2024-07-10T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_first_ride_of_week() {
        let bounds = week_of(Utc.with_ymd_and_hms(2024, 7, 10, 10, 0, 0).unwrap());
        let mut weekly = WeeklyAggregate::new(42, &bounds);
        weekly.apply_ride(&make_ride(1, 20.0, 25.0, 2880));

        assert_eq!(weekly.total_rides, 1);
        assert_eq!(weekly.total_distance_km, 20.0);
        assert_eq!(weekly.total_coins, 250);
        assert_eq!(weekly.total_moving_time_secs, 2880);
        // 20 km over 0.8 h = 25 km/h
        assert!((weekly.average_speed_kmh - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_speed_rederived_from_totals() {
        let bounds = week_of(Utc.with_ymd_and_hms(2024, 7, 10, 10, 0, 0).unwrap());
        let mut weekly = WeeklyAggregate::new(42, &bounds);
        weekly.apply_ride(&make_ride(1, 20.0, 25.0, 2880));
        weekly.apply_ride(&make_ride(2, 10.0, 20.0, 1800));

        // 30 km over 4680 s = 23.0769... km/h, not the mean of 25 and 20
        let expected = 30.0 / (4680.0 / 3600.0);
        assert!((weekly.average_speed_kmh - expected).abs() < 1e-9);
        assert_eq!(weekly.total_rides, 2);
    }

    #[test]
    fn test_zero_moving_time_yields_zero_speed() {
        let bounds = week_of(Utc.with_ymd_and_hms(2024, 7, 10, 10, 0, 0).unwrap());
        let mut weekly = WeeklyAggregate::new(42, &bounds);
        weekly.apply_ride(&make_ride(1, 0.0, 0.0, 0));

        assert_eq!(weekly.average_speed_kmh, 0.0);
        assert!(weekly.average_speed_kmh.is_finite());
    }

    #[test]
    fn test_doc_id_encodes_composite_key() {
        assert_eq!(WeeklyAggregate::doc_id(42, 2025, 1), "42_2025_1");
    }
}
