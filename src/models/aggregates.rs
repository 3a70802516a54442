// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user statistics aggregate for efficient dashboard queries.
//!
//! The aggregate is pre-computed when rides are processed, reducing
//! dashboard Firestore reads from O(rides) to O(1). It is updated
//! atomically with ride writes via Firestore transactions and can always
//! be rebuilt from the surviving ride history with [`UserAggregate::recompute_from`].

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::Ride;
use crate::stats::BestEfforts;

/// Pre-computed statistics for a user.
///
/// Stored in the `user_aggregates` collection, keyed by `user_id`.
///
/// Every total is a running sum that only grows under incremental updates.
/// Deleting a ride reverses the coin credit eagerly (see [`reverse_ride`])
/// but intentionally does NOT decrement distance, records, or best efforts:
/// doing that correctly would require knowing whether another ride ties or
/// exceeds the deleted ride's contribution. Callers needing exact
/// consistency after a delete must run [`recompute_from`].
///
/// [`reverse_ride`]: UserAggregate::reverse_ride
/// [`recompute_from`]: UserAggregate::recompute_from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserAggregate {
    // ─── Running Totals ──────────────────────────────────────────
    /// Total rides processed
    #[serde(default)]
    pub total_rides: u32,
    /// Lifetime distance (km)
    #[serde(default)]
    pub total_distance_km: f64,
    /// Distance ridden in the current calendar year (km).
    /// A ride counts when its activity-date year equals the wall-clock
    /// year at the moment the ride is applied.
    #[serde(default)]
    pub distance_this_year_km: f64,
    /// Lifetime coin balance from ride rewards
    #[serde(default)]
    pub total_coins: i64,

    // ─── Records ─────────────────────────────────────────────────
    /// Longest single-ride distance (km)
    #[serde(default)]
    pub longest_ride_distance_km: f64,
    /// Longest single-ride moving time (seconds)
    #[serde(default)]
    pub longest_ride_time_secs: u32,
    /// Most elevation gained in a single ride (meters)
    #[serde(default)]
    pub max_elevation_gained_m: f64,

    // ─── Best Efforts ────────────────────────────────────────────
    /// Personal-best estimated times for the fixed reference distances
    #[serde(flatten)]
    pub best_efforts: BestEfforts,

    // ─── Idempotency ─────────────────────────────────────────────
    /// Set of processed ride IDs (for duplicate detection)
    #[serde(default)]
    pub processed_ride_ids: HashSet<u64>,

    // ─── Metadata ────────────────────────────────────────────────
    /// Last update timestamp (RFC3339)
    #[serde(default)]
    pub updated_at: String,
}

impl UserAggregate {
    /// Apply a new ride to the aggregate.
    ///
    /// Returns `true` if the ride was applied, `false` if it was already
    /// processed (idempotent duplicate, e.g. a redelivered task).
    ///
    /// Record fields use strict-greater comparisons: a tie does not
    /// overwrite, so the first ride to reach a tied record stays the ride
    /// of record.
    pub fn apply_ride(&mut self, ride: &Ride, now: DateTime<Utc>) -> bool {
        if self.processed_ride_ids.contains(&ride.ride_id) {
            return false;
        }
        self.processed_ride_ids.insert(ride.ride_id);

        self.total_rides += 1;
        self.total_distance_km += ride.distance_km;
        if ride.activity_date.year() == now.year() {
            self.distance_this_year_km += ride.distance_km;
        }
        self.total_coins += ride.coins_earned;

        if ride.distance_km > self.longest_ride_distance_km {
            self.longest_ride_distance_km = ride.distance_km;
        }
        if ride.moving_time_secs > self.longest_ride_time_secs {
            self.longest_ride_time_secs = ride.moving_time_secs;
        }
        if ride.elevation_gained_m > self.max_elevation_gained_m {
            self.max_elevation_gained_m = ride.elevation_gained_m;
        }

        self.best_efforts
            .update_from_ride(ride.distance_km, ride.average_speed_kmh);

        self.updated_at = now.to_rfc3339();
        true
    }

    /// Reverse the cheap part of a deleted ride's contribution.
    ///
    /// Only the coin credit and the ride count are taken back; distance,
    /// records, and best efforts stay as-is until a recompute. Returns
    /// `false` if the ride was not in the processed set.
    pub fn reverse_ride(&mut self, ride: &Ride, now: DateTime<Utc>) -> bool {
        if !self.processed_ride_ids.remove(&ride.ride_id) {
            return false;
        }

        self.total_rides = self.total_rides.saturating_sub(1);
        self.total_coins -= ride.coins_earned;
        self.updated_at = now.to_rfc3339();
        true
    }

    /// Rebuild an aggregate from scratch by replaying the surviving ride
    /// history in activity-date order.
    ///
    /// This is the authoritative consistency repair after deletions. For
    /// an addition-only history it produces exactly what an unbroken
    /// sequence of [`apply_ride`](Self::apply_ride) calls would have.
    pub fn recompute_from(rides: &[Ride], now: DateTime<Utc>) -> Self {
        let mut ordered: Vec<&Ride> = rides.iter().collect();
        ordered.sort_by(|a, b| {
            a.activity_date
                .cmp(&b.activity_date)
                .then(a.ride_id.cmp(&b.ride_id))
        });

        let mut aggregate = Self::default();
        for ride in ordered {
            aggregate.apply_ride(ride, now);
        }
        aggregate
    }

    /// Whether the totals of two aggregates agree within `tolerance`.
    ///
    /// Used by the administrative recompute to flag drift between the
    /// stored aggregate and a freshly computed one. Metadata and the
    /// processed-ID set are not compared.
    pub fn totals_match(&self, other: &Self, tolerance: f64) -> bool {
        self.total_rides == other.total_rides
            && self.total_coins == other.total_coins
            && (self.total_distance_km - other.total_distance_km).abs() <= tolerance
            && (self.distance_this_year_km - other.distance_this_year_km).abs() <= tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_ride(id: u64, distance: f64, speed: f64, time: u32, date: &str) -> Ride {
        let activity_date = chrono::DateTime::parse_from_rfc3339(date)
            .unwrap()
            .with_timezone(&Utc);
        Ride {
            ride_id: id,
            user_id: 42,
            name: format!("Test Ride {}", id),
            distance_km: distance,
            average_speed_kmh: speed,
            moving_time_secs: time,
            elevation_gained_m: 100.0,
            activity_date,
            coins_earned: crate::stats::compute_coins(distance, speed),
            created_at: date.to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_apply_ride_basic() {
        let mut agg = UserAggregate::default();
        let ride = make_ride(1, 20.0, 25.0, 2880, "2024-07-10T10:00:00Z");

        assert!(agg.apply_ride(&ride, now()));
        assert_eq!(agg.total_rides, 1);
        assert_eq!(agg.total_distance_km, 20.0);
        assert_eq!(agg.distance_this_year_km, 20.0);
        assert_eq!(agg.total_coins, 250);
        assert_eq!(agg.longest_ride_distance_km, 20.0);
        assert_eq!(agg.longest_ride_time_secs, 2880);
        assert_eq!(agg.best_efforts.best_20km_time_secs, Some(2880.0));
        assert_eq!(agg.best_efforts.best_10km_time_secs, Some(1440.0));
    }

    #[test]
    fn test_apply_ride_is_idempotent() {
        let mut agg = UserAggregate::default();
        let ride = make_ride(1, 20.0, 25.0, 2880, "2024-07-10T10:00:00Z");

        assert!(agg.apply_ride(&ride, now()));
        assert!(!agg.apply_ride(&ride, now()));
        assert_eq!(agg.total_rides, 1);
        assert_eq!(agg.total_coins, 250);
    }

    #[test]
    fn test_past_year_ride_skips_this_year_distance() {
        let mut agg = UserAggregate::default();
        let ride = make_ride(1, 30.0, 20.0, 5400, "2023-05-01T08:00:00Z");

        agg.apply_ride(&ride, now());
        assert_eq!(agg.total_distance_km, 30.0);
        assert_eq!(agg.distance_this_year_km, 0.0);
    }

    #[test]
    fn test_records_only_raise_on_strictly_greater() {
        let mut agg = UserAggregate::default();
        agg.apply_ride(&make_ride(1, 50.0, 25.0, 7200, "2024-03-01T08:00:00Z"), now());
        agg.apply_ride(&make_ride(2, 50.0, 20.0, 9000, "2024-03-02T08:00:00Z"), now());

        assert_eq!(agg.longest_ride_distance_km, 50.0);
        // Moving time is compared independently and did grow
        assert_eq!(agg.longest_ride_time_secs, 9000);
    }

    #[test]
    fn test_reverse_ride_takes_back_coins_only() {
        let mut agg = UserAggregate::default();
        let ride = make_ride(1, 20.0, 25.0, 2880, "2024-07-10T10:00:00Z");
        agg.apply_ride(&ride, now());

        assert!(agg.reverse_ride(&ride, now()));
        assert_eq!(agg.total_coins, 0);
        assert_eq!(agg.total_rides, 0);
        // Documented asymmetry: these are only repaired by recompute
        assert_eq!(agg.total_distance_km, 20.0);
        assert_eq!(agg.longest_ride_distance_km, 20.0);
        assert_eq!(agg.best_efforts.best_20km_time_secs, Some(2880.0));
    }

    #[test]
    fn test_reverse_unknown_ride_is_noop() {
        let mut agg = UserAggregate::default();
        let ride = make_ride(7, 20.0, 25.0, 2880, "2024-07-10T10:00:00Z");
        assert!(!agg.reverse_ride(&ride, now()));
        assert_eq!(agg, UserAggregate::default());
    }

    #[test]
    fn test_recompute_matches_incremental_replay() {
        let rides = vec![
            make_ride(3, 12.0, 18.0, 2400, "2024-02-01T09:00:00Z"),
            make_ride(1, 55.0, 26.0, 7615, "2023-11-20T07:30:00Z"),
            make_ride(4, 105.0, 24.0, 15750, "2024-06-15T06:00:00Z"),
            make_ride(2, 8.0, 35.0, 822, "2024-01-05T17:00:00Z"),
            make_ride(5, 20.0, 31.0, 2322, "2024-07-01T10:00:00Z"),
        ];

        // Incremental: apply in chronological order from a zeroed aggregate
        let mut chronological = rides.clone();
        chronological.sort_by_key(|r| r.activity_date);
        let mut incremental = UserAggregate::default();
        for ride in &chronological {
            incremental.apply_ride(ride, now());
        }

        // Batch: recompute from the unordered history
        let recomputed = UserAggregate::recompute_from(&rides, now());

        assert_eq!(incremental, recomputed);
    }

    #[test]
    fn test_recompute_after_delete_lowers_totals() {
        let rides = vec![
            make_ride(1, 100.0, 28.0, 12857, "2024-03-01T08:00:00Z"),
            make_ride(2, 15.0, 22.0, 2454, "2024-03-08T08:00:00Z"),
        ];
        let full = UserAggregate::recompute_from(&rides, now());
        assert_eq!(full.longest_ride_distance_km, 100.0);

        // Moderation deletes the century ride; recompute reflects survivors only
        let surviving = &rides[1..];
        let repaired = UserAggregate::recompute_from(surviving, now());
        assert_eq!(repaired.total_rides, 1);
        assert_eq!(repaired.longest_ride_distance_km, 15.0);
        assert_eq!(repaired.best_efforts.best_100km_time_secs, None);
        assert!(repaired.total_distance_km < full.total_distance_km);
    }

    #[test]
    fn test_recompute_of_empty_history_is_zeroed() {
        let repaired = UserAggregate::recompute_from(&[], now());
        assert_eq!(repaired.total_rides, 0);
        assert_eq!(repaired.total_distance_km, 0.0);
        assert_eq!(repaired.total_coins, 0);
        assert_eq!(repaired.best_efforts, crate::stats::BestEfforts::default());
    }

    #[test]
    fn test_totals_match_tolerance() {
        let rides = vec![make_ride(1, 20.0, 25.0, 2880, "2024-07-10T10:00:00Z")];
        let a = UserAggregate::recompute_from(&rides, now());
        let mut b = a.clone();
        assert!(a.totals_match(&b, 1e-6));

        b.total_distance_km += 0.5;
        assert!(!a.totals_match(&b, 1e-6));
    }
}
