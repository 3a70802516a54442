// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Statistics orchestration service.
//!
//! Single entry point for the two aggregate-mutating events (ride created,
//! ride deleted) and the read queries backing the dashboard. All mutations
//! for one user run under that user's update permit, so an administrative
//! recompute can never interleave with an incremental update in-process;
//! the Firestore transactions in the db layer cover cross-instance races.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use validator::Validate;

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{Ride, UserAggregate, WeeklyAggregate};
use crate::stats::{compute_coins, BestEfforts};

/// Ride creation payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RideSubmission {
    /// Ride name/title (optional, defaults to "Ride")
    pub name: Option<String>,
    /// Distance in kilometers
    #[validate(range(min = 0.0, message = "distance must be non-negative"))]
    pub distance_km: f64,
    /// Average speed in km/h
    #[validate(range(min = 0.0, message = "average speed must be non-negative"))]
    pub average_speed_kmh: f64,
    /// Moving time in seconds
    pub moving_time_secs: u32,
    /// Elevation gained in meters
    #[validate(range(min = 0.0, message = "elevation must be non-negative"))]
    pub elevation_gained_m: f64,
    /// When the ride took place
    pub activity_date: DateTime<Utc>,
}

/// Orchestrates reward accounting and statistics aggregation.
#[derive(Clone)]
pub struct StatsService {
    db: FirestoreDb,
    /// Per-user update permits. Mutations of a user's aggregates are
    /// serialized through the user's permit and the guard is released on
    /// every exit path when it drops.
    user_locks: Arc<DashMap<u64, Arc<Mutex<()>>>>,
}

impl StatsService {
    pub fn new(db: FirestoreDb) -> Self {
        Self {
            db,
            user_locks: Arc::new(DashMap::new()),
        }
    }

    /// Acquire the update permit for one user.
    async fn lock_user(&self, user_id: u64) -> OwnedMutexGuard<()> {
        let lock = self
            .user_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Handle a new ride: compute the coin reward, persist the ride, and
    /// fold it into the user and weekly aggregates atomically.
    ///
    /// Returns the stored ride with `coins_earned` set.
    pub async fn on_ride_created(
        &self,
        user_id: u64,
        submission: RideSubmission,
    ) -> Result<Ride> {
        submission
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let now = Utc::now();
        let coins = compute_coins(submission.distance_km, submission.average_speed_kmh);

        let ride = Ride {
            // Nanosecond timestamps are unique enough for a single-writer
            // creation path; rides from devices carry their own IDs upstream.
            ride_id: now.timestamp_nanos_opt().unwrap_or(0) as u64,
            user_id,
            name: submission.name.unwrap_or_else(|| "Ride".to_string()),
            distance_km: submission.distance_km,
            average_speed_kmh: submission.average_speed_kmh,
            moving_time_secs: submission.moving_time_secs,
            elevation_gained_m: submission.elevation_gained_m,
            activity_date: submission.activity_date,
            coins_earned: coins,
            created_at: now.to_rfc3339(),
        };

        let _permit = self.lock_user(user_id).await;
        self.db.apply_ride_atomic(&ride).await?;

        Ok(ride)
    }

    /// Handle a ride deletion.
    ///
    /// The coin credit is reversed eagerly; everything else is left as-is
    /// unless `full_recompute` is set (moderation-driven and account
    /// deletion flows), in which case the aggregate is rebuilt from the
    /// surviving history. Cheap common-case deletes, expensive exact
    /// consistency only where it matters.
    pub async fn on_ride_deleted(
        &self,
        user_id: u64,
        ride_id: u64,
        full_recompute: bool,
    ) -> Result<()> {
        let ride = self
            .db
            .get_ride(ride_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ride {} not found", ride_id)))?;

        if ride.user_id != user_id {
            // Do not leak whether a foreign ride exists
            return Err(AppError::NotFound(format!("Ride {} not found", ride_id)));
        }

        let _permit = self.lock_user(user_id).await;
        self.db.delete_ride_atomic(&ride).await?;

        if full_recompute {
            self.db.recompute_user_aggregate(user_id).await?;
        }

        Ok(())
    }

    /// Current user aggregate snapshot.
    pub async fn get_user_stats(&self, user_id: u64) -> Result<UserAggregate> {
        if self.db.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(self
            .db
            .get_user_aggregate(user_id)
            .await?
            .unwrap_or_default())
    }

    /// The most recent `weeks` weekly rollups, oldest first.
    pub async fn get_weekly_graph(
        &self,
        user_id: u64,
        weeks: u32,
    ) -> Result<Vec<WeeklyAggregate>> {
        let mut rollups = self
            .db
            .get_recent_weekly_aggregates(user_id, weeks)
            .await?;
        // Fetched newest-first; the graph contract is ascending by week
        rollups.reverse();
        Ok(rollups)
    }

    /// Best-effort times for the fixed reference distances.
    pub async fn get_best_efforts(&self, user_id: u64) -> Result<BestEfforts> {
        Ok(self.get_user_stats(user_id).await?.best_efforts)
    }

    /// Administrative repair: rebuild the user aggregate from the ride
    /// history. Returns the fresh aggregate and whether drift was found.
    pub async fn recompute_all(&self, user_id: u64) -> Result<(UserAggregate, bool)> {
        let _permit = self.lock_user(user_id).await;
        self.db.recompute_user_aggregate(user_id).await
    }

    /// Like [`recompute_all`](Self::recompute_all), but drift is an error.
    ///
    /// For audit-style callers that want divergence surfaced rather than
    /// silently repaired. The repair still happens (the fresh aggregate is
    /// already persisted when this returns), so a second strict call on an
    /// unchanged history succeeds.
    pub async fn recompute_all_strict(&self, user_id: u64) -> Result<UserAggregate> {
        let (fresh, drift) = self.recompute_all(user_id).await?;
        if drift {
            return Err(AppError::Inconsistent(format!(
                "Aggregate for user {} diverged from the ride history (now repaired)",
                user_id
            )));
        }
        Ok(fresh)
    }
}
