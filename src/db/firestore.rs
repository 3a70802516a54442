// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile storage)
//! - Rides (ride records with physical metrics)
//! - User aggregates (per-user running statistics)
//! - Weekly aggregates (per-ISO-week rollups)
//!
//! All aggregate mutations that accompany a ride write go through
//! Firestore transactions. The aggregate reads use the transaction's
//! consistency selector, so they join the transaction's read set and a
//! concurrent commit to the same documents fails this commit instead of
//! silently losing an increment; commits are retried with fresh reads a
//! bounded number of times.

use chrono::{DateTime, Utc};

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Ride, User, UserAggregate, WeeklyAggregate};
use crate::stats;

/// How many times a conflicting aggregate transaction is retried with
/// fresh reads before giving up.
const MAX_TXN_ATTEMPTS: u32 = 8;

/// Cursor for paginated ride listing (newest first).
#[derive(Debug, Clone, Copy)]
pub struct RideQueryCursor {
    pub activity_date: DateTime<Utc>,
    pub ride_id: u64,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: u64) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user.user_id.to_string())
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Ride Operations ─────────────────────────────────────────

    /// Get a ride by ID.
    pub async fn get_ride(&self, ride_id: u64) -> Result<Option<Ride>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::RIDES)
            .obj()
            .one(&ride_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a user's full ride history, ordered by activity date ascending.
    ///
    /// This is the replay input for aggregate recomputation; the ascending
    /// order matches the order incremental updates would have seen.
    pub async fn find_rides_by_user(&self, user_id: u64) -> Result<Vec<Ride>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RIDES)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id)]))
            .order_by([(
                "activity_date",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a page of a user's rides, newest first, with cursor pagination.
    pub async fn get_rides_page(
        &self,
        user_id: u64,
        cursor: Option<RideQueryCursor>,
        limit: u32,
    ) -> Result<Vec<Ride>, AppError> {
        let query = self.get_client()?.fluent().select().from(collections::RIDES);

        let query = if let Some(cursor) = cursor {
            let before = cursor.activity_date;
            query.filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id),
                    q.field("activity_date").less_than(before),
                ])
            })
        } else {
            query.filter(move |q| q.for_all([q.field("user_id").eq(user_id)]))
        };

        query
            .order_by([(
                "activity_date",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── User Aggregate Operations ───────────────────────────────

    /// Get the user aggregate document.
    pub async fn get_user_aggregate(
        &self,
        user_id: u64,
    ) -> Result<Option<UserAggregate>, AppError> {
        Self::read_user_aggregate(self.get_client()?, user_id).await
    }

    /// Read the user aggregate through an explicit client, e.g. one carrying
    /// a transaction consistency selector.
    async fn read_user_aggregate(
        client: &firestore::FirestoreDb,
        user_id: u64,
    ) -> Result<Option<UserAggregate>, AppError> {
        client
            .fluent()
            .select()
            .by_id_in(collections::USER_AGGREGATES)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store the user aggregate document.
    pub async fn set_user_aggregate(
        &self,
        user_id: u64,
        aggregate: &UserAggregate,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USER_AGGREGATES)
            .document_id(user_id.to_string())
            .object(aggregate)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Weekly Aggregate Operations ─────────────────────────────

    /// Get a weekly rollup by its composite key.
    pub async fn get_weekly_aggregate(
        &self,
        user_id: u64,
        iso_year: i32,
        iso_week: u32,
    ) -> Result<Option<WeeklyAggregate>, AppError> {
        Self::read_weekly_aggregate(self.get_client()?, user_id, iso_year, iso_week).await
    }

    /// Read a weekly rollup through an explicit client, e.g. one carrying
    /// a transaction consistency selector.
    async fn read_weekly_aggregate(
        client: &firestore::FirestoreDb,
        user_id: u64,
        iso_year: i32,
        iso_week: u32,
    ) -> Result<Option<WeeklyAggregate>, AppError> {
        client
            .fluent()
            .select()
            .by_id_in(collections::WEEKLY_AGGREGATES)
            .obj()
            .one(&WeeklyAggregate::doc_id(user_id, iso_year, iso_week))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the N most recent weekly rollups for a user.
    ///
    /// Returned in descending week order; the service reverses them so the
    /// caller-facing contract is strictly ascending.
    pub async fn get_recent_weekly_aggregates(
        &self,
        user_id: u64,
        weeks: u32,
    ) -> Result<Vec<WeeklyAggregate>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::WEEKLY_AGGREGATES)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id)]))
            .order_by([(
                "week_start",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(weeks)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Atomic Ride Processing ──────────────────────────────────

    /// Atomically store a ride and fold it into both aggregates.
    ///
    /// A single Firestore transaction covers the ride write, the user
    /// aggregate update, and the weekly rollup get-or-create + update.
    /// Both aggregate reads go through the transaction's consistency
    /// selector, so a concurrent commit to either document makes this
    /// commit fail; the whole read-modify-write is then retried with
    /// fresh reads, and no increment is lost even across server
    /// instances. The weekly document ID is derived from (user_id,
    /// iso_year, iso_week), so concurrent first-writers for the same week
    /// converge on one document.
    ///
    /// Returns `true` if the ride was newly processed, `false` if it was
    /// already in the aggregate's processed set (idempotent duplicate).
    pub async fn apply_ride_atomic(&self, ride: &Ride) -> Result<bool, AppError> {
        let user_id = ride.user_id;
        let ride_id = ride.ride_id;

        // A ride for a deleted or never-created user must not materialize
        // aggregates out of nothing.
        if self.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        for attempt in 1..=MAX_TXN_ATTEMPTS {
            let client = self.get_client()?;
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            // Reads must carry the transaction's consistency selector to
            // join its read set; a plain select would leave the commit
            // without preconditions and lose concurrent increments.
            let txn_client = client.clone_with_consistency_selector(
                firestore::FirestoreConsistencySelector::Transaction(
                    transaction.transaction_id().clone(),
                ),
            );

            let now = Utc::now();
            let mut aggregate: UserAggregate =
                Self::read_user_aggregate(&txn_client, user_id)
                    .await?
                    .unwrap_or_default();

            if !aggregate.apply_ride(ride, now) {
                tracing::debug!(user_id, ride_id, "Ride already processed (idempotent skip)");
                let _ = transaction.rollback().await;
                return Ok(false);
            }

            let bounds = stats::week_of(ride.activity_date);
            let mut weekly = Self::read_weekly_aggregate(
                &txn_client,
                user_id,
                bounds.iso_year,
                bounds.iso_week,
            )
            .await?
            .unwrap_or_else(|| WeeklyAggregate::new(user_id, &bounds));
            weekly.apply_ride(ride);

            client
                .fluent()
                .update()
                .in_col(collections::RIDES)
                .document_id(ride_id.to_string())
                .object(ride)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add ride to transaction: {}", e))
                })?;

            client
                .fluent()
                .update()
                .in_col(collections::USER_AGGREGATES)
                .document_id(user_id.to_string())
                .object(&aggregate)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add aggregate to transaction: {}", e))
                })?;

            client
                .fluent()
                .update()
                .in_col(collections::WEEKLY_AGGREGATES)
                .document_id(WeeklyAggregate::doc_id(
                    user_id,
                    bounds.iso_year,
                    bounds.iso_week,
                ))
                .object(&weekly)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!(
                        "Failed to add weekly rollup to transaction: {}",
                        e
                    ))
                })?;

            match transaction.commit().await {
                Ok(_) => {
                    tracing::info!(
                        user_id,
                        ride_id,
                        coins = ride.coins_earned,
                        iso_year = bounds.iso_year,
                        iso_week = bounds.iso_week,
                        "Ride processed atomically"
                    );
                    return Ok(true);
                }
                Err(e) if attempt < MAX_TXN_ATTEMPTS => {
                    tracing::debug!(
                        user_id,
                        ride_id,
                        attempt,
                        error = %e,
                        "Transaction conflict, retrying with fresh reads"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(
                        25 * u64::from(attempt),
                    ))
                    .await;
                }
                Err(e) => {
                    return Err(AppError::Database(format!(
                        "Transaction commit failed: {}",
                        e
                    )));
                }
            }
        }

        Err(AppError::Database(
            "Transaction retries exhausted".to_string(),
        ))
    }

    /// Atomically delete a ride and reverse its coin credit.
    ///
    /// Only the cheap reversal happens here; distance, records, and best
    /// efforts are left untouched until a recompute (see
    /// [`recompute_user_aggregate`](Self::recompute_user_aggregate)).
    pub async fn delete_ride_atomic(&self, ride: &Ride) -> Result<(), AppError> {
        let user_id = ride.user_id;

        for attempt in 1..=MAX_TXN_ATTEMPTS {
            let client = self.get_client()?;
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            // Same consistency-selector read as apply_ride_atomic: the
            // reversal must not race a concurrent apply on the same user.
            let txn_client = client.clone_with_consistency_selector(
                firestore::FirestoreConsistencySelector::Transaction(
                    transaction.transaction_id().clone(),
                ),
            );

            let now = Utc::now();
            let mut aggregate: UserAggregate =
                Self::read_user_aggregate(&txn_client, user_id)
                    .await?
                    .unwrap_or_default();
            aggregate.reverse_ride(ride, now);

            client
                .fluent()
                .delete()
                .from(collections::RIDES)
                .document_id(ride.ride_id.to_string())
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add deletion to transaction: {}", e))
                })?;

            client
                .fluent()
                .update()
                .in_col(collections::USER_AGGREGATES)
                .document_id(user_id.to_string())
                .object(&aggregate)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add aggregate to transaction: {}", e))
                })?;

            match transaction.commit().await {
                Ok(_) => {
                    tracing::info!(
                        user_id,
                        ride_id = ride.ride_id,
                        coins_reversed = ride.coins_earned,
                        "Ride deleted, coin credit reversed"
                    );
                    return Ok(());
                }
                Err(e) if attempt < MAX_TXN_ATTEMPTS => {
                    tracing::debug!(
                        user_id,
                        ride_id = ride.ride_id,
                        attempt,
                        error = %e,
                        "Transaction conflict, retrying with fresh reads"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(
                        25 * u64::from(attempt),
                    ))
                    .await;
                }
                Err(e) => {
                    return Err(AppError::Database(format!(
                        "Transaction commit failed: {}",
                        e
                    )));
                }
            }
        }

        Err(AppError::Database(
            "Transaction retries exhausted".to_string(),
        ))
    }

    /// Rebuild the user aggregate from the surviving ride history.
    ///
    /// Returns the fresh aggregate and whether the stored one had drifted
    /// from it beyond a small tolerance (a diagnostic signal; the fresh
    /// aggregate always wins and is persisted).
    pub async fn recompute_user_aggregate(
        &self,
        user_id: u64,
    ) -> Result<(UserAggregate, bool), AppError> {
        if self.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        let rides = self.find_rides_by_user(user_id).await?;
        let now = Utc::now();
        let fresh = UserAggregate::recompute_from(&rides, now);

        let stored = self.get_user_aggregate(user_id).await?.unwrap_or_default();
        let drift = !stored.totals_match(&fresh, 1e-6);
        if drift {
            tracing::warn!(
                user_id,
                stored_distance = stored.total_distance_km,
                fresh_distance = fresh.total_distance_km,
                stored_coins = stored.total_coins,
                fresh_coins = fresh.total_coins,
                "Stored aggregate diverged from recomputed history"
            );
        }

        self.set_user_aggregate(user_id, &fresh).await?;

        tracing::info!(
            user_id,
            rides = rides.len(),
            drift,
            "User aggregate recomputed"
        );

        Ok((fresh, drift))
    }
}
