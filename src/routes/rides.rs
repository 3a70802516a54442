// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ride CRUD routes (the slice that feeds the statistics engine).

use crate::db::RideQueryCursor;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Ride;
use crate::services::RideSubmission;
use super::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MAX_PER_PAGE: u32 = 100;
const CURSOR_PARTS: usize = 3;

/// Ride routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/rides", post(create_ride))
        .route("/api/rides", get(list_rides))
        .route("/api/rides/{id}", delete(delete_ride))
}

// ─── Shared Shapes ───────────────────────────────────────────

/// Ride as returned by the API.
#[derive(Serialize, Clone, Debug)]
pub struct RideResponse {
    pub id: u64,
    pub name: String,
    pub distance_km: f64,
    pub average_speed_kmh: f64,
    pub moving_time_secs: u32,
    pub elevation_gained_m: f64,
    pub activity_date: String,
    pub coins_earned: i64,
}

impl From<Ride> for RideResponse {
    fn from(ride: Ride) -> Self {
        Self {
            id: ride.ride_id,
            name: ride.name,
            distance_km: ride.distance_km,
            average_speed_kmh: ride.average_speed_kmh,
            moving_time_secs: ride.moving_time_secs,
            elevation_gained_m: ride.elevation_gained_m,
            activity_date: format_utc_rfc3339(ride.activity_date),
            coins_earned: ride.coins_earned,
        }
    }
}

// ─── Create ──────────────────────────────────────────────────

/// Record a new ride. The response carries the computed coin reward.
async fn create_ride(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(submission): Json<RideSubmission>,
) -> Result<Json<RideResponse>> {
    tracing::debug!(
        user_id = user.user_id,
        distance_km = submission.distance_km,
        "Creating ride"
    );

    let ride = state.stats.on_ride_created(user.user_id, submission).await?;
    Ok(Json(ride.into()))
}

// ─── Delete ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct DeleteRideQuery {
    /// Rebuild the full aggregate from the surviving history instead of
    /// only reversing the coin credit. Moderation and account-deletion
    /// flows pass true.
    #[serde(default)]
    full_recompute: bool,
}

#[derive(Serialize)]
pub struct DeleteRideResponse {
    pub deleted: bool,
    pub recomputed: bool,
}

/// Delete a ride owned by the current user.
async fn delete_ride(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<u64>,
    Query(params): Query<DeleteRideQuery>,
) -> Result<Json<DeleteRideResponse>> {
    tracing::info!(
        user_id = user.user_id,
        ride_id,
        full_recompute = params.full_recompute,
        "Deleting ride"
    );

    state
        .stats
        .on_ride_deleted(user.user_id, ride_id, params.full_recompute)
        .await?;

    Ok(Json(DeleteRideResponse {
        deleted: true,
        recomputed: params.full_recompute,
    }))
}

// ─── List ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RidesQuery {
    /// Cursor for forward pagination (opaque token).
    cursor: Option<String>,
    /// Pagination: items per page
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_per_page() -> u32 {
    50
}

#[derive(Serialize)]
pub struct RidesResponse {
    pub rides: Vec<RideResponse>,
    pub per_page: u32,
    pub next_cursor: Option<String>,
}

fn parse_cursor(cursor: Option<&str>) -> Result<Option<RideQueryCursor>> {
    cursor
        .map(|raw| {
            let invalid_cursor =
                || AppError::BadRequest("Invalid 'cursor' parameter".to_string());

            let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid_cursor())?;
            let decoded_str = std::str::from_utf8(&decoded).map_err(|_| invalid_cursor())?;

            let parts: Vec<&str> = decoded_str.split(':').collect();
            if parts.len() != CURSOR_PARTS {
                return Err(invalid_cursor());
            }

            let seconds = parts[0].parse::<i64>().map_err(|_| invalid_cursor())?;
            let nanos = parts[1].parse::<u32>().map_err(|_| invalid_cursor())?;
            let ride_id = parts[2].parse::<u64>().map_err(|_| invalid_cursor())?;
            let activity_date =
                chrono::DateTime::from_timestamp(seconds, nanos).ok_or_else(invalid_cursor)?;

            Ok(RideQueryCursor {
                activity_date,
                ride_id,
            })
        })
        .transpose()
}

fn encode_cursor(cursor: RideQueryCursor) -> String {
    let payload = format!(
        "{}:{}:{}",
        cursor.activity_date.timestamp(),
        cursor.activity_date.timestamp_subsec_nanos(),
        cursor.ride_id
    );
    URL_SAFE_NO_PAD.encode(payload)
}

/// List the current user's rides, newest first.
async fn list_rides(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<RidesQuery>,
) -> Result<Json<RidesResponse>> {
    let limit = params.per_page.min(MAX_PER_PAGE);
    let cursor = parse_cursor(params.cursor.as_deref())?;

    // Fetch one extra item to determine if another page is available.
    let fetch_limit = limit.saturating_add(1);
    let mut rides = state
        .db
        .get_rides_page(user.user_id, cursor, fetch_limit)
        .await?;

    let has_more = rides.len() > limit as usize;
    if has_more {
        rides.truncate(limit as usize);
    }

    let next_cursor = if has_more {
        rides.last().map(|r| {
            encode_cursor(RideQueryCursor {
                activity_date: r.activity_date,
                ride_id: r.ride_id,
            })
        })
    } else {
        None
    };

    Ok(Json(RidesResponse {
        rides: rides.into_iter().map(RideResponse::from).collect(),
        per_page: limit,
        next_cursor,
    }))
}
