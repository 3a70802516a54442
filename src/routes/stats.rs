// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Statistics routes: aggregate snapshot, weekly graph, best efforts,
//! administrative recompute.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{UserAggregate, WeeklyAggregate};
use crate::stats::BestEfforts;
use super::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_GRAPH_WEEKS: u32 = 12;
const MAX_GRAPH_WEEKS: u32 = 104;

/// Statistics routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/stats/weekly", get(get_weekly_graph))
        .route("/api/stats/efforts", get(get_best_efforts))
        .route("/api/stats/recompute", post(recompute_stats))
}

// ─── Aggregate Snapshot ──────────────────────────────────────

/// User statistics snapshot (1 Firestore read).
#[derive(Serialize)]
pub struct StatsResponse {
    pub total_rides: u32,
    pub total_distance_km: f64,
    pub distance_this_year_km: f64,
    pub total_coins: i64,
    pub longest_ride_distance_km: f64,
    pub longest_ride_time_secs: u32,
    pub max_elevation_gained_m: f64,
    #[serde(flatten)]
    pub best_efforts: BestEfforts,
    pub updated_at: String,
}

impl From<UserAggregate> for StatsResponse {
    fn from(agg: UserAggregate) -> Self {
        Self {
            total_rides: agg.total_rides,
            total_distance_km: agg.total_distance_km,
            distance_this_year_km: agg.distance_this_year_km,
            total_coins: agg.total_coins,
            longest_ride_distance_km: agg.longest_ride_distance_km,
            longest_ride_time_secs: agg.longest_ride_time_secs,
            max_elevation_gained_m: agg.max_elevation_gained_m,
            best_efforts: agg.best_efforts,
            updated_at: agg.updated_at,
        }
    }
}

/// Get the pre-computed aggregate for the current user.
async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StatsResponse>> {
    let aggregate = state.stats.get_user_stats(user.user_id).await?;
    Ok(Json(aggregate.into()))
}

// ─── Weekly Graph ────────────────────────────────────────────

#[derive(Deserialize)]
struct WeeklyGraphQuery {
    /// How many recent weeks to return
    weeks: Option<u32>,
}

/// One point of the weekly graph series.
#[derive(Serialize)]
pub struct WeekSummary {
    pub iso_year: i32,
    pub iso_week: u32,
    pub week_start: String,
    pub week_end: String,
    pub total_distance_km: f64,
    pub total_rides: u32,
    pub total_coins: i64,
    pub total_moving_time_secs: u64,
    pub average_speed_kmh: f64,
}

impl From<WeeklyAggregate> for WeekSummary {
    fn from(weekly: WeeklyAggregate) -> Self {
        Self {
            iso_year: weekly.iso_year,
            iso_week: weekly.iso_week,
            week_start: format_utc_rfc3339(weekly.week_start),
            week_end: format_utc_rfc3339(weekly.week_end),
            total_distance_km: weekly.total_distance_km,
            total_rides: weekly.total_rides,
            total_coins: weekly.total_coins,
            total_moving_time_secs: weekly.total_moving_time_secs,
            average_speed_kmh: weekly.average_speed_kmh,
        }
    }
}

#[derive(Serialize)]
pub struct WeeklyGraphResponse {
    /// Oldest week first
    pub weeks: Vec<WeekSummary>,
}

/// Get the weekly rollup series for the current user, oldest week first.
async fn get_weekly_graph(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<WeeklyGraphQuery>,
) -> Result<Json<WeeklyGraphResponse>> {
    let weeks = params
        .weeks
        .unwrap_or(DEFAULT_GRAPH_WEEKS)
        .min(MAX_GRAPH_WEEKS);

    let rollups = state.stats.get_weekly_graph(user.user_id, weeks).await?;
    Ok(Json(WeeklyGraphResponse {
        weeks: rollups.into_iter().map(WeekSummary::from).collect(),
    }))
}

// ─── Best Efforts ────────────────────────────────────────────

/// Get the best-effort times for the fixed reference distances.
/// Nulls mean the user has never covered that distance in one ride.
async fn get_best_efforts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<BestEfforts>> {
    let efforts = state.stats.get_best_efforts(user.user_id).await?;
    Ok(Json(efforts))
}

// ─── Administrative Recompute ────────────────────────────────

#[derive(Deserialize)]
struct RecomputeQuery {
    /// Treat drift as an error (500 inconsistent_aggregate) instead of a
    /// flag in the response. The repair is persisted either way.
    #[serde(default)]
    strict: bool,
}

#[derive(Serialize)]
pub struct RecomputeResponse {
    pub recomputed: bool,
    /// Whether the stored aggregate had diverged from the ride history
    pub drift_detected: bool,
    pub total_rides: u32,
    pub total_coins: i64,
}

/// Rebuild the current user's aggregate from the ride history.
async fn recompute_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<RecomputeQuery>,
) -> Result<Json<RecomputeResponse>> {
    let (fresh, drift) = if params.strict {
        let fresh = state.stats.recompute_all_strict(user.user_id).await?;
        (fresh, false)
    } else {
        state.stats.recompute_all(user.user_id).await?
    };

    Ok(Json(RecomputeResponse {
        recomputed: true,
        drift_detected: drift,
        total_rides: fresh.total_rides,
        total_coins: fresh.total_coins,
    }))
}
