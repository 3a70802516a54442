// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ride model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored ride record in Firestore.
///
/// Rides are immutable once written; corrective flows delete the document
/// and recompute aggregates rather than mutating in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    /// Server-assigned ride ID (also used as document ID)
    pub ride_id: u64,
    /// Owning user ID
    pub user_id: u64,
    /// Ride name/title
    pub name: String,
    /// Distance in kilometers
    pub distance_km: f64,
    /// Average speed in km/h
    pub average_speed_kmh: f64,
    /// Moving time in seconds
    pub moving_time_secs: u32,
    /// Elevation gained in meters
    pub elevation_gained_m: f64,
    /// When the ride took place (stored as a native Firestore timestamp
    /// so range filters and ordering compare correctly)
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub activity_date: DateTime<Utc>,
    /// Coin reward, derived from distance and speed at creation
    pub coins_earned: i64,
    /// When this ride was stored (RFC3339)
    pub created_at: String,
}
