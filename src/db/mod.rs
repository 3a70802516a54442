//! Database layer (Firestore).

pub mod firestore;

pub use firestore::{FirestoreDb, RideQueryCursor};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const RIDES: &str = "rides";
    /// Per-user statistics aggregates (keyed by user_id)
    pub const USER_AGGREGATES: &str = "user_aggregates";
    /// Weekly rollups (keyed by "{user_id}_{iso_year}_{iso_week}")
    pub const WEEKLY_AGGREGATES: &str = "weekly_aggregates";
}
