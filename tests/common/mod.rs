// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::sync::Arc;
use velocoin::config::Config;
use velocoin::db::FirestoreDb;
use velocoin::routes::create_router;
use velocoin::services::StatsService;
use velocoin::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();
    let stats = StatsService::new(db.clone());

    let state = Arc::new(AppState { config, db, stats });

    (create_router(state.clone()), state)
}

/// Create a test user document in the emulator.
#[allow(dead_code)]
pub async fn seed_user(db: &FirestoreDb, user_id: u64) {
    let user = velocoin::models::User {
        user_id,
        email: Some(format!("user{}@example.com", user_id)),
        display_name: format!("Test User {}", user_id),
        created_at: chrono::Utc::now().to_rfc3339(),
        last_active: chrono::Utc::now().to_rfc3339(),
    };
    db.upsert_user(&user).await.expect("Failed to create test user");
}
