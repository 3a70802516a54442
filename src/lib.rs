// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Velocoin: cycling-activity tracker with coin rewards
//!
//! This crate provides the backend API for recording rides, paying out
//! deterministic coin rewards, and maintaining per-user and per-ISO-week
//! statistics aggregates.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod stats;

use config::Config;
use db::FirestoreDb;
use services::StatsService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub stats: StatsService,
}
