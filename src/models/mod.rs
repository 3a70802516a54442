// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod aggregates;
pub mod ride;
pub mod user;
pub mod weekly;

pub use aggregates::UserAggregate;
pub use ride::Ride;
pub use user::User;
pub use weekly::WeeklyAggregate;
