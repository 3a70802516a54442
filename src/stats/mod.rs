// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pure statistics building blocks: coin rewards, ISO week math,
//! best-effort estimation. No I/O here; everything is deterministic
//! and unit-tested in isolation.

pub mod calendar;
pub mod efforts;
pub mod rewards;

pub use calendar::{week_of, WeekBounds};
pub use efforts::{BestEfforts, TARGET_DISTANCES_KM};
pub use rewards::compute_coins;
