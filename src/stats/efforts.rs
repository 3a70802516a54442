// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Best-effort time estimation for fixed reference distances.
//!
//! The estimate assumes uniform pace across the whole ride:
//! `target / average_speed * 3600` seconds. This is an approximation, not
//! a true fastest-contiguous-segment extraction from the GPS trace, and is
//! kept deliberately simple. A record only ever improves here; deleting a
//! ride lowers a best effort solely through a full recompute, which resets
//! everything and replays the surviving history.

use serde::{Deserialize, Serialize};

/// Reference distances (km) a best effort is tracked for.
pub const TARGET_DISTANCES_KM: [f64; 6] = [10.0, 20.0, 25.0, 50.0, 75.0, 100.0];

/// Personal-best estimated times per reference distance, in seconds.
///
/// `None` means no ride has yet covered that distance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BestEfforts {
    #[serde(default)]
    pub best_10km_time_secs: Option<f64>,
    #[serde(default)]
    pub best_20km_time_secs: Option<f64>,
    #[serde(default)]
    pub best_25km_time_secs: Option<f64>,
    #[serde(default)]
    pub best_50km_time_secs: Option<f64>,
    #[serde(default)]
    pub best_75km_time_secs: Option<f64>,
    #[serde(default)]
    pub best_100km_time_secs: Option<f64>,
}

impl BestEfforts {
    /// Update records from a ride's realized pace.
    ///
    /// Targets the ride did not reach are skipped; qualifying targets are
    /// overwritten only when the new estimate is strictly faster.
    pub fn update_from_ride(&mut self, distance_km: f64, average_speed_kmh: f64) {
        if average_speed_kmh <= 0.0 {
            return;
        }

        for target in TARGET_DISTANCES_KM {
            if distance_km < target {
                continue;
            }
            let estimate = target / average_speed_kmh * 3600.0;
            let slot = self.slot_mut(target);
            match slot {
                Some(current) if *current <= estimate => {}
                _ => *slot = Some(estimate),
            }
        }
    }

    /// Look up the record for a reference distance.
    pub fn get(&self, target_km: f64) -> Option<f64> {
        match target_km as u32 {
            10 => self.best_10km_time_secs,
            20 => self.best_20km_time_secs,
            25 => self.best_25km_time_secs,
            50 => self.best_50km_time_secs,
            75 => self.best_75km_time_secs,
            100 => self.best_100km_time_secs,
            _ => None,
        }
    }

    fn slot_mut(&mut self, target_km: f64) -> &mut Option<f64> {
        match target_km as u32 {
            10 => &mut self.best_10km_time_secs,
            20 => &mut self.best_20km_time_secs,
            25 => &mut self.best_25km_time_secs,
            50 => &mut self.best_50km_time_secs,
            75 => &mut self.best_75km_time_secs,
            _ => &mut self.best_100km_time_secs,
        }
    }
}
