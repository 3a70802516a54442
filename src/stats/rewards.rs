// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Coin reward calculation.
//!
//! The reward for a ride is `round(distance_km * average_speed_kmh / 2)`,
//! rounded half away from zero (`f64::round` semantics). Deterministic,
//! no side effects.

/// Compute the coin reward for a ride.
///
/// Callers must reject negative inputs before calling; this function is
/// total over the non-negative domain and never produces negative coins
/// for valid inputs.
pub fn compute_coins(distance_km: f64, average_speed_kmh: f64) -> i64 {
    (distance_km * average_speed_kmh / 2.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_coins_basic() {
        // 20 km at 25 km/h: round(20 * 25 / 2) = 250
        assert_eq!(compute_coins(20.0, 25.0), 250);
    }

    #[test]
    fn test_compute_coins_zero_inputs() {
        assert_eq!(compute_coins(0.0, 25.0), 0);
        assert_eq!(compute_coins(20.0, 0.0), 0);
        assert_eq!(compute_coins(0.0, 0.0), 0);
    }

    #[test]
    fn test_compute_coins_half_boundary_rounds_away_from_zero() {
        // 1 km at 25 km/h: 25/2 = 12.5 -> 13, not 12 (banker's rounding
        // would give 12; we pin half-away-from-zero).
        assert_eq!(compute_coins(1.0, 25.0), 13);
        // 23/2 = 11.5 -> 12
        assert_eq!(compute_coins(1.0, 23.0), 12);
    }

    #[test]
    fn test_compute_coins_monotone_in_distance_and_speed() {
        let speeds = [0.0, 5.0, 12.5, 20.0, 31.0];
        let distances = [0.0, 1.0, 9.9, 42.0, 120.0];

        for &s in &speeds {
            let mut prev = i64::MIN;
            for &d in &distances {
                let coins = compute_coins(d, s);
                assert!(coins >= prev, "not monotone in distance at d={d} s={s}");
                prev = coins;
            }
        }
        for &d in &distances {
            let mut prev = i64::MIN;
            for &s in &speeds {
                let coins = compute_coins(d, s);
                assert!(coins >= prev, "not monotone in speed at d={d} s={s}");
                prev = coins;
            }
        }
    }
}
