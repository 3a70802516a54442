// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Benchmark for full aggregate recomputation.
//!
//! Recompute replays the entire surviving ride history, so its cost grows
//! with history size; this tracks that cost for realistic histories.

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use velocoin::models::{Ride, UserAggregate};
use velocoin::stats::compute_coins;

fn make_history(rides: usize) -> Vec<Ride> {
    let start = Utc.with_ymd_and_hms(2020, 1, 6, 9, 0, 0).unwrap();
    (0..rides)
        .map(|i| {
            let distance = 5.0 + (i % 40) as f64 * 2.5;
            let speed = 15.0 + (i % 20) as f64;
            Ride {
                ride_id: i as u64,
                user_id: 1,
                name: format!("Ride {}", i),
                distance_km: distance,
                average_speed_kmh: speed,
                moving_time_secs: (distance / speed * 3600.0) as u32,
                elevation_gained_m: (i % 15) as f64 * 90.0,
                activity_date: start + Duration::days(i as i64 % 1400),
                coins_earned: compute_coins(distance, speed),
                created_at: start.to_rfc3339(),
            }
        })
        .collect()
}

fn bench_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("recompute_from");
    let now = Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap();

    for size in [100, 1_000, 10_000] {
        let history = make_history(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &history, |b, rides| {
            b.iter(|| UserAggregate::recompute_from(std::hint::black_box(rides), now));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_recompute);
criterion_main!(benches);
