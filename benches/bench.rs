// Criterion benchmarks for SoulMatch

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use soulmatch::core::{
    calculate_bounding_box, calculate_compatibility, haversine_distance, matches_mutually, Matcher,
};
use soulmatch::models::{Gender, GeoPoint, Preferences, Profile, ScoringWeights, UserId};
use std::collections::HashSet;

const INTERESTS: [&str; 6] = ["hiking", "jazz", "chess", "cooking", "tennis", "film"];

fn create_candidate(id: usize, lat: f64, lon: f64) -> Profile {
    Profile {
        user_id: UserId(id as i64 + 2),
        display_name: format!("User {}", id),
        age: 22 + (id % 15) as u8,
        gender: if id % 2 == 0 { Gender::Female } else { Gender::Male },
        bio: "benchmark profile".to_string(),
        interests: INTERESTS
            .iter()
            .skip(id % INTERESTS.len())
            .take(3)
            .map(|s| s.to_string())
            .collect(),
        location: Some(GeoPoint {
            latitude: lat,
            longitude: lon,
        }),
        photo_file_id: (id % 3 == 0).then(|| format!("photo-{}", id)),
        preferences: Preferences {
            genders: [Gender::Male].into_iter().collect(),
            min_age: 21,
            max_age: 40,
            max_distance_km: Some(100),
        },
        updated_at: Utc::now() - Duration::minutes(id as i64),
    }
}

fn create_seeker() -> Profile {
    Profile {
        user_id: UserId(1),
        display_name: "Seeker".to_string(),
        age: 30,
        gender: Gender::Male,
        bio: "looking".to_string(),
        interests: ["hiking", "jazz", "film"].iter().map(|s| s.to_string()).collect(),
        location: Some(GeoPoint {
            latitude: 40.7128,
            longitude: -74.0060,
        }),
        photo_file_id: None,
        preferences: Preferences {
            genders: [Gender::Female].into_iter().collect(),
            min_age: 21,
            max_age: 35,
            max_distance_km: Some(50),
        },
        updated_at: Utc::now(),
    }
}

fn create_pool(count: usize) -> Vec<Profile> {
    (0..count)
        .map(|i| {
            let lat_offset = (i as f64 * 0.001) % 0.5;
            let lon_offset = (i as f64 * 0.001) % 0.5;
            create_candidate(i, 40.7128 + lat_offset, -74.0060 + lon_offset)
        })
        .collect()
}

fn bench_haversine_distance(c: &mut Criterion) {
    let from = GeoPoint {
        latitude: 40.7128,
        longitude: -74.0060,
    };
    let to = GeoPoint {
        latitude: 40.72,
        longitude: -74.01,
    };

    c.bench_function("haversine_distance", |b| {
        b.iter(|| haversine_distance(black_box(from), black_box(to)));
    });
}

fn bench_bounding_box(c: &mut Criterion) {
    let center = GeoPoint {
        latitude: 40.7128,
        longitude: -74.0060,
    };

    c.bench_function("bounding_box_calculation", |b| {
        b.iter(|| calculate_bounding_box(black_box(center), black_box(50.0)));
    });
}

fn bench_compatibility(c: &mut Criterion) {
    let seeker = create_seeker();
    let candidate = create_candidate(4, 40.72, -74.01);
    let weights = ScoringWeights::default();

    c.bench_function("compatibility_score", |b| {
        b.iter(|| calculate_compatibility(black_box(&seeker), black_box(&candidate), &weights));
    });
}

fn bench_ranking(c: &mut Criterion) {
    let matcher = Matcher::with_default_weights();
    let seeker = create_seeker();

    let mut group = c.benchmark_group("ranking");

    for candidate_count in [10, 50, 100, 500, 1000].iter() {
        let pool = create_pool(*candidate_count);
        // Every tenth candidate was already decided on
        let decided: HashSet<UserId> = pool.iter().step_by(10).map(|p| p.user_id).collect();

        group.bench_with_input(
            BenchmarkId::new("rank", candidate_count),
            candidate_count,
            |b, _| {
                b.iter(|| {
                    matcher.rank(
                        black_box(&seeker),
                        black_box(pool.clone()),
                        black_box(&decided),
                        black_box(20),
                    )
                });
            },
        );
    }

    group.finish();
}

fn bench_mutual_filter(c: &mut Criterion) {
    let seeker = create_seeker();
    let pool = create_pool(100);

    c.bench_function("mutual_filter_100_candidates", |b| {
        b.iter(|| {
            let filtered: Vec<_> = pool
                .iter()
                .filter(|p| matches_mutually(&seeker, p))
                .collect();

            black_box(filtered)
        });
    });
}

criterion_group!(
    benches,
    bench_haversine_distance,
    bench_bounding_box,
    bench_compatibility,
    bench_ranking,
    bench_mutual_filter
);

criterion_main!(benches);
