//! Overlap analysis over a large synthetic snapshot.
//!
//! Run with: cargo run --release --example batch_overlaps --features parallel

use city_overlap::{
    assign_friend_colors, compute_overlaps_parallel, compute_overlaps_with_config, CityMark,
    FriendCityMark, OverlapConfig,
};
use std::time::Instant;

const CITIES: [(&str, f64, f64); 8] = [
    ("Paris", 48.8566, 2.3522),
    ("Lyon", 45.7640, 4.8357),
    ("Marseille", 43.2965, 5.3698),
    ("Toulouse", 43.6047, 1.4442),
    ("Bordeaux", 44.8378, -0.5792),
    ("Lille", 50.6292, 3.0573),
    ("Nantes", 47.2184, -1.5536),
    ("Strasbourg", 48.5734, 7.7521),
];

/// Deterministic pseudo-random offset in degrees, up to ~1.5 km.
fn jitter(seed: usize) -> f64 {
    let x = (seed as u64).wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    ((x >> 33) % 2000) as f64 / 2000.0 * 0.027 - 0.0135
}

fn main() {
    println!("Batch Overlap Example\n");

    let own: Vec<CityMark> = CITIES
        .iter()
        .step_by(2)
        .enumerate()
        .map(|(i, (name, lat, lng))| CityMark::new(&format!("own-{i}"), name, *lat, *lng, 4))
        .collect();

    let friend_ids: Vec<String> = (0..200).map(|i| format!("friend-{i}")).collect();
    let colors = assign_friend_colors(friend_ids.iter().map(String::as_str));

    let mut friends = Vec::new();
    for (f, (friend_id, color)) in colors.iter().enumerate() {
        for c in 0..10 {
            let seed = f * 10 + c;
            let (name, lat, lng) = CITIES[(f + c * 3) % CITIES.len()];
            let mark = CityMark::new(
                &format!("{friend_id}-{c}"),
                name,
                lat + jitter(seed),
                lng + jitter(seed + 7),
                (seed % 5) as u8 + 1,
            );
            friends.push(FriendCityMark::new(mark, friend_id, friend_id, color.clone()));
        }
    }

    let config = OverlapConfig::default();
    println!("{} own marks, {} friend marks\n", own.len(), friends.len());

    let start = Instant::now();
    let sequential = compute_overlaps_with_config(&own, &friends, &config);
    println!("Sequential: {} groups in {:?}", sequential.len(), start.elapsed());

    let start = Instant::now();
    let parallel = compute_overlaps_parallel(&own, &friends, &config);
    println!("Parallel:   {} groups in {:?}", parallel.len(), start.elapsed());

    println!("Outputs identical: {}\n", sequential == parallel);

    for group in parallel.iter().take(10) {
        println!(
            "  {:<12} {:>4} marks  avg {:.1}  {}",
            group.city_name,
            group.participant_count,
            group.average_rating,
            if group.own_city_mark.is_some() { "(with you)" } else { "" }
        );
    }
}
