//! Overlap report for a small hand-made snapshot.
//!
//! Run with: cargo run --example overlap_report

use city_overlap::{
    analyze_snapshot, are_same_city, assign_friend_colors, city_distance_km, summarize_friends,
    summarize_ratings, CityMark, ClusterPolicy, FriendCityMark, OverlapConfig, OWNER_COLOR,
};

fn main() {
    let own = vec![
        CityMark::new("m-1", "Lyon", 45.7640, 4.8357, 4),
        CityMark::new("m-2", "Paris", 48.8566, 2.3522, 3),
        CityMark::new("m-3", "Saint-Denis", 48.9362, 2.3574, 2),
    ];

    let colors = assign_friend_colors(["camille", "sam"]);
    let friend = |id: &str, who: usize, name: &str, lat: f64, lng: f64, rating: u8| {
        let (friend_id, color) = &colors[who];
        FriendCityMark::new(CityMark::new(id, name, lat, lng, rating), friend_id, friend_id, color.clone())
    };

    let friends = vec![
        friend("f-1", 0, "lyon", 45.7500, 4.8500, 5),
        friend("f-2", 0, "Marseille", 43.2965, 5.3698, 4),
        friend("f-3", 1, "Marseille", 43.3000, 5.3700, 2),
        // Same name, different island
        friend("f-4", 1, "Saint-Denis", -20.8821, 55.4507, 5),
    ];

    println!("City Overlap Report\n");

    println!("1. Identity checks:");
    for (a, b) in [(&own[0], &friends[0]), (&own[2], &friends[3])] {
        println!(
            "   {} vs {}: {:.1} km -> {}",
            a.city_name,
            b.city_name,
            city_distance_km(a, b),
            if are_same_city(a, b) { "same city" } else { "different cities" }
        );
    }

    let config = OverlapConfig::default();
    let snapshot = analyze_snapshot(&own, &friends, &config);

    println!("\n2. Overlap groups ({}):", snapshot.groups.len());
    for group in &snapshot.groups {
        let who: Vec<&str> = group
            .own_city_mark
            .iter()
            .map(|_| "you")
            .chain(group.friend_city_marks.iter().map(|m| m.friend_display_name.as_str()))
            .collect();
        println!(
            "   {} ({} people: {}) avg {:.1}/5",
            group.city_name,
            group.participant_count,
            who.join(", "),
            group.average_rating
        );
    }

    println!("\n3. Standalone marks:");
    for mark in &snapshot.standalone_own {
        println!("   [{}] {} {}/5", OWNER_COLOR, mark.city_name, mark.rating);
    }
    for mark in &snapshot.standalone_friends {
        println!(
            "   [{}] {} {}/5 ({})",
            mark.assigned_color.value, mark.city_name, mark.rating, mark.friend_display_name
        );
    }

    if let Some(bounds) = snapshot.bounds {
        let center = bounds.center();
        println!(
            "\n   Viewport: lat {:.2}..{:.2}, lng {:.2}..{:.2}, centered on ({:.3}, {:.3})",
            bounds.min_lat, bounds.max_lat, bounds.min_lng, bounds.max_lng, center.latitude, center.longitude
        );
    }

    let summary = summarize_ratings(&own);
    println!("\n4. Your ratings: {} cities, avg {:.1}", summary.mark_count, summary.average_rating);
    for bucket in &summary.distribution {
        println!("   {}* {}", bucket.rating, "#".repeat(bucket.count as usize));
    }

    println!("\n5. Friends:");
    for friend in summarize_friends(&friends) {
        println!(
            "   {} ({}): {} cities, avg {:.1}",
            friend.display_name, friend.color.name, friend.mark_count, friend.average_rating
        );
    }

    let representative = OverlapConfig {
        cluster_policy: ClusterPolicy::Representative,
        ..config
    };
    let groups = analyze_snapshot(&own, &friends, &representative).groups;
    println!("\nRepresentative clustering finds {} groups", groups.len());
}
