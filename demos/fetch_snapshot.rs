//! Fetch a live snapshot from the store and print its overlaps.
//!
//! Run with:
//!   STORE_URL=https://xyz.supabase.co STORE_API_KEY=... STORE_TOKEN=... USER_ID=... \
//!     cargo run --example fetch_snapshot --features http

use city_overlap::http::fetch_snapshot_sync;
use city_overlap::{analyze_snapshot, ingest_friend_marks, ingest_own_marks, FetchConfig, OverlapConfig};
use std::env;

fn main() {
    let vars: Result<Vec<String>, _> = ["STORE_URL", "STORE_API_KEY", "STORE_TOKEN", "USER_ID"]
        .iter()
        .map(env::var)
        .collect();
    let Ok(vars) = vars else {
        eprintln!("Set STORE_URL, STORE_API_KEY, STORE_TOKEN and USER_ID");
        std::process::exit(1);
    };

    let config = FetchConfig::new(&vars[0], &vars[1], &vars[2]);
    let raw = match fetch_snapshot_sync(config, &vars[3]) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Fetch failed: {e}");
            std::process::exit(1);
        }
    };

    let own = ingest_own_marks(&raw.own_rows);
    let friends = ingest_friend_marks(&raw.friends);
    println!(
        "Fetched {} own marks ({} rejected), {} friend marks from {} friends ({} rejected)\n",
        own.marks.len(),
        own.rejected.len(),
        friends.marks.len(),
        raw.friends.len(),
        friends.rejected.len()
    );

    let snapshot = analyze_snapshot(&own.marks, &friends.marks, &OverlapConfig::default());
    for group in &snapshot.groups {
        println!(
            "{:<20} {} people, avg {:.1}",
            group.city_name, group.participant_count, group.average_rating
        );
    }
    println!(
        "\n{} standalone own, {} standalone friend marks",
        snapshot.standalone_own.len(),
        snapshot.standalone_friends.len()
    );
}
