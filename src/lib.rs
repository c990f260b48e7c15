//! # City Overlap
//!
//! Overlap analysis for shared visited-city maps.
//!
//! Users mark cities they have visited and rate them 1-5. This library decides
//! which of a user's marks and their friends' marks refer to the same real-world
//! city, folds them into overlap groups for composite rendering, and splits the
//! remaining marks off as standalone entries.
//!
//! This library provides:
//! - City identity resolution (normalized name + haversine distance gate)
//! - Overlap aggregation (owner-anchored groups, then friend-only clusters)
//! - Standalone filtering of marks that belong to no group
//! - Validation of loosely typed store rows before they reach the core
//! - Friend color assignment and rating statistics
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel candidate matching with rayon
//! - **`http`** - Enable REST client for snapshot fetching
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use city_overlap::{CityMark, FriendCityMark, FriendColor, compute_overlaps, filter_standalone};
//!
//! let own = vec![CityMark::new("m-1", "Lyon", 45.7640, 4.8357, 4)];
//! let friends = vec![FriendCityMark::new(
//!     CityMark::new("f-1", "Lyon", 45.7500, 4.8500, 5),
//!     "friend-1",
//!     "Camille",
//!     FriendColor::default(),
//! )];
//!
//! let groups = compute_overlaps(&own, &friends);
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].participant_count, 2);
//! assert_eq!(groups[0].average_rating, 4.5);
//!
//! assert!(filter_standalone(&own, &groups).is_empty());
//! ```

use serde::{Deserialize, Serialize};

pub mod geo_utils;

// City identity resolution
pub mod resolver;
pub use resolver::{are_same_city, are_same_city_with_config, city_distance_km, normalize_city_name};

// Overlap aggregation
pub mod overlaps;
pub use overlaps::{compute_overlaps, compute_overlaps_with_config};
#[cfg(feature = "parallel")]
pub use overlaps::compute_overlaps_parallel;

// Standalone (non-overlapping) filtering
pub mod standalone;
pub use standalone::{filter_standalone, grouped_mark_ids};

// Row validation at the ingestion boundary
pub mod ingest;
pub use ingest::{
    FriendMarks, FriendProfile, IngestError, Ingested, MarkError, MarkRow,
    ingest_friend_marks, ingest_own_marks,
};

// Friend colors
pub mod colors;
pub use colors::{FriendColor, OWNER_COLOR, assign_friend_colors, color_for};

// Rating statistics
pub mod stats;
pub use stats::{FriendSummary, RatingBucket, RatingSummary, summarize_friends, summarize_ratings};

// REST module for snapshot fetching
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{FetchConfig, FetchError, RawSnapshot, SnapshotFetcher};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("CityOverlapRust")
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate with latitude and longitude in decimal degrees.
///
/// # Example
/// ```
/// use city_overlap::GeoPoint;
/// let lyon = GeoPoint::new(45.7640, 4.8357);
/// assert!(lyon.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has finite, in-range coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box of a set of points (used to fit the map viewport).
///
/// `min_lng` is the western edge and `max_lng` the eastern edge. When the box
/// crosses the antimeridian, `min_lng > max_lng`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Check if the box spans the antimeridian.
    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lng > self.max_lng
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        let longitude = if self.crosses_antimeridian() {
            let mid = (self.min_lng + self.max_lng + 360.0) / 2.0;
            if mid > 180.0 { mid - 360.0 } else { mid }
        } else {
            (self.min_lng + self.max_lng) / 2.0
        };
        GeoPoint::new((self.min_lat + self.max_lat) / 2.0, longitude)
    }
}

/// A city the acting user has visited and rated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct CityMark {
    /// Stable identifier of the mark
    pub id: String,
    /// City name as returned by the geocoder when the mark was created
    pub city_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Rating, 1 to 5 inclusive
    pub rating: u8,
    /// Administrative boundary polygon, when the boundary lookup succeeded
    pub boundary: Option<Vec<GeoPoint>>,
}

impl CityMark {
    /// Create a mark without a boundary polygon.
    pub fn new(id: &str, city_name: &str, latitude: f64, longitude: f64, rating: u8) -> Self {
        Self {
            id: id.to_string(),
            city_name: city_name.to_string(),
            latitude,
            longitude,
            rating,
            boundary: None,
        }
    }

    /// Attach a boundary polygon.
    pub fn with_boundary(mut self, boundary: Vec<GeoPoint>) -> Self {
        self.boundary = Some(boundary);
        self
    }
}

/// A friend's mark, as seen (read-only) by the acting user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct FriendCityMark {
    pub id: String,
    pub city_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: u8,
    pub boundary: Option<Vec<GeoPoint>>,
    /// Friend who authored the mark
    pub friend_id: String,
    /// Friend's visible name
    pub friend_display_name: String,
    /// Display color assigned to the friend
    pub assigned_color: FriendColor,
}

impl FriendCityMark {
    /// Wrap a mark authored by a friend.
    pub fn new(mark: CityMark, friend_id: &str, friend_display_name: &str, assigned_color: FriendColor) -> Self {
        Self {
            id: mark.id,
            city_name: mark.city_name,
            latitude: mark.latitude,
            longitude: mark.longitude,
            rating: mark.rating,
            boundary: mark.boundary,
            friend_id: friend_id.to_string(),
            friend_display_name: friend_display_name.to_string(),
            assigned_color,
        }
    }
}

/// Either the acting user's mark or a friend's mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Mark {
    Own { mark: CityMark },
    Friend { mark: FriendCityMark },
}

/// One real-world city marked by at least two people.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct CityOverlapGroup {
    /// Name of the representative mark
    pub city_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// The acting user's mark for this city, if any
    pub own_city_mark: Option<CityMark>,
    /// Friend marks folded into the group, in input order
    pub friend_city_marks: Vec<FriendCityMark>,
    /// Mean of all participant ratings, rounded to one decimal
    pub average_rating: f64,
    /// Number of marks in the group (always >= 2)
    pub participant_count: u32,
}

impl CityOverlapGroup {
    /// Iterate over the ids of every mark in the group.
    pub fn member_ids(&self) -> impl Iterator<Item = &str> {
        self.own_city_mark
            .iter()
            .map(|m| m.id.as_str())
            .chain(self.friend_city_marks.iter().map(|m| m.id.as_str()))
    }
}

/// How friend-only marks are clustered once owner-anchored groups are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum ClusterPolicy {
    /// Full transitive closure: A~B and B~C put A, B and C together.
    #[default]
    Transitive,
    /// The first unassigned mark anchors a cluster and only pulls marks that
    /// match the anchor itself.
    Representative,
}

/// Configuration for overlap analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct OverlapConfig {
    /// Two marks with matching names are the same city only when they are
    /// strictly closer than this great-circle distance.
    /// Default: 5.0 km
    pub same_city_distance_km: f64,

    /// Clustering policy for friend-only groups.
    /// Default: transitive closure
    pub cluster_policy: ClusterPolicy,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            same_city_distance_km: 5.0,
            cluster_policy: ClusterPolicy::Transitive,
        }
    }
}

/// Overlap groups plus the standalone marks of each list, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct OverlapSnapshot {
    pub groups: Vec<CityOverlapGroup>,
    pub standalone_own: Vec<CityMark>,
    pub standalone_friends: Vec<FriendCityMark>,
    /// Viewport covering every mark, `None` when there are no marks
    pub bounds: Option<Bounds>,
}

// ============================================================================
// Mark Accessors
// ============================================================================

/// Anything with a city name and a location can be compared by the resolver.
pub trait CityRef {
    fn city_name(&self) -> &str;
    fn location(&self) -> GeoPoint;
}

/// A rated mark with a stable identifier.
pub trait MarkRef: CityRef {
    fn id(&self) -> &str;
    fn rating(&self) -> u8;
}

impl CityRef for CityMark {
    fn city_name(&self) -> &str {
        &self.city_name
    }

    fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

impl MarkRef for CityMark {
    fn id(&self) -> &str {
        &self.id
    }

    fn rating(&self) -> u8 {
        self.rating
    }
}

impl CityRef for FriendCityMark {
    fn city_name(&self) -> &str {
        &self.city_name
    }

    fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

impl MarkRef for FriendCityMark {
    fn id(&self) -> &str {
        &self.id
    }

    fn rating(&self) -> u8 {
        self.rating
    }
}

impl CityRef for Mark {
    fn city_name(&self) -> &str {
        match self {
            Mark::Own { mark } => &mark.city_name,
            Mark::Friend { mark } => &mark.city_name,
        }
    }

    fn location(&self) -> GeoPoint {
        match self {
            Mark::Own { mark } => mark.location(),
            Mark::Friend { mark } => mark.location(),
        }
    }
}

impl MarkRef for Mark {
    fn id(&self) -> &str {
        match self {
            Mark::Own { mark } => &mark.id,
            Mark::Friend { mark } => &mark.id,
        }
    }

    fn rating(&self) -> u8 {
        match self {
            Mark::Own { mark } => mark.rating,
            Mark::Friend { mark } => mark.rating,
        }
    }
}

// ============================================================================
// Core Functions
// ============================================================================

/// Compute overlap groups and split both lists into their standalone parts.
///
/// This is the full analysis for one snapshot: the caller re-runs it after any
/// mark or friendship change instead of patching a previous result.
///
/// # Example
/// ```
/// use city_overlap::{CityMark, OverlapConfig, analyze_snapshot};
///
/// let own = vec![CityMark::new("m-1", "Paris", 48.8566, 2.3522, 3)];
/// let snapshot = analyze_snapshot(&own, &[], &OverlapConfig::default());
/// assert!(snapshot.groups.is_empty());
/// assert_eq!(snapshot.standalone_own.len(), 1);
/// ```
pub fn analyze_snapshot(
    own: &[CityMark],
    friends: &[FriendCityMark],
    config: &OverlapConfig,
) -> OverlapSnapshot {
    let groups = compute_overlaps_with_config(own, friends, config);
    let standalone_own = filter_standalone(own, &groups);
    let standalone_friends = filter_standalone(friends, &groups);

    let locations: Vec<GeoPoint> = own
        .iter()
        .map(CityRef::location)
        .chain(friends.iter().map(CityRef::location))
        .collect();

    OverlapSnapshot {
        groups,
        standalone_own,
        standalone_friends,
        bounds: geo_utils::compute_bounds(&locations),
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::info;

    /// Check whether two marks refer to the same city.
    #[uniffi::export]
    pub fn ffi_are_same_city(a: Mark, b: Mark, config: OverlapConfig) -> bool {
        are_same_city_with_config(&a, &b, &config)
    }

    /// Compute overlap groups for already-validated marks.
    #[uniffi::export]
    pub fn ffi_compute_overlaps(
        own: Vec<CityMark>,
        friends: Vec<FriendCityMark>,
        config: OverlapConfig,
    ) -> Vec<CityOverlapGroup> {
        init_logging();
        info!("[CityOverlapRust] compute_overlaps called with {} own + {} friend marks", own.len(), friends.len());

        let start = std::time::Instant::now();
        let groups = compute_overlaps_parallel(&own, &friends, &config);
        info!("[CityOverlapRust] Found {} overlap groups in {:?}", groups.len(), start.elapsed());

        groups
    }

    /// Compute groups and standalone lists in one call.
    #[uniffi::export]
    pub fn ffi_analyze_snapshot(
        own: Vec<CityMark>,
        friends: Vec<FriendCityMark>,
        config: OverlapConfig,
    ) -> OverlapSnapshot {
        init_logging();
        info!("[CityOverlapRust] analyze_snapshot: {} own + {} friend marks", own.len(), friends.len());
        analyze_snapshot(&own, &friends, &config)
    }

    /// Validate raw store rows, assign friend colors and analyze them.
    /// Malformed rows are logged and skipped.
    #[uniffi::export]
    pub fn ffi_analyze_rows(
        own_rows: Vec<MarkRow>,
        friends: Vec<FriendMarks>,
        config: OverlapConfig,
    ) -> OverlapSnapshot {
        init_logging();
        let own = ingest_own_marks(&own_rows);
        let friend_marks = ingest_friend_marks(&friends);
        info!(
            "[CityOverlapRust] analyze_rows: {} own ({} rejected), {} friend ({} rejected)",
            own.marks.len(),
            own.rejected.len(),
            friend_marks.marks.len(),
            friend_marks.rejected.len()
        );
        analyze_snapshot(&own.marks, &friend_marks.marks, &config)
    }

    /// Own marks that are part of no overlap group.
    #[uniffi::export]
    pub fn ffi_filter_standalone_own(
        marks: Vec<CityMark>,
        overlaps: Vec<CityOverlapGroup>,
    ) -> Vec<CityMark> {
        filter_standalone(&marks, &overlaps)
    }

    /// Friend marks that are part of no overlap group.
    #[uniffi::export]
    pub fn ffi_filter_standalone_friends(
        marks: Vec<FriendCityMark>,
        overlaps: Vec<CityOverlapGroup>,
    ) -> Vec<FriendCityMark> {
        filter_standalone(&marks, &overlaps)
    }

    /// A friend id paired with its display color.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FriendColorAssignment {
        pub friend_id: String,
        pub color: FriendColor,
    }

    /// Assign colors to friends in the given order.
    #[uniffi::export]
    pub fn ffi_assign_friend_colors(friend_ids: Vec<String>) -> Vec<FriendColorAssignment> {
        assign_friend_colors(friend_ids.iter().map(String::as_str))
            .into_iter()
            .map(|(friend_id, color)| FriendColorAssignment { friend_id, color })
            .collect()
    }

    /// Rating summary of the acting user's marks.
    #[uniffi::export]
    pub fn ffi_summarize_ratings(marks: Vec<CityMark>) -> RatingSummary {
        summarize_ratings(&marks)
    }

    /// Get default configuration.
    #[uniffi::export]
    pub fn default_config() -> OverlapConfig {
        init_logging();
        OverlapConfig::default()
    }

    /// Fetch the snapshot for `user_id` and analyze it in one call.
    #[cfg(feature = "http")]
    #[uniffi::export]
    pub fn ffi_fetch_and_analyze(
        base_url: String,
        api_key: String,
        access_token: String,
        user_id: String,
        config: OverlapConfig,
    ) -> Option<OverlapSnapshot> {
        init_logging();
        info!("[CityOverlapRust] fetch_and_analyze for user {}", user_id);

        let fetch_config = crate::http::FetchConfig::new(&base_url, &api_key, &access_token);
        match crate::http::fetch_snapshot_sync(fetch_config, &user_id) {
            Ok(raw) => {
                let own = ingest_own_marks(&raw.own_rows);
                let friend_marks = ingest_friend_marks(&raw.friends);
                Some(analyze_snapshot(&own.marks, &friend_marks.marks, &config))
            }
            Err(e) => {
                log::warn!("[CityOverlapRust] Snapshot fetch failed: {}", e);
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
