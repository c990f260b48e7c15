//! # Geographic Utilities
//!
//! Geographic computations used by the resolver, the aggregator and the
//! ingestion boundary.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance_km`] | Great-circle distance between two points (R = 6371 km) |
//! | [`to_unit_sphere`] | Project a point onto the unit sphere for spatial indexing |
//! | [`chord_for_distance_km`] | Unit-sphere chord length spanning a great-circle distance |
//! | [`compute_bounds`] | Bounding box of a set of points |
//! | [`boundary_polygon`] | Build a polygon from a city boundary ring |
//!
//! ## Example
//!
//! ```rust
//! use city_overlap::{GeoPoint, geo_utils};
//!
//! let paris = GeoPoint::new(48.8566, 2.3522);
//! let lyon = GeoPoint::new(45.7640, 4.8357);
//!
//! let dist = geo_utils::haversine_distance_km(&paris, &lyon);
//! assert!((dist - 392.0).abs() < 5.0);
//!
//! let bounds = geo_utils::compute_bounds(&[paris, lyon]).unwrap();
//! assert_eq!(bounds.max_lat, 48.8566);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Distances are computed on a spherical Earth of radius 6371 km. Two geocoder
//! results for the same city usually land a few hundred meters apart, well
//! inside the 5 km identity gate, so the spherical model is accurate enough.
//!
//! ### Spatial Indexing
//!
//! Points are indexed as 3D unit vectors. The straight-line (chord) distance
//! between two unit vectors grows monotonically with their great-circle
//! distance, so a ball query in 3D finds exactly the candidates within a
//! great-circle radius, with no special cases at the poles or across the
//! antimeridian.

use geo::{BoundingRect, Coord, LineString, MultiPoint, Point, Polygon};

use crate::{Bounds, GeoPoint};

/// Mean Earth radius used for all distance computations.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Minimum number of vertices for a usable boundary ring.
pub const MIN_BOUNDARY_VERTICES: usize = 3;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two points using the Haversine formula.
///
/// Returns the distance in kilometers on a sphere of radius [`EARTH_RADIUS_KM`].
///
/// # Example
///
/// ```rust
/// use city_overlap::{GeoPoint, geo_utils};
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance_km(&london, &paris);
/// assert!((distance - 343.5).abs() < 1.0);
/// ```
#[inline]
pub fn haversine_distance_km(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lng = (p2.longitude - p1.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Project a point onto the unit sphere as `[x, y, z]`.
#[inline]
pub fn to_unit_sphere(p: &GeoPoint) -> [f64; 3] {
    let lat = p.latitude.to_radians();
    let lng = p.longitude.to_radians();
    [lat.cos() * lng.cos(), lat.cos() * lng.sin(), lat.sin()]
}

/// Chord length on the unit sphere between two points `distance_km` apart
/// along the surface.
///
/// Distances beyond half the circumference saturate at the diameter (2.0).
#[inline]
pub fn chord_for_distance_km(distance_km: f64) -> f64 {
    let angle = (distance_km / EARTH_RADIUS_KM).clamp(0.0, std::f64::consts::PI);
    2.0 * (angle / 2.0).sin()
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a set of points.
///
/// Returns `None` for empty input. Used by renderers to fit the map viewport
/// around a snapshot. Longitudes take the narrowest span covering every point,
/// so marks on both sides of the antimeridian give a box with
/// `min_lng > max_lng` instead of one spanning the whole globe.
///
/// # Example
///
/// ```rust
/// use city_overlap::{GeoPoint, geo_utils};
///
/// let points = vec![
///     GeoPoint::new(43.2965, 5.3698),
///     GeoPoint::new(48.8566, 2.3522),
///     GeoPoint::new(45.7640, 4.8357),
/// ];
///
/// let bounds = geo_utils::compute_bounds(&points).unwrap();
/// assert_eq!(bounds.min_lat, 43.2965);
/// assert_eq!(bounds.max_lat, 48.8566);
/// assert_eq!(bounds.min_lng, 2.3522);
/// assert_eq!(bounds.max_lng, 5.3698);
/// ```
pub fn compute_bounds(points: &[GeoPoint]) -> Option<Bounds> {
    let multi: MultiPoint<f64> = points
        .iter()
        .map(|p| Point::new(p.longitude, p.latitude))
        .collect::<Vec<_>>()
        .into();

    let rect = multi.bounding_rect()?;
    let (min_lng, max_lng) = longitude_span(points).unwrap_or((rect.min().x, rect.max().x));

    Some(Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng,
        max_lng,
    })
}

/// Narrowest longitude interval covering every point, as `(west, east)`.
///
/// The interval is the complement of the widest gap between neighbouring
/// longitudes. The gap across the antimeridian wins ties, so ordinary sets
/// keep `west <= east`.
fn longitude_span(points: &[GeoPoint]) -> Option<(f64, f64)> {
    let mut lngs: Vec<f64> = points.iter().map(|p| p.longitude).collect();
    lngs.sort_by(f64::total_cmp);
    let (&first, &last) = (lngs.first()?, lngs.last()?);

    let mut widest = (first + 360.0 - last, first, last);
    for pair in lngs.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > widest.0 {
            widest = (gap, pair[1], pair[0]);
        }
    }
    Some((widest.1, widest.2))
}

// =============================================================================
// Boundary Functions
// =============================================================================

/// Build a polygon from a city boundary ring.
///
/// Returns `None` when the ring has fewer than [`MIN_BOUNDARY_VERTICES`]
/// vertices or any vertex is invalid. The ring does not need to be closed;
/// [`geo`] closes it.
pub fn boundary_polygon(points: &[GeoPoint]) -> Option<Polygon<f64>> {
    if points.len() < MIN_BOUNDARY_VERTICES || !points.iter().all(GeoPoint::is_valid) {
        return None;
    }

    let coords: Vec<Coord> = points
        .iter()
        .map(|p| Coord { x: p.longitude, y: p.latitude })
        .collect();

    Some(Polygon::new(LineString::new(coords), vec![]))
}

// =============================================================================
// Unit Tests
// =============================================================================
