//! Validation of store rows at the ingestion boundary.
//!
//! Rows arrive loosely typed: any field may be missing, the rating is a
//! floating point number and boundary rings are raw `[lat, lng]` arrays. Each
//! row is validated into a [`CityMark`] or [`FriendCityMark`] before it reaches
//! the resolver, so the core only ever sees finite, in-range coordinates and
//! integer ratings. A bad row is logged and skipped; it never aborts the batch.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::colors::assign_friend_colors;
use crate::geo_utils::boundary_polygon;
use crate::{CityMark, FriendCityMark, FriendColor, GeoPoint};

/// Display name used when a friend has neither a pseudo nor an email.
pub const FALLBACK_DISPLAY_NAME: &str = "Friend";

/// A city mark row as stored, before validation.
///
/// Field aliases accept the column names of the hosted store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct MarkRow {
    pub id: Option<String>,
    #[serde(alias = "nom_ville")]
    pub city_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(alias = "note")]
    pub rating: Option<f64>,
    /// Boundary ring as `[lat, lng]` pairs
    #[serde(alias = "frontieres")]
    pub boundary: Option<Vec<Vec<f64>>>,
    #[serde(alias = "auth_user_id")]
    pub owner_id: Option<String>,
    pub created_at: Option<String>,
}

/// Public profile of a friend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct FriendProfile {
    /// Not returned by the profile RPC; filled in by the caller
    #[serde(default)]
    pub id: String,
    pub pseudo: Option<String>,
    pub email: Option<String>,
    #[serde(alias = "code_ami")]
    pub friend_code: Option<String>,
}

impl FriendProfile {
    /// Pseudo, else the local part of the email, else [`FALLBACK_DISPLAY_NAME`].
    ///
    /// # Example
    /// ```
    /// use city_overlap::FriendProfile;
    ///
    /// let profile = FriendProfile {
    ///     id: "u-1".to_string(),
    ///     email: Some("camille@example.org".to_string()),
    ///     ..FriendProfile::default()
    /// };
    /// assert_eq!(profile.display_name(), "camille");
    /// ```
    pub fn display_name(&self) -> String {
        let pseudo = self.pseudo.as_deref().map(str::trim).filter(|p| !p.is_empty());
        let local_part = self
            .email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|local| !local.is_empty());

        pseudo
            .or(local_part)
            .unwrap_or(FALLBACK_DISPLAY_NAME)
            .to_string()
    }
}

/// A friend's profile with their mark rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct FriendMarks {
    pub profile: FriendProfile,
    pub rows: Vec<MarkRow>,
}

/// Why a row was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarkError {
    #[error("mark row has no id")]
    MissingId,

    #[error("mark {id}: city name is empty")]
    MissingName { id: String },

    #[error("mark {id}: missing {field}")]
    MissingField { id: String, field: &'static str },

    #[error("mark {id}: {field} is not finite")]
    NonFinite { id: String, field: &'static str },

    #[error("mark {id}: latitude {value} out of range")]
    LatitudeOutOfRange { id: String, value: f64 },

    #[error("mark {id}: longitude {value} out of range")]
    LongitudeOutOfRange { id: String, value: f64 },

    #[error("mark {id}: rating {value} is not an integer from 1 to 5")]
    InvalidRating { id: String, value: f64 },

    #[error("mark {id}: author profile has no id")]
    MissingFriendId { id: String },
}

/// Payload decoding failure.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Validated marks plus the rows that were rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested<T> {
    pub marks: Vec<T>,
    pub rejected: Vec<MarkError>,
}

impl<T> Ingested<T> {
    fn new() -> Self {
        Self { marks: Vec::new(), rejected: Vec::new() }
    }

    fn push(&mut self, result: Result<T, MarkError>) {
        match result {
            Ok(mark) => self.marks.push(mark),
            Err(e) => {
                warn!("[ingest] Skipping row: {}", e);
                self.rejected.push(e);
            }
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Validate one row into a mark.
///
/// # Example
/// ```
/// use city_overlap::{MarkError, MarkRow};
/// use city_overlap::ingest::validate_row;
///
/// let row = MarkRow {
///     id: Some("m-1".to_string()),
///     city_name: Some("Lyon".to_string()),
///     latitude: Some(45.764),
///     longitude: Some(4.8357),
///     rating: Some(f64::NAN),
///     ..MarkRow::default()
/// };
/// assert!(matches!(validate_row(&row), Err(MarkError::NonFinite { field: "rating", .. })));
/// ```
pub fn validate_row(row: &MarkRow) -> Result<CityMark, MarkError> {
    let id = row
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(MarkError::MissingId)?;

    let city_name = row
        .city_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| MarkError::MissingName { id: id.to_string() })?;

    let latitude = finite_field(id, "latitude", row.latitude)?;
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(MarkError::LatitudeOutOfRange { id: id.to_string(), value: latitude });
    }

    let longitude = finite_field(id, "longitude", row.longitude)?;
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(MarkError::LongitudeOutOfRange { id: id.to_string(), value: longitude });
    }

    let rating = finite_field(id, "rating", row.rating)?;
    if rating.fract() != 0.0 || !(1.0..=5.0).contains(&rating) {
        return Err(MarkError::InvalidRating { id: id.to_string(), value: rating });
    }

    let mut mark = CityMark::new(id, city_name, latitude, longitude, rating as u8);
    if let Some(ring) = row.boundary.as_deref() {
        match parse_boundary(ring) {
            Some(boundary) => mark = mark.with_boundary(boundary),
            None => warn!("[ingest] Mark {}: dropping invalid boundary ({} vertices)", id, ring.len()),
        }
    }

    Ok(mark)
}

fn finite_field(id: &str, field: &'static str, value: Option<f64>) -> Result<f64, MarkError> {
    match value {
        None => Err(MarkError::MissingField { id: id.to_string(), field }),
        Some(v) if !v.is_finite() => Err(MarkError::NonFinite { id: id.to_string(), field }),
        Some(v) => Ok(v),
    }
}

/// Convert a raw `[lat, lng]` ring, or `None` when it cannot form a polygon.
fn parse_boundary(ring: &[Vec<f64>]) -> Option<Vec<GeoPoint>> {
    let points: Vec<GeoPoint> = ring
        .iter()
        .map(|vertex| match vertex.as_slice() {
            [lat, lng] => Some(GeoPoint::new(*lat, *lng)),
            _ => None,
        })
        .collect::<Option<_>>()?;

    boundary_polygon(&points).map(|_| points)
}

// ============================================================================
// Batch Ingestion
// ============================================================================

/// Validate the acting user's rows.
pub fn ingest_own_marks(rows: &[MarkRow]) -> Ingested<CityMark> {
    let mut ingested = Ingested::new();
    for row in rows {
        ingested.push(validate_row(row));
    }
    debug!(
        "[ingest] Own marks: {} accepted, {} rejected",
        ingested.marks.len(),
        ingested.rejected.len()
    );
    ingested
}

/// Trimmed profile id, or `None` when blank.
fn friend_id(friend: &FriendMarks) -> Option<&str> {
    Some(friend.profile.id.trim()).filter(|id| !id.is_empty())
}

/// Validate friends' rows, tagging each mark with its author's display name
/// and color. Colors are assigned in friend order.
///
/// Rows of a friend whose profile has a blank id are rejected: without an id
/// their marks cannot be attributed.
pub fn ingest_friend_marks(friends: &[FriendMarks]) -> Ingested<FriendCityMark> {
    let colors = assign_friend_colors(friends.iter().filter_map(friend_id));
    let color_of = |id: &str| -> FriendColor {
        colors
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, color)| color.clone())
            .unwrap_or_default()
    };

    let mut ingested = Ingested::new();
    for friend in friends {
        let Some(id) = friend_id(friend) else {
            warn!(
                "[ingest] Friend profile without id, rejecting {} rows",
                friend.rows.len()
            );
            for row in &friend.rows {
                ingested.push(Err(MarkError::MissingFriendId {
                    id: row.id.clone().unwrap_or_default(),
                }));
            }
            continue;
        };

        let display_name = friend.profile.display_name();
        let color = color_of(id);
        for row in &friend.rows {
            ingested.push(validate_row(row).map(|mark| {
                FriendCityMark::new(mark, id, &display_name, color.clone())
            }));
        }
    }
    debug!(
        "[ingest] Friend marks from {} friends: {} accepted, {} rejected",
        friends.len(),
        ingested.marks.len(),
        ingested.rejected.len()
    );
    ingested
}

/// Decode a JSON array of mark rows.
pub fn parse_mark_rows(json: &str) -> Result<Vec<MarkRow>, IngestError> {
    Ok(serde_json::from_str(json)?)
}

/// Decode a JSON array of friends with their rows.
pub fn parse_friend_marks(json: &str) -> Result<Vec<FriendMarks>, IngestError> {
    Ok(serde_json::from_str(json)?)
}
