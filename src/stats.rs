//! Rating statistics for the stats panel and the friends list.

use serde::{Deserialize, Serialize};

use crate::{FriendCityMark, FriendColor, MarkRef};

/// Number of marks with a given rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RatingBucket {
    pub rating: u8,
    pub count: u32,
}

/// Summary of a list of marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RatingSummary {
    pub mark_count: u32,
    /// Mean rating rounded to one decimal, 0.0 for an empty list
    pub average_rating: f64,
    /// Buckets for ratings 5, 4, 3, 2, 1 (in that order)
    pub distribution: Vec<RatingBucket>,
}

/// Per-friend totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct FriendSummary {
    pub friend_id: String,
    pub display_name: String,
    pub color: FriendColor,
    pub mark_count: u32,
    pub average_rating: f64,
}

/// Round to one decimal place (half away from zero).
#[inline]
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Mean of the ratings rounded to one decimal, or `None` when empty.
pub fn mean_rating<I>(ratings: I) -> Option<f64>
where
    I: IntoIterator<Item = u8>,
{
    let (sum, count) = ratings
        .into_iter()
        .fold((0u32, 0u32), |(sum, count), r| (sum + u32::from(r), count + 1));

    if count == 0 {
        return None;
    }
    Some(round_to_tenth(f64::from(sum) / f64::from(count)))
}

/// Summarize the ratings of a list of marks.
///
/// # Example
/// ```
/// use city_overlap::{CityMark, summarize_ratings};
///
/// let marks = vec![
///     CityMark::new("1", "Lyon", 45.764, 4.8357, 4),
///     CityMark::new("2", "Paris", 48.8566, 2.3522, 5),
/// ];
/// let summary = summarize_ratings(&marks);
/// assert_eq!(summary.mark_count, 2);
/// assert_eq!(summary.average_rating, 4.5);
/// assert_eq!(summary.distribution[0].rating, 5);
/// assert_eq!(summary.distribution[0].count, 1);
/// ```
pub fn summarize_ratings<T: MarkRef>(marks: &[T]) -> RatingSummary {
    let distribution = (1..=5u8)
        .rev()
        .map(|rating| RatingBucket {
            rating,
            count: marks.iter().filter(|m| m.rating() == rating).count() as u32,
        })
        .collect();

    RatingSummary {
        mark_count: marks.len() as u32,
        average_rating: mean_rating(marks.iter().map(MarkRef::rating)).unwrap_or(0.0),
        distribution,
    }
}

/// Summarize friend marks per friend, in order of first appearance.
pub fn summarize_friends(marks: &[FriendCityMark]) -> Vec<FriendSummary> {
    let mut order: Vec<&str> = Vec::new();
    for mark in marks {
        if !order.contains(&mark.friend_id.as_str()) {
            order.push(&mark.friend_id);
        }
    }

    order
        .into_iter()
        .filter_map(|friend_id| {
            let theirs: Vec<&FriendCityMark> = marks.iter().filter(|m| m.friend_id == friend_id).collect();
            let first = theirs.first()?;
            Some(FriendSummary {
                friend_id: friend_id.to_string(),
                display_name: first.friend_display_name.clone(),
                color: first.assigned_color.clone(),
                mark_count: theirs.len() as u32,
                average_rating: mean_rating(theirs.iter().map(|m| m.rating)).unwrap_or(0.0),
            })
        })
        .collect()
}
