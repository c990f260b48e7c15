//! Marks that belong to no overlap group.
//!
//! Grouped marks are rendered as composite markers, so the renderer needs the
//! complement of each input list to draw everything else exactly once.

use std::collections::HashSet;

use crate::{CityOverlapGroup, MarkRef};

/// Ids of every mark that belongs to one of the groups.
pub fn grouped_mark_ids(overlaps: &[CityOverlapGroup]) -> HashSet<&str> {
    overlaps.iter().flat_map(CityOverlapGroup::member_ids).collect()
}

/// Keep the marks whose id appears in no group, in input order.
///
/// Works on own marks, friend marks or a mixed [`crate::Mark`] list. Matching
/// is by id only, so the same groups can filter both lists.
///
/// # Example
/// ```
/// use city_overlap::{CityMark, compute_overlaps, filter_standalone};
///
/// let own = vec![
///     CityMark::new("m-1", "Lyon", 45.7640, 4.8357, 4),
///     CityMark::new("m-2", "Paris", 48.8566, 2.3522, 3),
/// ];
/// let groups = compute_overlaps(&own, &[]);
/// assert_eq!(filter_standalone(&own, &groups), own);
/// ```
pub fn filter_standalone<T>(marks: &[T], overlaps: &[CityOverlapGroup]) -> Vec<T>
where
    T: MarkRef + Clone,
{
    if overlaps.is_empty() {
        return marks.to_vec();
    }

    let grouped = grouped_mark_ids(overlaps);
    marks
        .iter()
        .filter(|mark| !grouped.contains(mark.id()))
        .cloned()
        .collect()
}
