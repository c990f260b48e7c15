//! Overlap aggregation.
//!
//! Builds [`CityOverlapGroup`]s from the acting user's marks and their friends'
//! marks in two phases:
//!
//! 1. **Owner-anchored groups.** Each own mark claims every friend mark that
//!    resolves to the same city and is not yet claimed by an earlier own mark.
//! 2. **Friend-only groups.** Unclaimed friend marks are clustered according to
//!    [`ClusterPolicy`]; clusters of two or more marks become groups.
//!
//! A single mark never forms a group, and no mark is placed in two groups.
//!
//! Candidate pairs come from an R-tree over unit-sphere projections of the
//! friend marks; every candidate is confirmed with the resolver, so the result
//! is identical to comparing every pair.

use std::collections::HashMap;

use log::debug;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::geo_utils::{chord_for_distance_km, to_unit_sphere};
use crate::resolver::are_same_city_with_config;
use crate::stats::mean_rating;
use crate::{CityMark, CityOverlapGroup, CityRef, ClusterPolicy, FriendCityMark, OverlapConfig};

/// Relative slack added to the search radius so rounding in the projection
/// never drops a candidate the resolver would accept.
const SEARCH_SLACK: f64 = 1e-9;

// ============================================================================
// Spatial Index
// ============================================================================

/// A friend mark position on the unit sphere.
#[derive(Debug, Clone, Copy)]
struct IndexedMark {
    position: [f64; 3],
    index: usize,
}

impl RTreeObject for IndexedMark {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for IndexedMark {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        let dz = self.position[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// R-tree over friend marks, queried by great-circle radius.
struct FriendIndex<'a> {
    friends: &'a [FriendCityMark],
    tree: RTree<IndexedMark>,
    max_chord_2: f64,
}

impl<'a> FriendIndex<'a> {
    fn build(friends: &'a [FriendCityMark], config: &OverlapConfig) -> Self {
        let points: Vec<IndexedMark> = friends
            .iter()
            .enumerate()
            .map(|(index, mark)| IndexedMark {
                position: to_unit_sphere(&mark.location()),
                index,
            })
            .collect();

        let chord = chord_for_distance_km(config.same_city_distance_km) * (1.0 + SEARCH_SLACK) + SEARCH_SLACK;

        Self {
            friends,
            tree: RTree::bulk_load(points),
            max_chord_2: chord * chord,
        }
    }

    /// Indices of friend marks resolving to the same city as `city`,
    /// in ascending input order.
    fn matching<C: CityRef + ?Sized>(&self, city: &C, config: &OverlapConfig) -> Vec<usize> {
        let query = to_unit_sphere(&city.location());
        let mut matches: Vec<usize> = self
            .tree
            .locate_within_distance(query, self.max_chord_2)
            .map(|p| p.index)
            .filter(|&i| are_same_city_with_config(city, &self.friends[i], config))
            .collect();
        matches.sort_unstable();
        matches
    }
}

// ============================================================================
// Union-Find
// ============================================================================

/// Disjoint sets over friend mark indices. The smaller index becomes the root,
/// so cluster roots do not depend on the order pairs are merged in.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self { parent: (0..len).collect() }
    }

    fn find(&mut self, id: usize) -> usize {
        let mut root = id;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut current = id;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            let (low, high) = if root_a < root_b { (root_a, root_b) } else { (root_b, root_a) };
            self.parent[high] = low;
        }
    }
}

// ============================================================================
// Core Functions
// ============================================================================

/// Compute overlap groups with the default configuration.
///
/// # Example
/// ```
/// use city_overlap::{CityMark, FriendCityMark, FriendColor, compute_overlaps};
///
/// let friend = |id: &str, who: &str, lat: f64, lng: f64, rating: u8| {
///     FriendCityMark::new(
///         CityMark::new(id, "Marseille", lat, lng, rating),
///         who,
///         who,
///         FriendColor::default(),
///     )
/// };
///
/// // No own mark: two friends marked Marseille a few hundred meters apart
/// let friends = vec![
///     friend("f-1", "u-1", 43.2965, 5.3698, 4),
///     friend("f-2", "u-2", 43.3000, 5.3700, 2),
/// ];
///
/// let groups = compute_overlaps(&[], &friends);
/// assert_eq!(groups.len(), 1);
/// assert!(groups[0].own_city_mark.is_none());
/// assert_eq!(groups[0].average_rating, 3.0);
/// ```
pub fn compute_overlaps(own: &[CityMark], friends: &[FriendCityMark]) -> Vec<CityOverlapGroup> {
    compute_overlaps_with_config(own, friends, &OverlapConfig::default())
}

/// Compute overlap groups.
///
/// Groups anchored on own marks come first (own input order), followed by
/// friend-only groups ordered by the input position of their first member.
/// Pure and deterministic: the same inputs always give the same groups.
pub fn compute_overlaps_with_config(
    own: &[CityMark],
    friends: &[FriendCityMark],
    config: &OverlapConfig,
) -> Vec<CityOverlapGroup> {
    if own.is_empty() && friends.len() < 2 {
        return vec![];
    }

    let index = FriendIndex::build(friends, config);

    let owner_matches: Vec<Vec<usize>> = own
        .iter()
        .map(|mark| index.matching(mark, config))
        .collect();

    let (claims, claimed) = claim_friend_marks(owner_matches, friends.len());

    let neighbors: Vec<Vec<usize>> = (0..friends.len())
        .map(|i| unclaimed_neighbors(i, &claimed, &index, config))
        .collect();

    assemble_groups(own, friends, claims, &claimed, &neighbors, config.cluster_policy)
}

/// Compute overlap groups using parallel processing.
///
/// Same output as [`compute_overlaps_with_config`]; only the candidate matching
/// runs on the rayon pool. Worth it for several hundred marks and up.
#[cfg(feature = "parallel")]
pub fn compute_overlaps_parallel(
    own: &[CityMark],
    friends: &[FriendCityMark],
    config: &OverlapConfig,
) -> Vec<CityOverlapGroup> {
    use rayon::prelude::*;

    if own.is_empty() && friends.len() < 2 {
        return vec![];
    }

    let index = FriendIndex::build(friends, config);

    let owner_matches: Vec<Vec<usize>> = own
        .par_iter()
        .map(|mark| index.matching(mark, config))
        .collect();

    // Claiming is order-dependent, keep it sequential
    let (claims, claimed) = claim_friend_marks(owner_matches, friends.len());

    let neighbors: Vec<Vec<usize>> = (0..friends.len())
        .into_par_iter()
        .map(|i| unclaimed_neighbors(i, &claimed, &index, config))
        .collect();

    assemble_groups(own, friends, claims, &claimed, &neighbors, config.cluster_policy)
}

/// Give each friend mark to the first own mark that matches it.
///
/// Returns the claimed indices per own mark and a claimed flag per friend mark.
fn claim_friend_marks(owner_matches: Vec<Vec<usize>>, friend_count: usize) -> (Vec<Vec<usize>>, Vec<bool>) {
    let mut claimed = vec![false; friend_count];

    let claims: Vec<Vec<usize>> = owner_matches
        .into_iter()
        .map(|matches| {
            matches
                .into_iter()
                .filter(|&i| !std::mem::replace(&mut claimed[i], true))
                .collect::<Vec<usize>>()
        })
        .collect();

    (claims, claimed)
}

/// Unclaimed friend marks (other than `i`) resolving to the same city as mark `i`.
fn unclaimed_neighbors(
    i: usize,
    claimed: &[bool],
    index: &FriendIndex<'_>,
    config: &OverlapConfig,
) -> Vec<usize> {
    if claimed[i] {
        return vec![];
    }
    index
        .matching(&index.friends[i], config)
        .into_iter()
        .filter(|&j| j != i && !claimed[j])
        .collect()
}

fn assemble_groups(
    own: &[CityMark],
    friends: &[FriendCityMark],
    claims: Vec<Vec<usize>>,
    claimed: &[bool],
    neighbors: &[Vec<usize>],
    policy: ClusterPolicy,
) -> Vec<CityOverlapGroup> {
    let mut groups: Vec<CityOverlapGroup> = own
        .iter()
        .zip(claims)
        .filter(|(_, members)| !members.is_empty())
        .map(|(mark, members)| build_group(Some(mark), members.iter().map(|&i| &friends[i]).collect()))
        .collect();
    let anchored = groups.len();

    let clusters = match policy {
        ClusterPolicy::Transitive => transitive_clusters(claimed, neighbors),
        ClusterPolicy::Representative => representative_clusters(claimed, neighbors),
    };

    groups.extend(
        clusters
            .into_iter()
            .filter(|members| members.len() >= 2)
            .map(|members| build_group(None, members.iter().map(|&i| &friends[i]).collect())),
    );

    debug!(
        "[compute_overlaps] {} own + {} friend marks -> {} owner-anchored, {} friend-only groups",
        own.len(),
        friends.len(),
        anchored,
        groups.len() - anchored
    );

    groups
}

/// Full transitive closure over matching unclaimed friend marks.
fn transitive_clusters(claimed: &[bool], neighbors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut sets = UnionFind::new(claimed.len());
    for (i, adjacent) in neighbors.iter().enumerate() {
        for &j in adjacent.iter().filter(|&&j| j > i) {
            sets.union(i, j);
        }
    }

    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut by_root: HashMap<usize, usize> = HashMap::new();
    for i in (0..claimed.len()).filter(|&i| !claimed[i]) {
        let root = sets.find(i);
        match by_root.get(&root) {
            Some(&slot) => clusters[slot].push(i),
            None => {
                by_root.insert(root, clusters.len());
                clusters.push(vec![i]);
            }
        }
    }
    clusters
}

/// Each unassigned mark, in order, anchors a cluster of the unassigned marks
/// that match it directly.
fn representative_clusters(claimed: &[bool], neighbors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut assigned = claimed.to_vec();
    let mut clusters = Vec::new();

    for anchor in 0..claimed.len() {
        if assigned[anchor] {
            continue;
        }
        assigned[anchor] = true;

        let mut cluster = vec![anchor];
        for &j in &neighbors[anchor] {
            if !assigned[j] {
                assigned[j] = true;
                cluster.push(j);
            }
        }
        clusters.push(cluster);
    }
    clusters
}

fn build_group(own: Option<&CityMark>, members: Vec<&FriendCityMark>) -> CityOverlapGroup {
    let ratings = own
        .map(|m| m.rating)
        .into_iter()
        .chain(members.iter().map(|m| m.rating));
    let average_rating = mean_rating(ratings).unwrap_or(0.0);

    let (city_name, latitude, longitude) = match (own, members.first()) {
        (Some(mark), _) => (mark.city_name.clone(), mark.latitude, mark.longitude),
        (None, Some(first)) => (first.city_name.clone(), first.latitude, first.longitude),
        (None, None) => (String::new(), 0.0, 0.0),
    };

    CityOverlapGroup {
        city_name,
        latitude,
        longitude,
        participant_count: (usize::from(own.is_some()) + members.len()) as u32,
        own_city_mark: own.cloned(),
        friend_city_marks: members.into_iter().cloned().collect(),
        average_rating,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::color_for;
    use crate::geo_utils::EARTH_RADIUS_KM;
    use crate::resolver::city_distance_km;
    use crate::standalone::filter_standalone;
    use std::collections::HashSet;

    fn own(id: &str, name: &str, lat: f64, lng: f64, rating: u8) -> CityMark {
        CityMark::new(id, name, lat, lng, rating)
    }

    fn friend(id: &str, friend_id: &str, name: &str, lat: f64, lng: f64, rating: u8) -> FriendCityMark {
        FriendCityMark::new(
            CityMark::new(id, name, lat, lng, rating),
            friend_id,
            friend_id,
            color_for(friend_id, &[]),
        )
    }

    fn north_of(lat: f64, km: f64) -> f64 {
        lat + (km / EARTH_RADIUS_KM).to_degrees()
    }

    fn friend_ids(group: &CityOverlapGroup) -> Vec<&str> {
        group.friend_city_marks.iter().map(|m| m.id.as_str()).collect()
    }

    /// Marks spread over a few cities, with homonyms and near-duplicates.
    fn mixed_snapshot() -> (Vec<CityMark>, Vec<FriendCityMark>) {
        let own_marks = vec![
            own("o-lyon", "Lyon", 45.7640, 4.8357, 4),
            own("o-paris", "Paris", 48.8566, 2.3522, 3),
            own("o-brest", "Brest", 48.3904, -4.4861, 5),
        ];
        let friend_marks = vec![
            friend("f-lyon-1", "u-1", "Lyon", 45.7500, 4.8500, 5),
            friend("f-nice-1", "u-1", "Nice", 43.7102, 7.2620, 2),
            friend("f-lyon-2", "u-2", "lyon", 45.7600, 4.8400, 3),
            friend("f-nice-2", "u-2", "Nice", 43.7000, 7.2700, 4),
            friend("f-sd-1", "u-2", "Saint-Denis", 48.9362, 2.3574, 1),
            friend("f-sd-2", "u-3", "Saint-Denis", -20.8821, 55.4507, 5),
            friend("f-nice-3", "u-3", "Nice", 43.7050, 7.2650, 3),
            friend("f-tours", "u-3", "Tours", 47.3941, 0.6848, 4),
        ];
        (own_marks, friend_marks)
    }

    #[test]
    fn test_scenario_owner_and_friend_same_city() {
        let own_marks = vec![own("o-1", "Lyon", 45.7640, 4.8357, 4)];
        let friend_marks = vec![friend("f-1", "u-1", "Lyon", 45.7500, 4.8500, 5)];

        let groups = compute_overlaps(&own_marks, &friend_marks);

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.own_city_mark.as_ref().map(|m| m.id.as_str()), Some("o-1"));
        assert_eq!(friend_ids(group), vec!["f-1"]);
        assert_eq!(group.participant_count, 2);
        assert_eq!(group.average_rating, 4.5);
        assert_eq!(group.city_name, "Lyon");
        assert_eq!(group.latitude, 45.7640);
        assert_eq!(group.longitude, 4.8357);
    }

    #[test]
    fn test_scenario_different_cities() {
        let own_marks = vec![own("o-1", "Paris", 48.8566, 2.3522, 3)];
        let friend_marks = vec![friend("f-1", "u-1", "Lyon", 45.7640, 4.8357, 4)];

        let groups = compute_overlaps(&own_marks, &friend_marks);

        assert!(groups.is_empty());
        assert_eq!(filter_standalone(&own_marks, &groups), own_marks);
        assert_eq!(filter_standalone(&friend_marks, &groups), friend_marks);
    }

    #[test]
    fn test_scenario_friends_only() {
        let friend_marks = vec![
            friend("f-1", "u-1", "Marseille", 43.2965, 5.3698, 4),
            friend("f-2", "u-2", "Marseille", 43.3000, 5.3700, 2),
        ];

        let groups = compute_overlaps(&[], &friend_marks);

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert!(group.own_city_mark.is_none());
        assert_eq!(friend_ids(group), vec!["f-1", "f-2"]);
        assert_eq!(group.participant_count, 2);
        assert_eq!(group.average_rating, 3.0);
        assert_eq!(group.latitude, 43.2965);
    }

    #[test]
    fn test_average_of_three() {
        let own_marks = vec![own("o-1", "Lyon", 45.7640, 4.8357, 3)];
        let friend_marks = vec![
            friend("f-1", "u-1", "Lyon", 45.7500, 4.8500, 4),
            friend("f-2", "u-2", "Lyon", 45.7600, 4.8400, 5),
        ];

        let groups = compute_overlaps(&own_marks, &friend_marks);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].participant_count, 3);
        assert_eq!(groups[0].average_rating, 4.0);
    }

    #[test]
    fn test_average_of_two() {
        let own_marks = vec![own("o-1", "Nantes", 47.2184, -1.5536, 1)];
        let friend_marks = vec![friend("f-1", "u-1", "Nantes", 47.2200, -1.5500, 2)];

        let groups = compute_overlaps(&own_marks, &friend_marks);
        assert_eq!(groups[0].average_rating, 1.5);
    }

    #[test]
    fn test_single_marks_never_form_groups() {
        let own_marks = vec![own("o-1", "Lyon", 45.7640, 4.8357, 4)];
        let friend_marks = vec![friend("f-1", "u-1", "Nice", 43.7102, 7.2620, 2)];

        assert!(compute_overlaps(&own_marks, &[]).is_empty());
        assert!(compute_overlaps(&[], &friend_marks).is_empty());
        assert!(compute_overlaps(&own_marks, &friend_marks).is_empty());
    }

    #[test]
    fn test_duplicate_own_marks_do_not_share_friends() {
        // The owner marked Lyon twice; the friend mark goes to the first one only
        let own_marks = vec![
            own("o-1", "Lyon", 45.7640, 4.8357, 4),
            own("o-2", "Lyon", 45.7650, 4.8360, 2),
        ];
        let friend_marks = vec![friend("f-1", "u-1", "Lyon", 45.7500, 4.8500, 5)];

        let groups = compute_overlaps(&own_marks, &friend_marks);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].own_city_mark.as_ref().map(|m| m.id.as_str()), Some("o-1"));
        assert_eq!(filter_standalone(&own_marks, &groups)[0].id, "o-2");
    }

    #[test]
    fn test_friend_matching_owner_is_not_regrouped() {
        let own_marks = vec![own("o-1", "Lyon", 45.7640, 4.8357, 4)];
        let friend_marks = vec![
            friend("f-1", "u-1", "Lyon", 45.7500, 4.8500, 5),
            friend("f-2", "u-2", "Lyon", 45.7600, 4.8400, 3),
        ];

        let groups = compute_overlaps(&own_marks, &friend_marks);

        assert_eq!(groups.len(), 1);
        assert_eq!(friend_ids(&groups[0]), vec!["f-1", "f-2"]);
    }

    #[test]
    fn test_chain_policies() {
        // A-B and B-C are 4 km apart, A-C is 8 km apart
        let friend_marks = vec![
            friend("a", "u-1", "Chambery", 45.0, 5.9, 3),
            friend("c", "u-3", "Chambery", north_of(45.0, 8.0), 5.9, 5),
            friend("b", "u-2", "Chambery", north_of(45.0, 4.0), 5.9, 4),
        ];

        let transitive = compute_overlaps(&[], &friend_marks);
        assert_eq!(transitive.len(), 1);
        assert_eq!(friend_ids(&transitive[0]), vec!["a", "c", "b"]);
        assert_eq!(transitive[0].average_rating, 4.0);

        let config = OverlapConfig {
            cluster_policy: ClusterPolicy::Representative,
            ..OverlapConfig::default()
        };
        let representative = compute_overlaps_with_config(&[], &friend_marks, &config);
        // "a" anchors and only pulls "b"; "c" is left alone
        assert_eq!(representative.len(), 1);
        assert_eq!(friend_ids(&representative[0]), vec!["a", "b"]);
        assert_eq!(representative[0].average_rating, 3.5);
    }

    #[test]
    fn test_mixed_snapshot_groups() {
        let (own_marks, friend_marks) = mixed_snapshot();
        let groups = compute_overlaps(&own_marks, &friend_marks);

        assert_eq!(groups.len(), 2);

        assert_eq!(groups[0].own_city_mark.as_ref().map(|m| m.id.as_str()), Some("o-lyon"));
        assert_eq!(friend_ids(&groups[0]), vec!["f-lyon-1", "f-lyon-2"]);
        assert_eq!(groups[0].average_rating, 4.0);

        assert!(groups[1].own_city_mark.is_none());
        assert_eq!(friend_ids(&groups[1]), vec!["f-nice-1", "f-nice-2", "f-nice-3"]);
        assert_eq!(groups[1].city_name, "Nice");
        assert_eq!(groups[1].participant_count, 3);
    }

    #[test]
    fn test_no_false_groups() {
        let (own_marks, friend_marks) = mixed_snapshot();
        for policy in [ClusterPolicy::Transitive, ClusterPolicy::Representative] {
            let config = OverlapConfig { cluster_policy: policy, ..OverlapConfig::default() };
            for group in compute_overlaps_with_config(&own_marks, &friend_marks, &config) {
                assert!(group.participant_count >= 2);
                assert_eq!(
                    group.participant_count as usize,
                    usize::from(group.own_city_mark.is_some()) + group.friend_city_marks.len()
                );
            }
        }
    }

    #[test]
    fn test_exhaustive_partition() {
        let (own_marks, friend_marks) = mixed_snapshot();
        let groups = compute_overlaps(&own_marks, &friend_marks);

        let grouped: Vec<&str> = groups.iter().flat_map(|g| g.member_ids()).collect();
        let unique: HashSet<&str> = grouped.iter().copied().collect();
        assert_eq!(grouped.len(), unique.len(), "a mark appears in two groups");

        let standalone_own = filter_standalone(&own_marks, &groups);
        let standalone_friends = filter_standalone(&friend_marks, &groups);

        for mark in &own_marks {
            let in_group = unique.contains(mark.id.as_str());
            let alone = standalone_own.iter().any(|m| m.id == mark.id);
            assert!(in_group ^ alone, "{} must be in exactly one place", mark.id);
        }
        for mark in &friend_marks {
            let in_group = unique.contains(mark.id.as_str());
            let alone = standalone_friends.iter().any(|m| m.id == mark.id);
            assert!(in_group ^ alone, "{} must be in exactly one place", mark.id);
        }
    }

    #[test]
    fn test_idempotent() {
        let (own_marks, friend_marks) = mixed_snapshot();
        let first = compute_overlaps(&own_marks, &friend_marks);
        let second = compute_overlaps(&own_marks.clone(), &friend_marks.clone());
        assert_eq!(first, second);
    }

    #[test]
    fn test_matches_across_antimeridian() {
        let friend_marks = vec![
            friend("f-1", "u-1", "Taveuni", -16.8, 179.99, 4),
            friend("f-2", "u-2", "Taveuni", -16.8, -179.99, 5),
        ];
        let groups = compute_overlaps(&[], &friend_marks);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].average_rating, 4.5);
    }

    /// Point reached by travelling `km` from `(lat, lng)` on the initial `bearing` (degrees).
    fn destination(lat: f64, lng: f64, bearing: f64, km: f64) -> (f64, f64) {
        let (phi1, lambda1, theta) = (lat.to_radians(), lng.to_radians(), bearing.to_radians());
        let delta = km / EARTH_RADIUS_KM;
        let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
        let lambda2 = lambda1
            + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());
        let lng2 = (lambda2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;
        (phi2.to_degrees(), lng2)
    }

    #[test]
    fn test_distance_gate_in_groups() {
        let origins = [(45.764, 4.8357), (-33.8688, 151.2093), (69.6492, 18.9553), (-16.8, 179.999)];
        let bearings = [0.0, 63.0, 90.0, 151.0, 242.0, 317.0];

        for &(lat, lng) in &origins {
            for &bearing in &bearings {
                let (near_lat, near_lng) = destination(lat, lng, bearing, 4.999);
                let (far_lat, far_lng) = destination(lat, lng, bearing + 180.0, 5.0001);

                let owner = own("o", "Gate", lat, lng, 3);
                let near = friend("near", "u-1", "Gate", near_lat, near_lng, 4);
                let far = friend("far", "u-2", "Gate", far_lat, far_lng, 5);
                assert!(city_distance_km(&owner, &near) < 5.0);
                assert!(city_distance_km(&owner, &far) > 5.0);

                let context = format!("origin ({lat}, {lng}) bearing {bearing}");

                let groups = compute_overlaps(&[owner], &[near.clone(), far.clone()]);
                assert_eq!(groups.len(), 1, "{context}");
                assert_eq!(friend_ids(&groups[0]), vec!["near"], "{context}");

                // Same geometry without an own mark
                let anchor = friend("anchor", "u-3", "Gate", lat, lng, 3);
                let groups = compute_overlaps(&[], &[anchor, near, far]);
                assert_eq!(groups.len(), 1, "{context}");
                assert_eq!(friend_ids(&groups[0]), vec!["anchor", "near"], "{context}");
            }
        }
    }

    #[test]
    fn test_custom_distance_gate() {
        let friend_marks = vec![
            friend("f-1", "u-1", "Lyon", 45.7640, 4.8357, 4),
            friend("f-2", "u-2", "Lyon", 45.7500, 4.8500, 5),
        ];
        let tight = OverlapConfig { same_city_distance_km: 1.0, ..OverlapConfig::default() };
        assert!(compute_overlaps_with_config(&[], &friend_marks, &tight).is_empty());
        assert_eq!(compute_overlaps(&[], &friend_marks).len(), 1);
    }

    #[test]
    fn test_union_find_prefers_smallest_root() {
        let mut sets = UnionFind::new(5);
        sets.union(4, 3);
        sets.union(3, 1);
        assert_eq!(sets.find(4), 1);
        assert_eq!(sets.find(3), 1);
        assert_eq!(sets.find(0), 0);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let (own_marks, friend_marks) = mixed_snapshot();
        for policy in [ClusterPolicy::Transitive, ClusterPolicy::Representative] {
            let config = OverlapConfig { cluster_policy: policy, ..OverlapConfig::default() };
            assert_eq!(
                compute_overlaps_parallel(&own_marks, &friend_marks, &config),
                compute_overlaps_with_config(&own_marks, &friend_marks, &config)
            );
        }
    }
}
