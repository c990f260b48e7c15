//! City identity resolution.
//!
//! Two marks refer to the same real-world city when their normalized names are
//! identical and their points are strictly closer than the configured distance
//! (5 km by default). Independent geocoder lookups for one city return slightly
//! different centroids, so a name match alone is required but not sufficient:
//! homonymous towns in different regions must stay apart.

use crate::geo_utils::haversine_distance_km;
use crate::{CityRef, OverlapConfig};

/// Normalize a city name for comparison.
///
/// Lowercases, trims, folds accented Latin letters to their ASCII base and
/// removes whitespace and hyphens.
///
/// # Example
/// ```
/// use city_overlap::normalize_city_name;
///
/// assert_eq!(normalize_city_name("  Saint-Étienne "), "saintetienne");
/// assert_eq!(normalize_city_name("Aix en Provence"), "aixenprovence");
/// ```
pub fn normalize_city_name(name: &str) -> String {
    name.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_diacritic)
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Great-circle distance in kilometers between two cities' points.
#[inline]
pub fn city_distance_km<A, B>(a: &A, b: &B) -> f64
where
    A: CityRef + ?Sized,
    B: CityRef + ?Sized,
{
    haversine_distance_km(&a.location(), &b.location())
}

/// Check whether two marks refer to the same city, using the default 5 km gate.
///
/// # Example
/// ```
/// use city_overlap::{CityMark, are_same_city};
///
/// let mine = CityMark::new("a", "Lyon", 45.7640, 4.8357, 4);
/// let theirs = CityMark::new("b", "lyon", 45.7500, 4.8500, 5);
/// let paris = CityMark::new("c", "Paris", 48.8566, 2.3522, 3);
///
/// assert!(are_same_city(&mine, &theirs));
/// assert!(!are_same_city(&mine, &paris));
/// ```
pub fn are_same_city<A, B>(a: &A, b: &B) -> bool
where
    A: CityRef + ?Sized,
    B: CityRef + ?Sized,
{
    are_same_city_with_config(a, b, &OverlapConfig::default())
}

/// Check whether two marks refer to the same city with a custom distance gate.
///
/// Names are compared first; the distance is only computed for matching names.
/// Callers must pass marks with finite coordinates (see [`crate::ingest`]).
pub fn are_same_city_with_config<A, B>(a: &A, b: &B, config: &OverlapConfig) -> bool
where
    A: CityRef + ?Sized,
    B: CityRef + ?Sized,
{
    if normalize_city_name(a.city_name()) != normalize_city_name(b.city_name()) {
        return false;
    }

    city_distance_km(a, b) < config.same_city_distance_km
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::EARTH_RADIUS_KM;
    use crate::CityMark;

    fn mark(id: &str, name: &str, lat: f64, lng: f64) -> CityMark {
        CityMark::new(id, name, lat, lng, 3)
    }

    /// Latitude reached by walking `km` due north from `lat`.
    fn north_of(lat: f64, km: f64) -> f64 {
        lat + (km / EARTH_RADIUS_KM).to_degrees()
    }

    #[test]
    fn test_normalize_city_name() {
        assert_eq!(normalize_city_name("Lyon"), "lyon");
        assert_eq!(normalize_city_name("  PARIS  "), "paris");
        assert_eq!(normalize_city_name("Saint-Étienne"), "saintetienne");
        assert_eq!(normalize_city_name("Besançon"), "besancon");
        assert_eq!(normalize_city_name("A Coruña"), "acoruna");
        assert_eq!(normalize_city_name("Zürich"), "zurich");
        assert_eq!(normalize_city_name("Île-de-Ré"), "iledere");
        assert_eq!(normalize_city_name("   "), "");
    }

    #[test]
    fn test_hyphens_and_spaces_are_equivalent() {
        let a = mark("a", "Aix-en-Provence", 43.5297, 5.4474);
        let b = mark("b", "aix en provence", 43.5300, 5.4480);
        assert!(are_same_city(&a, &b));
    }

    #[test]
    fn test_reflexive() {
        let a = mark("a", "Marseille", 43.2965, 5.3698);
        assert!(are_same_city(&a, &a));
    }

    #[test]
    fn test_symmetric() {
        let pairs = [
            (mark("a", "Lyon", 45.7640, 4.8357), mark("b", "Lyon", 45.7500, 4.8500)),
            (mark("a", "Lyon", 45.7640, 4.8357), mark("b", "Paris", 48.8566, 2.3522)),
            (mark("a", "Nice", 43.7102, 7.2620), mark("b", "Nice", 43.7102, 7.4000)),
        ];
        for (a, b) in &pairs {
            assert_eq!(are_same_city(a, b), are_same_city(b, a));
        }
    }

    #[test]
    fn test_name_gate_ignores_identical_coordinates() {
        let a = mark("a", "Villeurbanne", 45.7640, 4.8357);
        let b = mark("b", "Lyon", 45.7640, 4.8357);
        assert!(!are_same_city(&a, &b));
    }

    #[test]
    fn test_homonyms_far_apart_are_different() {
        // Saint-Denis near Paris vs Saint-Denis on Réunion
        let a = mark("a", "Saint-Denis", 48.9362, 2.3574);
        let b = mark("b", "Saint-Denis", -20.8821, 55.4507);
        assert!(!are_same_city(&a, &b));
    }

    #[test]
    fn test_distance_just_below_limit() {
        let a = mark("a", "Grenoble", 45.0, 5.7);
        let b = mark("b", "Grenoble", north_of(45.0, 4.999), 5.7);
        assert!(city_distance_km(&a, &b) < 5.0);
        assert!(are_same_city(&a, &b));
    }

    #[test]
    fn test_distance_at_or_above_limit() {
        let a = mark("a", "Grenoble", 45.0, 5.7);
        let above = mark("b", "Grenoble", north_of(45.0, 5.0001), 5.7);
        assert!(!are_same_city(&a, &above));

        // Gate exactly at the measured distance: strict comparison rejects it
        let d = city_distance_km(&a, &above);
        let exact = OverlapConfig { same_city_distance_km: d, ..OverlapConfig::default() };
        assert!(!are_same_city_with_config(&a, &above, &exact));

        let wider = OverlapConfig { same_city_distance_km: d + 1e-9, ..OverlapConfig::default() };
        assert!(are_same_city_with_config(&a, &above, &wider));
    }

    #[test]
    fn test_empty_names_only_match_each_other() {
        let a = mark("a", "", 45.0, 5.0);
        let b = mark("b", "  ", 45.0, 5.0);
        let c = mark("c", "Lyon", 45.0, 5.0);
        assert!(are_same_city(&a, &b));
        assert!(!are_same_city(&a, &c));
    }
}
