//! Friend display colors.
//!
//! Each friend gets a palette color derived from a hash of their id, so the
//! same friend keeps the same color across sessions. When the preferred slot
//! is already taken the first free slot is used instead, and once all ten
//! colors are in use they are reused.

use serde::{Deserialize, Serialize};

/// Color used for the acting user's own marks.
pub const OWNER_COLOR: &str = "#FF6B35";

/// (name, value, light value) for each palette slot.
const PALETTE: [(&str, &str, &str); 10] = [
    ("Blue", "#3B82F6", "#DBEAFE"),
    ("Red", "#EF4444", "#FEE2E2"),
    ("Green", "#10B981", "#D1FAE5"),
    ("Violet", "#8B5CF6", "#EDE9FE"),
    ("Pink", "#EC4899", "#FCE7F3"),
    ("Orange", "#F97316", "#FED7AA"),
    ("Yellow", "#EAB308", "#FEF3C7"),
    ("Cyan", "#06B6D4", "#CFFAFE"),
    ("Indigo", "#6366F1", "#E0E7FF"),
    ("Emerald", "#059669", "#D1FAE5"),
];

/// A display color for a friend's marks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct FriendColor {
    pub name: String,
    /// Stroke/marker color
    pub value: String,
    /// Lighter variant for backgrounds
    pub light_value: String,
}

impl Default for FriendColor {
    fn default() -> Self {
        palette_color(0)
    }
}

/// Color at `index`, wrapping around the palette.
pub fn palette_color(index: usize) -> FriendColor {
    let (name, value, light_value) = PALETTE[index % PALETTE.len()];
    FriendColor {
        name: name.to_string(),
        value: value.to_string(),
        light_value: light_value.to_string(),
    }
}

/// All palette colors in slot order.
pub fn palette() -> Vec<FriendColor> {
    (0..PALETTE.len()).map(palette_color).collect()
}

/// Palette slot derived from the friend id.
///
/// 32-bit `h = h * 31 + c` hash over the UTF-16 code units of the id, so ids
/// hash the same way the web client hashes them.
pub fn preferred_color_index(friend_id: &str) -> usize {
    let hash = friend_id.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(i32::from(unit))
    });
    (i64::from(hash).unsigned_abs() % PALETTE.len() as u64) as usize
}

/// Pick a color for `friend_id` given the colors already handed out.
///
/// # Example
/// ```
/// use city_overlap::colors::{color_for, palette_color, preferred_color_index};
///
/// let first = color_for("friend-a", &[]);
/// assert_eq!(first, palette_color(preferred_color_index("friend-a")));
///
/// // The same preferred slot is taken: fall back to a free one
/// let second = color_for("friend-a", &[first.clone()]);
/// assert_ne!(second, first);
/// ```
pub fn color_for(friend_id: &str, used: &[FriendColor]) -> FriendColor {
    let preferred = palette_color(preferred_color_index(friend_id));
    let is_used = |color: &FriendColor| used.iter().any(|u| u.value == color.value);

    if !is_used(&preferred) {
        return preferred;
    }

    palette()
        .into_iter()
        .find(|color| !is_used(color))
        .unwrap_or(preferred)
}

/// Assign colors to friends in order, folding [`color_for`] over them.
///
/// A repeated id keeps the color it was first given.
pub fn assign_friend_colors<'a, I>(friend_ids: I) -> Vec<(String, FriendColor)>
where
    I: IntoIterator<Item = &'a str>,
{
    friend_ids
        .into_iter()
        .fold(Vec::new(), |mut assigned: Vec<(String, FriendColor)>, id| {
            if !assigned.iter().any(|(known, _)| known == id) {
                let used: Vec<FriendColor> = assigned.iter().map(|(_, c)| c.clone()).collect();
                let color = color_for(id, &used);
                assigned.push((id.to_string(), color));
            }
            assigned
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette() {
        let colors = palette();
        assert_eq!(colors.len(), 10);
        assert_eq!(colors[0].value, "#3B82F6");
        assert_eq!(colors[9].name, "Emerald");
        assert_eq!(palette_color(12), colors[2]);
    }

    #[test]
    fn test_preferred_index_known_values() {
        assert_eq!(preferred_color_index(""), 0);
        // "a" -> 97
        assert_eq!(preferred_color_index("a"), 7);
        // "ab" -> 97 * 31 + 98 = 3105
        assert_eq!(preferred_color_index("ab"), 5);
    }

    #[test]
    fn test_preferred_index_is_deterministic() {
        let id = "8c1f4a52-2f0e-4b0c-9d7e-5a1b3c2d4e6f";
        assert_eq!(preferred_color_index(id), preferred_color_index(id));
        assert!(preferred_color_index(id) < PALETTE.len());
    }

    #[test]
    fn test_color_for_falls_back_to_first_free_slot() {
        // "a" prefers slot 7 (Cyan)
        let used = vec![palette_color(7), palette_color(0)];
        assert_eq!(color_for("a", &used), palette_color(1));
    }

    #[test]
    fn test_color_for_reuses_when_exhausted() {
        let used = palette();
        assert_eq!(color_for("a", &used), palette_color(7));
    }

    #[test]
    fn test_assign_friend_colors() {
        let assigned = assign_friend_colors(["a", "a", "ab"]);
        assert_eq!(assigned.len(), 2);
        assert_eq!(assigned[0], ("a".to_string(), palette_color(7)));
        assert_eq!(assigned[1], ("ab".to_string(), palette_color(5)));
    }

    #[test]
    fn test_assign_friend_colors_unique_until_exhausted() {
        let ids: Vec<String> = (0..10).map(|i| format!("friend-{i}")).collect();
        let assigned = assign_friend_colors(ids.iter().map(String::as_str));
        let mut values: Vec<&str> = assigned.iter().map(|(_, c)| c.value.as_str()).collect();
        values.sort();
        values.dedup();
        assert_eq!(values.len(), 10);
    }
}
