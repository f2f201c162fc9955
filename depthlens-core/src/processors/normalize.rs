//! Min/max normalization of depth values.

use crate::domain::DepthMap;

/// Value assigned to every pixel of a map whose depth range is zero.
pub const FLAT_DEPTH_LEVEL: f32 = 0.5;

/// Rescales every depth value into `[0, 1]` using the map's own range.
///
/// The minimum maps to `0.0` and the maximum to `1.0`. A flat map (every value
/// equal) has no range to divide by and normalizes to [`FLAT_DEPTH_LEVEL`].
pub fn normalize(map: &DepthMap) -> Vec<f32> {
    normalize_values(map.values())
}

/// Slice form of [`normalize`].
pub fn normalize_values(values: &[f32]) -> Vec<f32> {
    let Some((min, max)) = min_max(values) else {
        return Vec::new();
    };
    let range = max - min;
    if range <= 0.0 {
        return vec![FLAT_DEPTH_LEVEL; values.len()];
    }
    values
        .iter()
        .map(|&v| ((v - min) / range).clamp(0.0, 1.0))
        .collect()
}

fn min_max(values: &[f32]) -> Option<(f32, f32)> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_range() {
        let map = DepthMap::new(vec![2.0, 4.0, 6.0, 10.0], 2, 2).expect("valid map");
        let normalized = normalize(&map);
        assert_eq!(normalized, vec![0.0, 0.25, 0.5, 1.0]);
        assert!(normalized.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_normalize_flat_map() {
        let map = DepthMap::new(vec![3.3; 6], 3, 2).expect("valid map");
        assert_eq!(normalize(&map), vec![0.5; 6]);
    }

    #[test]
    fn test_normalize_negative_values() {
        let normalized = normalize_values(&[-4.0, 0.0, 4.0]);
        assert_eq!(normalized, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize_values(&[]).is_empty());
    }
}
