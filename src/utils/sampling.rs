//! Deterministic Sampling Helpers
//!
//! Low-discrepancy sequences and hashing used to build sample kernels.
//! Everything here is pure and reproducible: the same inputs always produce
//! the same kernel, so accumulated images converge identically across runs.

use glam::{Vec2, Vec3};
use xxhash_rust::xxh3::xxh3_64;

/// Radical inverse of `index` in the given prime `base`, in `[0, 1)`.
///
/// Base 2 is the Van der Corput sequence (first Hammersley dimension).
#[inline]
#[must_use]
pub fn halton(index: u32, base: u32) -> f32 {
    let mut result = 0.0f32;
    let mut f = 1.0f32;
    let mut i = index;

    while i > 0 {
        f /= base as f32;
        result += f * (i % base) as f32;
        i /= base;
    }

    result
}

/// 2D Halton point (bases 2 and 3) in `[0, 1)²`.
#[inline]
#[must_use]
pub fn halton_2_3(index: u32) -> Vec2 {
    Vec2::new(halton(index, 2), halton(index, 3))
}

/// Maps a 64-bit hash onto `[0, 1)` using its top 24 bits.
#[inline]
#[must_use]
pub fn hash_to_unit_float(hash: u64) -> f32 {
    (hash >> 40) as f32 / (1u64 << 24) as f32
}

/// Stable hash of an identity string (and optional owning library path).
///
/// Linked data is disambiguated by the library path so two objects with the
/// same name coming from different files hash differently.
#[must_use]
pub fn identity_hash(name: &str, library_path: Option<&str>) -> u64 {
    let hash = xxh3_64(name.as_bytes());
    match library_path {
        Some(path) => hash.wrapping_mul(13) ^ xxh3_64(path.as_bytes()),
        None => hash,
    }
}

/// Converts an HSV triple (all components in `[0, 1]`) to linear RGB.
#[must_use]
pub fn hsv_to_rgb(hsv: Vec3) -> Vec3 {
    let h = hsv.x.fract() * 6.0;
    let s = hsv.y.clamp(0.0, 1.0);
    let v = hsv.z;

    let r = ((h - 3.0).abs() - 1.0).clamp(0.0, 1.0);
    let g = (2.0 - (h - 2.0).abs()).clamp(0.0, 1.0);
    let b = (2.0 - (h - 4.0).abs()).clamp(0.0, 1.0);

    ((Vec3::new(r, g, b) - 1.0) * s + 1.0) * v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halton_base_2() {
        assert!((halton(1, 2) - 0.5).abs() < 1e-6);
        assert!((halton(2, 2) - 0.25).abs() < 1e-6);
        assert!((halton(3, 2) - 0.75).abs() < 1e-6);
        assert!((halton(4, 2) - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_halton_base_3() {
        assert!((halton(1, 3) - 1.0 / 3.0).abs() < 1e-6);
        assert!((halton(2, 3) - 2.0 / 3.0).abs() < 1e-6);
        assert!((halton(3, 3) - 1.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_hash_to_unit_float_range() {
        for seed in ["Cube", "Suzanne", "Plane.001", ""] {
            let v = hash_to_unit_float(identity_hash(seed, None));
            assert!((0.0..1.0).contains(&v), "{seed} -> {v}");
        }
    }

    #[test]
    fn test_library_path_changes_hash() {
        assert_ne!(
            identity_hash("Cube", None),
            identity_hash("Cube", Some("//props.blend"))
        );
    }

    #[test]
    fn test_hsv_primaries() {
        let red = hsv_to_rgb(Vec3::new(0.0, 1.0, 1.0));
        assert!((red - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
        let green = hsv_to_rgb(Vec3::new(1.0 / 3.0, 1.0, 1.0));
        assert!((green - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-5);
        let grey = hsv_to_rgb(Vec3::new(0.7, 0.0, 0.5));
        assert!((grey - Vec3::splat(0.5)).length() < 1e-5);
    }
}
