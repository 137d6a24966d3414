//! Pair hashing: angular separation → quantized bucket key.
//!
//! The key depends only on the angle between the two directions, so it is
//! symmetric in its arguments and invariant to any rotation of the sky.

use std::ops::RangeInclusive;

use crate::Vector3;

use super::{HashKey, QuantizationStep};

/// Angle (radians, in [0, π]) between two unit vectors.
///
/// The dot product is clamped first so that rounding on (anti)parallel
/// vectors cannot push `acos` out of its domain.
#[inline]
pub fn angular_distance(u: &Vector3, v: &Vector3) -> f64 {
    u.dot(v).clamp(-1.0, 1.0).acos()
}

/// Bucket for a separation angle in radians.
#[inline]
pub fn key_for_distance(distance_rad: f64, step: QuantizationStep) -> HashKey {
    let k = (distance_rad / step.radians()).floor();
    if k.is_finite() && k > 0.0 {
        k.min(HashKey::MAX as f64) as HashKey
    } else {
        0
    }
}

/// Bucket key for a pair of directions.
#[inline]
pub fn hash_key(u: &Vector3, v: &Vector3, step: QuantizationStep) -> HashKey {
    key_for_distance(angular_distance(u, v), step)
}

/// `key` and its immediate neighbors.
#[inline]
pub fn neighbor_keys(key: HashKey) -> RangeInclusive<HashKey> {
    key.saturating_sub(1)..=key.saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::star::radec_to_uvec;

    fn deg(v: f64) -> f64 {
        v.to_radians()
    }

    #[test]
    fn test_hash_is_symmetric() {
        let step = QuantizationStep::from_degrees(0.25).unwrap();
        let dirs = [
            radec_to_uvec(deg(10.0), deg(20.0)),
            radec_to_uvec(deg(165.9), deg(61.75)),
            radec_to_uvec(deg(359.0), deg(-45.0)),
            radec_to_uvec(deg(0.5), deg(89.9)),
        ];
        for u in &dirs {
            for v in &dirs {
                assert_eq!(hash_key(u, v, step), hash_key(v, u, step));
            }
        }
    }

    #[test]
    fn test_known_separation() {
        let step = QuantizationStep::default();
        let u = radec_to_uvec(0.0, 0.0);
        let v = radec_to_uvec(deg(10.75), 0.0);
        assert!((angular_distance(&u, &v).to_degrees() - 10.75).abs() < 1e-9);
        assert_eq!(hash_key(&u, &v, step), 10);

        let half = QuantizationStep::from_degrees(0.5).unwrap();
        assert_eq!(hash_key(&u, &v, half), 21);
    }

    #[test]
    fn test_duplicate_direction_maps_to_zero() {
        let step = QuantizationStep::from_degrees(1e-6).unwrap();
        let u = radec_to_uvec(deg(123.4), deg(-12.3));
        assert_eq!(angular_distance(&u, &u), 0.0);
        assert_eq!(hash_key(&u, &u, step), 0);
    }

    #[test]
    fn test_clamps_out_of_domain_dot() {
        // Slightly over-length vectors produce dot products above 1.
        let u = Vector3::new(1.0 + 1e-12, 0.0, 0.0);
        let d = angular_distance(&u, &u);
        assert!(d.is_finite());
        assert_eq!(d, 0.0);

        let v = Vector3::new(-1.0 - 1e-12, 0.0, 0.0);
        let d = angular_distance(&u, &v);
        assert!((d - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_key_for_non_finite_distance() {
        let step = QuantizationStep::default();
        assert_eq!(key_for_distance(f64::NAN, step), 0);
        assert_eq!(key_for_distance(-1.0, step), 0);
    }

    #[test]
    fn test_neighbor_keys() {
        assert_eq!(neighbor_keys(0), 0..=1);
        assert_eq!(neighbor_keys(5), 4..=6);
        assert_eq!(neighbor_keys(HashKey::MAX), HashKey::MAX - 1..=HashKey::MAX);
    }
}
