use std::f32::consts::SQRT_2;

use nalgebra::Quaternion;

/// Largest value a 15-bit component can hold.
const COMPONENT_MASK: u64 = 0x7FFF;
const COMPONENT_SCALE: f32 = 16383.5;

/// Normalize `rotation`, falling back to identity if it has no finite
/// direction.
pub fn sanitize_rotation(rotation: &Quaternion<f32>) -> Quaternion<f32> {
    if !rotation.coords.iter().all(|value| value.is_finite()) {
        return Quaternion::identity();
    }
    match rotation.coords.try_normalize(f32::EPSILON).map(Quaternion::from) {
        Some(normalized) if normalized.coords.iter().all(|value| value.is_finite()) => normalized,
        _ => Quaternion::identity(),
    }
}

/// Encode a rotation into the 48-bit "smallest three" form.
///
/// Bits 45..47 hold the index (x, y, z, w order) of the dropped largest
/// component; the remaining three components follow in 15-bit groups, the
/// first in bits 30..45.
pub fn compress_quaternion(rotation: &Quaternion<f32>) -> [u8; 6] {
    let unit = sanitize_rotation(rotation);
    let mut components = [unit.i, unit.j, unit.k, unit.w];

    let mut max_index = 0;
    for index in 1..4 {
        if components[index].abs() > components[max_index].abs() {
            max_index = index;
        }
    }
    if components[max_index] < 0.0 {
        for value in &mut components {
            *value = -*value;
        }
    }

    let mut bits = (max_index as u64) << 45;
    let mut shift: u32 = 30;
    for (index, value) in components.iter().enumerate() {
        if index == max_index {
            continue;
        }
        bits |= quantize_component(*value) << shift;
        shift = shift.saturating_sub(15);
    }

    let bytes = bits.to_le_bytes();
    [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]]
}

fn quantize_component(value: f32) -> u64 {
    let scaled = (COMPONENT_SCALE * (SQRT_2 * value + 1.0)).round();
    (scaled.max(0.0) as u64).min(COMPONENT_MASK)
}

/// Inverse of [`compress_quaternion`], used to verify written assets.
#[cfg(test)]
pub(crate) fn decompress_quaternion(bytes: [u8; 6]) -> Quaternion<f32> {
    let mut word = [0u8; 8];
    word[..6].copy_from_slice(&bytes);
    let bits = u64::from_le_bytes(word);

    let max_index = ((bits >> 45) & 0x3) as usize;
    let mut components = [0.0f32; 4];
    let mut shift: u32 = 30;
    let mut sum_sq = 0.0;
    for (index, slot) in components.iter_mut().enumerate() {
        if index == max_index {
            continue;
        }
        let raw = ((bits >> shift) & COMPONENT_MASK) as f32;
        let value = raw * (SQRT_2 / 32767.0) - std::f32::consts::FRAC_1_SQRT_2;
        *slot = value;
        sum_sq += value * value;
        shift = shift.saturating_sub(15);
    }
    components[max_index] = (1.0 - sum_sq).max(0.0).sqrt();

    Quaternion::new(components[3], components[0], components[1], components[2])
}

#[cfg(test)]
mod tests {
    use nalgebra::{UnitQuaternion, Vector3};

    use super::*;

    fn angle_between(a: &Quaternion<f32>, b: &Quaternion<f32>) -> f32 {
        let dot = a.normalize().dot(&b.normalize()).abs().min(1.0);
        2.0 * dot.acos()
    }

    #[test]
    fn given_identity_when_compressing_then_w_is_dropped_and_others_are_midpoint() {
        let bytes = compress_quaternion(&Quaternion::identity());
        let mut word = [0u8; 8];
        word[..6].copy_from_slice(&bytes);
        let bits = u64::from_le_bytes(word);

        assert_eq!(bits >> 45, 3);
        // round(16383.5) == 16384 for each zero component
        assert_eq!((bits >> 30) & COMPONENT_MASK, 16384);
        assert_eq!((bits >> 15) & COMPONENT_MASK, 16384);
        assert_eq!(bits & COMPONENT_MASK, 16384);
    }

    #[test]
    fn given_arbitrary_rotations_when_round_tripping_then_error_is_below_half_degree() {
        let axes = [
            Vector3::x_axis(),
            Vector3::y_axis(),
            Vector3::z_axis(),
            nalgebra::Unit::new_normalize(Vector3::new(1.0, -2.0, 0.5)),
        ];
        for axis in axes {
            for step in 0..24 {
                let angle = step as f32 * 0.27 - 3.0;
                let rotation = UnitQuaternion::from_axis_angle(&axis, angle).into_inner();
                let decoded = decompress_quaternion(compress_quaternion(&rotation));
                assert!(
                    angle_between(&rotation, &decoded) < 0.5f32.to_radians(),
                    "rotation {rotation:?} decoded as {decoded:?}"
                );
            }
        }
    }

    #[test]
    fn given_negative_largest_component_when_compressing_then_sign_is_flipped() {
        let rotation = Quaternion::new(-0.9, 0.1, 0.3, 0.1);
        let decoded = decompress_quaternion(compress_quaternion(&rotation));
        assert!(decoded.w > 0.0);
        assert!(angle_between(&rotation, &decoded) < 0.5f32.to_radians());
    }

    #[test]
    fn given_equal_magnitudes_when_compressing_then_earliest_component_is_dropped() {
        let rotation = Quaternion::new(0.5, 0.5, 0.5, 0.5);
        let bytes = compress_quaternion(&rotation);
        assert_eq!(bytes[5] >> 5, 0);
    }

    #[test]
    fn given_non_finite_rotation_when_sanitizing_then_identity_is_used() {
        let rotation = Quaternion::new(f32::NAN, 0.0, 1.0, 0.0);
        assert_eq!(sanitize_rotation(&rotation), Quaternion::identity());
        assert_eq!(
            sanitize_rotation(&Quaternion::new(0.0, 0.0, 0.0, 0.0)),
            Quaternion::identity()
        );
    }
}
