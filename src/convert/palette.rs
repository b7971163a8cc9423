use nalgebra::{Quaternion, Vector3};

use crate::error::ExportError;

/// Two vectors share a palette slot when their squared distance is below this.
pub const VECTOR_DISTANCE_SQ_TOLERANCE: f32 = 1e-5;
/// Two unit quaternions share a slot when `|dot|` exceeds this.
pub const QUATERNION_DOT_TOLERANCE: f32 = 0.99999;
/// Frame entries address palettes with 16-bit indices.
pub const MAX_PALETTE_ENTRIES: usize = u16::MAX as usize;

/// Deduplicated list of translations and scales.
#[derive(Debug, Clone, Default)]
pub struct VectorPalette {
    entries: Vec<Vector3<f32>>,
}

impl VectorPalette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the first entry within tolerance of `value`, appending it when
    /// none matches.
    pub fn add(&mut self, value: Vector3<f32>) -> Result<u16, ExportError> {
        if let Some(index) = self
            .entries
            .iter()
            .position(|entry| (entry - value).norm_squared() < VECTOR_DISTANCE_SQ_TOLERANCE)
        {
            return palette_index(index, "vector");
        }
        push_entry(&mut self.entries, value, "vector")
    }

    pub fn entries(&self) -> &[Vector3<f32>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Deduplicated list of normalized rotations. `q` and `-q` share a slot.
#[derive(Debug, Clone, Default)]
pub struct QuaternionPalette {
    entries: Vec<Quaternion<f32>>,
}

impl QuaternionPalette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes `value` before matching; the stored entry is the normalized
    /// form of the first rotation that opened the slot.
    pub fn add(&mut self, value: Quaternion<f32>) -> Result<u16, ExportError> {
        let value: Quaternion<f32> = value
            .coords
            .try_normalize(f32::EPSILON)
            .map_or_else(Quaternion::identity, Quaternion::from);
        if let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry.dot(&value).abs() > QUATERNION_DOT_TOLERANCE)
        {
            return palette_index(index, "quaternion");
        }
        push_entry(&mut self.entries, value, "quaternion")
    }

    pub fn entries(&self) -> &[Quaternion<f32>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn push_entry<T>(entries: &mut Vec<T>, value: T, palette: &'static str) -> Result<u16, ExportError> {
    if entries.len() >= MAX_PALETTE_ENTRIES {
        return Err(ExportError::PaletteOverflow {
            palette,
            max: MAX_PALETTE_ENTRIES,
        });
    }
    entries.push(value);
    palette_index(entries.len() - 1, palette)
}

fn palette_index(index: usize, palette: &'static str) -> Result<u16, ExportError> {
    u16::try_from(index).map_err(|_| ExportError::PaletteOverflow {
        palette,
        max: MAX_PALETTE_ENTRIES,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_nearby_vectors_when_adding_then_slot_is_shared() {
        let mut palette = VectorPalette::new();
        let a = palette.add(Vector3::new(1.0, 2.0, 3.0)).expect("room");
        let b = palette.add(Vector3::new(1.001, 2.0, 3.0)).expect("room");
        let c = palette.add(Vector3::new(1.1, 2.0, 3.0)).expect("room");

        assert_eq!(a, 0);
        assert_eq!(b, 0);
        assert_eq!(c, 1);
        assert_eq!(palette.len(), 2);
    }

    #[test]
    fn given_same_vector_when_adding_100_times_then_one_slot_is_reused() {
        let mut palette = VectorPalette::new();
        let indices: Vec<u16> = (0..100)
            .map(|_| palette.add(Vector3::new(0.25, -1.0, 4.0)).expect("room"))
            .collect();

        assert!(indices.iter().all(|&index| index == 0));
        assert_eq!(palette.len(), 1);
    }

    #[test]
    fn given_negated_quaternion_when_adding_then_slot_is_shared() {
        let mut palette = QuaternionPalette::new();
        let q = Quaternion::new(0.5, 0.5, -0.5, 0.5);
        let first = palette.add(q).expect("room");
        let second = palette.add(-q).expect("room");

        assert_eq!(first, second);
        assert_eq!(palette.len(), 1);
    }

    #[test]
    fn given_unnormalized_quaternion_when_adding_then_entry_is_normalized() {
        let mut palette = QuaternionPalette::new();
        palette.add(Quaternion::new(2.0, 0.0, 0.0, 0.0)).expect("room");
        assert!((palette.entries()[0].norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn given_full_palette_when_adding_new_value_then_overflow_is_reported() {
        let mut palette = VectorPalette::new();
        for index in 0..MAX_PALETTE_ENTRIES {
            palette.entries.push(Vector3::new(index as f32, 0.0, 0.0));
        }

        let reused = palette.add(Vector3::new(5.0, 0.0, 0.0)).expect("existing slot");
        assert_eq!(reused, 5);

        let error = palette
            .add(Vector3::new(-1.0, 0.0, 0.0))
            .expect_err("palette is full");
        assert!(matches!(error, ExportError::PaletteOverflow { .. }));
    }

    #[test]
    fn given_full_quaternion_palette_when_adding_new_rotation_then_overflow_is_reported() {
        let mut palette = QuaternionPalette::new();
        palette
            .entries
            .resize(MAX_PALETTE_ENTRIES, Quaternion::identity());

        let reused = palette.add(Quaternion::identity()).expect("existing slot");
        assert_eq!(reused, 0);

        let error = palette
            .add(Quaternion::new(0.0, 1.0, 0.0, 0.0))
            .expect_err("palette is full");
        assert!(matches!(
            error,
            ExportError::PaletteOverflow {
                palette: "quaternion",
                ..
            }
        ));
    }
}
