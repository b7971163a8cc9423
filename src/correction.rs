use nalgebra::{Matrix3, Matrix4, Quaternion, Rotation3, UnitQuaternion, Vector3};
use serde::Serialize;

/// Minimum improvement a later axis needs over the current best in the
/// minimax search before it replaces it.
const AXIS_SCORE_EPSILON: f32 = 1e-6;

/// One of the six signed principal axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignedAxis {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl SignedAxis {
    /// Search order used by the minimax selection.
    pub const ALL: [SignedAxis; 6] = [
        SignedAxis::PosX,
        SignedAxis::NegX,
        SignedAxis::PosY,
        SignedAxis::NegY,
        SignedAxis::PosZ,
        SignedAxis::NegZ,
    ];

    pub fn vector(self) -> Vector3<f32> {
        match self {
            SignedAxis::PosX => Vector3::x(),
            SignedAxis::NegX => -Vector3::x(),
            SignedAxis::PosY => Vector3::y(),
            SignedAxis::NegY => -Vector3::y(),
            SignedAxis::PosZ => Vector3::z(),
            SignedAxis::NegZ => -Vector3::z(),
        }
    }

    /// Up axis paired with `self` used as the forward axis.
    pub fn up(self) -> SignedAxis {
        match self {
            SignedAxis::PosX | SignedAxis::NegX => SignedAxis::PosY,
            SignedAxis::PosY => SignedAxis::NegX,
            SignedAxis::NegY => SignedAxis::PosX,
            SignedAxis::PosZ | SignedAxis::NegZ => SignedAxis::PosY,
        }
    }
}

/// Picks the signed axis best matching a single child direction.
///
/// # Arguments
///
/// * `direction` - Parent-to-child offset in the parent's local frame.
///
/// # Returns
///
/// The axis of the largest absolute component, preferring X over Y over Z on
/// ties, signed like that component. A zero vector yields `PosZ`.
pub fn select_single_child_axis(direction: &Vector3<f32>) -> SignedAxis {
    let (ax, ay, az) = (direction.x.abs(), direction.y.abs(), direction.z.abs());
    if ax > 0.0 && ax >= ay && ax >= az {
        if direction.x < 0.0 {
            SignedAxis::NegX
        } else {
            SignedAxis::PosX
        }
    } else if ay > 0.0 && ay >= az {
        if direction.y < 0.0 {
            SignedAxis::NegY
        } else {
            SignedAxis::PosY
        }
    } else if direction.z < 0.0 {
        SignedAxis::NegZ
    } else {
        SignedAxis::PosZ
    }
}

/// Picks the signed axis that maximizes the minimum dot product against all
/// child directions.
///
/// # Arguments
///
/// * `directions` - Normalized parent-to-child directions.
///
/// # Returns
///
/// The winning axis. Candidates are visited in [`SignedAxis::ALL`] order and
/// only replace the current best when they beat it by more than a small
/// epsilon, so an axis already aligned to `PosX` keeps it.
pub fn select_minimax_axis(directions: &[Vector3<f32>]) -> SignedAxis {
    let score = |axis: SignedAxis| {
        let axis = axis.vector();
        directions
            .iter()
            .map(|direction| axis.dot(direction))
            .fold(f32::INFINITY, f32::min)
    };

    let mut best = SignedAxis::PosX;
    let mut best_score = score(best);
    for axis in SignedAxis::ALL.into_iter().skip(1) {
        let candidate = score(axis);
        if candidate > best_score + AXIS_SCORE_EPSILON {
            best = axis;
            best_score = candidate;
        }
    }
    best
}

/// Builds the rotation taking the canonical (forward = X, up = Y) frame to
/// `forward` and its paired up axis.
///
/// # Returns
///
/// A signed permutation matrix with columns `[forward, up, forward × up]`.
/// Entries are exactly `0` or `±1`.
pub fn correction_matrix(forward: SignedAxis) -> Matrix3<f32> {
    let f = forward.vector();
    let u = forward.up().vector();
    Matrix3::from_columns(&[f, u, f.cross(&u)])
}

/// Quaternion form of [`correction_matrix`].
pub fn correction_rotation(correction: &Matrix3<f32>) -> UnitQuaternion<f32> {
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*correction))
}

/// Re-expresses a local transform in corrected parent and joint frames.
///
/// # Arguments
///
/// * `local` - Original local matrix of the joint.
/// * `parent` - Correction applied to the parent joint.
/// * `own` - Correction applied to this joint.
///
/// # Returns
///
/// `parent⁻¹ · local · own`. World positions of the joint and of every
/// child compensated the same way are unchanged.
pub fn correct_local_transform(
    local: &Matrix4<f32>,
    parent: &Matrix3<f32>,
    own: &Matrix3<f32>,
) -> Matrix4<f32> {
    parent.transpose().to_homogeneous() * local * own.to_homogeneous()
}

/// Corrects one translation key: `parent⁻¹ · t`.
pub fn correct_translation_key(translation: &Vector3<f32>, parent: &Matrix3<f32>) -> Vector3<f32> {
    parent.transpose() * translation
}

/// Corrects one rotation key: `parent⁻¹ ⊗ r ⊗ own`.
pub fn correct_rotation_key(
    rotation: &Quaternion<f32>,
    parent: &UnitQuaternion<f32>,
    own: &UnitQuaternion<f32>,
) -> Quaternion<f32> {
    parent.inverse().into_inner() * rotation * own.into_inner()
}

/// Corrects one scale key by permuting it through `own`.
///
/// `S · C == C · S'` holds for a signed permutation `C` when `S'` takes, for
/// each axis `i`, the scale of the row that column `i` of `C` selects.
pub fn correct_scale_key(scale: &Vector3<f32>, own: &Matrix3<f32>) -> Vector3<f32> {
    let mut permuted = *scale;
    for column in 0..3 {
        let row = (0..3)
            .max_by(|&a, &b| own[(a, column)].abs().total_cmp(&own[(b, column)].abs()))
            .unwrap_or(column);
        permuted[column] = scale[row];
    }
    permuted
}

/// Rebuilds an inverse bind matrix after a joint's world transform changed.
///
/// # Arguments
///
/// * `world_old` - Joint world matrix before correction.
/// * `inverse_bind_old` - Inverse bind matrix before correction.
/// * `world_new` - Joint world matrix after correction.
///
/// # Returns
///
/// `inverse(world_new) · world_old · inverse_bind_old` with its bottom row
/// reset to `[0, 0, 0, 1]`, or `None` when `world_new` is not invertible.
pub fn rebuild_inverse_bind_matrix(
    world_old: &Matrix4<f32>,
    inverse_bind_old: &Matrix4<f32>,
    world_new: &Matrix4<f32>,
) -> Option<Matrix4<f32>> {
    let mesh_bind = world_old * inverse_bind_old;
    let mut rebuilt = world_new.try_inverse()? * mesh_bind;
    rebuilt[(3, 0)] = 0.0;
    rebuilt[(3, 1)] = 0.0;
    rebuilt[(3, 2)] = 0.0;
    rebuilt[(3, 3)] = 1.0;
    rebuilt.iter().all(|value| value.is_finite()).then_some(rebuilt)
}
