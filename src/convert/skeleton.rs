use nalgebra::{Matrix3, Matrix4, Quaternion, UnitQuaternion, Vector3};
use serde::Serialize;

use super::types::ValidationIssue;
use crate::correction::{
    SignedAxis, correct_local_transform, correct_rotation_key, correct_scale_key,
    correct_translation_key, correction_matrix, correction_rotation, rebuild_inverse_bind_matrix,
    select_minimax_axis, select_single_child_axis,
};
use crate::scene::{
    Animation, AnimationChannel, AnimationSampler, ChannelProperty, Interpolation, SamplerOutput,
    SceneGraph,
};

/// Child offsets shorter than this carry no direction.
const MIN_CHILD_DISTANCE: f32 = 1e-6;

// ─── Report types ─────────────────────────────────────────────────────────────

/// Axis chosen for one skin joint.
#[derive(Debug, Clone, Serialize)]
pub struct JointCorrection {
    pub joint: String,
    pub node_index: usize,
    pub forward: SignedAxis,
    pub up: SignedAxis,
    /// The joint had no usable child and reused its parent's correction.
    pub inherited: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedJoint {
    pub joint: String,
    pub reason: String,
}

/// Outcome of an orientation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrectionReport {
    /// Joints whose frame actually changed.
    pub corrected_joints: usize,
    pub joints: Vec<JointCorrection>,
    pub skipped: Vec<SkippedJoint>,
    pub issues: Vec<ValidationIssue>,
}

/// Parent and own correction of a node whose local frame changed.
#[derive(Debug, Clone, Copy)]
struct FrameChange {
    parent: Matrix3<f32>,
    own: Matrix3<f32>,
    parent_rotation: UnitQuaternion<f32>,
    own_rotation: UnitQuaternion<f32>,
}

impl FrameChange {
    fn new(parent: Matrix3<f32>, own: Matrix3<f32>) -> Self {
        Self {
            parent,
            own,
            parent_rotation: correction_rotation(&parent),
            own_rotation: correction_rotation(&own),
        }
    }

    /// Corrected form of the identity rotation a missing channel implies.
    fn rest_rotation(&self) -> Quaternion<f32> {
        correct_rotation_key(
            &Quaternion::identity(),
            &self.parent_rotation,
            &self.own_rotation,
        )
    }
}

// ─── Orientation pass ─────────────────────────────────────────────────────────

/// Re-orient every joint of `skin` so its local X axis follows its dominant
/// child direction.
///
/// Node locals are compensated so world positions stay put, inverse bind
/// matrices are rebuilt so skinning is unchanged, and every animation channel
/// driving a changed node is rewritten keyframe by keyframe into the
/// corrected frames. Running the pass on its own output changes nothing.
pub fn normalize_joint_orientations(
    scene: &mut SceneGraph,
    skin: Option<usize>,
) -> CorrectionReport {
    let mut report = CorrectionReport::default();

    let Some(skin_index) = skin.filter(|&index| index < scene.skins.len()) else {
        report.issues.push(ValidationIssue::warning(
            "MISSING_SKIN",
            "Orientation normalization needs a skin; joints were left unchanged",
        ));
        return report;
    };
    if scene.skins[skin_index].joints.is_empty() {
        report.issues.push(ValidationIssue::warning(
            "EMPTY_SKIN",
            "Skin has no joints; orientation normalization was skipped",
        ));
        return report;
    }

    let node_count = scene.nodes.len();
    let mut is_joint = vec![false; node_count];
    for &node in &scene.skins[skin_index].joints {
        if node < node_count {
            is_joint[node] = true;
        }
    }

    let worlds_old = scene.world_matrices();
    let identity = Matrix3::<f32>::identity();
    // Effective correction per node; non-joint nodes keep identity.
    let mut corrections = vec![identity; node_count];
    let mut forwards = vec![SignedAxis::PosX; node_count];
    let mut changes: Vec<Option<FrameChange>> = vec![None; node_count];

    for node in scene.topological_order() {
        let parent = scene.nodes[node].parent;
        let parent_correction = parent.map(|parent| corrections[parent]).unwrap_or(identity);

        let own = if is_joint[node] {
            let joint = scene.joint_name(node);
            match choose_joint_axis(scene, node, &is_joint, &worlds_old[node]) {
                Ok(Some(forward)) => {
                    forwards[node] = forward;
                    report.joints.push(JointCorrection {
                        joint,
                        node_index: node,
                        forward,
                        up: forward.up(),
                        inherited: false,
                    });
                    correction_matrix(forward)
                }
                Ok(None) => {
                    let inherited = parent
                        .filter(|&parent| is_joint[parent])
                        .map(|parent| forwards[parent])
                        .unwrap_or(SignedAxis::PosX);
                    forwards[node] = inherited;
                    report.joints.push(JointCorrection {
                        joint,
                        node_index: node,
                        forward: inherited,
                        up: inherited.up(),
                        inherited: true,
                    });
                    parent_correction
                }
                Err(reason) => {
                    report.issues.push(ValidationIssue::warning(
                        "CORRECTION_SKIPPED",
                        format!("Joint '{joint}' was not re-oriented: {reason}"),
                    ));
                    report.skipped.push(SkippedJoint { joint, reason });
                    identity
                }
            }
        } else {
            identity
        };

        corrections[node] = own;
        if own != identity {
            report.corrected_joints += 1;
        }
        if parent_correction == identity && own == identity {
            continue;
        }

        let local = scene.nodes[node].local;
        scene.nodes[node].local = correct_local_transform(&local, &parent_correction, &own);
        changes[node] = Some(FrameChange::new(parent_correction, own));
    }

    let worlds_new = scene.world_matrices();
    let skin = &mut scene.skins[skin_index];
    for (slot, &node) in skin.joints.iter().enumerate() {
        if node >= node_count || corrections[node] == identity {
            continue;
        }
        let Some(inverse_bind) = skin.inverse_bind_matrices.get_mut(slot) else {
            continue;
        };
        match rebuild_inverse_bind_matrix(&worlds_old[node], inverse_bind, &worlds_new[node]) {
            Some(rebuilt) => *inverse_bind = rebuilt,
            None => {
                let joint = scene.nodes[node]
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("joint_{node}"));
                let reason = "corrected world matrix is not invertible".to_string();
                report.issues.push(ValidationIssue::warning(
                    "CORRECTION_SKIPPED",
                    format!("Inverse bind matrix of '{joint}' was kept: {reason}"),
                ));
                report.skipped.push(SkippedJoint { joint, reason });
            }
        }
    }

    if changes.iter().any(Option::is_some) {
        for animation in &mut scene.animations {
            correct_animation_channels(animation, &changes, &is_joint);
        }
    }

    report
}

/// `Ok(None)` means the joint has no usable child and inherits.
fn choose_joint_axis(
    scene: &SceneGraph,
    node: usize,
    is_joint: &[bool],
    world: &Matrix4<f32>,
) -> Result<Option<SignedAxis>, String> {
    if world.try_inverse().is_none() {
        return Err("world matrix is not invertible".to_string());
    }

    let directions: Vec<Vector3<f32>> = scene.nodes[node]
        .children
        .iter()
        .filter(|&&child| is_joint.get(child).copied().unwrap_or(false))
        .filter_map(|&child| {
            let local = &scene.nodes[child].local;
            let offset = Vector3::new(local[(0, 3)], local[(1, 3)], local[(2, 3)]);
            let length = offset.norm();
            (length.is_finite() && length > MIN_CHILD_DISTANCE).then(|| offset / length)
        })
        .collect();

    Ok(match directions.as_slice() {
        [] => None,
        [direction] => Some(select_single_child_axis(direction)),
        many => Some(select_minimax_axis(many)),
    })
}

// ─── Channel rewrite ──────────────────────────────────────────────────────────

/// Rewrite every channel driving a changed node. Each correction is linear
/// in the keyed value, so cubic tangents are transformed like values.
///
/// Rest rotations are keyed only for skin joints; other nodes are never
/// exported.
fn correct_animation_channels(
    animation: &mut Animation,
    changes: &[Option<FrameChange>],
    is_joint: &[bool],
) {
    unshare_samplers(animation);

    let mut has_rotation = vec![false; changes.len()];
    for channel in &animation.channels {
        let Some(node) = channel.target_node.filter(|&node| node < changes.len()) else {
            continue;
        };
        if channel.property == ChannelProperty::Rotation {
            has_rotation[node] = true;
        }
        let (Some(change), Some(sampler)) = (
            changes[node],
            channel
                .sampler
                .and_then(|sampler| animation.samplers.get_mut(sampler)),
        ) else {
            continue;
        };

        match (channel.property, &mut sampler.output) {
            (ChannelProperty::Translation, SamplerOutput::Vectors(values)) => {
                for value in values.iter_mut() {
                    *value = correct_translation_key(value, &change.parent);
                }
            }
            (ChannelProperty::Scale, SamplerOutput::Vectors(values)) => {
                for value in values.iter_mut() {
                    *value = correct_scale_key(value, &change.own);
                }
            }
            (ChannelProperty::Rotation, SamplerOutput::Rotations(values)) => {
                for value in values.iter_mut() {
                    let [x, y, z, w] = *value;
                    let corrected = correct_rotation_key(
                        &Quaternion::new(w, x, y, z),
                        &change.parent_rotation,
                        &change.own_rotation,
                    );
                    *value = [corrected.i, corrected.j, corrected.k, corrected.w];
                }
            }
            _ => {}
        }
    }

    // A joint without a rotation channel samples identity; keep that pose
    // by keying its corrected form.
    for (node, change) in changes.iter().enumerate() {
        let Some(change) = change else {
            continue;
        };
        if has_rotation[node] || !is_joint[node] {
            continue;
        }
        // Equal corrections cancel on an identity rotation.
        if change.parent == change.own {
            continue;
        }
        let rest = change.rest_rotation();
        animation.samplers.push(AnimationSampler {
            interpolation: Interpolation::Step,
            input: vec![0.0],
            output: SamplerOutput::Rotations(vec![[rest.i, rest.j, rest.k, rest.w]]),
        });
        animation.channels.push(AnimationChannel {
            target_node: Some(node),
            property: ChannelProperty::Rotation,
            sampler: Some(animation.samplers.len() - 1),
        });
    }
}

/// Give every channel its own sampler so per-node rewrites never leak into
/// another channel.
fn unshare_samplers(animation: &mut Animation) {
    let mut used = vec![false; animation.samplers.len()];
    for channel in &mut animation.channels {
        let Some(index) = channel.sampler.filter(|&index| index < used.len()) else {
            continue;
        };
        if used[index] {
            let copy = animation.samplers[index].clone();
            animation.samplers.push(copy);
            channel.sampler = Some(animation.samplers.len() - 1);
        } else {
            used[index] = true;
        }
    }
}
