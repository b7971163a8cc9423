use std::collections::HashSet;

use nalgebra::{Quaternion, Vector3};

use super::curve::{Curve, CurveValue, Keyframe, native_sampler};
use super::quantize::sanitize_rotation;
use super::types::ValidationIssue;
use crate::scene::{
    Animation, AnimationSampler, ChannelProperty, Interpolation, SamplerOutput, SceneGraph,
};

/// Per-joint animation curves, indexed by joint slot.
#[derive(Debug, Clone)]
pub struct JointTrack {
    pub name: String,
    /// Scene node backing the joint. Canonical names absent from the scene
    /// have no node and always sample the rest pose.
    pub node: Option<usize>,
    pub translation: Curve<Vector3<f32>>,
    pub rotation: Curve<Quaternion<f32>>,
    pub scale: Curve<Vector3<f32>>,
}

impl JointTrack {
    pub fn new(name: impl Into<String>, node: Option<usize>) -> Self {
        Self {
            name: name.into(),
            node,
            translation: Curve::default(),
            rotation: Curve::default(),
            scale: Curve::default(),
        }
    }

    pub fn max_key_time(&self) -> f32 {
        [
            self.translation.last_time(),
            self.rotation.last_time(),
            self.scale.last_time(),
        ]
        .into_iter()
        .flatten()
        .fold(0.0, f32::max)
    }

    /// Pose at `time`; empty channels fall back to zero translation, identity
    /// rotation and unit scale. The rotation is normalized.
    pub fn sample(&self, time: f32) -> (Vector3<f32>, Quaternion<f32>, Vector3<f32>) {
        let translation = self.translation.evaluate(time).unwrap_or_else(Vector3::zeros);
        let rotation = self
            .rotation
            .evaluate(time)
            .map(|rotation| sanitize_rotation(&rotation))
            .unwrap_or_else(Quaternion::identity);
        let scale = self
            .scale
            .evaluate(time)
            .unwrap_or_else(|| Vector3::new(1.0, 1.0, 1.0));
        (translation, rotation, scale)
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedAnimation {
    pub tracks: Vec<JointTrack>,
    /// Largest key time across every extracted curve.
    pub max_key_time: f32,
    pub issues: Vec<ValidationIssue>,
}

/// Resolve the joint set and gather one curve per joint and property.
///
/// `canonical` overrides the joint order of `skin`. Without either, every
/// node targeted by a channel becomes a joint, in node order. Bad channels are
/// skipped and recorded; extraction itself never fails.
pub fn extract_joint_curves(
    scene: &SceneGraph,
    animation: &Animation,
    skin: Option<usize>,
    canonical: Option<&[String]>,
) -> ExtractedAnimation {
    let mut issues = Vec::<ValidationIssue>::new();
    let mut tracks = collect_joint_set(scene, animation, skin, canonical, &mut issues);

    let mut slot_of_node = vec![None; scene.nodes.len()];
    for (slot, track) in tracks.iter().enumerate() {
        if let Some(node) = track.node {
            slot_of_node[node] = Some(slot);
        }
    }

    let mut assigned = vec![[false; 3]; tracks.len()];

    for (channel_index, channel) in animation.channels.iter().enumerate() {
        let Some(node) = channel.target_node.filter(|&node| node < scene.nodes.len()) else {
            issues.push(ValidationIssue::warning(
                "MISSING_CHANNEL_TARGET",
                format!("Channel {channel_index} has no target node and was skipped"),
            ));
            continue;
        };
        let Some(slot) = slot_of_node[node] else {
            issues.push(ValidationIssue::warning(
                "CHANNEL_TARGET_NOT_A_JOINT",
                format!(
                    "Channel {channel_index} targets node '{}' which is not an exported joint",
                    scene.joint_name(node)
                ),
            ));
            continue;
        };
        let property_slot = match channel.property {
            ChannelProperty::Translation => 0,
            ChannelProperty::Rotation => 1,
            ChannelProperty::Scale => 2,
            ChannelProperty::Weights => {
                issues.push(ValidationIssue::warning(
                    "UNSUPPORTED_CHANNEL_PROPERTY",
                    format!(
                        "Channel {channel_index} animates morph weights on '{}', which cannot be exported",
                        tracks[slot].name
                    ),
                ));
                continue;
            }
        };
        let Some(sampler) = channel
            .sampler
            .and_then(|sampler| animation.samplers.get(sampler))
        else {
            issues.push(ValidationIssue::warning(
                "UNRESOLVED_SAMPLER",
                format!("Channel {channel_index} references a sampler that could not be read"),
            ));
            continue;
        };

        let joint = tracks[slot].name.clone();
        let context = ChannelContext {
            index: channel_index,
            joint: &joint,
        };
        let installed = match (channel.property, &sampler.output) {
            (ChannelProperty::Translation, SamplerOutput::Vectors(values)) => {
                build_curve(sampler, values, &context, &mut issues)
                    .map(|curve| tracks[slot].translation = curve)
            }
            (ChannelProperty::Scale, SamplerOutput::Vectors(values)) => {
                build_curve(sampler, values, &context, &mut issues)
                    .map(|curve| tracks[slot].scale = curve)
            }
            (ChannelProperty::Rotation, SamplerOutput::Rotations(values)) => {
                let rotations: Vec<Quaternion<f32>> = values
                    .iter()
                    .map(|[x, y, z, w]| Quaternion::new(*w, *x, *y, *z))
                    .collect();
                build_curve(sampler, &rotations, &context, &mut issues)
                    .map(|curve| tracks[slot].rotation = curve)
            }
            (property, output) => {
                issues.push(ValidationIssue::warning(
                    "SAMPLER_OUTPUT_MISMATCH",
                    format!(
                        "Channel {channel_index} on '{}' animates {property:?} but its sampler outputs {}",
                        joint,
                        output.kind()
                    ),
                ));
                None
            }
        };

        if installed.is_some() {
            if assigned[slot][property_slot] {
                issues.push(ValidationIssue::warning(
                    "DUPLICATE_CHANNEL",
                    format!(
                        "Joint '{}' has more than one {:?} channel; channel {channel_index} replaces the earlier one",
                        joint, channel.property
                    ),
                ));
            }
            assigned[slot][property_slot] = true;
        }
    }

    let max_key_time = tracks
        .iter()
        .map(JointTrack::max_key_time)
        .fold(0.0, f32::max);

    ExtractedAnimation {
        tracks,
        max_key_time,
        issues,
    }
}

fn collect_joint_set(
    scene: &SceneGraph,
    animation: &Animation,
    skin: Option<usize>,
    canonical: Option<&[String]>,
    issues: &mut Vec<ValidationIssue>,
) -> Vec<JointTrack> {
    let mut tracks = Vec::<JointTrack>::new();
    let mut names = HashSet::<String>::new();
    let mut nodes = HashSet::<usize>::new();

    let mut push = |name: String, node: Option<usize>, issues: &mut Vec<ValidationIssue>| {
        if names.contains(&name) || node.is_some_and(|node| nodes.contains(&node)) {
            issues.push(ValidationIssue::warning(
                "DUPLICATE_JOINT_NAME",
                format!("Joint '{name}' is listed more than once; only the first entry is kept"),
            ));
            return;
        }
        names.insert(name.clone());
        if let Some(node) = node {
            nodes.insert(node);
        }
        tracks.push(JointTrack::new(name, node));
    };

    if let Some(canonical) = canonical {
        for name in canonical {
            let node = scene.find_node(name);
            if node.is_none() {
                issues.push(ValidationIssue::warning(
                    "CANONICAL_JOINT_NOT_FOUND",
                    format!("Joint '{name}' from the joint list does not exist in the scene; its track holds the rest pose"),
                ));
            }
            push(name.clone(), node, issues);
        }
    } else if let Some(skin) = skin.and_then(|skin| scene.skins.get(skin)) {
        for &node in skin.joints.iter().filter(|&&node| node < scene.nodes.len()) {
            push(scene.joint_name(node), Some(node), issues);
        }
    } else {
        let mut targets: Vec<usize> = animation
            .channels
            .iter()
            .filter(|channel| channel.property != ChannelProperty::Weights)
            .filter_map(|channel| channel.target_node)
            .filter(|&node| node < scene.nodes.len())
            .collect();
        targets.sort_unstable();
        targets.dedup();
        for node in targets {
            push(scene.joint_name(node), Some(node), issues);
        }
    }

    tracks
}

struct ChannelContext<'a> {
    index: usize,
    joint: &'a str,
}

/// Turn sampler data into a curve. Returns `None` when nothing usable was
/// left; every dropped key is reported.
fn build_curve<T: CurveValue>(
    sampler: &AnimationSampler,
    outputs: &[T],
    context: &ChannelContext<'_>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Curve<T>> {
    if sampler.input.is_empty() || outputs.is_empty() {
        issues.push(ValidationIssue::warning(
            "EMPTY_SAMPLER",
            format!(
                "Channel {} on '{}' has no keyframes and was skipped",
                context.index, context.joint
            ),
        ));
        return None;
    }

    let (stride, offset) = match sampler.interpolation {
        Interpolation::CubicSpline => (3, 1),
        Interpolation::Step | Interpolation::Linear => (1, 0),
    };
    if outputs.len() != sampler.input.len() * stride {
        issues.push(ValidationIssue::warning(
            "SAMPLER_COUNT_MISMATCH",
            format!(
                "Channel {} on '{}' has {} input times but {} output values",
                context.index,
                context.joint,
                sampler.input.len(),
                outputs.len()
            ),
        ));
        return None;
    }

    let mut keys = Vec::<Keyframe<T>>::with_capacity(sampler.input.len());
    let mut non_finite = 0usize;
    let mut non_monotonic = 0usize;
    for (key_index, &time) in sampler.input.iter().enumerate() {
        let value = outputs[key_index * stride + offset];
        if !time.is_finite() || !value.is_finite() {
            non_finite += 1;
            continue;
        }
        if keys.last().is_some_and(|last| last.time >= time) {
            non_monotonic += 1;
            continue;
        }
        keys.push(Keyframe { time, value });
    }

    if non_finite > 0 {
        issues.push(ValidationIssue::warning(
            "NON_FINITE_KEYFRAME",
            format!(
                "Channel {} on '{}' dropped {non_finite} keyframe(s) with non-finite values",
                context.index, context.joint
            ),
        ));
    }
    if non_monotonic > 0 {
        issues.push(ValidationIssue::warning(
            "NON_MONOTONIC_KEYFRAMES",
            format!(
                "Channel {} on '{}' dropped {non_monotonic} keyframe(s) whose time did not increase",
                context.index, context.joint
            ),
        ));
    }
    if keys.is_empty() {
        issues.push(ValidationIssue::warning(
            "EMPTY_SAMPLER",
            format!(
                "Channel {} on '{}' has no usable keyframes and was skipped",
                context.index, context.joint
            ),
        ));
        return None;
    }

    let curve = Curve::new(keys);
    // Dropped keys would desynchronize the native sampler from the key list.
    if non_finite == 0 && non_monotonic == 0 {
        if let Some(native) = native_sampler(sampler, outputs) {
            return Some(curve.with_native(native));
        }
    }
    Some(curve)
}
