use std::path::Path;

use anyhow::{Context, Result};
use gltf::{
    Document,
    animation::{Interpolation as GltfInterpolation, Property, util::ReadOutputs},
    buffer,
};
use nalgebra::{Matrix4, Vector3};

use crate::scene::{
    Animation, AnimationChannel, AnimationSampler, ChannelProperty, Interpolation, SamplerOutput,
    SceneGraph, SceneNode, Skin,
};

// ─── Import ───────────────────────────────────────────────────────────────────

/// Load a glTF/GLB file into a [`SceneGraph`].
pub fn load_scene(input_path: &Path) -> Result<SceneGraph> {
    let (document, buffers, _images) = gltf::import(input_path)
        .with_context(|| format!("failed to read glTF: {}", input_path.display()))?;
    Ok(scene_from_document(&document, &buffers))
}

/// Load a glTF/GLB held in memory.
pub fn scene_from_slice(bytes: &[u8]) -> Result<SceneGraph> {
    let (document, buffers, _images) =
        gltf::import_slice(bytes).context("failed to parse glTF from memory")?;
    Ok(scene_from_document(&document, &buffers))
}

pub(super) fn scene_from_document(document: &Document, buffers: &[buffer::Data]) -> SceneGraph {
    let mut nodes: Vec<SceneNode> = document
        .nodes()
        .map(|node| SceneNode {
            name: node.name().map(ToOwned::to_owned),
            parent: None,
            children: node.children().map(|child| child.index()).collect(),
            local: Matrix4::from(node.transform().matrix()),
        })
        .collect();

    for parent in 0..nodes.len() {
        for child in nodes[parent].children.clone() {
            if let Some(node) = nodes.get_mut(child) {
                node.parent = Some(parent);
            }
        }
    }

    let skins = document
        .skins()
        .map(|skin| {
            let joints: Vec<usize> = skin.joints().map(|joint| joint.index()).collect();
            let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));
            let mut inverse_bind_matrices: Vec<Matrix4<f32>> = reader
                .read_inverse_bind_matrices()
                .map(|matrices| matrices.map(Matrix4::from).collect())
                .unwrap_or_default();
            // Missing matrices default to identity.
            inverse_bind_matrices.resize(joints.len(), Matrix4::identity());
            Skin {
                name: skin.name().map(ToOwned::to_owned),
                joints,
                inverse_bind_matrices,
            }
        })
        .collect();

    let animations = document
        .animations()
        .map(|animation| read_animation(&animation, buffers))
        .collect();

    SceneGraph {
        nodes,
        skins,
        animations,
    }
}

/// One sampler per channel; a channel whose data cannot be read keeps
/// `sampler: None` so extraction can report it.
fn read_animation(animation: &gltf::Animation<'_>, buffers: &[buffer::Data]) -> Animation {
    let mut channels = Vec::new();
    let mut samplers = Vec::new();

    for channel in animation.channels() {
        let target = channel.target();
        let property = match target.property() {
            Property::Translation => ChannelProperty::Translation,
            Property::Rotation => ChannelProperty::Rotation,
            Property::Scale => ChannelProperty::Scale,
            Property::MorphTargetWeights => ChannelProperty::Weights,
        };
        let interpolation = match channel.sampler().interpolation() {
            GltfInterpolation::Step => Interpolation::Step,
            GltfInterpolation::Linear => Interpolation::Linear,
            GltfInterpolation::CubicSpline => Interpolation::CubicSpline,
        };

        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));
        let input: Option<Vec<f32>> = reader.read_inputs().map(Iterator::collect);
        let output = reader.read_outputs().map(|outputs| match outputs {
            ReadOutputs::Translations(values) | ReadOutputs::Scales(values) => {
                SamplerOutput::Vectors(values.map(Vector3::from).collect())
            }
            ReadOutputs::Rotations(values) => SamplerOutput::Rotations(values.into_f32().collect()),
            ReadOutputs::MorphTargetWeights(values) => {
                SamplerOutput::Weights(values.into_f32().collect())
            }
        });

        let sampler = match (input, output) {
            (Some(input), Some(output)) => {
                samplers.push(AnimationSampler {
                    interpolation,
                    input,
                    output,
                });
                Some(samplers.len() - 1)
            }
            _ => None,
        };

        channels.push(AnimationChannel {
            target_node: Some(target.node().index()),
            property,
            sampler,
        });
    }

    Animation {
        name: animation.name().map(ToOwned::to_owned),
        channels,
        samplers,
    }
}
