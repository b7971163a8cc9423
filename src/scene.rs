//! In-memory scene graph consumed by the exporter.
//!
//! Nodes hold their local transform as a column-major 4x4 matrix. Skins list
//! joint node indices together with one inverse bind matrix per joint.

use nalgebra::{Matrix4, Translation3, UnitQuaternion, Vector3};

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: Option<String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub local: Matrix4<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct Skin {
    pub name: Option<String>,
    /// Joint node indices; the order defines the inverse bind matrix slots.
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Matrix4<f32>>,
}

/// Node property an animation channel drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelProperty {
    Translation,
    Rotation,
    Scale,
    Weights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Step,
    #[default]
    Linear,
    CubicSpline,
}

/// Typed sampler output. For cubic splines every key owns three entries
/// (in-tangent, value, out-tangent).
#[derive(Debug, Clone)]
pub enum SamplerOutput {
    Vectors(Vec<Vector3<f32>>),
    /// `[x, y, z, w]`
    Rotations(Vec<[f32; 4]>),
    Weights(Vec<f32>),
}

impl SamplerOutput {
    pub fn len(&self) -> usize {
        match self {
            SamplerOutput::Vectors(values) => values.len(),
            SamplerOutput::Rotations(values) => values.len(),
            SamplerOutput::Weights(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SamplerOutput::Vectors(_) => "VEC3",
            SamplerOutput::Rotations(_) => "VEC4",
            SamplerOutput::Weights(_) => "SCALAR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnimationSampler {
    pub interpolation: Interpolation,
    pub input: Vec<f32>,
    pub output: SamplerOutput,
}

#[derive(Debug, Clone)]
pub struct AnimationChannel {
    pub target_node: Option<usize>,
    pub property: ChannelProperty,
    /// Index into [`Animation::samplers`]; `None` when the source sampler
    /// could not be read.
    pub sampler: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Animation {
    pub name: Option<String>,
    pub channels: Vec<AnimationChannel>,
    pub samplers: Vec<AnimationSampler>,
}

impl Animation {
    /// Largest key time over every sampler, `0.0` for an empty animation.
    pub fn duration(&self) -> f32 {
        self.samplers
            .iter()
            .filter_map(|sampler| sampler.input.last().copied())
            .filter(|time| time.is_finite())
            .fold(0.0, f32::max)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    pub nodes: Vec<SceneNode>,
    pub skins: Vec<Skin>,
    pub animations: Vec<Animation>,
}

impl SceneGraph {
    /// Append a node and link it below `parent`.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        local: Matrix4<f32>,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(SceneNode {
            name: Some(name.into()),
            parent,
            children: Vec::new(),
            local,
        });
        if let Some(parent_node) = parent.and_then(|parent| self.nodes.get_mut(parent)) {
            parent_node.children.push(index);
        }
        index
    }

    pub fn node_name(&self, index: usize) -> Option<&str> {
        self.nodes.get(index).and_then(|node| node.name.as_deref())
    }

    /// Name used for joint matching; unnamed nodes fall back to `joint_<index>`.
    pub fn joint_name(&self, index: usize) -> String {
        self.node_name(index)
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| format!("joint_{index}"))
    }

    pub fn find_node(&self, name: &str) -> Option<usize> {
        (0..self.nodes.len()).find(|&index| self.joint_name(index) == name)
    }

    /// Skin by name, or the first skin when `name` is `None`.
    pub fn find_skin(&self, name: Option<&str>) -> Option<usize> {
        match name {
            Some(name) => self
                .skins
                .iter()
                .position(|skin| skin.name.as_deref() == Some(name)),
            None => (!self.skins.is_empty()).then_some(0),
        }
    }

    /// Animation by name, or the first animation when `name` is `None`.
    pub fn find_animation(&self, name: Option<&str>) -> Option<usize> {
        match name {
            Some(name) => self
                .animations
                .iter()
                .position(|animation| animation.name.as_deref() == Some(name)),
            None => (!self.animations.is_empty()).then_some(0),
        }
    }

    /// Breadth-first order starting at the roots: every node appears after
    /// its parent. Nodes on a parent cycle are never reached and are omitted.
    pub fn topological_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.nodes.len())
            .filter(|&index| self.nodes[index].parent.is_none())
            .collect();
        let mut visited = vec![false; self.nodes.len()];
        for &root in &order {
            visited[root] = true;
        }

        let mut cursor = 0;
        while cursor < order.len() {
            let index = order[cursor];
            cursor += 1;
            for &child in &self.nodes[index].children {
                if child < visited.len() && !visited[child] {
                    visited[child] = true;
                    order.push(child);
                }
            }
        }
        order
    }

    /// Compose world matrices from local transforms and parent links.
    pub fn world_matrices(&self) -> Vec<Matrix4<f32>> {
        let mut worlds = vec![Matrix4::<f32>::identity(); self.nodes.len()];
        for index in self.topological_order() {
            let node = &self.nodes[index];
            worlds[index] = match node.parent {
                Some(parent) => worlds[parent] * node.local,
                None => node.local,
            };
        }
        worlds
    }
}

/// Build a `T * R * S` matrix.
pub fn compose_trs(
    translation: &Vector3<f32>,
    rotation: &UnitQuaternion<f32>,
    scale: &Vector3<f32>,
) -> Matrix4<f32> {
    Translation3::from(*translation).to_homogeneous()
        * rotation.to_homogeneous()
        * Matrix4::new_nonuniform_scaling(scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_chain_when_computing_world_matrices_then_parents_compose_first() {
        let mut scene = SceneGraph::default();
        let root = scene.add_node("root", None, Translation3::new(0.0, 1.0, 0.0).to_homogeneous());
        let child = scene.add_node(
            "child",
            Some(root),
            Translation3::new(2.0, 0.0, 0.0).to_homogeneous(),
        );
        let leaf = scene.add_node(
            "leaf",
            Some(child),
            Translation3::new(0.0, 0.0, 3.0).to_homogeneous(),
        );

        let worlds = scene.world_matrices();
        assert_eq!(worlds[leaf][(0, 3)], 2.0);
        assert_eq!(worlds[leaf][(1, 3)], 1.0);
        assert_eq!(worlds[leaf][(2, 3)], 3.0);
    }

    #[test]
    fn given_unnamed_node_when_resolving_joint_name_then_index_fallback_is_used() {
        let mut scene = SceneGraph::default();
        scene.nodes.push(SceneNode {
            name: None,
            parent: None,
            children: Vec::new(),
            local: Matrix4::identity(),
        });

        assert_eq!(scene.joint_name(0), "joint_0");
        assert_eq!(scene.find_node("joint_0"), Some(0));
    }

    #[test]
    fn given_missing_name_when_finding_animation_then_first_is_returned() {
        let scene = SceneGraph {
            animations: vec![
                Animation {
                    name: Some("idle".to_string()),
                    ..Animation::default()
                },
                Animation {
                    name: Some("run".to_string()),
                    ..Animation::default()
                },
            ],
            ..SceneGraph::default()
        };

        assert_eq!(scene.find_animation(None), Some(0));
        assert_eq!(scene.find_animation(Some("run")), Some(1));
        assert_eq!(scene.find_animation(Some("walk")), None);
    }
}
