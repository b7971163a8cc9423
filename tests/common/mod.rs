//! Programmatic GLB fixtures and an `.anm` reader for integration tests.

#![allow(dead_code)]

use std::{fs, path::Path};

use serde_json::{Value, json};

// ─── GLB assembly ─────────────────────────────────────────────────────────────

/// Packs float accessors into a single binary buffer.
#[derive(Default)]
pub struct GlbBuilder {
    bin: Vec<u8>,
    buffer_views: Vec<Value>,
    accessors: Vec<Value>,
}

impl GlbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_floats(&mut self, values: &[f32], count: usize, kind: &str) -> usize {
        let offset = self.bin.len();
        for value in values {
            self.bin.extend_from_slice(&value.to_le_bytes());
        }
        self.buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": values.len() * 4,
        }));
        self.accessors.push(json!({
            "bufferView": self.buffer_views.len() - 1,
            "componentType": 5126,
            "count": count,
            "type": kind,
        }));
        self.accessors.len() - 1
    }

    /// Keyframe times; min/max are recorded as animation inputs require.
    pub fn times(&mut self, values: &[f32]) -> usize {
        let index = self.push_floats(values, values.len(), "SCALAR");
        let min = values.iter().copied().fold(f32::INFINITY, f32::min);
        let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        self.accessors[index]["min"] = json!([min]);
        self.accessors[index]["max"] = json!([max]);
        index
    }

    pub fn vec3s(&mut self, values: &[[f32; 3]]) -> usize {
        let flat: Vec<f32> = values.iter().flatten().copied().collect();
        self.push_floats(&flat, values.len(), "VEC3")
    }

    pub fn vec4s(&mut self, values: &[[f32; 4]]) -> usize {
        let flat: Vec<f32> = values.iter().flatten().copied().collect();
        self.push_floats(&flat, values.len(), "VEC4")
    }

    /// Column-major matrices.
    pub fn mat4s(&mut self, values: &[[f32; 16]]) -> usize {
        let flat: Vec<f32> = values.iter().flatten().copied().collect();
        self.push_floats(&flat, values.len(), "MAT4")
    }

    /// Complete `document` with the buffer tables and wrap it in a GLB.
    pub fn finish(self, mut document: Value) -> Vec<u8> {
        document["asset"] = json!({ "version": "2.0" });
        document["buffers"] = json!([{ "byteLength": self.bin.len() }]);
        document["bufferViews"] = Value::Array(self.buffer_views);
        document["accessors"] = Value::Array(self.accessors);
        let json_bytes = serde_json::to_vec(&document).expect("serialize glTF JSON");
        assemble_glb(&json_bytes, &self.bin)
    }
}

/// Header, JSON chunk padded with spaces, BIN chunk padded with zeros.
pub fn assemble_glb(json_bytes: &[u8], bin: &[u8]) -> Vec<u8> {
    let json_padding = (4 - json_bytes.len() % 4) % 4;
    let json_chunk_length = json_bytes.len() + json_padding;
    let bin_padding = (4 - bin.len() % 4) % 4;
    let bin_chunk_length = bin.len() + bin_padding;
    let total_length = 12 + 8 + json_chunk_length + 8 + bin_chunk_length;

    let mut glb = Vec::with_capacity(total_length);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total_length as u32).to_le_bytes());

    glb.extend_from_slice(&(json_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&0x4E4F534Au32.to_le_bytes());
    glb.extend_from_slice(json_bytes);
    glb.extend(std::iter::repeat_n(0x20u8, json_padding));

    glb.extend_from_slice(&(bin_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&0x004E4942u32.to_le_bytes());
    glb.extend_from_slice(bin);
    glb.extend(std::iter::repeat_n(0u8, bin_padding));

    glb
}

fn translation_matrix(x: f32, y: f32, z: f32) -> [f32; 16] {
    [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        x, y, z, 1.0,
    ]
}

/// Hips → Spine → Head, skin "Body", animations "Walk" (1 s) and "Idle" (2 s).
///
/// Walk moves the hips and bends the spine around Z; Idle steps the head
/// scale at 2 s.
pub fn skinned_character_glb() -> Vec<u8> {
    let mut builder = GlbBuilder::new();

    let inverse_binds = builder.mat4s(&[
        translation_matrix(0.0, -1.0, 0.0),
        translation_matrix(0.0, -1.5, 0.0),
        translation_matrix(0.0, -1.5, -0.3),
    ]);

    let bend = 0.1f32;
    let walk_times = builder.times(&[0.0, 0.5, 1.0]);
    let hips_translations =
        builder.vec3s(&[[0.0, 1.0, 0.0], [0.0, 1.1, 0.0], [0.0, 1.0, 0.0]]);
    let spine_rotations = builder.vec4s(&[
        [0.0, 0.0, 0.0, 1.0],
        [0.0, 0.0, bend.sin(), bend.cos()],
        [0.0, 0.0, 0.0, 1.0],
    ]);

    let idle_times = builder.times(&[0.0, 2.0]);
    let head_scales = builder.vec3s(&[[1.0, 1.0, 1.0], [1.2, 1.2, 1.2]]);

    builder.finish(json!({
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [
            { "name": "Hips", "translation": [0.0, 1.0, 0.0], "children": [1] },
            { "name": "Spine", "translation": [0.0, 0.5, 0.0], "children": [2] },
            { "name": "Head", "translation": [0.0, 0.0, 0.3] },
        ],
        "skins": [{
            "name": "Body",
            "joints": [0, 1, 2],
            "inverseBindMatrices": inverse_binds,
        }],
        "animations": [
            {
                "name": "Walk",
                "samplers": [
                    { "input": walk_times, "output": hips_translations, "interpolation": "LINEAR" },
                    { "input": walk_times, "output": spine_rotations, "interpolation": "LINEAR" },
                ],
                "channels": [
                    { "sampler": 0, "target": { "node": 0, "path": "translation" } },
                    { "sampler": 1, "target": { "node": 1, "path": "rotation" } },
                ],
            },
            {
                "name": "Idle",
                "samplers": [
                    { "input": idle_times, "output": head_scales, "interpolation": "STEP" },
                ],
                "channels": [
                    { "sampler": 0, "target": { "node": 2, "path": "scale" } },
                ],
            },
        ],
    }))
}

/// Single-joint skin "Root" whose "Long" clip keys a translation at
/// `end_time` seconds.
pub fn long_clip_glb(end_time: f32) -> Vec<u8> {
    let mut builder = GlbBuilder::new();
    let times = builder.times(&[0.0, end_time]);
    let translations = builder.vec3s(&[[0.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);

    builder.finish(json!({
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "Root" }],
        "skins": [{ "name": "Body", "joints": [0] }],
        "animations": [{
            "name": "Long",
            "samplers": [
                { "input": times, "output": translations, "interpolation": "LINEAR" },
            ],
            "channels": [
                { "sampler": 0, "target": { "node": 0, "path": "translation" } },
            ],
        }],
    }))
}

pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).expect("write fixture");
    path
}

// ─── .anm reader ──────────────────────────────────────────────────────────────

/// Decoded r3d2anmd v5 asset.
#[derive(Debug)]
pub struct DecodedAnm {
    pub resource_size: u32,
    pub format_token: u32,
    pub flags: u32,
    pub track_count: u32,
    pub frame_count: u32,
    pub frame_duration: f32,
    /// Joint hashes, asset name, time, vectors, quaternions, frames.
    pub offsets: [u32; 6],
    pub vectors: Vec<[f32; 3]>,
    pub quaternions: Vec<[f32; 4]>,
    pub joint_hashes: Vec<u32>,
    /// `[translation, scale, rotation]` per joint, frame-major.
    pub frames: Vec<[u16; 3]>,
}

impl DecodedAnm {
    pub fn entry(&self, frame: usize, joint: usize) -> [u16; 3] {
        self.frames[frame * self.track_count as usize + joint]
    }

    pub fn translation(&self, frame: usize, joint: usize) -> [f32; 3] {
        self.vectors[self.entry(frame, joint)[0] as usize]
    }

    pub fn scale(&self, frame: usize, joint: usize) -> [f32; 3] {
        self.vectors[self.entry(frame, joint)[1] as usize]
    }

    /// `[x, y, z, w]`
    pub fn rotation(&self, frame: usize, joint: usize) -> [f32; 4] {
        self.quaternions[self.entry(frame, joint)[2] as usize]
    }
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().expect("4 bytes"))
}

fn f32_at(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(bytes[offset..offset + 4].try_into().expect("4 bytes"))
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(bytes[offset..offset + 2].try_into().expect("2 bytes"))
}

/// Inverse of the 48-bit smallest-three encoding.
pub fn decompress_quaternion(bytes: &[u8]) -> [f32; 4] {
    let mut word = [0u8; 8];
    word[..6].copy_from_slice(&bytes[..6]);
    let bits = u64::from_le_bytes(word);

    let max_index = ((bits >> 45) & 0x3) as usize;
    let mut components = [0.0f32; 4];
    let mut shift = 30;
    let mut sum_sq = 0.0;
    for (index, slot) in components.iter_mut().enumerate() {
        if index == max_index {
            continue;
        }
        let raw = ((bits >> shift) & 0x7FFF) as f32;
        let value = raw * (std::f32::consts::SQRT_2 / 32767.0) - std::f32::consts::FRAC_1_SQRT_2;
        *slot = value;
        sum_sq += value * value;
        shift -= 15;
    }
    components[max_index] = (1.0 - sum_sq).max(0.0).sqrt();
    components
}

pub fn decode_anm(bytes: &[u8]) -> DecodedAnm {
    assert_eq!(&bytes[0..8], b"r3d2anmd", "magic");
    assert_eq!(u32_at(bytes, 8), 5, "version");
    assert_eq!(u32_at(bytes, 20), 5, "inner version");

    let track_count = u32_at(bytes, 28);
    let frame_count = u32_at(bytes, 32);
    let mut offsets = [0u32; 6];
    for (slot, offset) in offsets.iter_mut().enumerate() {
        *offset = u32_at(bytes, 40 + slot * 4);
    }
    let [hashes_at, _, _, vectors_at, quaternions_at, frames_at] = offsets.map(|o| o as usize);

    let vector_count = (quaternions_at - vectors_at - 12) / 12;
    let vectors = (0..vector_count)
        .map(|index| {
            let at = vectors_at + 12 + index * 12;
            [f32_at(bytes, at), f32_at(bytes, at + 4), f32_at(bytes, at + 8)]
        })
        .collect();

    let quaternion_count = (hashes_at - quaternions_at - 12) / 6;
    let quaternions = (0..quaternion_count)
        .map(|index| {
            let at = quaternions_at + 12 + index * 6;
            decompress_quaternion(&bytes[at..at + 6])
        })
        .collect();

    let joint_hashes = (0..track_count as usize)
        .map(|index| u32_at(bytes, hashes_at + 12 + index * 4))
        .collect();

    let frames = (0..(track_count * frame_count) as usize)
        .map(|index| {
            let at = frames_at + 12 + index * 6;
            [u16_at(bytes, at), u16_at(bytes, at + 2), u16_at(bytes, at + 4)]
        })
        .collect();

    DecodedAnm {
        resource_size: u32_at(bytes, 12),
        format_token: u32_at(bytes, 16),
        flags: u32_at(bytes, 24),
        track_count,
        frame_count,
        frame_duration: f32_at(bytes, 36),
        offsets,
        vectors,
        quaternions,
        joint_hashes,
        frames,
    }
}
