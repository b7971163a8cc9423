use std::io::{Cursor, Seek, SeekFrom, Write};

use super::extract::JointTrack;
use super::hash::joint_hash;
use super::palette::{QuaternionPalette, VectorPalette};
use super::quantize::compress_quaternion;
use crate::error::ExportError;

// ─── Format constants ─────────────────────────────────────────────────────────

pub const MAGIC: &[u8; 8] = b"r3d2anmd";
pub const VERSION: u32 = 5;
pub const HEADER_LEN: u64 = 64;
/// Zero bytes written in front of every referenced section.
pub const SECTION_PADDING: usize = 12;

/// The resource size field counts bytes after the first 16 of the header.
const RESOURCE_SIZE_BASE: u64 = 16;
const RESOURCE_SIZE_POSITION: u64 = 12;
const OFFSETS_POSITION: u64 = 40;
/// Absorbs f32 error in `fps × duration` so a 31/30 s clip yields 31 frames.
const FRAME_COUNT_EPSILON: f64 = 1e-4;
/// Translation, scale and rotation index, two bytes each.
const FRAME_ENTRY_LEN: u64 = 6;
const VECTOR_LEN: u64 = 12;
const COMPRESSED_QUATERNION_LEN: u64 = 6;
const JOINT_HASH_LEN: u64 = 4;

// ─── Asset model ──────────────────────────────────────────────────────────────

/// Palette indices of one joint in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEntry {
    pub translation: u16,
    pub scale: u16,
    pub rotation: u16,
}

/// Absolute section offsets as stored in the header, in header order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionOffsets {
    pub joint_hashes: u32,
    pub asset_name: u32,
    pub time: u32,
    pub vector_palette: u32,
    pub quaternion_palette: u32,
    pub frames: u32,
}

/// Fully sampled animation, ready to serialize.
#[derive(Debug, Clone)]
pub struct AnimationAsset {
    pub frame_duration: f32,
    pub frame_count: u32,
    pub joint_hashes: Vec<u32>,
    pub vectors: VectorPalette,
    pub quaternions: QuaternionPalette,
    /// Frame-major, joint-minor.
    pub frames: Vec<FrameEntry>,
}

impl AnimationAsset {
    pub fn track_count(&self) -> usize {
        self.joint_hashes.len()
    }

    /// Entries of frame `frame`, one per joint.
    pub fn frame(&self, frame: usize) -> &[FrameEntry] {
        let tracks = self.track_count();
        let start = (frame * tracks).min(self.frames.len());
        let end = (start + tracks).min(self.frames.len());
        &self.frames[start..end]
    }

    /// Serialize into `writer`, patching the header once every section is
    /// placed. Offsets are relative to the writer position on entry.
    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> Result<SectionOffsets, ExportError> {
        let base = writer.stream_position()?;
        let track_count = u32::try_from(self.track_count()).map_err(|_| {
            ExportError::CountOverflow {
                field: "track",
                count: self.track_count(),
            }
        })?;

        writer.write_all(MAGIC)?;
        write_u32(writer, VERSION)?;
        write_u32(writer, 0)?; // resource size
        write_u32(writer, 0)?; // format token
        write_u32(writer, VERSION)?;
        write_u32(writer, 0)?; // flags
        write_u32(writer, track_count)?;
        write_u32(writer, self.frame_count)?;
        writer.write_all(&self.frame_duration.to_le_bytes())?;
        for _ in 0..6 {
            write_u32(writer, 0)?;
        }

        let mut offsets = SectionOffsets::default();

        offsets.vector_palette = begin_section(writer, base, "vector palette")?;
        for vector in self.vectors.entries() {
            for component in vector.iter() {
                writer.write_all(&component.to_le_bytes())?;
            }
        }

        offsets.quaternion_palette = begin_section(writer, base, "quaternion palette")?;
        for rotation in self.quaternions.entries() {
            writer.write_all(&compress_quaternion(rotation))?;
        }

        offsets.joint_hashes = begin_section(writer, base, "joint hash")?;
        for hash in &self.joint_hashes {
            write_u32(writer, *hash)?;
        }

        offsets.frames = begin_section(writer, base, "frame")?;
        for entry in &self.frames {
            writer.write_all(&entry.translation.to_le_bytes())?;
            writer.write_all(&entry.scale.to_le_bytes())?;
            writer.write_all(&entry.rotation.to_le_bytes())?;
        }

        let end = writer.stream_position()?;
        let resource_size = (end - base).saturating_sub(RESOURCE_SIZE_BASE);
        let resource_size = u32::try_from(resource_size)
            .map_err(|_| ExportError::ResourceSizeOverflow { size: resource_size })?;

        writer.seek(SeekFrom::Start(base + RESOURCE_SIZE_POSITION))?;
        write_u32(writer, resource_size)?;
        writer.seek(SeekFrom::Start(base + OFFSETS_POSITION))?;
        for offset in [
            offsets.joint_hashes,
            offsets.asset_name,
            offsets.time,
            offsets.vector_palette,
            offsets.quaternion_palette,
            offsets.frames,
        ] {
            write_u32(writer, offset)?;
        }
        writer.seek(SeekFrom::Start(end))?;

        Ok(offsets)
    }

    /// Serialize into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ExportError> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

fn write_u32<W: Write>(writer: &mut W, value: u32) -> std::io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Write the section padding and return the offset pointing at it.
fn begin_section<W: Write + Seek>(
    writer: &mut W,
    base: u64,
    section: &'static str,
) -> Result<u32, ExportError> {
    let offset = checked_offset(section, writer.stream_position()? - base)?;
    writer.write_all(&[0u8; SECTION_PADDING])?;
    Ok(offset)
}

pub(super) fn checked_offset(section: &'static str, offset: u64) -> Result<u32, ExportError> {
    u32::try_from(offset).map_err(|_| ExportError::OffsetOverflow { section, offset })
}

/// Serialized length of an asset with `entry_count` frame entries and a
/// single entry in each palette, the smallest any sampled asset can be.
pub(super) fn minimum_asset_len(track_count: usize, entry_count: usize) -> u64 {
    let fixed = HEADER_LEN + 4 * SECTION_PADDING as u64 + VECTOR_LEN + COMPRESSED_QUATERNION_LEN;
    (track_count as u64)
        .saturating_mul(JOINT_HASH_LEN)
        .saturating_add((entry_count as u64).saturating_mul(FRAME_ENTRY_LEN))
        .saturating_add(fixed)
}

// ─── Sampling ─────────────────────────────────────────────────────────────────

/// `max(1, floor(frame_rate × max_key_time + ε))` with `ε = 1e-4`.
///
/// The epsilon keeps durations that land on a frame boundary in f32 from
/// losing their last frame, so a key time less than `ε / frame_rate` short of
/// a boundary also counts that frame.
pub fn frame_count_for(frame_rate: f32, max_key_time: f32) -> Result<u32, ExportError> {
    let frames = (f64::from(frame_rate) * f64::from(max_key_time.max(0.0)) + FRAME_COUNT_EPSILON)
        .floor()
        .max(1.0);
    if !frames.is_finite() || frames > f64::from(u32::MAX) {
        return Err(ExportError::CountOverflow {
            field: "frame",
            count: usize::MAX,
        });
    }
    Ok(frames as u32)
}

/// Sample every track at `frame / frame_rate` and build the palettes and the
/// frame table.
pub fn sample_animation_asset(
    tracks: &[JointTrack],
    frame_rate: f32,
    max_key_time: f32,
) -> Result<AnimationAsset, ExportError> {
    if tracks.is_empty() {
        return Err(ExportError::NoJoints);
    }
    if !(frame_rate.is_finite() && frame_rate > 0.0) {
        return Err(ExportError::InvalidFrameRate(frame_rate));
    }

    let frame_count = frame_count_for(frame_rate, max_key_time)?;
    let entry_count = (frame_count as usize)
        .checked_mul(tracks.len())
        .ok_or(ExportError::CountOverflow {
            field: "frame entry",
            count: usize::MAX,
        })?;

    // Reject tables that cannot be addressed before allocating them.
    let resource_size =
        minimum_asset_len(tracks.len(), entry_count).saturating_sub(RESOURCE_SIZE_BASE);
    if resource_size > u64::from(u32::MAX) {
        return Err(ExportError::ResourceSizeOverflow {
            size: resource_size,
        });
    }

    let mut vectors = VectorPalette::new();
    let mut quaternions = QuaternionPalette::new();
    let mut frames = Vec::new();

    for frame in 0..frame_count {
        let time = (f64::from(frame) / f64::from(frame_rate)) as f32;
        for track in tracks {
            let (translation, rotation, scale) = track.sample(time);
            frames.push(FrameEntry {
                translation: vectors.add(translation)?,
                scale: vectors.add(scale)?,
                rotation: quaternions.add(rotation)?,
            });
        }
    }

    Ok(AnimationAsset {
        frame_duration: 1.0 / frame_rate,
        frame_count,
        joint_hashes: tracks.iter().map(|track| joint_hash(&track.name)).collect(),
        vectors,
        quaternions,
        frames,
    })
}
