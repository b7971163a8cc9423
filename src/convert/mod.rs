mod curve;
mod diagnostic;
mod extract;
mod gltf_utils;
mod hash;
mod palette;
mod quantize;
mod skeleton;
mod types;
mod validation;
mod writer;

use std::{
    collections::HashSet,
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::scene::SceneGraph;

// Re-export public types for callers of this module.
pub use curve::{Curve, CurveSampler, CurveValue, Keyframe, SplineSampler};
pub use extract::{ExtractedAnimation, JointTrack, extract_joint_curves};
pub use gltf_utils::{load_scene, scene_from_slice};
pub use hash::joint_hash;
pub use palette::{
    MAX_PALETTE_ENTRIES, QUATERNION_DOT_TOLERANCE, QuaternionPalette, VECTOR_DISTANCE_SQ_TOLERANCE,
    VectorPalette,
};
pub use quantize::{compress_quaternion, sanitize_rotation};
pub use skeleton::{CorrectionReport, JointCorrection, SkippedJoint, normalize_joint_orientations};
pub use types::{
    AnimationInfo, DEFAULT_FRAME_RATE, ExportOptions, ExportReport, JointSummary, SceneSummary,
    SkinInfo, ValidationIssue,
};
pub use writer::{
    AnimationAsset, FrameEntry, HEADER_LEN, MAGIC, SECTION_PADDING, SectionOffsets, VERSION,
    frame_count_for, sample_animation_asset,
};

use diagnostic::{diagnostic_log_path_for_output, write_export_diagnostic_log};
use validation::{check_frame_rate, validate_frame_rate};

/// Result of an in-memory export.
#[derive(Debug, Clone)]
pub struct ExportedAnimation {
    pub bytes: Vec<u8>,
    pub asset: AnimationAsset,
    pub offsets: SectionOffsets,
    pub report: ExportReport,
}

/// Outcome of exporting every animation of a file.
#[derive(Debug, Clone, Default)]
pub struct BatchExport {
    pub exported: Vec<(PathBuf, ExportReport)>,
    /// Animation name and error chain of every failed export.
    pub failed: Vec<(String, String)>,
}

// ─── Public API ───────────────────────────────────────────────────────────────

/// Export one animation of `scene` into an in-memory asset.
///
/// When orientation normalization is enabled the scene itself is corrected
/// in place: node locals, inverse bind matrices and animation channels.
pub fn export_animation(
    scene: &mut SceneGraph,
    animation_index: usize,
    options: &ExportOptions,
    canonical: Option<&[String]>,
) -> Result<ExportedAnimation> {
    validate_frame_rate(options.frame_rate)?;

    let animation_name = scene
        .animations
        .get(animation_index)
        .with_context(|| format!("animation index {animation_index} not found"))?
        .name
        .clone()
        .unwrap_or_else(|| format!("animation_{animation_index}"));

    let skin = match options.skin_name.as_deref() {
        Some(name) => Some(scene.find_skin(Some(name)).with_context(|| {
            let available: Vec<_> = scene.skins.iter().filter_map(|s| s.name.as_deref()).collect();
            format!("Skin '{name}' not found. Available skins: {available:?}")
        })?),
        None => scene.find_skin(None),
    };

    // Corrected scenes are extracted like any other; a second pass is a no-op.
    let correction = options.normalize_orientation.then(|| {
        let report = normalize_joint_orientations(scene, skin);
        debug!(
            "orientation pass on '{}': {} corrected, {} skipped",
            animation_name,
            report.corrected_joints,
            report.skipped.len()
        );
        report
    });

    let animation = &scene.animations[animation_index];
    let ExtractedAnimation {
        tracks,
        max_key_time,
        mut issues,
    } = extract_joint_curves(scene, animation, skin, canonical);
    issues.extend(check_frame_rate(animation, options.frame_rate));
    if let Some(report) = &correction {
        issues.extend(report.issues.iter().cloned());
    }

    if tracks.is_empty() {
        return Err(crate::ExportError::NoJoints)
            .with_context(|| format!("animation '{animation_name}' has nothing to export"));
    }

    let asset = sample_animation_asset(&tracks, options.frame_rate, max_key_time)
        .with_context(|| format!("failed to sample animation '{animation_name}'"))?;
    let mut cursor = Cursor::new(Vec::new());
    let offsets = asset
        .write_to(&mut cursor)
        .with_context(|| format!("failed to serialize animation '{animation_name}'"))?;
    let bytes = cursor.into_inner();

    for issue in &issues {
        warn!("[{}] {}", issue.code, issue.message);
    }

    let report = ExportReport {
        animation_name,
        frame_rate: options.frame_rate,
        frame_count: asset.frame_count,
        frame_duration: asset.frame_duration,
        max_key_time,
        track_count: asset.track_count(),
        vector_palette_len: asset.vectors.len(),
        quaternion_palette_len: asset.quaternions.len(),
        byte_len: bytes.len(),
        joints: tracks
            .iter()
            .zip(&asset.joint_hashes)
            .map(|(track, &hash)| JointSummary {
                name: track.name.clone(),
                hash,
                node_index: track.node,
            })
            .collect(),
        correction,
        issues,
    };

    Ok(ExportedAnimation {
        bytes,
        asset,
        offsets,
        report,
    })
}

/// Convert one animation of a glTF/GLB file into an `.anm` file.
///
/// Nothing is written unless the whole asset serialized successfully.
pub fn convert_gltf_to_anm(
    input_path: &Path,
    output_path: &Path,
    options: &ExportOptions,
    canonical: Option<&[String]>,
) -> Result<ExportReport> {
    let mut scene = load_scene(input_path)?;
    let animation_index = match options.animation_name.as_deref() {
        Some(name) => scene.find_animation(Some(name)).with_context(|| {
            let available: Vec<_> = scene
                .animations
                .iter()
                .filter_map(|animation| animation.name.as_deref())
                .collect();
            format!("Animation '{name}' not found. Available animations: {available:?}")
        })?,
        None => scene
            .find_animation(None)
            .with_context(|| format!("no animations found in {}", input_path.display()))?,
    };

    let exported = export_animation(&mut scene, animation_index, options, canonical)?;
    write_exported(output_path, &exported, options)?;
    Ok(exported.report)
}

/// Export every animation of a file into `output_dir` as `<name>.anm`.
///
/// Individual failures are collected and the rest continue; the call fails
/// only when no animation could be exported.
pub fn convert_all_gltf_animations(
    input_path: &Path,
    output_dir: &Path,
    options: &ExportOptions,
    canonical: Option<&[String]>,
) -> Result<BatchExport> {
    let scene = load_scene(input_path)?;
    if scene.animations.is_empty() {
        bail!("no animations found in {}", input_path.display());
    }
    fs::create_dir_all(output_dir).with_context(|| {
        format!(
            "failed to create output directory: {}",
            output_dir.display()
        )
    })?;

    let mut batch = BatchExport::default();
    let mut used_names = HashSet::<String>::new();

    for (index, animation) in scene.animations.iter().enumerate() {
        let display_name = animation
            .name
            .clone()
            .unwrap_or_else(|| format!("animation_{index}"));
        let file_stem = unique_file_stem(&display_name, index, &mut used_names);
        let output_path = output_dir.join(format!("{file_stem}.anm"));

        // Each export gets a pristine scene so corrections do not compound.
        let mut working = scene.clone();
        let result = export_animation(&mut working, index, options, canonical)
            .and_then(|exported| {
                write_exported(&output_path, &exported, options)?;
                Ok(exported.report)
            });

        match result {
            Ok(report) => batch.exported.push((output_path, report)),
            Err(err) => {
                warn!("failed to export animation '{}': {:#}", display_name, err);
                batch.failed.push((display_name, format!("{err:#}")));
            }
        }
    }

    if batch.exported.is_empty() {
        bail!(
            "none of the {} animation(s) in {} could be exported",
            scene.animations.len(),
            input_path.display()
        );
    }
    Ok(batch)
}

/// Summarize the animations and skins of a glTF/GLB file.
pub fn list_gltf_contents(input_path: &Path) -> Result<SceneSummary> {
    let scene = load_scene(input_path)?;
    Ok(summarize_scene(&scene))
}

pub fn summarize_scene(scene: &SceneGraph) -> SceneSummary {
    SceneSummary {
        node_count: scene.nodes.len(),
        animations: scene
            .animations
            .iter()
            .enumerate()
            .map(|(index, animation)| AnimationInfo {
                index,
                name: animation.name.clone(),
                channel_count: animation.channels.len(),
                duration: animation.duration(),
            })
            .collect(),
        skins: scene
            .skins
            .iter()
            .enumerate()
            .map(|(index, skin)| SkinInfo {
                index,
                name: skin.name.clone(),
                joint_count: skin.joints.len(),
            })
            .collect(),
    }
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn write_exported(
    output_path: &Path,
    exported: &ExportedAnimation,
    options: &ExportOptions,
) -> Result<()> {
    fs::write(output_path, &exported.bytes)
        .with_context(|| format!("failed to write output: {}", output_path.display()))?;

    let report = &exported.report;
    info!(
        "Exported animation '{}': {} joints, {} frames at {} fps ({} vectors, {} rotations, {} warnings) -> {}",
        report.animation_name,
        report.track_count,
        report.frame_count,
        report.frame_rate,
        report.vector_palette_len,
        report.quaternion_palette_len,
        report.warning_count(),
        output_path.display()
    );

    if options.write_diagnostic {
        let diagnostic_path = diagnostic_log_path_for_output(output_path);
        write_export_diagnostic_log(
            output_path,
            &diagnostic_path,
            &exported.asset,
            &exported.offsets,
            report,
        )?;
        debug!("diagnostic log written to {}", diagnostic_path.display());
    }
    Ok(())
}

/// File-system friendly stem, unique within one batch.
fn unique_file_stem(name: &str, index: usize, used: &mut HashSet<String>) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let base = if sanitized.trim_matches('_').is_empty() {
        format!("animation_{index}")
    } else {
        sanitized
    };

    let mut candidate = base.clone();
    let mut suffix = 1;
    while !used.insert(candidate.clone()) {
        candidate = format!("{base}_{suffix}");
        suffix += 1;
    }
    candidate
}
