use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;

use super::types::ExportReport;
use super::writer::{AnimationAsset, HEADER_LEN, MAGIC, SectionOffsets, VERSION};

// ─── Diagnostic structs ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct SectionDiagnostic {
    joint_hashes: u32,
    vector_palette: u32,
    quaternion_palette: u32,
    frames: u32,
}

#[derive(Debug, Clone, Serialize)]
struct ExportDiagnosticLog<'a> {
    output_path: String,
    magic: String,
    version: u32,
    header_len: u64,
    sections: SectionDiagnostic,
    /// Translation/scale entries, first few only.
    vector_palette_preview: Vec<[f32; 3]>,
    report: &'a ExportReport,
}

const PREVIEW_LEN: usize = 8;

// ─── Path helper ──────────────────────────────────────────────────────────────

pub(super) fn diagnostic_log_path_for_output(output_path: &Path) -> PathBuf {
    output_path.with_extension("diagnostic.json")
}

// ─── Diagnostic writer ────────────────────────────────────────────────────────

pub(super) fn write_export_diagnostic_log(
    output_path: &Path,
    diagnostic_path: &Path,
    asset: &AnimationAsset,
    offsets: &SectionOffsets,
    report: &ExportReport,
) -> Result<()> {
    let log = ExportDiagnosticLog {
        output_path: output_path.display().to_string(),
        magic: String::from_utf8_lossy(MAGIC).into_owned(),
        version: VERSION,
        header_len: HEADER_LEN,
        sections: SectionDiagnostic {
            joint_hashes: offsets.joint_hashes,
            vector_palette: offsets.vector_palette,
            quaternion_palette: offsets.quaternion_palette,
            frames: offsets.frames,
        },
        vector_palette_preview: asset
            .vectors
            .entries()
            .iter()
            .take(PREVIEW_LEN)
            .map(|vector| [vector.x, vector.y, vector.z])
            .collect(),
        report,
    };

    let content =
        serde_json::to_string_pretty(&log).context("failed to serialize diagnostic log")?;
    fs::write(diagnostic_path, content).with_context(|| {
        format!(
            "failed to write diagnostic log: {}",
            diagnostic_path.display()
        )
    })?;
    Ok(())
}
