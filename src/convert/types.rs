use serde::{Deserialize, Serialize};

use super::skeleton::CorrectionReport;

/// Sampling rate used when no profile or flag overrides it.
pub const DEFAULT_FRAME_RATE: f32 = 30.0;

// ─── Public types ─────────────────────────────────────────────────────────────

/// Export options shared by the CLI and saved export profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Fixed sampling rate in frames per second.
    pub frame_rate: f32,
    /// Re-orient joints along their child direction before sampling.
    pub normalize_orientation: bool,
    /// Skin providing joint order and bind matrices; first skin when unset.
    pub skin_name: Option<String>,
    /// Animation to export; first animation when unset.
    pub animation_name: Option<String>,
    /// Write `<output>.diagnostic.json` next to the asset.
    pub write_diagnostic: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            normalize_orientation: false,
            skin_name: None,
            animation_name: None,
            write_diagnostic: false,
        }
    }
}

/// A single non-fatal finding recorded during extraction or export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// One exported track as it appears in the joint-hash table.
#[derive(Debug, Clone, Serialize)]
pub struct JointSummary {
    pub name: String,
    pub hash: u32,
    pub node_index: Option<usize>,
}

/// Report returned after an export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub animation_name: String,
    pub frame_rate: f32,
    pub frame_count: u32,
    pub frame_duration: f32,
    pub max_key_time: f32,
    pub track_count: usize,
    pub vector_palette_len: usize,
    pub quaternion_palette_len: usize,
    pub byte_len: usize,
    pub joints: Vec<JointSummary>,
    pub correction: Option<CorrectionReport>,
    pub issues: Vec<ValidationIssue>,
}

impl ExportReport {
    /// Every recorded issue is a warning; fatal conditions abort the export.
    pub fn warning_count(&self) -> usize {
        self.issues.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnimationInfo {
    pub index: usize,
    pub name: Option<String>,
    pub channel_count: usize,
    pub duration: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkinInfo {
    pub index: usize,
    pub name: Option<String>,
    pub joint_count: usize,
}

/// Contents listing returned by `list_gltf_contents`.
#[derive(Debug, Clone, Serialize)]
pub struct SceneSummary {
    pub node_count: usize,
    pub animations: Vec<AnimationInfo>,
    pub skins: Vec<SkinInfo>,
}
