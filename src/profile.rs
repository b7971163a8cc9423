use std::{fs, path::Path};

use anyhow::{Context, Result};

use crate::convert::ExportOptions;

/// Save export options to a JSON profile.
pub fn save_export_profile(path: &Path, options: &ExportOptions) -> Result<()> {
    let content = serde_json::to_string_pretty(options)
        .context("failed to serialize export profile as JSON")?;
    fs::write(path, content)
        .with_context(|| format!("failed to save export profile: {}", path.display()))?;
    Ok(())
}

/// Load export options from a JSON profile. Missing fields take their
/// defaults.
pub fn load_export_profile(path: &Path) -> Result<ExportOptions> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to load export profile: {}", path.display()))?;
    let options: ExportOptions =
        serde_json::from_str(&content).context("failed to parse export profile JSON")?;
    Ok(options)
}

/// Parse a joint list: one name per line, `#` comments and blank lines
/// ignored, surrounding whitespace trimmed.
pub fn parse_joint_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToOwned::to_owned)
        .collect()
}

/// Load a canonical joint order from a joint list file.
pub fn load_canonical_joint_list(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to load joint list: {}", path.display()))?;
    Ok(parse_joint_list(&content))
}
