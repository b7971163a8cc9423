use crate::error::ExportError;
use crate::scene::Animation;

use super::types::ValidationIssue;

/// Relative tolerance for key spacing and frame-rate comparisons.
const RATE_TOLERANCE: f32 = 0.01;

// ─── Option validation ────────────────────────────────────────────────────────

pub(super) fn validate_frame_rate(frame_rate: f32) -> Result<(), ExportError> {
    if frame_rate.is_finite() && frame_rate > 0.0 {
        Ok(())
    } else {
        Err(ExportError::InvalidFrameRate(frame_rate))
    }
}

// ─── Source timing ────────────────────────────────────────────────────────────

/// Key step shared by every evenly spaced sampler of `animation`, if any.
///
/// Samplers with fewer than two keys carry no timing and are ignored. Returns
/// `None` when a sampler is unevenly spaced or samplers disagree.
pub(super) fn detect_source_frame_step(animation: &Animation) -> Option<f32> {
    let mut shared: Option<f32> = None;
    for sampler in &animation.samplers {
        if sampler.input.len() < 2 {
            continue;
        }
        let step = sampler.input[1] - sampler.input[0];
        if !step.is_finite() || step <= 0.0 {
            return None;
        }
        let evenly_spaced = sampler
            .input
            .windows(2)
            .all(|pair| ((pair[1] - pair[0]) - step).abs() <= step * RATE_TOLERANCE);
        if !evenly_spaced {
            return None;
        }
        match shared {
            Some(existing) if (existing - step).abs() > existing * RATE_TOLERANCE => return None,
            Some(_) => {}
            None => shared = Some(step),
        }
    }
    shared
}

/// Warn when the source keys sit on a different fixed rate than the export.
pub(super) fn check_frame_rate(animation: &Animation, frame_rate: f32) -> Option<ValidationIssue> {
    let step = detect_source_frame_step(animation)?;
    let source_rate = 1.0 / step;
    if ((source_rate - frame_rate) / frame_rate).abs() <= RATE_TOLERANCE {
        return None;
    }
    Some(ValidationIssue::warning(
        "FRAME_RATE_MISMATCH",
        format!(
            "Source keys are spaced at {source_rate:.2} fps but the export samples at {frame_rate:.2} fps; motion will be resampled"
        ),
    ))
}
