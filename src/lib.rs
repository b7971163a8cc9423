//! glTF skeletal animation to `r3d2anmd` (version 5) exporter.
//!
//! The pipeline loads a scene graph, extracts per-joint curves, optionally
//! re-aligns joint local axes, samples the curves at a fixed frame rate and
//! serializes the pose palettes and frame table.

pub mod convert;
pub mod correction;
pub mod error;
pub mod profile;
pub mod scene;

pub use error::ExportError;
