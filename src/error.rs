use thiserror::Error;

/// Fatal conditions that abort an export before any output is committed.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("{palette} palette exceeds the maximum of {max} entries")]
    PaletteOverflow { palette: &'static str, max: usize },

    #[error("{section} section offset {offset} does not fit in 32 bits")]
    OffsetOverflow { section: &'static str, offset: u64 },

    #[error("resource size {size} does not fit in 32 bits")]
    ResourceSizeOverflow { size: u64 },

    #[error("{field} count {count} does not fit in 32 bits")]
    CountOverflow { field: &'static str, count: usize },

    #[error("animation has no joints to export")]
    NoJoints,

    #[error("frame rate must be a positive finite number, got {0}")]
    InvalidFrameRate(f32),

    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
}
