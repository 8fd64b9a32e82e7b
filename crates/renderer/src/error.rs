use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage a compile diagnostic belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// Setup failures surfaced by the renderer library.
///
/// Anything in here aborts construction of the object being built; per-frame
/// problems are reported through [`crate::FrameOutcome`] instead.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no compatible GPU adapter: {0}")]
    NoAdapter(String),
    #[error("failed to create GPU device: {0}")]
    Device(String),
    #[error("shader '{0}' is not in the shader library")]
    MissingShader(String),
    #[error("{stage} stage of program '{label}' failed to compile:\n{log}")]
    Compile {
        label: String,
        stage: StageKind,
        log: String,
    },
    #[error("program '{label}' failed to link:\n{log}")]
    Link { label: String, log: String },
    #[error("offscreen target '{label}' at {width}x{height} is incomplete: {reason}")]
    IncompleteTarget {
        label: String,
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("image {label} at {width}x{height} cannot be uploaded: {reason}")]
    InvalidImage {
        label: String,
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("LUT image is {width}x{height}; expected 512x512")]
    InvalidLut { width: u32, height: u32 },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("GPU readback failed: {0}")]
    Readback(String),
    #[error("renderer used before on_init")]
    NotInitialized,
}

impl RenderError {
    /// True for errors that mean no GPU is usable at all, so callers may fall
    /// back to the CPU reference path.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RenderError::NoAdapter(_) | RenderError::Device(_))
    }
}
