//! Error type shared by the pipeline and its backends.

use crate::format::TextureFormat;

/// Failures reported by the resource provider or pass encoder.
///
/// None of these reach the caller of [`crate::MotionBlurPass::render`]: the orchestrator
/// releases every transient texture and degrades to a passthrough instead.
#[derive(Debug, thiserror::Error)]
pub enum MotionBlurError {
    #[error("frame descriptor {width}x{height} has a zero dimension")]
    InvalidFrame { width: u32, height: u32 },

    #[error("motion blur shader programs unavailable: {0}")]
    ProgramsUnavailable(String),

    #[error("failed to allocate {label} ({width}x{height}): {reason}")]
    Allocation {
        label: &'static str,
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("transient texture {0} requested while still alive")]
    RoleAlreadyLive(&'static str),

    #[error("unknown texture handle {0}")]
    UnknownTexture(u32),

    #[error("cannot copy {src_width}x{src_height} {src_format:?} into {dst_width}x{dst_height} {dst_format:?}")]
    FormatMismatch {
        src_width: u32,
        src_height: u32,
        src_format: TextureFormat,
        dst_width: u32,
        dst_height: u32,
        dst_format: TextureFormat,
    },

    #[error("failed to encode {pass}: {reason}")]
    Encode { pass: &'static str, reason: String },
}
