//! The closed set of passes and the contract for recording them.

use shutter_gpu_shared::uniforms::MotionBlurUniforms;

use crate::error::MotionBlurError;
use crate::format::TextureFormat;
use crate::texture::{TextureHandle, TextureProvider};

/// Program selector for each pass, in pipeline order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKind {
    VelocitySetup,
    TileMax1,
    TileMax2,
    TileMaxV,
    NeighborMax,
    Reconstruction,
}

impl PassKind {
    pub fn label(self) -> &'static str {
        match self {
            PassKind::VelocitySetup => "Motion Blur Velocity Setup",
            PassKind::TileMax1 => "Motion Blur TileMax1",
            PassKind::TileMax2 => "Motion Blur TileMax2",
            PassKind::TileMaxV => "Motion Blur TileMaxV",
            PassKind::NeighborMax => "Motion Blur NeighborMax",
            PassKind::Reconstruction => "Motion Blur Reconstruction",
        }
    }
}

/// One fullscreen pass with its texture bindings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pass {
    /// Scale raw motion vectors by the shutter and pack them with depth.
    VelocitySetup {
        motion: TextureHandle,
        depth: Option<TextureHandle>,
        target: TextureHandle,
    },
    /// First halving; unpacks the velocity buffer.
    TileMax1 {
        source: TextureHandle,
        target: TextureHandle,
    },
    /// Halving of an already unpacked tile buffer.
    TileMax2 {
        source: TextureHandle,
        target: TextureHandle,
    },
    /// Variable reduction from 1/8 resolution to the tile size.
    TileMaxV {
        source: TextureHandle,
        target: TextureHandle,
    },
    NeighborMax {
        source: TextureHandle,
        target: TextureHandle,
    },
    Reconstruction {
        color: TextureHandle,
        velocity: TextureHandle,
        neighbor_max: TextureHandle,
        target: TextureHandle,
    },
}

impl Pass {
    pub fn kind(&self) -> PassKind {
        match self {
            Pass::VelocitySetup { .. } => PassKind::VelocitySetup,
            Pass::TileMax1 { .. } => PassKind::TileMax1,
            Pass::TileMax2 { .. } => PassKind::TileMax2,
            Pass::TileMaxV { .. } => PassKind::TileMaxV,
            Pass::NeighborMax { .. } => PassKind::NeighborMax,
            Pass::Reconstruction { .. } => PassKind::Reconstruction,
        }
    }

    pub fn target(&self) -> TextureHandle {
        match *self {
            Pass::VelocitySetup { target, .. }
            | Pass::TileMax1 { target, .. }
            | Pass::TileMax2 { target, .. }
            | Pass::TileMaxV { target, .. }
            | Pass::NeighborMax { target, .. }
            | Pass::Reconstruction { target, .. } => target,
        }
    }
}

/// Queries answered by the device itself, made once when the effect is built.
///
/// Kept apart from [`PassEncoder`] so a host can set the effect up without opening a
/// frame's recorder.
pub trait EffectSetup {
    /// Whether textures of `format` can be allocated and rendered to.
    fn supports_format(&self, format: TextureFormat) -> bool;

    /// Compile or look up the shader programs.
    fn prepare_programs(&mut self) -> Result<(), MotionBlurError>;
}

/// Records passes and copies. Work may execute later; recording order is execution order.
pub trait PassEncoder {
    fn encode_pass(&mut self, pass: &Pass, uniforms: &MotionBlurUniforms) -> Result<(), MotionBlurError>;

    /// Copy a whole texture into another of identical size and format.
    fn copy_texture(&mut self, source: TextureHandle, destination: TextureHandle) -> Result<(), MotionBlurError>;
}

/// Everything the pipeline needs from a rendering backend.
pub trait MotionBlurBackend: TextureProvider + PassEncoder {}

impl<T: TextureProvider + PassEncoder + ?Sized> MotionBlurBackend for T {}
