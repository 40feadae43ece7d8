//! Tile-based motion blur.
//!
//! Per-pixel motion vectors are packed with depth, reduced through a tile pyramid to one
//! dominant velocity per tile, spread to each tile's neighbors, and finally used to
//! gather color samples along the dominant motion.
//!
//! The pipeline is backend-agnostic: [`MotionBlurPass::render`] drives any
//! [`MotionBlurBackend`]. [`cpu::CpuBackend`] runs every pass on the host; the GPU
//! backend lives in the `shutter-wgpu` crate.

pub mod cpu;
pub mod error;
pub mod format;
pub mod frame;
pub mod motion_blur;
pub mod params;
pub mod pass;
pub mod settings;
pub mod texture;
pub mod tile;

pub use error::MotionBlurError;
pub use format::{FilterMode, TextureFormat};
pub use frame::{CameraKind, Extent, FrameDescriptor};
pub use motion_blur::{FrameTargets, MotionBlurPass, PassthroughReason, RenderOutcome, RunReport};
pub use params::EffectParameters;
pub use pass::{EffectSetup, MotionBlurBackend, Pass, PassEncoder, PassKind};
pub use settings::MotionBlurSettings;
pub use texture::{TextureDesc, TextureHandle, TexturePool, TextureProvider, TextureRole, TransientScope};
pub use tile::TileLayout;
pub use shutter_gpu_shared::uniforms::MotionBlurUniforms;
