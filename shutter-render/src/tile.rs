//! Tile-size resolution and the resolutions of every pyramid level.

use glam::Vec2;
use shutter_gpu_shared::uniforms::MotionBlurUniforms;

use crate::frame::{Extent, FrameDescriptor};
use crate::params::EffectParameters;

/// Maximum blur radius as a percentage of the frame height.
pub const MAX_BLUR_RADIUS_PERCENT: f32 = 5.0;
/// Tiles are multiples of this many pixels; also the reduction of the fixed halvings.
pub const TILE_GRANULARITY: u32 = 8;

/// Blur radius budget in pixels for a frame height, floored at one pixel.
pub fn max_blur_pixels(height: u32) -> u32 {
    let pixels = (MAX_BLUR_RADIUS_PERCENT * height as f32 / 100.0) as u32;
    pixels.max(1)
}

/// Smallest multiple of [`TILE_GRANULARITY`] that covers `max_blur_pixels`.
pub fn tile_size_for(max_blur_pixels: u32) -> u32 {
    max_blur_pixels.max(1).div_ceil(TILE_GRANULARITY) * TILE_GRANULARITY
}

/// Resolved tile granularity and pyramid resolutions for one frame size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileLayout {
    pub max_blur_pixels: u32,
    pub tile_size: u32,
    /// Full, 1/2, 1/4 and 1/8 resolution.
    pub full: Extent,
    pub half: Extent,
    pub quarter: Extent,
    pub eighth: Extent,
    /// Resolution of the TileMax and NeighborMax buffers.
    pub tiles: Extent,
}

impl TileLayout {
    pub fn resolve(frame: &FrameDescriptor) -> Self {
        let max_blur_pixels = max_blur_pixels(frame.height);
        let tile_size = tile_size_for(max_blur_pixels);
        let full = frame.extent();
        Self {
            max_blur_pixels,
            tile_size,
            full,
            half: full.div(2),
            quarter: full.div(4),
            eighth: full.div(8),
            tiles: full.div(tile_size),
        }
    }

    /// Iterations per axis of the variable reduction from 1/8 resolution to tiles.
    pub fn tile_max_loop(&self) -> u32 {
        self.tile_size / TILE_GRANULARITY
    }

    /// Offset, in 1/8-resolution texels, that centers the variable footprint.
    pub fn tile_max_offset(&self) -> Vec2 {
        Vec2::splat((self.tile_size as f32 / TILE_GRANULARITY as f32 - 1.0) * -0.5)
    }

    /// Parameter block for every pass of a run with `params`.
    pub fn uniforms(&self, params: &EffectParameters) -> MotionBlurUniforms {
        let radius = self.max_blur_pixels as f32;
        MotionBlurUniforms {
            velocity_scale: params.velocity_scale(),
            max_blur_radius: radius,
            rcp_max_blur_radius: 1.0 / radius,
            tile_max_loop: self.tile_max_loop() as i32,
            tile_max_offset: self.tile_max_offset().to_array(),
            loop_count: params.loop_count() as i32,
            _pad: 0.0,
        }
    }
}
