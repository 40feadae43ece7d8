use bytemuck::{Pod, Zeroable};

/// Parameter block shared by every motion blur pass; matches GPU bind group 0, binding 0.
///
/// One value is built per pipeline run and copied into a fresh uniform buffer for each
/// pass, so passes recorded into the same encoder never observe each other's writes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MotionBlurUniforms {
    /// Shutter angle / 360.
    pub velocity_scale: f32,
    /// Maximum blur radius in pixels (velocity pack range).
    pub max_blur_radius: f32,
    pub rcp_max_blur_radius: f32,
    /// Side length, in 1/8-resolution texels, of the variable TileMax footprint.
    pub tile_max_loop: i32,
    /// Offset of the first TileMaxV sample, in source texels.
    pub tile_max_offset: [f32; 2],
    /// Reconstruction loop count (half the configured sample count).
    pub loop_count: i32,
    pub _pad: f32,
}
