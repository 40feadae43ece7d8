/// Embedded WGSL shader source strings for the motion blur pipeline.
/// These are shared between the GPU backend and the shader validation tests.

pub const FULLSCREEN_TRIANGLE_VERT: &str = include_str!("../shaders/fullscreen_triangle.wgsl");
pub const MOTION_BLUR_SHADER: &str = include_str!("../shaders/motion_blur_tiles.wgsl");

/// Fragment entry points in [`MOTION_BLUR_SHADER`], in pipeline order.
pub const VELOCITY_SETUP_ENTRY: &str = "fs_velocity_setup";
pub const TILE_MAX1_ENTRY: &str = "fs_tile_max1";
pub const TILE_MAX2_ENTRY: &str = "fs_tile_max2";
pub const TILE_MAX_V_ENTRY: &str = "fs_tile_max_v";
pub const NEIGHBOR_MAX_ENTRY: &str = "fs_neighbor_max";
pub const RECONSTRUCTION_ENTRY: &str = "fs_reconstruction";
