//! GPU-facing definitions shared by the motion blur backends.

pub mod shaders;
pub mod uniforms;
