//! Texture formats and filtering understood by the pipeline.

use glam::Vec4;

/// Formats a backend may be asked to allocate or import.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    /// Packed 10/10/10/2, the preferred velocity/depth format.
    Rgb10a2Unorm,
    /// Two-channel half float, used for every tile buffer.
    Rg16Float,
    Rgba16Float,
    Rgba32Float,
    R32Float,
}

/// Packed velocity/depth format requested when the backend supports it.
pub const PACKED_VELOCITY_FORMAT: TextureFormat = TextureFormat::Rgb10a2Unorm;
/// Always-supported substitute for [`PACKED_VELOCITY_FORMAT`].
pub const PACKED_VELOCITY_FALLBACK: TextureFormat = TextureFormat::Rgba8Unorm;
/// Format of the tile pyramid and neighbor-max buffers.
pub const TILE_VECTOR_FORMAT: TextureFormat = TextureFormat::Rg16Float;

impl TextureFormat {
    /// Number of meaningful channels.
    pub fn channels(self) -> usize {
        match self {
            TextureFormat::R32Float => 1,
            TextureFormat::Rg16Float => 2,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgb10a2Unorm
            | TextureFormat::Rgba16Float
            | TextureFormat::Rgba32Float => 4,
        }
    }

    pub fn is_unorm(self) -> bool {
        matches!(self, TextureFormat::Rgba8Unorm | TextureFormat::Rgb10a2Unorm)
    }

    /// Value as it reads back after being stored in this format.
    ///
    /// Unorm formats clamp and round to their bit depth; missing channels read as
    /// zero, except alpha which reads as one. Float formats are stored exactly.
    pub fn quantize(self, v: Vec4) -> Vec4 {
        fn unorm(x: f32, max: f32) -> f32 {
            (x.clamp(0.0, 1.0) * max).round() / max
        }
        match self {
            TextureFormat::Rgba8Unorm => Vec4::new(
                unorm(v.x, 255.0),
                unorm(v.y, 255.0),
                unorm(v.z, 255.0),
                unorm(v.w, 255.0),
            ),
            TextureFormat::Rgb10a2Unorm => Vec4::new(
                unorm(v.x, 1023.0),
                unorm(v.y, 1023.0),
                unorm(v.z, 1023.0),
                unorm(v.w, 3.0),
            ),
            TextureFormat::Rg16Float => Vec4::new(v.x, v.y, 0.0, 1.0),
            TextureFormat::R32Float => Vec4::new(v.x, 0.0, 0.0, 1.0),
            TextureFormat::Rgba16Float | TextureFormat::Rgba32Float => v,
        }
    }
}

/// Sampler filtering used when a pass reads a texture at fractional coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel. Every transient buffer uses this.
    #[default]
    Point,
    Bilinear,
}
