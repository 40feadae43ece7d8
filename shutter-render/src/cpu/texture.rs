//! Host-memory textures with the sampling rules the GPU programs use.

use glam::{Vec2, Vec4};
use image::{Rgba, Rgba32FImage};

use crate::format::{FilterMode, TextureFormat};
use crate::frame::Extent;

/// A 2D texture stored as one `Vec4` per texel, row-major, top row first.
#[derive(Clone, Debug, PartialEq)]
pub struct CpuTexture {
    extent: Extent,
    format: TextureFormat,
    filter: FilterMode,
    texels: Vec<Vec4>,
}

impl CpuTexture {
    /// Zero-filled texture.
    pub fn new(extent: Extent, format: TextureFormat, filter: FilterMode) -> Self {
        Self {
            extent,
            format,
            filter,
            texels: vec![format.quantize(Vec4::ZERO); extent.texel_count()],
        }
    }

    pub fn from_fn(
        extent: Extent,
        format: TextureFormat,
        filter: FilterMode,
        mut f: impl FnMut(u32, u32) -> Vec4,
    ) -> Self {
        let mut texture = Self::new(extent, format, filter);
        for y in 0..extent.height {
            for x in 0..extent.width {
                texture.store(x, y, f(x, y));
            }
        }
        texture
    }

    pub fn filled(extent: Extent, format: TextureFormat, filter: FilterMode, value: Vec4) -> Self {
        Self::from_fn(extent, format, filter, |_, _| value)
    }

    pub fn from_rgba32f(image: &Rgba32FImage, format: TextureFormat, filter: FilterMode) -> Self {
        let extent = Extent::new(image.width(), image.height());
        Self::from_fn(extent, format, filter, |x, y| Vec4::from_array(image.get_pixel(x, y).0))
    }

    pub fn to_rgba32f(&self) -> Rgba32FImage {
        Rgba32FImage::from_fn(self.extent.width, self.extent.height, |x, y| {
            Rgba(self.load(x, y).to_array())
        })
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    pub(crate) fn texels_mut(&mut self) -> &mut [Vec4] {
        &mut self.texels
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.extent.width as f32, self.extent.height as f32)
    }

    pub fn texel_size(&self) -> Vec2 {
        self.size().recip()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.extent.width as usize + x as usize
    }

    pub fn load(&self, x: u32, y: u32) -> Vec4 {
        self.texels[self.index(x, y)]
    }

    /// Load with clamp-to-edge addressing.
    pub fn load_clamped(&self, x: i64, y: i64) -> Vec4 {
        let x = x.clamp(0, self.extent.width as i64 - 1) as u32;
        let y = y.clamp(0, self.extent.height as i64 - 1) as u32;
        self.load(x, y)
    }

    /// Store, rounding to what the format can hold.
    pub fn store(&mut self, x: u32, y: u32, value: Vec4) {
        let i = self.index(x, y);
        self.texels[i] = self.format.quantize(value);
    }

    pub fn sample_point(&self, uv: Vec2) -> Vec4 {
        let p = (uv * self.size()).floor();
        self.load_clamped(p.x as i64, p.y as i64)
    }

    pub fn sample_bilinear(&self, uv: Vec2) -> Vec4 {
        let p = uv * self.size() - Vec2::splat(0.5);
        let p0 = p.floor();
        let f = p - p0;
        let (x0, y0) = (p0.x as i64, p0.y as i64);
        let top = self.load_clamped(x0, y0).lerp(self.load_clamped(x0 + 1, y0), f.x);
        let bottom = self.load_clamped(x0, y0 + 1).lerp(self.load_clamped(x0 + 1, y0 + 1), f.x);
        top.lerp(bottom, f.y)
    }

    /// Sample with the texture's own filter mode.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        match self.filter {
            FilterMode::Point => self.sample_point(uv),
            FilterMode::Bilinear => self.sample_bilinear(uv),
        }
    }
}
