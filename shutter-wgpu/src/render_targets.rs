//! Render target creation, format mapping and the transient texture pool.

use shutter_render::{Extent, FilterMode, TextureDesc, TextureFormat, TexturePool};

/// Usage of every transient target: rendered to, read by later passes, copyable.
pub const TRANSIENT_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

/// wgpu rows in buffer copies must be padded to this many bytes.
const COPY_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

pub fn to_wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgb10a2Unorm => wgpu::TextureFormat::Rgb10a2Unorm,
        TextureFormat::Rg16Float => wgpu::TextureFormat::Rg16Float,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
    }
}

/// Inverse of [`to_wgpu_format`]; `None` for formats the pipeline never uses.
pub fn from_wgpu_format(format: wgpu::TextureFormat) -> Option<TextureFormat> {
    Some(match format {
        wgpu::TextureFormat::Rgba8Unorm => TextureFormat::Rgba8Unorm,
        wgpu::TextureFormat::Rgb10a2Unorm => TextureFormat::Rgb10a2Unorm,
        wgpu::TextureFormat::Rg16Float => TextureFormat::Rg16Float,
        wgpu::TextureFormat::Rgba16Float => TextureFormat::Rgba16Float,
        wgpu::TextureFormat::Rgba32Float => TextureFormat::Rgba32Float,
        wgpu::TextureFormat::R32Float => TextureFormat::R32Float,
        _ => return None,
    })
}

pub fn to_wgpu_filter(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Point => wgpu::FilterMode::Nearest,
        FilterMode::Bilinear => wgpu::FilterMode::Linear,
    }
}

pub fn extent_3d(extent: Extent) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: extent.width,
        height: extent.height,
        depth_or_array_layers: 1,
    }
}

/// Render target (framebuffer equivalent).
pub struct RenderTarget {
    pub color_texture: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub desc: TextureDesc,
}

/// Create a single-mip 2D render target for a transient allocation.
pub fn create_render_target(device: &wgpu::Device, desc: &TextureDesc) -> RenderTarget {
    let color_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(desc.label),
        size: extent_3d(desc.extent),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: to_wgpu_format(desc.format),
        usage: TRANSIENT_USAGE,
        view_formats: &[],
    });
    let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());
    RenderTarget {
        color_texture,
        color_view,
        desc: *desc,
    }
}

/// Released targets kept for reuse, at most one per transient label.
pub type TransientPool = TexturePool<RenderTarget>;

/// 1x1 white texture bound to pass inputs that are unused. Reads as depth 1.0 (far)
/// when a run has no depth buffer.
pub fn create_default_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> (wgpu::Texture, wgpu::TextureView) {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Motion Blur Default Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[255u8; 4],
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Bytes per texel, or `None` for compressed and depth formats.
pub fn bytes_per_texel(format: wgpu::TextureFormat) -> Option<u32> {
    format.block_copy_size(None)
}

fn padded_row_bytes(row_bytes: u32) -> u32 {
    row_bytes.div_ceil(COPY_ALIGNMENT) * COPY_ALIGNMENT
}

/// Create a sampled texture and upload tightly packed texel data into it.
pub fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    extent: Extent,
    format: wgpu::TextureFormat,
    data: &[u8],
) -> Result<wgpu::Texture, String> {
    let texel_bytes = bytes_per_texel(format).ok_or_else(|| format!("{format:?} is not uploadable"))?;
    let row_bytes = extent.width * texel_bytes;
    if data.len() != (row_bytes * extent.height) as usize {
        return Err(format!(
            "{label}: expected {} bytes for {}x{} {format:?}, got {}",
            row_bytes * extent.height,
            extent.width,
            extent.height,
            data.len()
        ));
    }

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent_3d(extent),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: TRANSIENT_USAGE,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(row_bytes),
            rows_per_image: Some(extent.height),
        },
        extent_3d(extent),
    );
    Ok(texture)
}

/// Copy a texture back to host memory, rows tightly packed.
///
/// Blocks until the GPU has finished every previously submitted command.
pub fn read_texture(device: &wgpu::Device, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Result<Vec<u8>, String> {
    let format = texture.format();
    let texel_bytes = bytes_per_texel(format).ok_or_else(|| format!("{format:?} is not readable"))?;
    let (width, height) = (texture.width(), texture.height());
    let row_bytes = width * texel_bytes;
    let padded = padded_row_bytes(row_bytes);

    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Motion Blur Readback"),
        size: (padded * height) as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Motion Blur Readback"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &readback,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        texture.size(),
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = readback.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    receiver
        .recv()
        .map_err(|e| format!("readback callback dropped: {e}"))?
        .map_err(|e| format!("readback map failed: {e}"))?;

    let mapped = slice.get_mapped_range();
    let mut out = Vec::with_capacity((row_bytes * height) as usize);
    for row in mapped.chunks(padded as usize).take(height as usize) {
        out.extend_from_slice(&row[..row_bytes as usize]);
    }
    drop(mapped);
    readback.unmap();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_mapping_round_trips() {
        for format in [
            TextureFormat::Rgba8Unorm,
            TextureFormat::Rgb10a2Unorm,
            TextureFormat::Rg16Float,
            TextureFormat::Rgba16Float,
            TextureFormat::Rgba32Float,
            TextureFormat::R32Float,
        ] {
            assert_eq!(from_wgpu_format(to_wgpu_format(format)), Some(format));
        }
        assert_eq!(from_wgpu_format(wgpu::TextureFormat::Bgra8UnormSrgb), None);
    }

    #[test]
    fn texel_sizes_match_formats() {
        assert_eq!(bytes_per_texel(wgpu::TextureFormat::Rg16Float), Some(4));
        assert_eq!(bytes_per_texel(wgpu::TextureFormat::Rgb10a2Unorm), Some(4));
        assert_eq!(bytes_per_texel(wgpu::TextureFormat::Rgba32Float), Some(16));
    }

    #[test]
    fn rows_pad_to_copy_alignment() {
        assert_eq!(padded_row_bytes(4), 256);
        assert_eq!(padded_row_bytes(256), 256);
        assert_eq!(padded_row_bytes(1920 * 4), 7680);
        assert_eq!(padded_row_bytes(34 * 4), 256);
    }

    #[test]
    fn filters_map_to_sampler_modes() {
        assert_eq!(to_wgpu_filter(FilterMode::Point), wgpu::FilterMode::Nearest);
        assert_eq!(to_wgpu_filter(FilterMode::Bilinear), wgpu::FilterMode::Linear);
    }
}
