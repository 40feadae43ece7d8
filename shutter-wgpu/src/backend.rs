//! WebGPU backend state and the per-encoder pass recorder.

use std::collections::HashMap;

use shutter_gpu_shared::uniforms::MotionBlurUniforms;
use shutter_render::{
    EffectSetup, Extent, FilterMode, MotionBlurError, Pass, PassEncoder, PassKind, TextureDesc, TextureFormat,
    TextureHandle, TextureProvider,
};
use wgpu::util::DeviceExt;

use crate::passes;
use crate::pipeline::{self, MotionBlurPrograms};
use crate::render_targets::{self, RenderTarget, TransientPool};

/// Device, compiled programs and pooled targets shared by every frame.
pub struct WgpuBackend {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    programs: Option<MotionBlurPrograms>,
    // Built on first use per (pass, target format).
    pipelines: HashMap<(PassKind, wgpu::TextureFormat), wgpu::RenderPipeline>,

    point_sampler: wgpu::Sampler,
    linear_sampler: wgpu::Sampler,
    _default_texture: wgpu::Texture,
    default_view: wgpu::TextureView,

    pool: TransientPool,

    // Error state
    pub last_error: Option<String>,
}

fn clamp_sampler(device: &wgpu::Device, label: &str, filter: FilterMode) -> wgpu::Sampler {
    let filter = render_targets::to_wgpu_filter(filter);
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

impl WgpuBackend {
    /// Wrap a device the host already owns.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let point_sampler = clamp_sampler(&device, "Motion Blur Point Sampler", FilterMode::Point);
        let linear_sampler = clamp_sampler(&device, "Motion Blur Linear Sampler", FilterMode::Bilinear);
        let (default_texture, default_view) = render_targets::create_default_texture(&device, &queue);

        Self {
            device,
            queue,
            programs: None,
            pipelines: HashMap::new(),
            point_sampler,
            linear_sampler,
            _default_texture: default_texture,
            default_view,
            pool: TransientPool::default(),
            last_error: None,
        }
    }

    /// Create a device without a surface, for offline rendering and tests.
    pub fn new_headless() -> Result<Self, String> {
        let _ = env_logger::try_init();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or("Failed to find suitable GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Motion Blur Device"),
                required_features: adapter.features() & wgpu::Features::FLOAT32_FILTERABLE,
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .map_err(|e| format!("Failed to create device: {e}"))?;

        log::info!(
            "WebGPU motion blur backend initialized: {} ({})",
            adapter.get_info().name,
            adapter.get_info().backend.to_str()
        );
        Ok(Self::new(device, queue))
    }

    fn ensure_pipeline(&mut self, kind: PassKind, format: wgpu::TextureFormat) -> Result<(), MotionBlurError> {
        if self.pipelines.contains_key(&(kind, format)) {
            return Ok(());
        }
        self.prepare_programs()?;
        let Some(programs) = self.programs.as_ref() else {
            return Err(MotionBlurError::ProgramsUnavailable("programs not compiled".into()));
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = pipeline::create_fullscreen_effect_pipeline(&self.device, programs, kind, format);
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            let message = error.to_string();
            self.last_error = Some(message.clone());
            return Err(MotionBlurError::Encode {
                pass: kind.label(),
                reason: message,
            });
        }

        log::debug!("Created {} pipeline for {format:?}", kind.label());
        self.pipelines.insert((kind, format), pipeline);
        Ok(())
    }

    fn format_features(&self, format: TextureFormat) -> wgpu::TextureFormatFeatures {
        render_targets::to_wgpu_format(format).guaranteed_format_features(self.device.features())
    }

    fn is_filterable(&self, format: TextureFormat) -> bool {
        self.format_features(format)
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
    }

    fn sampler(&self, filter: FilterMode) -> &wgpu::Sampler {
        match filter {
            FilterMode::Point => &self.point_sampler,
            FilterMode::Bilinear => &self.linear_sampler,
        }
    }

    /// Start recording passes into `encoder`. Transients still held when the recorder
    /// drops go back to the pool.
    pub fn recorder<'a>(&'a mut self, encoder: &'a mut wgpu::CommandEncoder) -> Recorder<'a> {
        Recorder {
            backend: self,
            encoder,
            slots: Vec::new(),
        }
    }

    /// Targets kept for reuse by the next frame.
    pub fn pooled_targets(&self) -> usize {
        self.pool.len()
    }

    /// Free every pooled target.
    pub fn trim_pool(&mut self) {
        log::debug!("Dropping {} pooled motion blur targets", self.pool.len());
        self.pool.clear();
    }
}

impl EffectSetup for WgpuBackend {
    /// Whether `format` can be rendered to and read back by a later pass.
    fn supports_format(&self, format: TextureFormat) -> bool {
        self.format_features(format)
            .allowed_usages
            .contains(render_targets::TRANSIENT_USAGE)
    }

    /// Compile the shader modules once. Later calls are free.
    fn prepare_programs(&mut self) -> Result<(), MotionBlurError> {
        if self.programs.is_some() {
            return Ok(());
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let programs = pipeline::create_motion_blur_programs(&self.device);
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            let message = error.to_string();
            self.last_error = Some(message.clone());
            return Err(MotionBlurError::ProgramsUnavailable(message));
        }

        self.programs = Some(programs);
        Ok(())
    }
}

enum Slot<'a> {
    Imported {
        texture: &'a wgpu::Texture,
        view: wgpu::TextureView,
        format: TextureFormat,
        filter: FilterMode,
    },
    Transient(RenderTarget),
}

impl Slot<'_> {
    fn texture(&self) -> &wgpu::Texture {
        match self {
            Slot::Imported { texture, .. } => texture,
            Slot::Transient(target) => &target.color_texture,
        }
    }

    fn view(&self) -> &wgpu::TextureView {
        match self {
            Slot::Imported { view, .. } => view,
            Slot::Transient(target) => &target.color_view,
        }
    }

    fn extent(&self) -> Extent {
        let texture = self.texture();
        Extent::new(texture.width(), texture.height())
    }

    fn format(&self) -> TextureFormat {
        match self {
            Slot::Imported { format, .. } => *format,
            Slot::Transient(target) => target.desc.format,
        }
    }

    fn filter(&self) -> FilterMode {
        match self {
            Slot::Imported { filter, .. } => *filter,
            Slot::Transient(target) => target.desc.filter,
        }
    }
}

fn slot<'s, 'a>(slots: &'s [Option<Slot<'a>>], handle: TextureHandle) -> Result<&'s Slot<'a>, MotionBlurError> {
    slots
        .get(handle.0 as usize)
        .and_then(Option::as_ref)
        .ok_or(MotionBlurError::UnknownTexture(handle.0))
}

/// Texture inputs of a pass, by binding slot.
struct PassInputs {
    source: Option<TextureHandle>,
    aux: Option<TextureHandle>,
    neighbor_max: Option<TextureHandle>,
    color: Option<TextureHandle>,
}

impl PassInputs {
    fn of(pass: &Pass) -> Self {
        let none = Self {
            source: None,
            aux: None,
            neighbor_max: None,
            color: None,
        };
        match *pass {
            Pass::VelocitySetup { motion, depth, .. } => Self {
                source: Some(motion),
                aux: depth,
                ..none
            },
            Pass::TileMax1 { source, .. }
            | Pass::TileMax2 { source, .. }
            | Pass::TileMaxV { source, .. }
            | Pass::NeighborMax { source, .. } => Self {
                source: Some(source),
                ..none
            },
            Pass::Reconstruction {
                color,
                velocity,
                neighbor_max,
                ..
            } => Self {
                aux: Some(velocity),
                neighbor_max: Some(neighbor_max),
                color: Some(color),
                ..none
            },
        }
    }

    fn reads(&self, handle: TextureHandle) -> bool {
        [self.source, self.aux, self.neighbor_max, self.color].contains(&Some(handle))
    }
}

/// Records motion blur passes into one command encoder.
///
/// Handles are local to the recorder: import the frame's color, motion, depth and
/// destination textures, then hand the recorder to [`shutter_render::MotionBlurPass::render`].
/// The pass itself is built once against the [`WgpuBackend`].
pub struct Recorder<'a> {
    backend: &'a mut WgpuBackend,
    encoder: &'a mut wgpu::CommandEncoder,
    slots: Vec<Option<Slot<'a>>>,
}

impl<'a> Recorder<'a> {
    /// Make a host texture addressable by the pipeline. `filter` only matters for
    /// the color source, which reconstruction samples between texels.
    pub fn import(&mut self, texture: &'a wgpu::Texture, filter: FilterMode) -> Result<TextureHandle, MotionBlurError> {
        let format = render_targets::from_wgpu_format(texture.format()).ok_or_else(|| MotionBlurError::Allocation {
            label: "imported",
            width: texture.width(),
            height: texture.height(),
            reason: format!("{:?} is not supported", texture.format()),
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(self.insert(Slot::Imported {
            texture,
            view,
            format,
            filter,
        }))
    }

    fn insert(&mut self, slot: Slot<'a>) -> TextureHandle {
        let handle = TextureHandle(self.slots.len() as u32);
        self.slots.push(Some(slot));
        handle
    }
}

impl TextureProvider for Recorder<'_> {
    fn acquire(&mut self, desc: &TextureDesc) -> Result<TextureHandle, MotionBlurError> {
        if !self.backend.supports_format(desc.format) {
            return Err(MotionBlurError::Allocation {
                label: desc.label,
                width: desc.extent.width,
                height: desc.extent.height,
                reason: format!("{:?} is not renderable on this device", desc.format),
            });
        }
        let target = match self.backend.pool.take(desc) {
            Some(target) => target,
            None => {
                log::trace!("Allocating {} ({}x{})", desc.label, desc.extent.width, desc.extent.height);
                render_targets::create_render_target(&self.backend.device, desc)
            }
        };
        Ok(self.insert(Slot::Transient(target)))
    }

    fn release(&mut self, handle: TextureHandle) {
        match self.slots.get_mut(handle.0 as usize).and_then(Option::take) {
            Some(Slot::Transient(target)) => self.backend.pool.give_back(target.desc, target),
            Some(imported) => {
                log::error!("Refusing to release imported texture {}", handle.0);
                self.slots[handle.0 as usize] = Some(imported);
            }
            None => log::error!("Release of unknown texture handle {}", handle.0),
        }
    }

    fn describe(&self, handle: TextureHandle) -> Result<(Extent, TextureFormat), MotionBlurError> {
        let slot = slot(&self.slots, handle)?;
        Ok((slot.extent(), slot.format()))
    }
}

impl PassEncoder for Recorder<'_> {
    fn encode_pass(&mut self, pass: &Pass, uniforms: &MotionBlurUniforms) -> Result<(), MotionBlurError> {
        let kind = pass.kind();
        let encode_error = |reason: String| MotionBlurError::Encode {
            pass: kind.label(),
            reason,
        };

        let inputs = PassInputs::of(pass);
        if inputs.reads(pass.target()) {
            return Err(encode_error("pass reads its own render target".into()));
        }
        let target_format = render_targets::to_wgpu_format(slot(&self.slots, pass.target())?.format());
        self.backend.ensure_pipeline(kind, target_format)?;

        let backend = &*self.backend;
        let slots = &self.slots;
        let pipeline = backend
            .pipelines
            .get(&(kind, target_format))
            .ok_or_else(|| encode_error("pipeline missing".into()))?;
        let programs = backend
            .programs
            .as_ref()
            .ok_or_else(|| MotionBlurError::ProgramsUnavailable("programs not compiled".into()))?;

        let view = |handle: Option<TextureHandle>| match handle {
            Some(handle) => slot(slots, handle).map(Slot::view),
            None => Ok(&backend.default_view),
        };
        let (sampler, color_view) = match inputs.color {
            Some(handle) => {
                let color = slot(slots, handle)?;
                if !backend.is_filterable(color.format()) {
                    return Err(encode_error(format!("{:?} color cannot be filtered", color.format())));
                }
                (backend.sampler(color.filter()), color.view())
            }
            None => (&backend.point_sampler, &backend.default_view),
        };

        let params_buffer = backend.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Motion Blur Params"),
            contents: bytemuck::bytes_of(uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = backend.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kind.label()),
            layout: &programs.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: params_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(view(inputs.source)?) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(view(inputs.aux)?) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::TextureView(view(inputs.neighbor_max)?) },
                wgpu::BindGroupEntry { binding: 4, resource: wgpu::BindingResource::TextureView(color_view) },
                wgpu::BindGroupEntry { binding: 5, resource: wgpu::BindingResource::Sampler(sampler) },
            ],
        });

        let target = slot(slots, pass.target())?;
        passes::motion_blur::render_fullscreen_pass(self.encoder, target.view(), pipeline, &bind_group, kind.label());
        Ok(())
    }

    fn copy_texture(&mut self, source: TextureHandle, destination: TextureHandle) -> Result<(), MotionBlurError> {
        let src = slot(&self.slots, source)?;
        let dst = slot(&self.slots, destination)?;
        if src.extent() != dst.extent() || src.format() != dst.format() {
            return Err(MotionBlurError::FormatMismatch {
                src_width: src.extent().width,
                src_height: src.extent().height,
                src_format: src.format(),
                dst_width: dst.extent().width,
                dst_height: dst.extent().height,
                dst_format: dst.format(),
            });
        }
        if source == destination {
            return Ok(());
        }

        self.encoder.copy_texture_to_texture(
            wgpu::ImageCopyTexture {
                texture: src.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyTexture {
                texture: dst.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            render_targets::extent_3d(src.extent()),
        );
        Ok(())
    }
}

impl Drop for Recorder<'_> {
    fn drop(&mut self) {
        for slot in self.slots.drain(..).flatten() {
            if let Slot::Transient(target) = slot {
                log::warn!("{} still held when recording ended", target.desc.label);
                self.backend.pool.give_back(target.desc, target);
            }
        }
    }
}
