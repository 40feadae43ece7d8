//! Shader modules, bind group layout and render pipelines for the motion blur passes.

use shutter_gpu_shared::shaders;
use shutter_render::PassKind;

/// Shared fullscreen vertex state (vertex-index-based full-screen triangle).
fn fullscreen_vertex_state(module: &wgpu::ShaderModule) -> wgpu::VertexState<'_> {
    wgpu::VertexState {
        module,
        entry_point: Some("vs_main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        buffers: &[],
    }
}

/// Fragment entry point for each pass.
pub fn entry_point(kind: PassKind) -> &'static str {
    match kind {
        PassKind::VelocitySetup => shaders::VELOCITY_SETUP_ENTRY,
        PassKind::TileMax1 => shaders::TILE_MAX1_ENTRY,
        PassKind::TileMax2 => shaders::TILE_MAX2_ENTRY,
        PassKind::TileMaxV => shaders::TILE_MAX_V_ENTRY,
        PassKind::NeighborMax => shaders::NEIGHBOR_MAX_ENTRY,
        PassKind::Reconstruction => shaders::RECONSTRUCTION_ENTRY,
    }
}

fn unfilterable_texture(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Motion blur BGL: uniform + source + aux + neighbor max + color + color sampler.
/// Every pass binds the same layout; unused slots get the default texture.
pub fn create_motion_blur_bgl(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Motion Blur BGL"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            unfilterable_texture(1),
            unfilterable_texture(2),
            unfilterable_texture(3),
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 5,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// Compiled shader modules and the layout every pass pipeline shares.
pub struct MotionBlurPrograms {
    pub vert_module: wgpu::ShaderModule,
    pub frag_module: wgpu::ShaderModule,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
}

pub fn create_motion_blur_programs(device: &wgpu::Device) -> MotionBlurPrograms {
    let vert_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Fullscreen Vert"),
        source: wgpu::ShaderSource::Wgsl(shaders::FULLSCREEN_TRIANGLE_VERT.into()),
    });

    let frag_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Motion Blur"),
        source: wgpu::ShaderSource::Wgsl(shaders::MOTION_BLUR_SHADER.into()),
    });

    let bind_group_layout = create_motion_blur_bgl(device);
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Motion Blur Layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    MotionBlurPrograms {
        vert_module,
        frag_module,
        bind_group_layout,
        pipeline_layout,
    }
}

/// Create a fullscreen effect pipeline for one pass and output format.
pub fn create_fullscreen_effect_pipeline(
    device: &wgpu::Device,
    programs: &MotionBlurPrograms,
    kind: PassKind,
    output_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(kind.label()),
        layout: Some(&programs.pipeline_layout),
        vertex: fullscreen_vertex_state(&programs.vert_module),
        fragment: Some(wgpu::FragmentState {
            module: &programs.frag_module,
            entry_point: Some(entry_point(kind)),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: output_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
