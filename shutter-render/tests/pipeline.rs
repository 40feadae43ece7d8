use std::collections::HashMap;

use glam::Vec4;
use shutter_render::cpu::{BackendEvent, CpuBackend, CpuTexture};
use shutter_render::{
    CameraKind, EffectParameters, EffectSetup, Extent, FilterMode, FrameDescriptor, FrameTargets, MotionBlurError,
    MotionBlurPass, MotionBlurSettings, MotionBlurUniforms, Pass, PassEncoder, PassKind, PassthroughReason,
    RenderOutcome, TextureDesc, TextureFormat, TextureHandle, TextureProvider,
};

const COLOR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const FULL_PIPELINE: [PassKind; 7] = [
    PassKind::VelocitySetup,
    PassKind::TileMax1,
    PassKind::TileMax2,
    PassKind::TileMax2,
    PassKind::TileMaxV,
    PassKind::NeighborMax,
    PassKind::Reconstruction,
];

// 128x160: 8px max blur, 8px tiles.
const EXTENT: Extent = Extent::new(128, 160);

fn stripes(extent: Extent) -> CpuTexture {
    CpuTexture::from_fn(extent, COLOR_FORMAT, FilterMode::Bilinear, |x, _| {
        if x % 2 == 0 {
            Vec4::new(1.0, 0.5, 0.25, 1.0)
        } else {
            Vec4::new(0.0, 0.0, 0.0, 1.0)
        }
    })
}

fn motion(extent: Extent, f: impl Fn(u32, u32) -> [f32; 2]) -> CpuTexture {
    CpuTexture::from_fn(extent, TextureFormat::Rg16Float, FilterMode::Point, |x, y| {
        let [u, v] = f(x, y);
        Vec4::new(u, v, 0.0, 0.0)
    })
}

struct Scene {
    backend: CpuBackend,
    pass: MotionBlurPass,
    frame: FrameDescriptor,
    source: TextureHandle,
    targets: FrameTargets,
}

impl Scene {
    fn in_place(mut backend: CpuBackend, color: CpuTexture, motion: CpuTexture) -> Self {
        let frame = FrameDescriptor::new(color.extent().width, color.extent().height, color.format());
        let source = backend.import(color);
        let motion = backend.import(motion);
        let pass = MotionBlurPass::new(&mut backend);
        Self {
            backend,
            pass,
            frame,
            source,
            targets: FrameTargets::in_place(source, motion),
        }
    }

    fn separate(mut backend: CpuBackend, color: CpuTexture, motion: CpuTexture) -> Self {
        let frame = FrameDescriptor::new(color.extent().width, color.extent().height, color.format());
        let destination = backend.import(CpuTexture::new(color.extent(), color.format(), FilterMode::Point));
        let source = backend.import(color);
        let motion = backend.import(motion);
        let pass = MotionBlurPass::new(&mut backend);
        Self {
            backend,
            pass,
            frame,
            source,
            targets: FrameTargets::separate(source, destination, motion),
        }
    }

    fn render(&mut self, camera: CameraKind, params: &EffectParameters) -> RenderOutcome {
        self.pass.render(&mut self.backend, &self.frame, camera, params, &self.targets)
    }

    fn output(&self) -> &CpuTexture {
        self.backend.texture(self.targets.destination).unwrap()
    }

    fn source(&self) -> &CpuTexture {
        self.backend.texture(self.source).unwrap()
    }

    fn acquired(&self) -> Vec<(&'static str, Extent, TextureFormat)> {
        self.backend
            .events()
            .iter()
            .filter_map(|e| match e {
                BackendEvent::Acquire {
                    label, extent, format, ..
                } => Some((*label, *extent, *format)),
                _ => None,
            })
            .collect()
    }
}

fn full_shutter() -> EffectParameters {
    EffectParameters::new(360.0, 8)
}

#[test]
fn horizontal_motion_smears_stripes() {
    init_logger();
    let mut scene = Scene::in_place(CpuBackend::new(), stripes(EXTENT), motion(EXTENT, |_, _| [0.25, 0.0]));
    let original = stripes(EXTENT);

    let outcome = scene.render(CameraKind::Game, &full_shutter());
    match outcome {
        RenderOutcome::Blurred(report) => {
            assert_eq!(report.passes, FULL_PIPELINE);
            assert_eq!(report.layout.max_blur_pixels, 8);
            assert_eq!(report.layout.tile_size, 8);
        }
        other => panic!("expected blur, got {other:?}"),
    }

    let out = scene.output();
    let changed = out
        .texels()
        .iter()
        .zip(original.texels())
        .filter(|(a, b)| (**a - **b).abs().max_element() > 0.05)
        .count();
    assert!(changed > out.texels().len() / 2, "only {changed} texels changed");
    for texel in out.texels() {
        assert!(texel.min_element() >= 0.0 && texel.max_element() <= 1.0 + 1e-4);
        assert_eq!(texel.w, 1.0);
    }
}

#[test]
fn static_tiles_beyond_the_neighborhood_are_untouched() {
    init_logger();
    let moving = |x: u32, _: u32| if x < 64 { [0.25, 0.0] } else { [0.0, 0.0] };
    let mut scene = Scene::separate(CpuBackend::new(), stripes(EXTENT), motion(EXTENT, moving));

    assert!(scene.render(CameraKind::Game, &full_shutter()).is_blurred());

    let out = scene.output();
    let src = scene.source();
    for y in 0..EXTENT.height {
        for x in 80..EXTENT.width {
            assert_eq!(out.load(x, y), src.load(x, y), "texel ({x}, {y})");
        }
    }
    assert_ne!(out.load(32, 80), src.load(32, 80));
}

#[test]
fn zero_motion_reproduces_the_source() {
    init_logger();
    let mut scene = Scene::in_place(CpuBackend::new(), stripes(EXTENT), motion(EXTENT, |_, _| [0.0, 0.0]));

    assert!(scene.render(CameraKind::Game, &full_shutter()).is_blurred());
    assert_eq!(scene.output().texels(), stripes(EXTENT).texels());
}

#[test]
fn runs_are_deterministic() {
    init_logger();
    let swirl = |x: u32, y: u32| [(x as f32 / 128.0 - 0.5) * 0.3, (y as f32 / 160.0 - 0.5) * -0.2];
    let mut first = Scene::separate(CpuBackend::new(), stripes(EXTENT), motion(EXTENT, swirl));
    let mut second = Scene::separate(CpuBackend::new(), stripes(EXTENT), motion(EXTENT, swirl));

    first.render(CameraKind::Game, &full_shutter());
    second.render(CameraKind::Game, &full_shutter());

    let a = first.output().texels();
    let b = second.output().texels();
    assert!(a.iter().zip(b).all(|(a, b)| a.to_array().map(f32::to_bits) == b.to_array().map(f32::to_bits)));
}

#[test]
fn in_place_and_separate_targets_agree() {
    init_logger();
    let drift = |_: u32, y: u32| [0.0, if y < 80 { 0.1 } else { -0.1 }];
    let mut in_place = Scene::in_place(CpuBackend::new(), stripes(EXTENT), motion(EXTENT, drift));
    let mut separate = Scene::separate(CpuBackend::new(), stripes(EXTENT), motion(EXTENT, drift));

    in_place.render(CameraKind::Game, &full_shutter());
    separate.render(CameraKind::Game, &full_shutter());

    assert_eq!(in_place.output().texels(), separate.output().texels());
    // The separate source is never written.
    assert_eq!(separate.source().texels(), stripes(EXTENT).texels());

    let temp: Vec<_> = in_place
        .acquired()
        .into_iter()
        .filter(|(label, ..)| *label == "_TempColorBuffer")
        .collect();
    assert_eq!(temp, vec![("_TempColorBuffer", EXTENT, COLOR_FORMAT)]);
    assert!(separate.acquired().iter().all(|(label, ..)| *label != "_TempColorBuffer"));
}

#[test]
fn transients_are_released_exactly_once() {
    init_logger();
    let mut scene = Scene::in_place(CpuBackend::new(), stripes(EXTENT), motion(EXTENT, |_, _| [0.1, 0.1]));

    for _ in 0..3 {
        scene.backend.clear_events();
        assert!(scene.render(CameraKind::Game, &full_shutter()).is_blurred());

        let mut live: HashMap<TextureHandle, &str> = HashMap::new();
        let mut peak = 0;
        for event in scene.backend.events() {
            match event {
                BackendEvent::Acquire { handle, label, .. } => {
                    assert!(live.insert(*handle, *label).is_none());
                    peak = peak.max(live.len());
                }
                BackendEvent::Release { handle, .. } => {
                    assert!(live.remove(handle).is_some(), "double release of {handle:?}");
                }
                _ => {}
            }
        }
        assert!(live.is_empty(), "leaked {live:?}");
        assert!(peak <= 4, "peak of {peak} live transients");
        assert_eq!(scene.backend.live_transients(), 0);
    }
}

#[test]
fn pyramid_buffers_are_freed_once_consumed() {
    init_logger();
    let mut scene = Scene::separate(CpuBackend::new(), stripes(EXTENT), motion(EXTENT, |_, _| [0.1, 0.0]));
    scene.render(CameraKind::Game, &full_shutter());

    let order: Vec<String> = scene
        .backend
        .events()
        .iter()
        .filter_map(|e| match e {
            BackendEvent::Acquire { label, .. } => Some(format!("+{label}")),
            BackendEvent::Release { label, .. } => Some(format!("-{label}")),
            _ => None,
        })
        .collect();
    assert_eq!(
        order,
        [
            "+_VelocityTex",
            "+_Tile2RT",
            "+_Tile4RT",
            "-_Tile2RT",
            "+_Tile8RT",
            "-_Tile4RT",
            "+_TileVRT",
            "-_Tile8RT",
            "+_NeighborMaxTex",
            "-_TileVRT",
            "-_VelocityTex",
            "-_NeighborMaxTex",
        ]
    );
}

#[test]
fn disabled_effect_is_a_pixel_exact_copy() {
    init_logger();
    let cases = [
        EffectParameters::new(0.0, 8),
        EffectParameters::default(),
        MotionBlurSettings::default().parameters(),
        EffectParameters {
            enabled: false,
            ..full_shutter()
        },
    ];
    for params in cases {
        let mut scene = Scene::separate(CpuBackend::new(), stripes(EXTENT), motion(EXTENT, |_, _| [0.25, 0.25]));
        let outcome = scene.render(CameraKind::Game, &params);

        assert_eq!(outcome, RenderOutcome::Passthrough(PassthroughReason::Disabled));
        assert_eq!(scene.output().texels(), scene.source().texels());
        assert!(scene.acquired().is_empty());
        assert!(scene.backend.passes().is_empty());
    }
}

#[test]
fn scene_view_and_preview_cameras_are_skipped() {
    init_logger();
    for camera in [CameraKind::SceneView, CameraKind::Preview] {
        let mut scene = Scene::in_place(CpuBackend::new(), stripes(EXTENT), motion(EXTENT, |_, _| [0.25, 0.0]));
        let outcome = scene.render(camera, &full_shutter());

        assert_eq!(outcome, RenderOutcome::Passthrough(PassthroughReason::UnsupportedCamera));
        assert_eq!(scene.output().texels(), stripes(EXTENT).texels());
        assert!(scene.backend.events().is_empty());
    }
}

#[test]
fn missing_programs_pass_through() {
    init_logger();
    let mut scene = Scene::separate(
        CpuBackend::new().without_programs(),
        stripes(EXTENT),
        motion(EXTENT, |_, _| [0.25, 0.0]),
    );
    assert!(!scene.pass.is_ready());
    for _ in 0..3 {
        let outcome = scene.render(CameraKind::Game, &full_shutter());
        assert_eq!(outcome, RenderOutcome::Passthrough(PassthroughReason::ProgramsUnavailable));
    }

    assert_eq!(scene.output().texels(), scene.source().texels());
    assert!(scene.acquired().is_empty());
    assert_eq!(scene.backend.program_requests(), 1);
}

#[test]
fn resizing_keeps_pooled_storage_bounded() {
    init_logger();
    let mut backend = CpuBackend::new();
    let pass = MotionBlurPass::new(&mut backend);

    for side in [16, 24, 32, 40, 24] {
        let extent = Extent::new(side, side);
        let color = backend.import(stripes(extent));
        let vectors = backend.import(motion(extent, |_, _| [0.25, 0.0]));
        let frame = FrameDescriptor::new(side, side, COLOR_FORMAT);

        pass.render(
            &mut backend,
            &frame,
            CameraKind::Game,
            &full_shutter(),
            &FrameTargets::in_place(color, vectors),
        );

        assert_eq!(backend.live_transients(), 0);
        assert_eq!(backend.pooled_storage(), 7, "after a {side}x{side} frame");
    }
}

#[test]
fn zero_sized_frame_passes_through() {
    init_logger();
    let mut scene = Scene::in_place(CpuBackend::new(), stripes(EXTENT), motion(EXTENT, |_, _| [0.25, 0.0]));
    scene.frame = FrameDescriptor::new(0, EXTENT.height, COLOR_FORMAT);

    let outcome = scene.render(CameraKind::Game, &full_shutter());
    assert_eq!(outcome, RenderOutcome::Passthrough(PassthroughReason::InvalidFrame));
    assert!(scene.acquired().is_empty());
}

#[test]
fn packed_velocity_falls_back_to_8bit() {
    init_logger();
    let mut scene = Scene::in_place(
        CpuBackend::new().without_format(TextureFormat::Rgb10a2Unorm),
        stripes(EXTENT),
        motion(EXTENT, |_, _| [0.25, 0.0]),
    );
    assert_eq!(scene.pass.packed_format(), TextureFormat::Rgba8Unorm);

    assert!(scene.render(CameraKind::Game, &full_shutter()).is_blurred());
    let velocity = scene
        .acquired()
        .into_iter()
        .find(|(label, ..)| *label == "_VelocityTex")
        .unwrap();
    assert_eq!(velocity.2, TextureFormat::Rgba8Unorm);
}

#[test]
fn allocation_failure_releases_everything_and_passes_through() {
    init_logger();
    for failing in ["_VelocityTex", "_Tile2RT", "_Tile8RT", "_NeighborMaxTex"] {
        let mut scene = Scene::separate(
            CpuBackend::new().failing_allocation(failing),
            stripes(EXTENT),
            motion(EXTENT, |_, _| [0.25, 0.0]),
        );
        let outcome = scene.render(CameraKind::Game, &full_shutter());

        assert_eq!(outcome, RenderOutcome::Passthrough(PassthroughReason::ResourceFailure));
        assert_eq!(scene.backend.live_transients(), 0, "{failing} leaked transients");
        assert_eq!(scene.output().texels(), scene.source().texels());
        assert!(!scene.backend.passes().contains(&PassKind::Reconstruction));
    }
}

#[test]
fn in_place_allocation_failure_leaves_color_untouched() {
    init_logger();
    let mut scene = Scene::in_place(
        CpuBackend::new().failing_allocation("_NeighborMaxTex"),
        stripes(EXTENT),
        motion(EXTENT, |_, _| [0.25, 0.0]),
    );
    let outcome = scene.render(CameraKind::Game, &full_shutter());

    assert_eq!(outcome, RenderOutcome::Passthrough(PassthroughReason::ResourceFailure));
    assert_eq!(scene.output().texels(), stripes(EXTENT).texels());
    assert_eq!(scene.backend.live_transients(), 0);
}

#[test]
fn depth_buffer_is_optional() {
    init_logger();
    let mut scene = Scene::separate(CpuBackend::new(), stripes(EXTENT), motion(EXTENT, |_, _| [0.2, 0.0]));
    let depth = scene.backend.import(CpuTexture::filled(
        EXTENT,
        TextureFormat::R32Float,
        FilterMode::Point,
        Vec4::splat(0.5),
    ));
    scene.targets = scene.targets.with_depth(depth);

    assert!(scene.render(CameraKind::Game, &full_shutter()).is_blurred());
}

/// Records requests without shading, for frame sizes too large to run on the host.
#[derive(Default)]
struct Recorder {
    textures: Vec<(Extent, TextureFormat)>,
    acquired: Vec<TextureDesc>,
    released: Vec<TextureHandle>,
    passes: Vec<PassKind>,
}

impl Recorder {
    fn import(&mut self, extent: Extent, format: TextureFormat) -> TextureHandle {
        self.textures.push((extent, format));
        TextureHandle(self.textures.len() as u32 - 1)
    }
}

impl EffectSetup for Recorder {
    fn supports_format(&self, _format: TextureFormat) -> bool {
        true
    }

    fn prepare_programs(&mut self) -> Result<(), MotionBlurError> {
        Ok(())
    }
}

impl TextureProvider for Recorder {
    fn acquire(&mut self, desc: &TextureDesc) -> Result<TextureHandle, MotionBlurError> {
        self.acquired.push(*desc);
        Ok(self.import(desc.extent, desc.format))
    }

    fn release(&mut self, handle: TextureHandle) {
        self.released.push(handle);
    }

    fn describe(&self, handle: TextureHandle) -> Result<(Extent, TextureFormat), MotionBlurError> {
        self.textures
            .get(handle.0 as usize)
            .copied()
            .ok_or(MotionBlurError::UnknownTexture(handle.0))
    }
}

impl PassEncoder for Recorder {
    fn encode_pass(&mut self, pass: &Pass, uniforms: &MotionBlurUniforms) -> Result<(), MotionBlurError> {
        assert_eq!(uniforms.max_blur_radius, 54.0);
        assert_eq!(uniforms.tile_max_loop, 7);
        self.passes.push(pass.kind());
        Ok(())
    }

    fn copy_texture(&mut self, _source: TextureHandle, _destination: TextureHandle) -> Result<(), MotionBlurError> {
        Ok(())
    }
}

#[test]
fn full_hd_pyramid_resolutions() {
    init_logger();
    let mut recorder = Recorder::default();
    let color = recorder.import(Extent::new(1920, 1080), TextureFormat::Rgba16Float);
    let motion = recorder.import(Extent::new(1920, 1080), TextureFormat::Rg16Float);
    let frame = FrameDescriptor::new(1920, 1080, TextureFormat::Rgba16Float);

    let pass = MotionBlurPass::new(&mut recorder);
    let outcome = pass.render(
        &mut recorder,
        &frame,
        CameraKind::Game,
        &EffectParameters::new(270.0, 10),
        &FrameTargets::in_place(color, motion),
    );

    let RenderOutcome::Blurred(report) = outcome else {
        panic!("expected blur, got {outcome:?}");
    };
    assert_eq!(report.layout.tile_size, 56);
    assert_eq!(recorder.passes, FULL_PIPELINE);

    let sizes: Vec<_> = recorder
        .acquired
        .iter()
        .map(|d| (d.label, d.extent.width, d.extent.height, d.format))
        .collect();
    assert_eq!(
        sizes,
        [
            ("_TempColorBuffer", 1920, 1080, TextureFormat::Rgba16Float),
            ("_VelocityTex", 1920, 1080, TextureFormat::Rgb10a2Unorm),
            ("_Tile2RT", 960, 540, TextureFormat::Rg16Float),
            ("_Tile4RT", 480, 270, TextureFormat::Rg16Float),
            ("_Tile8RT", 240, 135, TextureFormat::Rg16Float),
            ("_TileVRT", 34, 19, TextureFormat::Rg16Float),
            ("_NeighborMaxTex", 34, 19, TextureFormat::Rg16Float),
        ]
    );
    assert_eq!(recorder.acquired[0].filter, FilterMode::Bilinear);
    assert_eq!(recorder.released.len(), recorder.acquired.len());
}
