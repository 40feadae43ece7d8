use shutter_gpu_shared::shaders;

fn parse_and_validate(label: &str, source: &str) -> naga::Module {
    let module = naga::front::wgsl::parse_str(source)
        .unwrap_or_else(|e| panic!("{label} failed to parse: {}", e.emit_to_string(source)));
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .unwrap_or_else(|e| panic!("{label} failed validation: {e:?}"));
    module
}

#[test]
fn fullscreen_triangle_validates() {
    let module = parse_and_validate("fullscreen_triangle", shaders::FULLSCREEN_TRIANGLE_VERT);
    assert!(module.entry_points.iter().any(|ep| ep.name == "vs_main"));
}

#[test]
fn motion_blur_shader_exposes_every_pass() {
    let module = parse_and_validate("motion_blur_tiles", shaders::MOTION_BLUR_SHADER);
    for entry in [
        shaders::VELOCITY_SETUP_ENTRY,
        shaders::TILE_MAX1_ENTRY,
        shaders::TILE_MAX2_ENTRY,
        shaders::TILE_MAX_V_ENTRY,
        shaders::NEIGHBOR_MAX_ENTRY,
        shaders::RECONSTRUCTION_ENTRY,
    ] {
        let ep = module
            .entry_points
            .iter()
            .find(|ep| ep.name == entry)
            .unwrap_or_else(|| panic!("missing entry point {entry}"));
        assert_eq!(ep.stage, naga::ShaderStage::Fragment);
    }
}

#[test]
fn uniform_block_layout_matches_rust() {
    let module = parse_and_validate("motion_blur_tiles", shaders::MOTION_BLUR_SHADER);
    let mut layouter = naga::proc::Layouter::default();
    layouter.update(module.to_ctx()).expect("layout");
    let (handle, _) = module
        .types
        .iter()
        .find(|(_, ty)| ty.name.as_deref() == Some("MotionBlurUniforms"))
        .expect("uniform struct");
    assert_eq!(
        layouter[handle].size as usize,
        std::mem::size_of::<shutter_gpu_shared::uniforms::MotionBlurUniforms>()
    );
}
