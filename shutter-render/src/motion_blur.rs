//! Pipeline orchestrator: velocity setup, tile pyramid, neighbor max, reconstruction.

use shutter_gpu_shared::uniforms::MotionBlurUniforms;

use crate::error::MotionBlurError;
use crate::format::{
    FilterMode, TextureFormat, PACKED_VELOCITY_FALLBACK, PACKED_VELOCITY_FORMAT, TILE_VECTOR_FORMAT,
};
use crate::frame::{CameraKind, Extent, FrameDescriptor};
use crate::params::EffectParameters;
use crate::pass::{EffectSetup, MotionBlurBackend, Pass, PassKind};
use crate::texture::{TextureDesc, TextureHandle, TextureRole, TransientScope};
use crate::tile::TileLayout;

/// Host textures a run reads from and writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTargets {
    pub color: TextureHandle,
    pub destination: TextureHandle,
    /// Texture-space motion vectors in RG.
    pub motion: TextureHandle,
    /// Linear 0..1 depth in R. Without it reconstruction ignores occlusion.
    pub depth: Option<TextureHandle>,
}

impl FrameTargets {
    /// Blur `color` in place.
    pub fn in_place(color: TextureHandle, motion: TextureHandle) -> Self {
        Self {
            color,
            destination: color,
            motion,
            depth: None,
        }
    }

    /// Read `source`, write the blurred image to `destination`.
    pub fn separate(source: TextureHandle, destination: TextureHandle, motion: TextureHandle) -> Self {
        Self {
            color: source,
            destination,
            motion,
            depth: None,
        }
    }

    pub fn with_depth(mut self, depth: TextureHandle) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn is_in_place(&self) -> bool {
        self.color == self.destination
    }
}

/// Why a run left the image unblurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassthroughReason {
    Disabled,
    UnsupportedCamera,
    ProgramsUnavailable,
    InvalidFrame,
    /// A transient allocation or pass recording failed for this frame.
    ResourceFailure,
}

/// What a completed run recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub layout: TileLayout,
    pub passes: Vec<PassKind>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderOutcome {
    Blurred(RunReport),
    Passthrough(PassthroughReason),
}

impl RenderOutcome {
    pub fn is_blurred(&self) -> bool {
        matches!(self, RenderOutcome::Blurred(_))
    }
}

/// Tile-based motion blur effect.
///
/// Holds only decisions made at setup time, so one instance can drive any number of
/// runs, each against its own backend or recorder.
#[derive(Clone, Debug)]
pub struct MotionBlurPass {
    packed_format: TextureFormat,
    programs_ready: bool,
}

impl MotionBlurPass {
    /// Prepare programs and pick the packed velocity format. A device without the
    /// programs yields a pass that always passes through; the failure is logged here
    /// once rather than every frame.
    pub fn new<S: EffectSetup + ?Sized>(setup: &mut S) -> Self {
        let programs_ready = match setup.prepare_programs() {
            Ok(()) => true,
            Err(e) => {
                log::error!("Motion blur disabled: {e}");
                false
            }
        };

        let packed_format = if setup.supports_format(PACKED_VELOCITY_FORMAT) {
            PACKED_VELOCITY_FORMAT
        } else {
            log::warn!(
                "{PACKED_VELOCITY_FORMAT:?} unsupported, packing velocity as {PACKED_VELOCITY_FALLBACK:?}"
            );
            PACKED_VELOCITY_FALLBACK
        };

        Self {
            packed_format,
            programs_ready,
        }
    }

    pub fn packed_format(&self) -> TextureFormat {
        self.packed_format
    }

    pub fn is_ready(&self) -> bool {
        self.programs_ready
    }

    /// Blur one frame, or leave the destination equal to the source.
    ///
    /// Never fails: every transient texture is released before returning and any
    /// problem degrades to a passthrough for this frame only.
    pub fn render<B: MotionBlurBackend + ?Sized>(
        &self,
        backend: &mut B,
        frame: &FrameDescriptor,
        camera: CameraKind,
        params: &EffectParameters,
        targets: &FrameTargets,
    ) -> RenderOutcome {
        if !params.is_effective() {
            return passthrough(backend, targets, PassthroughReason::Disabled);
        }
        if !camera.receives_motion_blur() {
            return passthrough(backend, targets, PassthroughReason::UnsupportedCamera);
        }
        if !self.programs_ready {
            return passthrough(backend, targets, PassthroughReason::ProgramsUnavailable);
        }
        if let Err(e) = frame.validate() {
            log::warn!("Motion blur skipped: {e}");
            return passthrough(backend, targets, PassthroughReason::InvalidFrame);
        }

        let layout = TileLayout::resolve(frame);
        match self.record(backend, frame, &layout, params, targets) {
            Ok(passes) => {
                log::debug!(
                    "Motion blur recorded {} passes, {}px tiles ({}x{})",
                    passes.len(),
                    layout.tile_size,
                    layout.tiles.width,
                    layout.tiles.height
                );
                RenderOutcome::Blurred(RunReport { layout, passes })
            }
            Err(e) => {
                log::warn!("Motion blur skipped for this frame: {e}");
                passthrough(backend, targets, PassthroughReason::ResourceFailure)
            }
        }
    }

    fn record<B: MotionBlurBackend + ?Sized>(
        &self,
        backend: &mut B,
        frame: &FrameDescriptor,
        layout: &TileLayout,
        params: &EffectParameters,
        targets: &FrameTargets,
    ) -> Result<Vec<PassKind>, MotionBlurError> {
        let uniforms = layout.uniforms(params);
        let mut passes = Vec::with_capacity(7);
        let mut scope = TransientScope::new(backend);

        // Reconstruction must not read the texture it writes.
        let color = if targets.is_in_place() {
            let desc = TextureDesc::transient(TextureRole::TempColor, layout.full, frame.color_format)
                .with_filter(FilterMode::Bilinear);
            let copy = scope.acquire(TextureRole::TempColor, &desc)?;
            scope.provider().copy_texture(targets.color, copy)?;
            copy
        } else {
            targets.color
        };

        // Pass 1 - Velocity/depth packing
        let velocity = acquire(&mut scope, TextureRole::Velocity, layout.full, self.packed_format)?;
        encode(
            &mut scope,
            Pass::VelocitySetup {
                motion: targets.motion,
                depth: targets.depth,
                target: velocity,
            },
            &uniforms,
            &mut passes,
        )?;

        // Pass 2 - First TileMax filter (1/2 downsize)
        let tile2 = acquire(&mut scope, TextureRole::Tile2, layout.half, TILE_VECTOR_FORMAT)?;
        encode(&mut scope, Pass::TileMax1 { source: velocity, target: tile2 }, &uniforms, &mut passes)?;

        // Pass 3 - Second TileMax filter (1/4)
        let tile4 = acquire(&mut scope, TextureRole::Tile4, layout.quarter, TILE_VECTOR_FORMAT)?;
        encode(&mut scope, Pass::TileMax2 { source: tile2, target: tile4 }, &uniforms, &mut passes)?;
        scope.release(TextureRole::Tile2);

        // Pass 4 - Third TileMax filter (1/8)
        let tile8 = acquire(&mut scope, TextureRole::Tile8, layout.eighth, TILE_VECTOR_FORMAT)?;
        encode(&mut scope, Pass::TileMax2 { source: tile4, target: tile8 }, &uniforms, &mut passes)?;
        scope.release(TextureRole::Tile4);

        // Pass 5 - Variable TileMax filter (reduce to tile size)
        let tile_max = acquire(&mut scope, TextureRole::TileMax, layout.tiles, TILE_VECTOR_FORMAT)?;
        encode(&mut scope, Pass::TileMaxV { source: tile8, target: tile_max }, &uniforms, &mut passes)?;
        scope.release(TextureRole::Tile8);

        // Pass 6 - NeighborMax filter
        let neighbor_max = acquire(&mut scope, TextureRole::NeighborMax, layout.tiles, TILE_VECTOR_FORMAT)?;
        encode(
            &mut scope,
            Pass::NeighborMax { source: tile_max, target: neighbor_max },
            &uniforms,
            &mut passes,
        )?;
        scope.release(TextureRole::TileMax);

        // Pass 7 - Reconstruction
        encode(
            &mut scope,
            Pass::Reconstruction {
                color,
                velocity,
                neighbor_max,
                target: targets.destination,
            },
            &uniforms,
            &mut passes,
        )?;

        scope.release(TextureRole::Velocity);
        scope.release(TextureRole::NeighborMax);
        scope.release(TextureRole::TempColor);
        Ok(passes)
    }
}

fn acquire<B: MotionBlurBackend + ?Sized>(
    scope: &mut TransientScope<'_, B>,
    role: TextureRole,
    extent: Extent,
    format: TextureFormat,
) -> Result<TextureHandle, MotionBlurError> {
    scope.acquire(role, &TextureDesc::transient(role, extent, format))
}

fn encode<B: MotionBlurBackend + ?Sized>(
    scope: &mut TransientScope<'_, B>,
    pass: Pass,
    uniforms: &MotionBlurUniforms,
    passes: &mut Vec<PassKind>,
) -> Result<(), MotionBlurError> {
    scope.provider().encode_pass(&pass, uniforms)?;
    passes.push(pass.kind());
    Ok(())
}

fn passthrough<B: MotionBlurBackend + ?Sized>(
    backend: &mut B,
    targets: &FrameTargets,
    reason: PassthroughReason,
) -> RenderOutcome {
    if !targets.is_in_place() {
        if let Err(e) = backend.copy_texture(targets.color, targets.destination) {
            log::warn!("Motion blur passthrough copy failed: {e}");
        }
    }
    RenderOutcome::Passthrough(reason)
}
