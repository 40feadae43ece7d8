//! Reference backend that executes every pass on the host.
//!
//! Slow, deterministic and fully inspectable: it keeps an ordered log of allocations,
//! releases, passes and copies, and can be told to fail in the ways a device can.

mod shading;
mod texture;

pub use shading::{gradient_noise, max_v};
pub use texture::CpuTexture;

use shutter_gpu_shared::uniforms::MotionBlurUniforms;

use crate::error::MotionBlurError;
use crate::format::TextureFormat;
use crate::frame::Extent;
use crate::pass::{EffectSetup, Pass, PassEncoder, PassKind};
use crate::texture::{TextureDesc, TextureHandle, TexturePool, TextureProvider};

/// Something the backend was asked to do, in request order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendEvent {
    Acquire {
        handle: TextureHandle,
        label: &'static str,
        extent: Extent,
        format: TextureFormat,
    },
    Release {
        handle: TextureHandle,
        label: &'static str,
    },
    Pass(PassKind),
    Copy {
        source: TextureHandle,
        destination: TextureHandle,
    },
}

struct Slot {
    texture: CpuTexture,
    label: &'static str,
    transient: bool,
}

#[derive(Default)]
pub struct CpuBackend {
    // Indexed by handle; handles are never reused so stale ones are detectable.
    slots: Vec<Option<Slot>>,
    pool: TexturePool<CpuTexture>,
    events: Vec<BackendEvent>,
    unsupported: Vec<TextureFormat>,
    failing_labels: Vec<&'static str>,
    programs_missing: bool,
    program_requests: usize,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `format` as unsupported.
    pub fn without_format(mut self, format: TextureFormat) -> Self {
        self.unsupported.push(format);
        self
    }

    /// Fail every allocation whose label is `label`.
    pub fn failing_allocation(mut self, label: &'static str) -> Self {
        self.failing_labels.push(label);
        self
    }

    /// Behave as if the shader programs could not be built.
    pub fn without_programs(mut self) -> Self {
        self.programs_missing = true;
        self
    }

    /// Register a host texture (color, motion vectors, depth or destination).
    pub fn import(&mut self, texture: CpuTexture) -> TextureHandle {
        self.insert(Slot {
            texture,
            label: "imported",
            transient: false,
        })
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&CpuTexture> {
        self.slots
            .get(handle.0 as usize)
            .and_then(Option::as_ref)
            .map(|slot| &slot.texture)
    }

    pub fn events(&self) -> &[BackendEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Transient textures currently held by the pipeline.
    pub fn live_transients(&self) -> usize {
        self.slots.iter().flatten().filter(|slot| slot.transient).count()
    }

    /// Released textures kept for reuse.
    pub fn pooled_storage(&self) -> usize {
        self.pool.len()
    }

    /// How often the programs were asked for.
    pub fn program_requests(&self) -> usize {
        self.program_requests
    }

    pub fn passes(&self) -> Vec<PassKind> {
        self.events
            .iter()
            .filter_map(|event| match event {
                BackendEvent::Pass(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    fn insert(&mut self, slot: Slot) -> TextureHandle {
        let handle = TextureHandle(self.slots.len() as u32);
        self.slots.push(Some(slot));
        handle
    }

    fn lookup(&self, handle: TextureHandle) -> Result<&CpuTexture, MotionBlurError> {
        self.texture(handle).ok_or(MotionBlurError::UnknownTexture(handle.0))
    }

    fn take(&mut self, handle: TextureHandle) -> Result<Slot, MotionBlurError> {
        self.slots
            .get_mut(handle.0 as usize)
            .and_then(Option::take)
            .ok_or(MotionBlurError::UnknownTexture(handle.0))
    }

    fn shade(
        &self,
        pass: &Pass,
        u: &MotionBlurUniforms,
        target: &mut CpuTexture,
    ) -> Result<(), MotionBlurError> {
        match *pass {
            Pass::VelocitySetup { motion, depth, .. } => {
                let motion = self.lookup(motion)?;
                let depth = depth.map(|d| self.lookup(d)).transpose()?;
                shading::render_fullscreen(target, |uv| shading::velocity_setup(u, motion, depth, uv));
            }
            Pass::TileMax1 { source, .. } => {
                let source = self.lookup(source)?;
                shading::render_fullscreen(target, |uv| shading::tile_max1(u, source, uv));
            }
            Pass::TileMax2 { source, .. } => {
                let source = self.lookup(source)?;
                shading::render_fullscreen(target, |uv| shading::tile_max2(source, uv));
            }
            Pass::TileMaxV { source, .. } => {
                let source = self.lookup(source)?;
                shading::render_fullscreen(target, |uv| shading::tile_max_v(u, source, uv));
            }
            Pass::NeighborMax { source, .. } => {
                let source = self.lookup(source)?;
                shading::render_fullscreen(target, |uv| shading::neighbor_max(source, uv));
            }
            Pass::Reconstruction {
                color,
                velocity,
                neighbor_max,
                ..
            } => {
                let color = self.lookup(color)?;
                let velocity = self.lookup(velocity)?;
                let neighbor_max = self.lookup(neighbor_max)?;
                shading::render_fullscreen(target, |uv| {
                    shading::reconstruction(u, color, velocity, neighbor_max, uv)
                });
            }
        }
        Ok(())
    }
}

impl EffectSetup for CpuBackend {
    fn supports_format(&self, format: TextureFormat) -> bool {
        !self.unsupported.contains(&format)
    }

    fn prepare_programs(&mut self) -> Result<(), MotionBlurError> {
        self.program_requests += 1;
        if self.programs_missing {
            return Err(MotionBlurError::ProgramsUnavailable("shader not loaded".into()));
        }
        Ok(())
    }
}

impl TextureProvider for CpuBackend {
    fn acquire(&mut self, desc: &TextureDesc) -> Result<TextureHandle, MotionBlurError> {
        if self.failing_labels.contains(&desc.label) {
            return Err(MotionBlurError::Allocation {
                label: desc.label,
                width: desc.extent.width,
                height: desc.extent.height,
                reason: "allocation refused".into(),
            });
        }
        if !self.supports_format(desc.format) {
            return Err(MotionBlurError::Allocation {
                label: desc.label,
                width: desc.extent.width,
                height: desc.extent.height,
                reason: format!("{:?} unsupported", desc.format),
            });
        }

        let texture = self
            .pool
            .take(desc)
            .unwrap_or_else(|| CpuTexture::new(desc.extent, desc.format, desc.filter));
        let handle = self.insert(Slot {
            texture,
            label: desc.label,
            transient: true,
        });
        self.events.push(BackendEvent::Acquire {
            handle,
            label: desc.label,
            extent: desc.extent,
            format: desc.format,
        });
        Ok(handle)
    }

    fn release(&mut self, handle: TextureHandle) {
        match self.take(handle) {
            Ok(slot) if slot.transient => {
                self.events.push(BackendEvent::Release {
                    handle,
                    label: slot.label,
                });
                let desc = TextureDesc {
                    label: slot.label,
                    extent: slot.texture.extent(),
                    format: slot.texture.format(),
                    filter: slot.texture.filter(),
                };
                self.pool.give_back(desc, slot.texture);
            }
            Ok(slot) => {
                log::error!("refusing to release imported texture {}", handle.0);
                self.slots[handle.0 as usize] = Some(slot);
            }
            Err(e) => log::error!("release failed: {e}"),
        }
    }

    fn describe(&self, handle: TextureHandle) -> Result<(Extent, TextureFormat), MotionBlurError> {
        let texture = self.lookup(handle)?;
        Ok((texture.extent(), texture.format()))
    }
}

impl PassEncoder for CpuBackend {
    fn encode_pass(&mut self, pass: &Pass, uniforms: &MotionBlurUniforms) -> Result<(), MotionBlurError> {
        if self.programs_missing {
            return Err(MotionBlurError::ProgramsUnavailable("shader not loaded".into()));
        }
        let target = pass.target();
        // Taken out for the duration of the pass; a pass reading its own target fails lookup.
        let mut slot = self.take(target)?;
        let result = self.shade(pass, uniforms, &mut slot.texture);
        self.slots[target.0 as usize] = Some(slot);
        result.map_err(|e| MotionBlurError::Encode {
            pass: pass.kind().label(),
            reason: e.to_string(),
        })?;
        self.events.push(BackendEvent::Pass(pass.kind()));
        Ok(())
    }

    fn copy_texture(&mut self, source: TextureHandle, destination: TextureHandle) -> Result<(), MotionBlurError> {
        let (src_extent, src_format) = self.describe(source)?;
        let (dst_extent, dst_format) = self.describe(destination)?;
        if src_extent != dst_extent || src_format != dst_format {
            return Err(MotionBlurError::FormatMismatch {
                src_width: src_extent.width,
                src_height: src_extent.height,
                src_format,
                dst_width: dst_extent.width,
                dst_height: dst_extent.height,
                dst_format,
            });
        }
        if source != destination {
            let texels = self.lookup(source)?.texels().to_vec();
            let mut slot = self.take(destination)?;
            slot.texture.texels_mut().copy_from_slice(&texels);
            self.slots[destination.0 as usize] = Some(slot);
        }
        self.events.push(BackendEvent::Copy { source, destination });
        Ok(())
    }
}
