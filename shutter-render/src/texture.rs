//! Resource-provider contract, the per-run transient scope and the storage pool
//! backends recycle transients through.

use crate::error::MotionBlurError;
use crate::format::{FilterMode, TextureFormat};
use crate::frame::Extent;

/// Opaque reference to a texture issued by a [`TextureProvider`] or imported by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Named transient slots used by one pipeline run.
///
/// Names are stable across runs so a pooled provider can hand the same storage back
/// every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureRole {
    /// Copy of the color target when rendering in place.
    TempColor,
    /// Packed velocity (and depth) at full resolution.
    Velocity,
    Tile2,
    Tile4,
    Tile8,
    /// Velocity reduced to the resolved tile size.
    TileMax,
    NeighborMax,
}

impl TextureRole {
    pub const ALL: [TextureRole; 7] = [
        TextureRole::TempColor,
        TextureRole::Velocity,
        TextureRole::Tile2,
        TextureRole::Tile4,
        TextureRole::Tile8,
        TextureRole::TileMax,
        TextureRole::NeighborMax,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TextureRole::TempColor => "_TempColorBuffer",
            TextureRole::Velocity => "_VelocityTex",
            TextureRole::Tile2 => "_Tile2RT",
            TextureRole::Tile4 => "_Tile4RT",
            TextureRole::Tile8 => "_Tile8RT",
            TextureRole::TileMax => "_TileVRT",
            TextureRole::NeighborMax => "_NeighborMaxTex",
        }
    }
}

/// Allocation request for a transient 2D texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub label: &'static str,
    pub extent: Extent,
    pub format: TextureFormat,
    pub filter: FilterMode,
}

impl TextureDesc {
    pub fn transient(role: TextureRole, extent: Extent, format: TextureFormat) -> Self {
        Self {
            label: role.name(),
            extent,
            format,
            filter: FilterMode::Point,
        }
    }

    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }
}

/// Allocates and frees transient textures.
pub trait TextureProvider {
    fn acquire(&mut self, desc: &TextureDesc) -> Result<TextureHandle, MotionBlurError>;

    /// Return a texture obtained from [`TextureProvider::acquire`].
    fn release(&mut self, handle: TextureHandle);

    /// Extent and format of a live texture, imported or transient.
    fn describe(&self, handle: TextureHandle) -> Result<(Extent, TextureFormat), MotionBlurError>;
}

/// Scoped ownership of the transient textures of one run.
///
/// Every texture acquired through the scope is released exactly once: either by an
/// explicit [`TransientScope::release`] as soon as its consumer has been recorded, or
/// when the scope drops, which also covers early returns on error.
pub struct TransientScope<'a, P: TextureProvider + ?Sized> {
    provider: &'a mut P,
    live: Vec<(TextureRole, TextureHandle)>,
}

impl<'a, P: TextureProvider + ?Sized> TransientScope<'a, P> {
    pub fn new(provider: &'a mut P) -> Self {
        Self {
            provider,
            live: Vec::with_capacity(TextureRole::ALL.len()),
        }
    }

    pub fn acquire(
        &mut self,
        role: TextureRole,
        desc: &TextureDesc,
    ) -> Result<TextureHandle, MotionBlurError> {
        if self.is_live(role) {
            return Err(MotionBlurError::RoleAlreadyLive(role.name()));
        }
        let handle = self.provider.acquire(desc)?;
        self.live.push((role, handle));
        Ok(handle)
    }

    /// Release the texture held for `role`; a no-op when nothing is held.
    pub fn release(&mut self, role: TextureRole) {
        if let Some(pos) = self.live.iter().position(|(r, _)| *r == role) {
            let (_, handle) = self.live.remove(pos);
            self.provider.release(handle);
        }
    }

    pub fn is_live(&self, role: TextureRole) -> bool {
        self.live.iter().any(|(r, _)| *r == role)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// The underlying provider, for recording passes between acquisitions.
    pub fn provider(&mut self) -> &mut P {
        &mut *self.provider
    }
}

impl<P: TextureProvider + ?Sized> Drop for TransientScope<'_, P> {
    fn drop(&mut self) {
        while let Some((role, handle)) = self.live.pop() {
            log::trace!("releasing {} at scope exit", role.name());
            self.provider.release(handle);
        }
    }
}

/// Released transient storage, recycled by descriptor.
///
/// Holds at most one entry per label. Giving back storage for a label drops whatever
/// the pool still held for it, and a request that misses on size or format drops the
/// stale entry of its label, so a resize leaves nothing behind from the old size.
#[derive(Debug)]
pub struct TexturePool<T> {
    free: Vec<(TextureDesc, T)>,
}

impl<T> Default for TexturePool<T> {
    fn default() -> Self {
        Self { free: Vec::new() }
    }
}

impl<T> TexturePool<T> {
    pub fn take(&mut self, desc: &TextureDesc) -> Option<T> {
        let index = self.free.iter().position(|(d, _)| d.label == desc.label)?;
        let (pooled, storage) = self.free.swap_remove(index);
        if pooled == *desc {
            Some(storage)
        } else {
            log::debug!(
                "dropping pooled {} at {}x{}",
                pooled.label,
                pooled.extent.width,
                pooled.extent.height
            );
            None
        }
    }

    pub fn give_back(&mut self, desc: TextureDesc, storage: T) {
        self.free.retain(|(d, _)| d.label != desc.label);
        self.free.push((desc, storage));
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn clear(&mut self) {
        self.free.clear();
    }
}
