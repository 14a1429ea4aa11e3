//! Transient Texture Pool
//!
//! Provides a texture pool for short-lived, per-frame render targets.
//! Passes acquire textures during **draw** and hand them back either as soon
//! as their last reader has been submitted ([`TransientTexturePool::release`])
//! or at frame end ([`TransientTexturePool::reset`]). Released textures stay
//! alive in the free list and are reused by later requests with the same
//! descriptor, so a steady-state frame allocates nothing.
//!
//! # Design
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              TransientTexturePool                   │
//! │                                                     │
//! │  active: [Option<PooledTexture>]                    │
//! │  free:   HashMap<Key, Vec<PooledTexture>>           │
//! │                                                     │
//! │  acquire()  → TextureHandle   (draw phase)          │
//! │  release()  → back to free    (mid-frame reuse)     │
//! │  reset()    → all to free     (end of frame)        │
//! │  trim()     → free stale      (after resize)        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! A pooled texture may alias the storage a different pass used last frame.
//! Callers must not expect contents to survive across an acquire.

use rustc_hash::FxHashMap;

use crate::errors::Result;
use crate::renderer::backend::{GpuBackend, TextureDesc, TextureHandle};
use crate::renderer::graph::slot::TextureSlot;

// ─── Internal Types ───────────────────────────────────────────────────────────

/// Key for texture recycling. Usage is part of the key; a texture with a
/// mismatched usage would fail validation on a real device.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
struct PoolKey {
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
    mip_level_count: u32,
}

impl PoolKey {
    fn from_desc(desc: &TextureDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
            mip_level_count: desc.mip_level_count,
        }
    }
}

#[derive(Debug)]
struct PooledTexture {
    handle: TextureHandle,
    key: PoolKey,
    /// Number of trims this texture has sat in the free list without reuse.
    idle_frames: u32,
}

// ─── Pool Implementation ──────────────────────────────────────────────────────

/// Texture pool for transient per-frame allocations.
#[derive(Debug, Default)]
pub struct TransientTexturePool {
    /// Textures handed out this frame. Released entries become `None`.
    active: Vec<Option<PooledTexture>>,
    /// Free textures available for reuse, grouped by pool key.
    free: FxHashMap<PoolKey, Vec<PooledTexture>>,
}

impl TransientTexturePool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a texture matching `desc`, reusing a free one when possible.
    pub fn acquire(
        &mut self,
        backend: &mut dyn GpuBackend,
        desc: &TextureDesc,
    ) -> Result<TextureHandle> {
        let key = PoolKey::from_desc(desc);

        let pooled = match self.free.get_mut(&key).and_then(Vec::pop) {
            Some(mut t) => {
                t.idle_frames = 0;
                t
            }
            None => {
                let handle = backend.allocate_texture(desc)?;
                log::trace!(
                    "Pool texture '{}' allocated ({}x{} {:?})",
                    desc.label,
                    desc.width,
                    desc.height,
                    desc.format
                );
                PooledTexture {
                    handle,
                    key,
                    idle_frames: 0,
                }
            }
        };

        let handle = pooled.handle;
        match self.active.iter_mut().find(|s| s.is_none()) {
            Some(entry) => *entry = Some(pooled),
            None => self.active.push(Some(pooled)),
        }
        Ok(handle)
    }

    /// Returns one active texture to the free list before frame end.
    ///
    /// Unknown or already released handles are ignored.
    pub fn release(&mut self, handle: TextureHandle) {
        let Some(entry) = self
            .active
            .iter_mut()
            .find(|s| s.as_ref().is_some_and(|t| t.handle == handle))
        else {
            return;
        };
        if let Some(t) = entry.take() {
            self.free.entry(t.key.clone()).or_default().push(t);
        }
    }

    // ── Frame boundary ─────────────────────────────────────────────────────

    /// Returns all active textures to the free list.
    pub fn reset(&mut self) {
        for t in self.active.drain(..).flatten() {
            self.free.entry(t.key.clone()).or_default().push(t);
        }
    }

    /// Frees textures that have been idle for more than `max_idle_frames`.
    ///
    /// Call this once per frame (and eagerly after a resolution change) to
    /// avoid holding stale GPU memory. Returns the number of freed textures.
    pub fn trim(&mut self, backend: &mut dyn GpuBackend, max_idle_frames: u32) -> usize {
        let mut freed = 0;
        for bucket in self.free.values_mut() {
            for t in bucket.iter_mut() {
                t.idle_frames += 1;
            }
            bucket.retain(|t| {
                let keep = t.idle_frames <= max_idle_frames;
                if !keep {
                    backend.free_texture(t.handle);
                    freed += 1;
                }
                keep
            });
        }
        self.free.retain(|_, bucket| !bucket.is_empty());
        if freed > 0 {
            log::info!("Texture pool trimmed {freed} stale texture(s)");
        }
        freed
    }

    /// Frees every texture owned by the pool, active ones included.
    pub fn release_all(&mut self, backend: &mut dyn GpuBackend) {
        for t in self.active.drain(..).flatten() {
            backend.free_texture(t.handle);
        }
        for (_, bucket) in self.free.drain() {
            for t in bucket {
                backend.free_texture(t.handle);
            }
        }
    }

    /// Number of textures currently handed out.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.iter().flatten().count()
    }

    /// Total number of textures managed by the pool (active and free).
    #[must_use]
    pub fn total_texture_count(&self) -> usize {
        self.active_count() + self.free.values().map(Vec::len).sum::<usize>()
    }
}

// ─── Pool-backed texture reference ────────────────────────────────────────────

/// A frame texture acquired from the pool and published through a slot.
///
/// Passes bind [`TextureFromPool::slot`] at sync time; the handle appears in
/// the slot between [`acquire`](Self::acquire) and [`release`](Self::release).
#[derive(Debug, Default)]
pub struct TextureFromPool {
    name: &'static str,
    slot: TextureSlot,
}

impl TextureFromPool {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: TextureSlot::new(),
        }
    }

    pub fn acquire(
        &self,
        pool: &mut TransientTexturePool,
        backend: &mut dyn GpuBackend,
        desc: &TextureDesc,
    ) -> Result<TextureHandle> {
        if let Some(previous) = self.slot.get() {
            pool.release(previous);
        }
        let handle = pool.acquire(backend, &TextureDesc {
            label: self.name,
            ..desc.clone()
        })?;
        self.slot.set(Some(handle));
        Ok(handle)
    }

    /// Hands the texture back to the pool. No-op when not acquired.
    pub fn release(&self, pool: &mut TransientTexturePool) {
        if let Some(handle) = self.slot.get() {
            pool.release(handle);
            self.slot.set(None);
        }
    }

    #[inline]
    #[must_use]
    pub fn slot(&self) -> &TextureSlot {
        &self.slot
    }

    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<TextureHandle> {
        self.slot.get()
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use super::*;
    use crate::renderer::backend::HeadlessBackend;

    fn desc(size: u32) -> TextureDesc {
        TextureDesc::target("test", UVec2::splat(size), wgpu::TextureFormat::Rgba16Float)
    }

    #[test]
    fn test_reset_recycles_textures() {
        let mut backend = HeadlessBackend::new();
        let mut pool = TransientTexturePool::new();

        let a = pool.acquire(&mut backend, &desc(64)).unwrap();
        pool.reset();
        let b = pool.acquire(&mut backend, &desc(64)).unwrap();

        assert_eq!(a, b);
        assert_eq!(backend.stats().textures_allocated, 1);
    }

    #[test]
    fn test_mismatched_desc_allocates() {
        let mut backend = HeadlessBackend::new();
        let mut pool = TransientTexturePool::new();

        let a = pool.acquire(&mut backend, &desc(64)).unwrap();
        pool.reset();
        let b = pool.acquire(&mut backend, &desc(32)).unwrap();

        assert_ne!(a, b);
        assert_eq!(pool.total_texture_count(), 2);
    }

    #[test]
    fn test_release_allows_mid_frame_reuse() {
        let mut backend = HeadlessBackend::new();
        let mut pool = TransientTexturePool::new();

        let a = pool.acquire(&mut backend, &desc(16)).unwrap();
        pool.release(a);
        pool.release(a);
        let b = pool.acquire(&mut backend, &desc(16)).unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn test_trim_frees_idle_textures() {
        let mut backend = HeadlessBackend::new();
        let mut pool = TransientTexturePool::new();

        pool.acquire(&mut backend, &desc(8)).unwrap();
        pool.reset();
        assert_eq!(pool.trim(&mut backend, 1), 0);
        assert_eq!(pool.trim(&mut backend, 1), 1);
        assert_eq!(pool.total_texture_count(), 0);
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_texture_from_pool_publishes_slot() {
        let mut backend = HeadlessBackend::new();
        let mut pool = TransientTexturePool::new();
        let tex = TextureFromPool::new("color");
        let slot = tex.slot().clone();

        let handle = tex.acquire(&mut pool, &mut backend, &desc(4)).unwrap();
        assert_eq!(slot.get(), Some(handle));

        tex.release(&mut pool);
        assert_eq!(slot.get(), None);
        assert_eq!(pool.active_count(), 0);
    }
}
