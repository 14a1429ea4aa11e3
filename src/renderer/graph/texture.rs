//! Persistent textures
//!
//! Textures that must keep their contents across frames (TAA history, the
//! first-sample depth, lookup tables). Unlike pooled textures they are owned
//! by one pass and only reallocated when their descriptor changes.

use crate::errors::Result;
use crate::renderer::backend::{GpuBackend, TextureDesc, TextureHandle};
use crate::renderer::graph::slot::TextureSlot;

#[derive(Debug, Default)]
pub struct PersistentTexture {
    current: Option<(TextureHandle, TextureDesc)>,
    slot: TextureSlot,
}

impl PersistentTexture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure the texture matches `desc`.
    ///
    /// Returns `true` when a (re)allocation happened, i.e. the previous
    /// contents are gone.
    pub fn ensure_2d(&mut self, backend: &mut dyn GpuBackend, desc: &TextureDesc) -> Result<bool> {
        if let Some((_, current)) = &self.current
            && current == desc
        {
            return Ok(false);
        }
        self.free(backend);
        let handle = backend.allocate_texture(desc)?;
        self.current = Some((handle, desc.clone()));
        self.slot.set(Some(handle));
        Ok(true)
    }

    pub fn free(&mut self, backend: &mut dyn GpuBackend) {
        if let Some((handle, _)) = self.current.take() {
            backend.free_texture(handle);
        }
        self.slot.set(None);
    }

    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<TextureHandle> {
        self.current.as_ref().map(|(h, _)| *h)
    }

    #[inline]
    #[must_use]
    pub fn desc(&self) -> Option<&TextureDesc> {
        self.current.as_ref().map(|(_, d)| d)
    }

    #[inline]
    #[must_use]
    pub fn slot(&self) -> &TextureSlot {
        &self.slot
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use super::*;
    use crate::renderer::backend::HeadlessBackend;

    #[test]
    fn test_ensure_only_reallocates_on_change() {
        let mut backend = HeadlessBackend::new();
        let mut tex = PersistentTexture::new();
        let small = TextureDesc::target("history", UVec2::new(4, 4), wgpu::TextureFormat::Rgba16Float);
        let large = TextureDesc::target("history", UVec2::new(8, 4), wgpu::TextureFormat::Rgba16Float);

        assert!(tex.ensure_2d(&mut backend, &small).unwrap());
        assert!(!tex.ensure_2d(&mut backend, &small).unwrap());
        assert!(tex.ensure_2d(&mut backend, &large).unwrap());
        assert_eq!(backend.live_texture_count(), 1);
        assert_eq!(tex.slot().get(), tex.handle());

        tex.free(&mut backend);
        assert_eq!(backend.live_texture_count(), 0);
        assert_eq!(tex.slot().get(), None);
    }
}
