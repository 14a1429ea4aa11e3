//! Framebuffers
//!
//! A [`Framebuffer`] caches one backend attachment set. `ensure` is called
//! every frame with the attachments the pass wants; the backend object is
//! only recreated when they differ (resize, pool aliasing, toggled targets).

use smallvec::SmallVec;

use crate::errors::Result;
use crate::renderer::backend::{FramebufferDesc, FramebufferHandle, GpuBackend, TextureHandle};

#[derive(Debug)]
pub struct Framebuffer {
    label: &'static str,
    current: Option<(FramebufferHandle, FramebufferDesc)>,
}

impl Framebuffer {
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            current: None,
        }
    }

    pub fn ensure(
        &mut self,
        backend: &mut dyn GpuBackend,
        depth: Option<TextureHandle>,
        colors: &[TextureHandle],
    ) -> Result<FramebufferHandle> {
        self.ensure_level(backend, depth, colors, 0)
    }

    /// Like [`ensure`](Self::ensure), attaching mip `mip_level` of every texture.
    pub fn ensure_level(
        &mut self,
        backend: &mut dyn GpuBackend,
        depth: Option<TextureHandle>,
        colors: &[TextureHandle],
        mip_level: u32,
    ) -> Result<FramebufferHandle> {
        let desc = FramebufferDesc {
            label: self.label,
            depth,
            colors: SmallVec::from_slice(colors),
            mip_level,
        };
        if let Some((handle, current)) = &self.current
            && *current == desc
        {
            return Ok(*handle);
        }

        self.free(backend);
        let handle = backend.create_framebuffer(&desc)?;
        log::debug!(
            "Framebuffer '{}' created ({} color, depth: {})",
            self.label,
            desc.colors.len(),
            desc.depth.is_some()
        );
        self.current = Some((handle, desc));
        Ok(handle)
    }

    pub fn free(&mut self, backend: &mut dyn GpuBackend) {
        if let Some((handle, _)) = self.current.take() {
            backend.free_framebuffer(handle);
        }
    }

    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<FramebufferHandle> {
        self.current.as_ref().map(|(h, _)| *h)
    }
}
