//! Object outline
//!
//! Full-screen edge detection over the object-id buffer, blended over the
//! color target.

use crate::errors::Result;
use crate::renderer::backend::{GpuBackend, SamplerState};
use crate::renderer::graph::{DrawState, Framebuffer, PassRecorder, RenderPass};
use crate::renderer::pipeline::UtilityShader;
use crate::renderer::resources::SceneResources;
use crate::renderer::state::SceneState;

#[derive(Debug)]
pub struct OutlinePass {
    enabled: bool,
    ps: RenderPass,
    fb: Framebuffer,
}

impl Default for OutlinePass {
    fn default() -> Self {
        Self {
            enabled: false,
            ps: RenderPass::new("Outline"),
            fb: Framebuffer::new("outline_fb"),
        }
    }
}

impl OutlinePass {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync(
        &mut self,
        backend: &mut dyn GpuBackend,
        scene_state: &SceneState,
        resources: &mut SceneResources,
    ) -> Result<()> {
        self.enabled = scene_state.draw_outline;
        if !self.enabled {
            return Ok(());
        }

        let shader = resources
            .shader_cache
            .utility_shader_get(backend, UtilityShader::Outline)?;
        self.ps.init();
        self.ps
            .state_set(DrawState::WRITE_COLOR | DrawState::BLEND_ALPHA_PREMUL);
        self.ps.shader_set(shader);
        self.ps.bind_ubo("world_data", resources.world_buf.slot());
        self.ps.bind_texture(
            "objectIdBuffer",
            resources.object_id_tx.slot(),
            SamplerState::DEFAULT,
        );
        self.ps.draw_fullscreen();
        Ok(())
    }

    pub fn draw(&mut self, backend: &mut dyn GpuBackend, resources: &SceneResources) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let color = super::acquired(&resources.color_tx, "color")?;
        let fb = self.fb.ensure(backend, None, &[color])?;
        backend.submit_pass(fb, &self.ps);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn free(&mut self, backend: &mut dyn GpuBackend) {
        self.fb.free(backend);
    }
}
