//! Transparent pass
//!
//! Weighted blended order-independent transparency. Each layer (main and
//! in-front) accumulates into two targets, then one full-screen composite
//! blends them over the color buffer:
//!
//! | Target | Format | Clear | Content |
//! |--------|--------|-------|---------|
//! | accumulation | `Rgba16Float` | 0 | weighted premultiplied color |
//! | reveal | `R16Float` | 1 | product of `1 - alpha` |

use super::mesh::MeshPass;
use crate::errors::Result;
use crate::renderer::backend::{ClearValue, GpuBackend, SamplerState, TextureDesc};
use crate::renderer::graph::{
    DrawState, Framebuffer, PassRecorder, RenderPass, TextureFromPool,
};
use crate::renderer::pipeline::{PipelineType, UtilityShader};
use crate::renderer::resources::SceneResources;
use crate::renderer::state::SceneState;

pub const ACCUMULATION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const REVEAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;

const CLEAR_ACCUMULATION: ClearValue = ClearValue::Color(wgpu::Color::TRANSPARENT);
const CLEAR_REVEAL: ClearValue = ClearValue::Color(wgpu::Color::WHITE);

#[derive(Debug)]
pub struct TransparentPass {
    pub accumulation_ps: MeshPass,
    pub accumulation_in_front_ps: MeshPass,
    resolve_ps: RenderPass,

    accumulation_tx: TextureFromPool,
    reveal_tx: TextureFromPool,

    transparent_fb: Framebuffer,
    transparent_in_front_fb: Framebuffer,
    resolve_fb: Framebuffer,
}

impl Default for TransparentPass {
    fn default() -> Self {
        Self {
            accumulation_ps: MeshPass::new("Transparent.Accumulation"),
            accumulation_in_front_ps: MeshPass::new("Transparent.AccumulationInFront"),
            resolve_ps: RenderPass::new("Transparent.Resolve"),
            accumulation_tx: TextureFromPool::new("wb_accumulation_tx"),
            reveal_tx: TextureFromPool::new("wb_reveal_tx"),
            transparent_fb: Framebuffer::new("transparent_fb"),
            transparent_in_front_fb: Framebuffer::new("transparent_in_front_fb"),
            resolve_fb: Framebuffer::new("transparent_resolve_fb"),
        }
    }
}

impl TransparentPass {
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
        let clip = scene_state.use_clip_planes();
        let state = DrawState::WRITE_COLOR
            | DrawState::DEPTH_LESS_EQUAL
            | DrawState::BLEND_OIT
            | scene_state.cull_state
            | scene_state.clip_state;

        for ps in [&mut self.accumulation_ps, &mut self.accumulation_in_front_ps] {
            ps.init_pass(resources, state, clip);
            ps.clear(&[CLEAR_ACCUMULATION, CLEAR_REVEAL]);
            ps.init_subpasses(
                backend,
                &mut resources.shader_cache,
                PipelineType::Transparent,
                scene_state.shading_type,
                clip,
            )?;
        }

        let shader = resources
            .shader_cache
            .utility_shader_get(backend, UtilityShader::TransparentResolve)?;
        let ps = &mut self.resolve_ps;
        ps.init();
        ps.state_set(DrawState::WRITE_COLOR | DrawState::BLEND_ALPHA);
        ps.shader_set(shader);
        ps.bind_texture("transparentAccum", self.accumulation_tx.slot(), SamplerState::DEFAULT);
        ps.bind_texture("transparentRevealage", self.reveal_tx.slot(), SamplerState::DEFAULT);
        ps.draw_fullscreen();
        Ok(())
    }

    pub fn draw(
        &mut self,
        backend: &mut dyn GpuBackend,
        scene_state: &SceneState,
        resources: &mut SceneResources,
    ) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let resolution = scene_state.resolution;
        let accumulation = self.accumulation_tx.acquire(
            &mut resources.pool,
            backend,
            &TextureDesc::target("", resolution, ACCUMULATION_FORMAT),
        )?;
        let reveal = self.reveal_tx.acquire(
            &mut resources.pool,
            backend,
            &TextureDesc::target("", resolution, REVEAL_FORMAT),
        )?;
        let color = super::acquired(&resources.color_tx, "color")?;
        let resolve_fb = self.resolve_fb.ensure(backend, None, &[color])?;

        if !self.accumulation_ps.is_empty() {
            let depth = super::acquired(&resources.depth_tx, "depth")?;
            let fb = self
                .transparent_fb
                .ensure(backend, Some(depth), &[accumulation, reveal])?;
            backend.submit_pass(fb, self.accumulation_ps.pass());
            backend.submit_pass(resolve_fb, &self.resolve_ps);
        }

        if !self.accumulation_in_front_ps.is_empty() {
            let depth = super::acquired(&resources.depth_in_front_tx, "in-front depth")?;
            let fb = self
                .transparent_in_front_fb
                .ensure(backend, Some(depth), &[accumulation, reveal])?;
            backend.submit_pass(fb, self.accumulation_in_front_ps.pass());
            backend.submit_pass(resolve_fb, &self.resolve_ps);
        }

        super::release_all(&mut resources.pool, &[&self.accumulation_tx, &self.reveal_tx]);
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accumulation_ps.is_empty() && self.accumulation_in_front_ps.is_empty()
    }

    pub fn free(&mut self, backend: &mut dyn GpuBackend) {
        self.transparent_fb.free(backend);
        self.transparent_in_front_fb.free(backend);
        self.resolve_fb.free(backend);
    }
}
