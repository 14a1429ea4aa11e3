//! Opaque pass
//!
//! Deferred shading in two steps:
//!
//! ```text
//! gbuffer_in_front ─┐                     stencil = OBJECT_IN_FRONT
//! gbuffer          ─┼─► material, normal  stencil = OBJECT (not over in-front)
//!                   │   (+ object ids)
//! deferred resolve ─┘──► color            only where stencil != background
//! ```
//!
//! In-front objects render first into the shared depth buffer; a copy of
//! that depth is kept for the transparent in-front layer.

use smallvec::SmallVec;

use super::StencilBits;
use super::mesh::MeshPass;
use crate::errors::Result;
use crate::renderer::backend::{GpuBackend, SamplerState, TextureDesc, TextureHandle};
use crate::renderer::graph::{
    DrawState, Framebuffer, PassRecorder, RenderPass, TextureFromPool,
};
use crate::renderer::pipeline::PipelineType;
use crate::renderer::resources::SceneResources;
use crate::renderer::state::SceneState;

pub const GBUFFER_MATERIAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const GBUFFER_NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;

#[derive(Debug)]
pub struct OpaquePass {
    pub gbuffer_ps: MeshPass,
    pub gbuffer_in_front_ps: MeshPass,
    deferred_ps: RenderPass,

    gbuffer_material_tx: TextureFromPool,
    gbuffer_normal_tx: TextureFromPool,

    gbuffer_fb: Framebuffer,
    gbuffer_in_front_fb: Framebuffer,
    deferred_fb: Framebuffer,
}

impl Default for OpaquePass {
    fn default() -> Self {
        Self {
            gbuffer_ps: MeshPass::new("Opaque.Gbuffer"),
            gbuffer_in_front_ps: MeshPass::new("Opaque.GbufferInFront"),
            deferred_ps: RenderPass::new("Opaque.Deferred"),
            gbuffer_material_tx: TextureFromPool::new("wb_gbuffer_material_tx"),
            gbuffer_normal_tx: TextureFromPool::new("wb_gbuffer_normal_tx"),
            gbuffer_fb: Framebuffer::new("opaque_gbuffer_fb"),
            gbuffer_in_front_fb: Framebuffer::new("opaque_gbuffer_in_front_fb"),
            deferred_fb: Framebuffer::new("opaque_deferred_fb"),
        }
    }
}

impl OpaquePass {
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
        let shading = scene_state.shading_type;
        let state = DrawState::WRITE_COLOR
            | DrawState::WRITE_DEPTH
            | DrawState::DEPTH_LESS_EQUAL
            | scene_state.cull_state
            | scene_state.clip_state;

        let in_front_state = state | DrawState::WRITE_STENCIL | DrawState::STENCIL_ALWAYS;
        self.gbuffer_in_front_ps.init_pass(resources, in_front_state, clip);
        self.gbuffer_in_front_ps
            .state_stencil(StencilBits::OBJECT_IN_FRONT, 0xFF, 0x00);
        self.gbuffer_in_front_ps.init_subpasses(
            backend,
            &mut resources.shader_cache,
            PipelineType::Opaque,
            shading,
            clip,
        )?;

        let main_state = state | DrawState::WRITE_STENCIL | DrawState::STENCIL_NEQUAL;
        self.gbuffer_ps.init_pass(resources, main_state, clip);
        self.gbuffer_ps
            .state_stencil(StencilBits::OBJECT, 0xFF, StencilBits::OBJECT_IN_FRONT);
        self.gbuffer_ps.init_subpasses(
            backend,
            &mut resources.shader_cache,
            PipelineType::Opaque,
            shading,
            clip,
        )?;

        let resolve = resources.shader_cache.resolve_shader_get(
            backend,
            PipelineType::Opaque,
            shading,
            scene_state.draw_cavity,
            scene_state.draw_curvature,
        )?;
        let ps = &mut self.deferred_ps;
        ps.init();
        ps.state_set(DrawState::WRITE_COLOR | DrawState::STENCIL_NEQUAL);
        ps.state_stencil(0x00, StencilBits::BACKGROUND, StencilBits::OBJECT_ALL);
        ps.shader_set(resolve);
        ps.bind_ubo("world_data", resources.world_buf.slot());
        ps.bind_ubo("view_data", resources.view_buf.slot());
        ps.bind_texture("normal_tx", self.gbuffer_normal_tx.slot(), SamplerState::DEFAULT);
        ps.bind_texture("material_tx", self.gbuffer_material_tx.slot(), SamplerState::DEFAULT);
        ps.bind_texture("depth_tx", resources.depth_tx.slot(), SamplerState::DEFAULT);
        ps.bind_texture("matcap_tx", resources.matcap_slot(), SamplerState::LINEAR);
        resources
            .cavity
            .setup_resolve_pass(ps, resources.object_id_tx.slot());
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
        let material = self.gbuffer_material_tx.acquire(
            &mut resources.pool,
            backend,
            &TextureDesc::target("", resolution, GBUFFER_MATERIAL_FORMAT),
        )?;
        let normal = self.gbuffer_normal_tx.acquire(
            &mut resources.pool,
            backend,
            &TextureDesc::target("", resolution, GBUFFER_NORMAL_FORMAT),
        )?;
        let depth = super::acquired(&resources.depth_tx, "depth")?;
        let color = super::acquired(&resources.color_tx, "color")?;

        let mut attachments: SmallVec<[TextureHandle; 3]> = SmallVec::from_slice(&[material, normal]);
        attachments.extend(resources.object_id_tx.handle());

        if !self.gbuffer_in_front_ps.is_empty() {
            let fb = self
                .gbuffer_in_front_fb
                .ensure(backend, Some(depth), &attachments)?;
            backend.submit_pass(fb, self.gbuffer_in_front_ps.pass());
            if let Some(depth_in_front) = resources.depth_in_front_tx.handle() {
                backend.copy_texture(depth, depth_in_front);
            }
        }

        if !self.gbuffer_ps.is_empty() {
            let fb = self.gbuffer_fb.ensure(backend, Some(depth), &attachments)?;
            backend.submit_pass(fb, self.gbuffer_ps.pass());
        }

        let fb = self.deferred_fb.ensure(backend, Some(depth), &[color])?;
        backend.submit_pass(fb, &self.deferred_ps);

        super::release_all(
            &mut resources.pool,
            &[&self.gbuffer_material_tx, &self.gbuffer_normal_tx],
        );
        Ok(())
    }

    /// `true` when no opaque geometry was routed this frame.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gbuffer_ps.is_empty() && self.gbuffer_in_front_ps.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn deferred_pass(&self) -> &RenderPass {
        &self.deferred_ps
    }

    pub fn free(&mut self, backend: &mut dyn GpuBackend) {
        self.gbuffer_fb.free(backend);
        self.gbuffer_in_front_fb.free(backend);
        self.deferred_fb.free(backend);
    }
}
