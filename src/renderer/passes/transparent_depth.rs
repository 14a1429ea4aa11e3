//! Transparent depth pass
//!
//! Transparent surfaces do not write depth in the OIT pass. When effects need
//! their depth and object ids (outlines), this pass draws the same objects
//! again with flat shading into the depth buffer:
//!
//! 1. `in_front_ps` draws in-front objects into the in-front depth layer.
//! 2. `merge_ps` copies that layer into the main depth, tagging stencil.
//! 3. `main_ps` draws the remaining objects into the main depth.

use super::StencilBits;
use super::mesh::MeshPass;
use crate::errors::Result;
use crate::renderer::backend::{GpuBackend, SamplerState, TextureHandle};
use crate::renderer::graph::{DrawState, Framebuffer, PassRecorder, RenderPass};
use crate::renderer::pipeline::{PipelineType, ShadingType, UtilityShader};
use crate::renderer::resources::SceneResources;
use crate::renderer::state::SceneState;

#[derive(Debug)]
pub struct TransparentDepthPass {
    pub main_ps: MeshPass,
    pub in_front_ps: MeshPass,
    merge_ps: RenderPass,

    main_fb: Framebuffer,
    in_front_fb: Framebuffer,
    merge_fb: Framebuffer,
}

impl Default for TransparentDepthPass {
    fn default() -> Self {
        Self {
            main_ps: MeshPass::new("TransparentDepth.Main"),
            in_front_ps: MeshPass::new("TransparentDepth.InFront"),
            merge_ps: RenderPass::new("TransparentDepth.Merge"),
            main_fb: Framebuffer::new("transparent_depth_main_fb"),
            in_front_fb: Framebuffer::new("transparent_depth_in_front_fb"),
            merge_fb: Framebuffer::new("transparent_depth_merge_fb"),
        }
    }
}

impl TransparentDepthPass {
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
            | DrawState::WRITE_DEPTH
            | DrawState::DEPTH_LESS_EQUAL
            | scene_state.cull_state
            | scene_state.clip_state;

        self.main_ps.init_pass(resources, state, clip);
        self.main_ps.init_subpasses(
            backend,
            &mut resources.shader_cache,
            PipelineType::Opaque,
            ShadingType::Flat,
            clip,
        )?;

        let in_front_state = state | DrawState::STENCIL_ALWAYS | DrawState::WRITE_STENCIL;
        self.in_front_ps.init_pass(resources, in_front_state, clip);
        self.in_front_ps
            .state_stencil(StencilBits::OBJECT_IN_FRONT, 0xFF, 0x00);
        self.in_front_ps.init_subpasses(
            backend,
            &mut resources.shader_cache,
            PipelineType::Opaque,
            ShadingType::Flat,
            clip,
        )?;

        let shader = resources
            .shader_cache
            .utility_shader_get(backend, UtilityShader::MergeDepth)?;
        let ps = &mut self.merge_ps;
        ps.init();
        ps.state_set(
            DrawState::WRITE_DEPTH
                | DrawState::DEPTH_ALWAYS
                | DrawState::WRITE_STENCIL
                | DrawState::STENCIL_ALWAYS,
        );
        ps.state_stencil(StencilBits::OBJECT_IN_FRONT, 0xFF, 0x00);
        ps.shader_set(shader);
        ps.bind_texture("depth_tx", resources.depth_in_front_tx.slot(), SamplerState::DEFAULT);
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

        let object_ids: Option<TextureHandle> = if scene_state.draw_object_id {
            Some(super::acquired(&resources.object_id_tx, "object id")?)
        } else {
            None
        };
        let colors = object_ids.as_slice();
        let depth = super::acquired(&resources.depth_tx, "depth")?;

        if !self.in_front_ps.is_empty() {
            let depth_in_front = super::acquired(&resources.depth_in_front_tx, "in-front depth")?;
            let fb = self.in_front_fb.ensure(backend, Some(depth_in_front), colors)?;
            backend.submit_pass(fb, self.in_front_ps.pass());

            let fb = self.merge_fb.ensure(backend, Some(depth), &[])?;
            backend.submit_pass(fb, &self.merge_ps);
        }

        if !self.main_ps.is_empty() {
            let fb = self.main_fb.ensure(backend, Some(depth), colors)?;
            backend.submit_pass(fb, self.main_ps.pass());
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.main_ps.is_empty() && self.in_front_ps.is_empty()
    }

    pub fn free(&mut self, backend: &mut dyn GpuBackend) {
        self.main_fb.free(backend);
        self.in_front_fb.free(backend);
        self.merge_fb.free(backend);
    }
}
