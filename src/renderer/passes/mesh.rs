//! Mesh passes
//!
//! A [`MeshPass`] is a [`RenderPass`] whose sub-passes are grouped by shader
//! variant. Every frame it holds:
//!
//! - a static grid of sub-passes, one per `(GeometryType, ColorType)`, each
//!   bound to its prepass variant;
//! - a dynamic set of texture sub-passes, one per `(image texture, geometry)`,
//!   created on first use within the frame.
//!
//! Draws without an image (or with an image that has no GPU texture) land in
//! the material-colored grid entry of their geometry type.

use rustc_hash::FxHashMap;

use crate::errors::{Result, WorkbenchError};
use crate::renderer::backend::{ClearValue, GpuBackend, SamplerState, ShaderHandle};
use crate::renderer::graph::{
    DrawCall, DrawState, PassRecorder, PushConstant, RenderPass, SubPassId,
};
use crate::renderer::pipeline::{ColorType, GeometryType, PipelineType, ShaderCache, ShadingType};
use crate::renderer::resources::SceneResources;
use crate::scene::{ImageRef, ImageTexture, ImageUser};

/// Alpha below which texture-colored fragments are discarded.
const IMAGE_TRANSPARENCY_CUTOFF: f32 = 0.1;

type SubPassGrid = [[SubPassId; ColorType::COUNT]; GeometryType::COUNT];

#[derive(Debug)]
pub struct MeshPass {
    pass: RenderPass,
    grid: Option<SubPassGrid>,
    texture_shaders: [Option<ShaderHandle>; GeometryType::COUNT],
    texture_subpasses: FxHashMap<(ImageTexture, GeometryType), SubPassId>,
    is_empty: bool,
}

impl MeshPass {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            pass: RenderPass::new(name),
            grid: None,
            texture_shaders: [None; GeometryType::COUNT],
            texture_subpasses: FxHashMap::default(),
            is_empty: true,
        }
    }

    /// Resets the pass for a new frame and records the shared header.
    pub fn init_pass(&mut self, resources: &SceneResources, state: DrawState, clip: bool) {
        self.pass.init();
        self.grid = None;
        self.texture_shaders = [None; GeometryType::COUNT];
        self.texture_subpasses.clear();
        self.is_empty = true;

        self.pass.state_set(state);
        self.pass
            .bind_texture("matcap_tx", resources.matcap_slot(), SamplerState::LINEAR);
        self.pass.bind_ssbo("materials_data", resources.material_buf.slot());
        self.pass.bind_ubo("world_data", resources.world_buf.slot());
        self.pass.bind_ubo("view_data", resources.view_buf.slot());
        if clip {
            self.pass.bind_ubo("clip_planes", resources.clip_planes_buf.slot());
        }
    }

    /// Builds the static sub-pass grid, compiling missing variants.
    pub fn init_subpasses(
        &mut self,
        backend: &mut dyn GpuBackend,
        shaders: &mut ShaderCache,
        pipeline: PipelineType,
        shading: ShadingType,
        clip: bool,
    ) -> Result<()> {
        let mut grid = [[SubPassId(0); ColorType::COUNT]; GeometryType::COUNT];
        for geometry in GeometryType::ALL {
            for color in ColorType::ALL {
                let shader =
                    shaders.prepass_shader_get(backend, pipeline, geometry, color, shading, clip)?;
                let id = self
                    .pass
                    .sub(format!("{}.{}", geometry.as_str(), color.as_str()));
                self.pass.subpass_mut(id).shader_set(shader);
                grid[geometry.index()][color.index()] = id;
                if color == ColorType::Texture {
                    self.texture_shaders[geometry.index()] = Some(shader);
                }
            }
        }
        self.grid = Some(grid);
        Ok(())
    }

    /// Returns the sub-pass a draw of `geometry` with `image` goes to.
    ///
    /// Images are isolated in their own sub-pass so their texture bindings
    /// do not leak into other draws. Each distinct texture gets exactly one
    /// sub-pass per geometry type per frame.
    pub fn sub_pass_get(
        &mut self,
        geometry: GeometryType,
        image: Option<&ImageRef>,
        sampler: SamplerState,
        iuser: Option<&ImageUser>,
    ) -> Result<SubPassId> {
        let Some(grid) = self.grid else {
            return Err(WorkbenchError::Configuration(format!(
                "mesh pass '{}' used before init_subpasses",
                self.pass.name()
            )));
        };

        if let Some(image) = image {
            let texture = image.texture(iuser);
            if texture != ImageTexture::Missing {
                return Ok(self.texture_subpass(geometry, image, texture, sampler));
            }
        }
        Ok(grid[geometry.index()][ColorType::Material.index()])
    }

    fn texture_subpass(
        &mut self,
        geometry: GeometryType,
        image: &ImageRef,
        texture: ImageTexture,
        sampler: SamplerState,
    ) -> SubPassId {
        if let Some(id) = self.texture_subpasses.get(&(texture, geometry)) {
            return *id;
        }

        let id = self.pass.sub(image.name.clone());
        let shader = self.texture_shaders[geometry.index()];
        let sub = self.pass.subpass_mut(id);
        // Texture sub-passes replay after the grid, so the shader is set again.
        if let Some(shader) = shader {
            sub.shader_set(shader);
        }
        match texture {
            ImageTexture::Single(tx) => {
                sub.bind_texture("image_tx", tx, sampler);
                sub.push_constant("isImageTile", PushConstant::Bool(false));
            }
            ImageTexture::Tiled { tiles, tile_map } => {
                sub.bind_texture("image_tile_array", tiles, sampler);
                sub.bind_texture("image_tile_data", tile_map, SamplerState::DEFAULT);
                sub.push_constant("isImageTile", PushConstant::Bool(true));
            }
            ImageTexture::Missing => {}
        }
        sub.push_constant("imagePremult", PushConstant::Bool(image.alpha_premultiplied));
        sub.push_constant(
            "imageTransparencyCutoff",
            PushConstant::Float(IMAGE_TRANSPARENCY_CUTOFF),
        );

        self.texture_subpasses.insert((texture, geometry), id);
        id
    }

    /// Records a draw into sub-pass `id`.
    pub fn draw(&mut self, id: SubPassId, call: DrawCall) {
        self.pass.subpass_mut(id).draw(call);
        self.is_empty = false;
    }

    /// Adds a stencil setup to the pass header (before every sub-pass).
    pub fn state_stencil(&mut self, write_mask: u8, reference: u8, compare_mask: u8) {
        self.pass.state_stencil(write_mask, reference, compare_mask);
    }

    pub fn clear(&mut self, values: &[ClearValue]) {
        self.pass.clear(values);
    }

    /// `true` until the first draw of the frame.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    #[inline]
    #[must_use]
    pub fn pass(&self) -> &RenderPass {
        &self.pass
    }

    /// Number of texture sub-passes created this frame.
    #[must_use]
    pub fn texture_subpass_count(&self) -> usize {
        self.texture_subpasses.len()
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use super::*;
    use crate::renderer::backend::{HeadlessBackend, TextureDesc};
    use crate::renderer::graph::{BatchHandle, PassCommand, ResourceHandle};

    fn setup(backend: &mut HeadlessBackend, resources: &mut SceneResources) -> MeshPass {
        let mut pass = MeshPass::new("Test.Mesh");
        pass.init_pass(resources, DrawState::WRITE_COLOR, false);
        pass.init_subpasses(
            backend,
            &mut resources.shader_cache,
            PipelineType::Opaque,
            ShadingType::Studio,
            false,
        )
        .unwrap();
        pass
    }

    fn call() -> DrawCall {
        DrawCall {
            batch: BatchHandle(0),
            resource: ResourceHandle(0),
            material_index: 0,
        }
    }

    #[test]
    fn test_grid_compiles_every_variant() {
        let mut backend = HeadlessBackend::new();
        let mut resources = SceneResources::new();
        let pass = setup(&mut backend, &mut resources);
        assert_eq!(pass.pass().subpasses().len(), 6);
        assert_eq!(backend.stats().shaders_compiled, 6);
        assert!(pass.is_empty());
    }

    #[test]
    fn test_untextured_draws_share_grid_entry() {
        let mut backend = HeadlessBackend::new();
        let mut resources = SceneResources::new();
        let mut pass = setup(&mut backend, &mut resources);

        let a = pass
            .sub_pass_get(GeometryType::Mesh, None, SamplerState::DEFAULT, None)
            .unwrap();
        let missing = ImageRef::still("missing", ImageTexture::Missing);
        let b = pass
            .sub_pass_get(GeometryType::Mesh, Some(&missing), SamplerState::DEFAULT, None)
            .unwrap();
        let c = pass
            .sub_pass_get(GeometryType::Curves, None, SamplerState::DEFAULT, None)
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(pass.pass().subpasses().len(), 6);
    }

    #[test]
    fn test_texture_subpass_per_image_and_geometry() {
        let mut backend = HeadlessBackend::new();
        let mut resources = SceneResources::new();
        let mut pass = setup(&mut backend, &mut resources);
        let desc = TextureDesc::sampled("wood", UVec2::ONE, wgpu::TextureFormat::Rgba8Unorm);
        let wood = ImageRef::still("wood", ImageTexture::Single(backend.allocate_texture(&desc).unwrap()));

        let a = pass
            .sub_pass_get(GeometryType::Mesh, Some(&wood), SamplerState::LINEAR, None)
            .unwrap();
        let b = pass
            .sub_pass_get(GeometryType::Mesh, Some(&wood), SamplerState::LINEAR, None)
            .unwrap();
        let c = pass
            .sub_pass_get(GeometryType::PointCloud, Some(&wood), SamplerState::LINEAR, None)
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(pass.texture_subpass_count(), 2);

        let sub = pass.pass().subpass(a);
        assert_eq!(sub.name(), "wood");
        assert!(matches!(sub.commands()[0], PassCommand::Shader(_)));
        assert!(sub.commands().iter().any(|c| matches!(
            c,
            PassCommand::Push {
                name: "imageTransparencyCutoff",
                value: PushConstant::Float(v)
            } if (*v - 0.1).abs() < 1e-6
        )));
    }

    #[test]
    fn test_tiled_image_binds_tile_map() {
        let mut backend = HeadlessBackend::new();
        let mut resources = SceneResources::new();
        let mut pass = setup(&mut backend, &mut resources);
        let desc = TextureDesc::sampled("udim", UVec2::ONE, wgpu::TextureFormat::Rgba8Unorm);
        let udim = ImageRef::still(
            "udim",
            ImageTexture::Tiled {
                tiles: backend.allocate_texture(&desc).unwrap(),
                tile_map: backend.allocate_texture(&desc).unwrap(),
            },
        );
        let id = pass
            .sub_pass_get(GeometryType::Mesh, Some(&udim), SamplerState::DEFAULT, None)
            .unwrap();
        let slots: Vec<_> = pass
            .pass()
            .subpass(id)
            .commands()
            .iter()
            .filter_map(|c| match c {
                PassCommand::Texture { slot, .. } => Some(*slot),
                _ => None,
            })
            .collect();
        assert_eq!(slots, ["image_tile_array", "image_tile_data"]);
    }

    #[test]
    fn test_is_empty_tracks_draws() {
        let mut backend = HeadlessBackend::new();
        let mut resources = SceneResources::new();
        let mut pass = setup(&mut backend, &mut resources);
        let id = pass
            .sub_pass_get(GeometryType::Mesh, None, SamplerState::DEFAULT, None)
            .unwrap();
        assert!(pass.is_empty());
        pass.draw(id, call());
        assert!(!pass.is_empty());

        pass.init_pass(&resources, DrawState::WRITE_COLOR, false);
        assert!(pass.is_empty());
    }

    #[test]
    fn test_sub_pass_get_before_grid_is_an_error() {
        let resources = SceneResources::new();
        let mut pass = MeshPass::new("Test.Mesh");
        pass.init_pass(&resources, DrawState::WRITE_COLOR, true);
        assert!(matches!(
            pass.sub_pass_get(GeometryType::Mesh, None, SamplerState::DEFAULT, None),
            Err(WorkbenchError::Configuration(_))
        ));
    }
}
