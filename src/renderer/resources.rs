//! Shared frame resources
//!
//! [`SceneResources`] owns everything several passes read:
//!
//! | Resource | Lifetime | Notes |
//! |----------|----------|-------|
//! | `shader_cache` | engine | append-only variant cache |
//! | `color_tx`, `depth_tx`, ... | frame | pooled, may alias last frame's storage |
//! | `material_buf` | frame | refilled by object sync |
//! | `world_buf`, `view_buf`, `clip_planes_buf` | engine | rewritten every frame |
//! | `cavity` | engine | kernel rebuilt on settings change |
//! | matcap | host | fallback texture when the host provides none |

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec2, Vec4};

use crate::errors::Result;
use crate::renderer::backend::{ClearValue, GpuBackend, TextureDesc};
use crate::renderer::graph::{
    PersistentTexture, StorageVecBuffer, TextureFromPool, TextureSlot, TransientTexturePool,
    UniformBuffer,
};
use crate::renderer::passes::cavity::CavityEffect;
use crate::renderer::pipeline::ShaderCache;
use crate::renderer::state::{Material, SceneState};
use crate::scene::FrameInput;

/// Idle trims a pooled texture survives before it is freed.
const POOL_MAX_IDLE_FRAMES: u32 = 8;

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const OBJECT_ID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Uint;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

// ─── GPU Structs ──────────────────────────────────────────────────────────────

/// Global shading parameters (`world_data` UBO).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct WorldData {
    pub viewport_size: Vec2,
    pub viewport_size_inv: Vec2,
    pub object_outline_color: Vec4,
    pub background_color: Vec4,

    pub cavity_sample_start: u32,
    pub cavity_sample_end: u32,
    pub cavity_sample_count_inv: f32,
    pub cavity_jitter_scale: f32,
    pub cavity_valley_factor: f32,
    pub cavity_ridge_factor: f32,
    pub cavity_attenuation: f32,
    pub cavity_distance: f32,
    pub curvature_ridge: f32,
    pub curvature_valley: f32,
    pub xray_alpha: f32,
    /// 1 for perspective views, 0 for orthographic.
    pub is_perspective: u32,
    pub _pad: [u32; 4],
}

impl Default for WorldData {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Camera matrices of the frame (`view_data` UBO). `projection` carries the
/// TAA jitter.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ViewData {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
}

impl Default for ViewData {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
        }
    }
}

pub const MAX_CLIP_PLANES: usize = 6;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ClipPlanesData {
    pub planes: [Vec4; MAX_CLIP_PLANES],
    pub count: u32,
    pub _pad: [u32; 3],
}

impl Default for ClipPlanesData {
    fn default() -> Self {
        Self::zeroed()
    }
}

// ─── Scene Resources ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SceneResources {
    pub shader_cache: ShaderCache,
    pub pool: TransientTexturePool,

    current_matcap: Option<String>,
    matcap_tx: TextureSlot,
    fallback_matcap_tx: PersistentTexture,

    pub color_tx: TextureFromPool,
    pub object_id_tx: TextureFromPool,
    pub depth_tx: TextureFromPool,
    pub depth_in_front_tx: TextureFromPool,

    pub material_buf: StorageVecBuffer<Material>,
    pub world_buf: UniformBuffer<WorldData>,
    pub view_buf: UniformBuffer<ViewData>,
    pub clip_planes_buf: UniformBuffer<ClipPlanesData>,

    pub cavity: CavityEffect,
}

impl Default for SceneResources {
    fn default() -> Self {
        Self {
            shader_cache: ShaderCache::new(),
            pool: TransientTexturePool::new(),
            current_matcap: None,
            matcap_tx: TextureSlot::new(),
            fallback_matcap_tx: PersistentTexture::new(),
            color_tx: TextureFromPool::new("wb_color_tx"),
            object_id_tx: TextureFromPool::new("wb_object_id_tx"),
            depth_tx: TextureFromPool::new("wb_depth_tx"),
            depth_in_front_tx: TextureFromPool::new("wb_depth_in_front_tx"),
            material_buf: StorageVecBuffer::new("material_buf"),
            world_buf: UniformBuffer::new("world_buf", WorldData::default()),
            view_buf: UniformBuffer::new("view_buf", ViewData::default()),
            clip_planes_buf: UniformBuffer::new("clip_planes_buf", ClipPlanesData::default()),
            cavity: CavityEffect::new(),
        }
    }
}

impl SceneResources {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-frame setup, run right after [`SceneState::init`].
    pub fn init(
        &mut self,
        backend: &mut dyn GpuBackend,
        scene_state: &SceneState,
        frame: &FrameInput,
        taa_sample: u32,
    ) -> Result<()> {
        if scene_state.resolution_changed {
            // Every pooled texture has the old size.
            self.pool.trim(backend, 0);
        } else {
            self.pool.trim(backend, POOL_MAX_IDLE_FRAMES);
        }

        self.sync_matcap(backend, frame)?;

        let size = scene_state.resolution.as_vec2();
        let world = &mut self.world_buf.data;
        world.viewport_size = size;
        world.viewport_size_inv = size.recip();
        world.object_outline_color = scene_state.shading.outline_color;
        world.background_color = scene_state.background_color;
        world.xray_alpha = if scene_state.xray_mode {
            scene_state.shading.xray_alpha
        } else {
            1.0
        };
        world.is_perspective = u32::from(scene_state.camera.is_perspective());
        self.cavity.init(backend, scene_state, taa_sample, world)?;

        let clip = &mut self.clip_planes_buf.data;
        *clip = ClipPlanesData::default();
        for (dst, src) in clip.planes.iter_mut().zip(scene_state.clip_planes.iter()) {
            *dst = *src;
        }
        clip.count = scene_state.clip_planes.len().min(MAX_CLIP_PLANES) as u32;

        let view = scene_state.camera.view;
        let projection = scene_state.camera.projection;
        self.view_buf.data = ViewData {
            view,
            projection,
            view_projection: projection * view,
        };

        self.material_buf.clear();
        Ok(())
    }

    fn sync_matcap(&mut self, backend: &mut dyn GpuBackend, frame: &FrameInput) -> Result<()> {
        let name = &frame.shading.matcap;
        let changed = self.current_matcap.as_deref() != Some(name.as_str());
        if let Some(texture) = frame.matcap_texture {
            if changed {
                log::debug!("Matcap '{name}' bound");
            }
            self.fallback_matcap_tx.free(backend);
            self.matcap_tx.set(Some(texture));
        } else {
            if changed || self.fallback_matcap_tx.handle().is_none() {
                log::warn!("Matcap '{name}' has no texture, using fallback");
            }
            let desc = TextureDesc::sampled("matcap_fallback_tx", UVec2::ONE, wgpu::TextureFormat::Rgba8Unorm);
            if self.fallback_matcap_tx.ensure_2d(backend, &desc)?
                && let Some(handle) = self.fallback_matcap_tx.handle()
            {
                backend.upload_texture(handle, &[204, 204, 204, 255]);
            }
            self.matcap_tx.set(self.fallback_matcap_tx.handle());
        }
        self.current_matcap = Some(name.clone());
        Ok(())
    }

    /// Uploads the CPU-side buffers. Run once all objects are synced.
    pub fn upload(&mut self, backend: &mut dyn GpuBackend) -> Result<()> {
        self.world_buf.push_update(backend)?;
        self.view_buf.push_update(backend)?;
        self.clip_planes_buf.push_update(backend)?;
        self.material_buf.push_update(backend)?;
        Ok(())
    }

    /// Acquires the frame targets and clears them.
    pub fn acquire_frame_textures(
        &mut self,
        backend: &mut dyn GpuBackend,
        scene_state: &SceneState,
        needs_in_front_depth: bool,
    ) -> Result<()> {
        let resolution = scene_state.resolution;
        let color = self.color_tx.acquire(
            &mut self.pool,
            backend,
            &TextureDesc::target("", resolution, COLOR_FORMAT),
        )?;
        let background = scene_state.background_color;
        backend.clear_texture(
            color,
            ClearValue::Color(wgpu::Color {
                r: f64::from(background.x),
                g: f64::from(background.y),
                b: f64::from(background.z),
                a: f64::from(background.w),
            }),
        );

        if scene_state.draw_object_id {
            let ids = self.object_id_tx.acquire(
                &mut self.pool,
                backend,
                &TextureDesc::target("", resolution, OBJECT_ID_FORMAT),
            )?;
            backend.clear_texture(ids, ClearValue::UInt(0));
        }

        let depth_clear = ClearValue::DepthStencil {
            depth: 1.0,
            stencil: 0,
        };
        let depth = self.depth_tx.acquire(
            &mut self.pool,
            backend,
            &TextureDesc::target("", resolution, DEPTH_FORMAT),
        )?;
        backend.clear_texture(depth, depth_clear);

        if needs_in_front_depth {
            let depth = self.depth_in_front_tx.acquire(
                &mut self.pool,
                backend,
                &TextureDesc::target("", resolution, DEPTH_FORMAT),
            )?;
            backend.clear_texture(depth, depth_clear);
        }
        Ok(())
    }

    /// Returns every frame texture to the pool.
    pub fn end_frame(&mut self) {
        self.color_tx.release(&mut self.pool);
        self.object_id_tx.release(&mut self.pool);
        self.depth_tx.release(&mut self.pool);
        self.depth_in_front_tx.release(&mut self.pool);
        self.pool.reset();
    }

    #[inline]
    #[must_use]
    pub fn matcap_slot(&self) -> &TextureSlot {
        &self.matcap_tx
    }

    /// Frees every GPU object owned by the resources.
    pub fn release_all(&mut self, backend: &mut dyn GpuBackend) {
        self.end_frame();
        self.pool.release_all(backend);
        self.shader_cache.release_all(backend);
        self.fallback_matcap_tx.free(backend);
        self.matcap_tx.set(None);
        self.material_buf.free(backend);
        self.world_buf.free(backend);
        self.view_buf.free(backend);
        self.clip_planes_buf.free(backend);
        self.cavity.free(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::HeadlessBackend;
    use crate::scene::ViewportTargets;

    fn frame(backend: &mut HeadlessBackend) -> FrameInput {
        let desc = TextureDesc::target("host", UVec2::new(8, 8), wgpu::TextureFormat::Rgba8Unorm);
        let targets = ViewportTargets {
            color: backend.allocate_texture(&desc).unwrap(),
            depth: backend.allocate_texture(&desc).unwrap(),
        };
        FrameInput::new(UVec2::new(8, 8), targets)
    }

    #[test]
    fn test_world_data_is_std140_sized() {
        assert_eq!(size_of::<WorldData>() % 16, 0);
        assert_eq!(size_of::<ClipPlanesData>() % 16, 0);
        assert_eq!(size_of::<Material>(), 16);
    }

    #[test]
    fn test_missing_matcap_uses_fallback() {
        let mut backend = HeadlessBackend::new();
        let input = frame(&mut backend);
        let mut state = SceneState::new();
        state.init(&input);
        let mut resources = SceneResources::new();

        resources.init(&mut backend, &state, &input, 0).unwrap();
        let fallback = resources.matcap_slot().get();
        assert!(fallback.is_some());

        let mut with_matcap = input.clone();
        with_matcap.matcap_texture = Some(input.targets.color);
        resources.init(&mut backend, &state, &with_matcap, 0).unwrap();
        assert_eq!(resources.matcap_slot().get(), Some(input.targets.color));

        with_matcap.shading.matcap = "metal".into();
        resources.init(&mut backend, &state, &with_matcap, 0).unwrap();
        assert_eq!(backend.texture_desc(fallback.unwrap()), None);
    }

    #[test]
    fn test_frame_textures_follow_toggles() {
        let mut backend = HeadlessBackend::new();
        let input = frame(&mut backend);
        let mut state = SceneState::new();
        state.init(&input);
        let mut resources = SceneResources::new();
        resources.init(&mut backend, &state, &input, 0).unwrap();

        resources.acquire_frame_textures(&mut backend, &state, false).unwrap();
        assert!(resources.color_tx.handle().is_some());
        assert!(resources.depth_tx.handle().is_some());
        assert!(resources.object_id_tx.handle().is_none());
        assert!(resources.depth_in_front_tx.handle().is_none());

        resources.end_frame();
        assert_eq!(resources.pool.active_count(), 0);

        resources.release_all(&mut backend);
        assert_eq!(backend.live_texture_count(), 2);
        assert_eq!(backend.live_buffer_count(), 0);
    }
}
