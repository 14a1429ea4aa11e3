//! Per-frame scene snapshot
//!
//! [`SceneState::init`] is the single place where host settings are turned
//! into pipeline decisions for the frame: effect toggles, draw-state flags,
//! the AA budget and whether temporal accumulation must restart.
//!
//! The state persists between frames so changes can be detected; every field
//! is recomputed on each `init`.

use glam::{Mat4, UVec2, Vec4};
use smallvec::SmallVec;

use super::material::Material;
use crate::renderer::graph::DrawState;
use crate::renderer::pipeline::ShadingType;
use crate::scene::{
    CameraSettings, DisplaySettings, FrameInput, ImagePaintSettings, ShadingFlags, ShadingSettings,
};

#[derive(Debug, Clone)]
pub struct SceneState {
    pub view_projection: Mat4,
    pub resolution: UVec2,
    pub camera: CameraSettings,
    pub shading: ShadingSettings,
    pub shading_type: ShadingType,
    pub display: DisplaySettings,
    pub image_paint: ImagePaintSettings,
    pub is_image_render: bool,
    /// X-ray enabled with an alpha below 1.
    pub xray_mode: bool,

    pub cull_state: DrawState,
    pub clip_state: DrawState,
    pub clip_planes: SmallVec<[Vec4; 6]>,

    pub background_color: Vec4,

    pub draw_cavity: bool,
    pub draw_curvature: bool,
    pub draw_outline: bool,
    pub draw_dof: bool,
    pub draw_object_id: bool,
    pub draw_transparent_depth: bool,

    /// TAA sample budget; 0 disables anti-aliasing.
    pub aa_samples: u32,
    pub reset_taa: bool,
    /// Carried over to force a reset on the next frame too.
    pub reset_taa_next_sample: bool,
    /// Set when the resolution differs from the previous frame.
    pub resolution_changed: bool,

    /// Used by [`MaterialSubType::Single`](super::object_state::MaterialSubType::Single).
    pub material_override: Material,
    pub material_attribute_color: Material,

    initialized: bool,
}

impl Default for SceneState {
    fn default() -> Self {
        Self {
            view_projection: Mat4::IDENTITY,
            resolution: UVec2::ZERO,
            camera: CameraSettings::default(),
            shading: ShadingSettings::default(),
            shading_type: ShadingType::Studio,
            display: DisplaySettings::default(),
            image_paint: ImagePaintSettings::default(),
            is_image_render: false,
            xray_mode: false,
            cull_state: DrawState::empty(),
            clip_state: DrawState::empty(),
            clip_planes: SmallVec::new(),
            background_color: Vec4::ZERO,
            draw_cavity: false,
            draw_curvature: false,
            draw_outline: false,
            draw_dof: false,
            draw_object_id: false,
            draw_transparent_depth: false,
            aa_samples: 0,
            reset_taa: true,
            reset_taa_next_sample: false,
            resolution_changed: false,
            material_override: Material::from_color(glam::Vec3::ONE),
            material_attribute_color: Material::ATTRIBUTE_COLOR,
            initialized: false,
        }
    }
}

impl SceneState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, frame: &FrameInput) {
        self.reset_taa = self.reset_taa_next_sample || !self.initialized;
        self.reset_taa_next_sample = false;

        let resolution = frame.resolution.max(UVec2::ONE);
        self.resolution_changed = self.initialized && resolution != self.resolution;
        if resolution != self.resolution {
            self.resolution = resolution;
            self.reset_taa = true;
        }

        let view_projection = frame.camera.view_projection();
        if view_projection != self.view_projection {
            self.view_projection = view_projection;
            self.reset_taa = true;
        }

        let mut shading = frame.shading.clone();
        self.xray_mode =
            shading.flags.contains(ShadingFlags::XRAY) && shading.xray_alpha < 1.0;
        if self.xray_mode {
            shading.flags.remove(ShadingFlags::CAVITY);
        }
        if shading != self.shading {
            self.reset_taa = true;
        }
        self.shading = shading;
        self.shading_type = self.shading.lighting;
        if frame.camera != self.camera {
            self.camera = frame.camera.clone();
            self.reset_taa = true;
        }
        if frame.display != self.display {
            self.display = frame.display.clone();
            self.reset_taa = true;
        }
        if frame.image_paint != self.image_paint {
            self.image_paint = frame.image_paint.clone();
            self.reset_taa = true;
        }
        if frame.is_image_render != self.is_image_render {
            self.is_image_render = frame.is_image_render;
            self.reset_taa = true;
        }

        self.cull_state = if self.shading.flags.contains(ShadingFlags::BACKFACE_CULLING) {
            DrawState::CULL_BACK
        } else {
            DrawState::empty()
        };
        if frame.clip_planes != self.clip_planes {
            self.clip_planes = frame.clip_planes.clone();
            self.reset_taa = true;
        }
        self.clip_state = if self.clip_planes.is_empty() {
            DrawState::empty()
        } else {
            DrawState::CLIP_PLANES
        };

        let background_color = if frame.is_image_render && !frame.film_transparent {
            frame.world_color.extend(1.0)
        } else {
            Vec4::ZERO
        };
        if background_color != self.background_color {
            self.background_color = background_color;
            self.reset_taa = true;
        }

        self.aa_samples = if frame.is_image_render {
            frame.display.render_aa.sample_count()
        } else {
            frame.display.viewport_aa.sample_count()
        };
        if !frame.is_image_render && (frame.is_navigating || frame.is_playback) {
            // Restart as soon as the view settles.
            self.reset_taa = true;
            self.reset_taa_next_sample = true;
            self.aa_samples = self.aa_samples.min(1);
        }

        let cavity = self.shading.flags.contains(ShadingFlags::CAVITY);
        self.draw_cavity = cavity && self.shading.cavity_type.world();
        self.draw_curvature = cavity && self.shading.cavity_type.screen();
        self.draw_outline = self.shading.flags.contains(ShadingFlags::OBJECT_OUTLINE);
        self.draw_dof = !self.xray_mode && self.camera.active_dof().is_some();
        self.draw_transparent_depth = self.draw_outline;
        self.draw_object_id = self.draw_outline || self.draw_curvature;

        self.material_override = Material::from_color(self.shading.single_color);
        self.initialized = true;
    }

    /// Marks the scene contents as changed since the last frame. The next
    /// [`init`](Self::init) restarts temporal accumulation.
    pub fn tag_update(&mut self) {
        self.reset_taa_next_sample = true;
    }

    #[inline]
    #[must_use]
    pub fn use_clip_planes(&self) -> bool {
        !self.clip_planes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::{GpuBackend, HeadlessBackend, TextureDesc};
    use crate::scene::{AntiAliasingMode, CavityType, DofSettings, ViewportTargets};

    fn frame() -> FrameInput {
        let mut backend = HeadlessBackend::new();
        let desc = TextureDesc::target("t", UVec2::ONE, wgpu::TextureFormat::Rgba8Unorm);
        let targets = ViewportTargets {
            color: backend.allocate_texture(&desc).unwrap(),
            depth: backend.allocate_texture(&desc).unwrap(),
        };
        FrameInput::new(UVec2::new(64, 32), targets)
    }

    #[test]
    fn test_first_init_resets() {
        let mut state = SceneState::new();
        state.init(&frame());
        assert!(state.reset_taa);
        assert!(!state.resolution_changed);
        state.init(&frame());
        assert!(!state.reset_taa);
    }

    #[test]
    fn test_resolution_change_resets() {
        let mut state = SceneState::new();
        let mut input = frame();
        state.init(&input);
        input.resolution = UVec2::new(128, 32);
        state.init(&input);
        assert!(state.reset_taa);
        assert!(state.resolution_changed);
    }

    #[test]
    fn test_navigation_clamps_and_carries_reset() {
        let mut state = SceneState::new();
        let mut input = frame();
        input.display.viewport_aa = AntiAliasingMode::Samples16;
        state.init(&input);

        input.is_navigating = true;
        state.init(&input);
        assert_eq!(state.aa_samples, 1);
        assert!(state.reset_taa && state.reset_taa_next_sample);

        input.is_navigating = false;
        state.init(&input);
        assert!(state.reset_taa);
        assert_eq!(state.aa_samples, 16);
        state.init(&input);
        assert!(!state.reset_taa);
    }

    #[test]
    fn test_xray_disables_cavity_and_dof() {
        let mut state = SceneState::new();
        let mut input = frame();
        input.shading.flags = ShadingFlags::CAVITY | ShadingFlags::XRAY;
        input.shading.cavity_type = CavityType::Both;
        input.camera.is_camera_view = true;
        input.camera.dof = Some(DofSettings::default());
        state.init(&input);
        assert!(state.xray_mode);
        assert!(!state.draw_cavity && !state.draw_curvature && !state.draw_dof);

        input.shading.xray_alpha = 1.0;
        state.init(&input);
        assert!(!state.xray_mode);
        assert!(state.draw_cavity && state.draw_curvature && state.draw_dof);
        assert!(state.draw_object_id);
    }

    #[test]
    fn test_outline_requires_ids_and_transparent_depth() {
        let mut state = SceneState::new();
        let mut input = frame();
        input.shading.flags = ShadingFlags::OBJECT_OUTLINE;
        state.init(&input);
        assert!(state.draw_outline && state.draw_transparent_depth && state.draw_object_id);
    }

    #[test]
    fn test_background_only_for_opaque_image_renders() {
        let mut state = SceneState::new();
        let mut input = frame();
        state.init(&input);
        assert_eq!(state.background_color, Vec4::ZERO);

        input.is_image_render = true;
        state.init(&input);
        assert_eq!(state.background_color.w, 1.0);

        input.film_transparent = true;
        state.init(&input);
        assert_eq!(state.background_color, Vec4::ZERO);
    }

    #[test]
    fn test_cull_and_clip_state() {
        let mut state = SceneState::new();
        let mut input = frame();
        input.shading.flags = ShadingFlags::BACKFACE_CULLING;
        input.clip_planes.push(Vec4::new(0.0, 0.0, 1.0, 0.0));
        state.init(&input);
        assert_eq!(state.cull_state, DrawState::CULL_BACK);
        assert_eq!(state.clip_state, DrawState::CLIP_PLANES);
    }
}
