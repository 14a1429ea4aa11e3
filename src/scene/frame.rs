//! Per-frame host input

use glam::{UVec2, Vec3, Vec4};
use smallvec::SmallVec;

use super::camera::CameraSettings;
use super::shading::{DisplaySettings, ImagePaintSettings, ShadingSettings};
use crate::renderer::backend::TextureHandle;

/// Final color and depth targets owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportTargets {
    pub color: TextureHandle,
    pub depth: TextureHandle,
}

/// Everything the pipeline reads from the host for one frame, objects aside.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInput {
    pub resolution: UVec2,
    pub camera: CameraSettings,
    pub shading: ShadingSettings,
    pub display: DisplaySettings,
    pub image_paint: ImagePaintSettings,
    pub world_color: Vec3,
    /// Final (F12) render instead of an interactive viewport.
    pub is_image_render: bool,
    pub film_transparent: bool,
    /// The user is orbiting / panning the view.
    pub is_navigating: bool,
    pub is_playback: bool,
    /// Clip planes in world space (`xyz` normal, `w` offset).
    pub clip_planes: SmallVec<[Vec4; 6]>,
    /// Texture of [`ShadingSettings::matcap`]; a fallback is bound when absent.
    pub matcap_texture: Option<TextureHandle>,
    pub targets: ViewportTargets,
}

impl FrameInput {
    #[must_use]
    pub fn new(resolution: UVec2, targets: ViewportTargets) -> Self {
        Self {
            resolution,
            camera: CameraSettings::default(),
            shading: ShadingSettings::default(),
            display: DisplaySettings::default(),
            image_paint: ImagePaintSettings::default(),
            world_color: Vec3::splat(0.05),
            is_image_render: false,
            film_transparent: false,
            is_navigating: false,
            is_playback: false,
            clip_planes: SmallVec::new(),
            matcap_texture: None,
            targets,
        }
    }
}
