//! Per-object classification
//!
//! Decides, for one object, where its color comes from and whether it is
//! drawn per material slot. Construction is pure: the same scene state and
//! object always give the same [`ObjectState`].

use super::scene_state::SceneState;
use crate::renderer::backend::SamplerState;
use crate::renderer::pipeline::{ColorType, GeometryType};
use crate::scene::{DisplayType, DrawableObject, ImageRef, ObjectMode, PaintMode, ShadingColor};

/// Where a material-colored draw gets its [`Material`](super::Material).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialSubType {
    Object,
    Material,
    Random,
    Single,
    Attribute,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectState {
    /// Effective color mode after fallbacks and paint-mode overrides.
    pub color_type: ShadingColor,
    pub sculpt_pbvh: bool,
    pub texture_paint_mode: bool,
    /// Paint canvas replacing every material image.
    pub image_paint_override: Option<ImageRef>,
    pub override_sampler_state: SamplerState,

    pub material_type: ColorType,
    pub material_subtype: MaterialSubType,
    pub use_per_material_batches: bool,
}

impl ObjectState {
    #[must_use]
    pub fn new(scene_state: &SceneState, object: &DrawableObject) -> Self {
        let is_mesh = object.geometry == GeometryType::Mesh;
        let has_uv = is_mesh && object.has_uv;
        let has_color = is_mesh && object.has_color_attribute;
        let sculpt_pbvh = object.sculpt_pbvh && !scene_state.is_image_render;

        let mut color_type = scene_state.shading.color;
        let mut texture_paint_mode = false;
        let mut image_paint_override = None;
        let mut override_sampler_state = SamplerState::DEFAULT;

        if color_type == ShadingColor::Texture
            && (!has_uv || object.display_type < DisplayType::Textured)
        {
            color_type = ShadingColor::Material;
        } else if color_type == ShadingColor::Vertex && !has_color {
            color_type = ShadingColor::Object;
        }

        if sculpt_pbvh {
            if color_type == ShadingColor::Texture {
                color_type = ShadingColor::Material;
            }
        } else if is_mesh && object.is_active() && !scene_state.is_image_render {
            match object.mode {
                ObjectMode::TexturePaint if has_uv => {
                    color_type = ShadingColor::Texture;
                    texture_paint_mode = true;
                    let paint = &scene_state.image_paint;
                    if paint.mode == PaintMode::Image {
                        image_paint_override.clone_from(&paint.canvas);
                        override_sampler_state = SamplerState {
                            filter: if paint.interpolation_closest {
                                wgpu::FilterMode::Nearest
                            } else {
                                wgpu::FilterMode::Linear
                            },
                            address_mode: wgpu::AddressMode::Repeat,
                        };
                    }
                }
                ObjectMode::TexturePaint => color_type = ShadingColor::Material,
                ObjectMode::VertexPaint if has_color => color_type = ShadingColor::Vertex,
                _ => {}
            }
        }

        let material_type = if color_type == ShadingColor::Texture {
            ColorType::Texture
        } else {
            ColorType::Material
        };
        let material_subtype = match color_type {
            ShadingColor::Single => MaterialSubType::Single,
            ShadingColor::Object => MaterialSubType::Object,
            ShadingColor::Random => MaterialSubType::Random,
            ShadingColor::Vertex => MaterialSubType::Attribute,
            ShadingColor::Material | ShadingColor::Texture => MaterialSubType::Material,
        };
        let use_per_material_batches = image_paint_override.is_none()
            && matches!(color_type, ShadingColor::Texture | ShadingColor::Material);

        Self {
            color_type,
            sculpt_pbvh,
            texture_paint_mode,
            image_paint_override,
            override_sampler_state,
            material_type,
            material_subtype,
            use_per_material_batches,
        }
    }
}
