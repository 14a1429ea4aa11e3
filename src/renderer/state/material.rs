//! Material Resolution
//!
//! [`Material`] is the GPU-side surface description: a base color plus
//! metallic, roughness and alpha packed into one `u32`:
//!
//! ```text
//!  31      24 23      16 15       8 7        0
//! ┌──────────┬──────────┬──────────┬──────────┐
//! │  unused  │  alpha   │ rough²   │ metallic │
//! └──────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! Roughness is squared before quantization (Disney remap) so the shader can
//! use it directly. An alpha byte below 255 marks the material transparent.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4Swizzles};

use crate::renderer::backend::SamplerState;
use crate::scene::{DrawableObject, Extension, ImageNode, ImageRef, ImageUser, Interpolation, MaterialData};
use crate::utils::sampling::{hash_to_unit_float, hsv_to_rgb, identity_hash};

const DEFAULT_ROUGHNESS: f32 = 0.4;
const ALPHA_MASK: u32 = 0x00ff_0000;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Material {
    pub base_color: Vec3,
    pub packed_data: u32,
}

impl Default for Material {
    fn default() -> Self {
        Self::from_color(Vec3::splat(0.8))
    }
}

impl Material {
    /// Sentinel telling the shader to read the vertex color attribute.
    pub const ATTRIBUTE_COLOR: Self = Self {
        base_color: Vec3::NEG_ONE,
        packed_data: 0x00ff_0000 | 0x2900,
    };

    /// Opaque, non-metallic surface of the given color.
    #[must_use]
    pub fn from_color(color: Vec3) -> Self {
        Self {
            base_color: color,
            packed_data: Self::pack_data(0.0, DEFAULT_ROUGHNESS, 1.0),
        }
    }

    /// Material from the object color, or a stable random color.
    #[must_use]
    pub fn from_object(object: &DrawableObject, random: bool) -> Self {
        let base_color = if random {
            random_color(object)
        } else {
            object.color.xyz()
        };
        Self {
            base_color,
            packed_data: Self::pack_data(0.0, DEFAULT_ROUGHNESS, object.color.w),
        }
    }

    #[must_use]
    pub fn from_material(material: &MaterialData) -> Self {
        Self {
            base_color: material.base_color,
            packed_data: Self::pack_data(material.metallic, material.roughness, material.alpha),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.packed_data & ALPHA_MASK != ALPHA_MASK
    }

    #[must_use]
    pub fn pack_data(metallic: f32, roughness: f32, alpha: f32) -> u32 {
        let roughness = unit_float_to_u8(roughness * roughness);
        let metallic = unit_float_to_u8(metallic);
        let alpha = unit_float_to_u8(alpha);
        (alpha << 16) | (roughness << 8) | metallic
    }

    /// Inverse of [`pack_data`](Self::pack_data): `(metallic, roughness, alpha)`.
    #[must_use]
    pub fn unpack_data(packed: u32) -> (f32, f32, f32) {
        let metallic = (packed & 0xff) as f32 / 255.0;
        let roughness = (((packed >> 8) & 0xff) as f32 / 255.0).sqrt();
        let alpha = ((packed >> 16) & 0xff) as f32 / 255.0;
        (metallic, roughness, alpha)
    }
}

#[inline]
fn unit_float_to_u8(value: f32) -> u32 {
    if value <= 0.0 {
        0
    } else if value > 1.0 - 0.5 / 255.0 {
        255
    } else {
        (255.0 * value + 0.5) as u32
    }
}

/// Evenly distributed hue, stable across frames and sessions.
fn random_color(object: &DrawableObject) -> Vec3 {
    let hash = identity_hash(&object.name, object.library_path.as_deref());
    let hue = hash_to_unit_float(hash);
    hsv_to_rgb(Vec3::new(hue, 0.5, 0.8))
}

// ---------------------------------------------------------------------------
// Material images
// ---------------------------------------------------------------------------

/// Image bound to a material slot, with the sampler derived from its node.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialImage {
    pub image: ImageRef,
    pub user: Option<ImageUser>,
    pub sampler: SamplerState,
}

fn filter_for(interpolation: Interpolation) -> wgpu::FilterMode {
    match interpolation {
        Interpolation::Closest => wgpu::FilterMode::Nearest,
        Interpolation::Linear | Interpolation::Cubic | Interpolation::Smart => {
            wgpu::FilterMode::Linear
        }
    }
}

/// Resolves the active texture of material slot `slot`.
///
/// Returns `None` when the slot has no material, no active texture, or an
/// unsupported texture node; the caller falls back to the material color.
#[must_use]
pub fn get_material_image(object: &DrawableObject, slot: usize) -> Option<MaterialImage> {
    let node = object.material(slot)?.active_texture.as_ref()?;
    match node {
        ImageNode::Image {
            image,
            user,
            interpolation,
            extension,
        } => {
            let address_mode = match extension {
                Extension::Repeat => wgpu::AddressMode::Repeat,
                Extension::Extend => wgpu::AddressMode::ClampToEdge,
                Extension::Clip => wgpu::AddressMode::ClampToBorder,
                Extension::Mirror => wgpu::AddressMode::MirrorRepeat,
            };
            Some(MaterialImage {
                image: image.clone(),
                user: *user,
                sampler: SamplerState {
                    filter: filter_for(*interpolation),
                    address_mode,
                },
            })
        }
        ImageNode::Environment {
            image,
            user,
            interpolation,
        } => Some(MaterialImage {
            image: image.clone(),
            user: *user,
            sampler: SamplerState {
                filter: filter_for(*interpolation),
                ..SamplerState::DEFAULT
            },
        }),
        ImageNode::Unsupported(kind) => {
            log::warn!(
                "Object '{}' slot {slot}: active texture node '{kind}' is not an image",
                object.name
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;
    use crate::renderer::graph::BatchHandle;
    use crate::scene::ImageTexture;

    #[test]
    fn test_pack_layout() {
        let packed = Material::pack_data(1.0, 1.0, 1.0);
        assert_eq!(packed, 0x00ff_ffff);
        assert_eq!(Material::pack_data(0.0, 0.0, 0.0), 0);
    }

    #[test]
    fn test_roughness_is_squared() {
        let packed = Material::pack_data(0.0, 0.5, 1.0);
        assert_eq!((packed >> 8) & 0xff, 64);
    }

    #[test]
    fn test_attribute_sentinel_matches_packing() {
        assert_eq!(
            Material::ATTRIBUTE_COLOR.packed_data,
            Material::pack_data(0.0, DEFAULT_ROUGHNESS, 1.0)
        );
        assert!(!Material::ATTRIBUTE_COLOR.is_transparent());
    }

    #[test]
    fn test_transparency_from_alpha() {
        let mut data = MaterialData::default();
        assert!(!Material::from_material(&data).is_transparent());
        data.alpha = 0.5;
        assert!(Material::from_material(&data).is_transparent());
    }

    #[test]
    fn test_random_color_is_stable_and_linked_aware() {
        let a = DrawableObject::mesh("Suzanne", BatchHandle(0));
        let mut b = a.clone();
        assert_eq!(Material::from_object(&a, true), Material::from_object(&b, true));

        b.library_path = Some("//lib.blend".into());
        assert_ne!(
            Material::from_object(&a, true).base_color,
            Material::from_object(&b, true).base_color
        );
    }

    #[test]
    fn test_object_alpha_drives_transparency() {
        let mut object = DrawableObject::mesh("Glass", BatchHandle(0));
        object.color = Vec4::new(1.0, 1.0, 1.0, 0.3);
        assert!(Material::from_object(&object, false).is_transparent());
    }

    #[test]
    fn test_image_sampler_derivation() {
        let image = ImageRef::still("wood", ImageTexture::Missing);
        let mut object = DrawableObject::mesh("Table", BatchHandle(0));
        object.materials = vec![Some(MaterialData {
            active_texture: Some(ImageNode::Image {
                image: image.clone(),
                user: None,
                interpolation: Interpolation::Closest,
                extension: Extension::Clip,
            }),
            ..Default::default()
        })];
        let resolved = get_material_image(&object, 0).unwrap();
        assert_eq!(resolved.sampler.filter, wgpu::FilterMode::Nearest);
        assert_eq!(resolved.sampler.address_mode, wgpu::AddressMode::ClampToBorder);

        object.materials = vec![Some(MaterialData {
            active_texture: Some(ImageNode::Environment {
                image,
                user: None,
                interpolation: Interpolation::Linear,
            }),
            ..Default::default()
        })];
        let resolved = get_material_image(&object, 0).unwrap();
        assert_eq!(resolved.sampler.filter, wgpu::FilterMode::Linear);
        assert_eq!(resolved.sampler.address_mode, SamplerState::DEFAULT.address_mode);
    }

    #[test]
    fn test_unsupported_node_falls_back() {
        let mut object = DrawableObject::mesh("Box", BatchHandle(0));
        object.materials = vec![Some(MaterialData {
            active_texture: Some(ImageNode::Unsupported("ShaderNodeTexNoise".into())),
            ..Default::default()
        })];
        assert!(get_material_image(&object, 0).is_none());
    }
}
