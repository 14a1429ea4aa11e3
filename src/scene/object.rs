//! Drawable objects and their materials
//!
//! Read-only host data. Geometry is referenced through pre-built
//! [`BatchHandle`]s; images through backend textures the host already
//! uploaded.

use glam::{Vec3, Vec4};
use smallvec::SmallVec;

use crate::renderer::backend::TextureHandle;
use crate::renderer::graph::BatchHandle;
use crate::renderer::pipeline::GeometryType;

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// GPU storage of one image frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTexture {
    /// Could not be loaded; drawn with the material color instead.
    Missing,
    Single(TextureHandle),
    /// UDIM tiles packed in an array, plus the tile lookup map.
    Tiled {
        tiles: TextureHandle,
        tile_map: TextureHandle,
    },
}

/// Per-use image parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ImageUser {
    /// Frame of a sequence image.
    pub frame: u32,
}

/// A host image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub name: String,
    /// One entry for still images, one per frame for sequences.
    pub frames: SmallVec<[ImageTexture; 1]>,
    pub alpha_premultiplied: bool,
}

impl ImageRef {
    #[must_use]
    pub fn still(name: impl Into<String>, texture: ImageTexture) -> Self {
        Self {
            name: name.into(),
            frames: SmallVec::from_elem(texture, 1),
            alpha_premultiplied: false,
        }
    }

    /// GPU texture for `user`; the last frame is held past the end of a sequence.
    #[must_use]
    pub fn texture(&self, user: Option<&ImageUser>) -> ImageTexture {
        let frame = user.map_or(0, |u| u.frame as usize);
        self.frames
            .get(frame)
            .or_else(|| self.frames.last())
            .copied()
            .unwrap_or(ImageTexture::Missing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Closest,
    Cubic,
    Smart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Extension {
    #[default]
    Repeat,
    Extend,
    Clip,
    Mirror,
}

/// The active texture node of a material.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageNode {
    Image {
        image: ImageRef,
        user: Option<ImageUser>,
        interpolation: Interpolation,
        extension: Extension,
    },
    Environment {
        image: ImageRef,
        user: Option<ImageUser>,
        interpolation: Interpolation,
    },
    /// Any other node type; carries the node type name for diagnostics.
    Unsupported(String),
}

// ---------------------------------------------------------------------------
// Materials
// ---------------------------------------------------------------------------

/// Viewport display properties of a host material.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialData {
    pub name: String,
    pub base_color: Vec3,
    pub alpha: f32,
    pub metallic: f32,
    pub roughness: f32,
    pub active_texture: Option<ImageNode>,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: "Material".to_string(),
            base_color: Vec3::splat(0.8),
            alpha: 1.0,
            metallic: 0.0,
            roughness: 0.4,
            active_texture: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ObjectFlags: u32 {
        /// Drawn on top of everything else.
        const IN_FRONT = 1 << 0;
        /// The active object of the view layer.
        const ACTIVE   = 1 << 1;
    }
}

/// Interaction mode the object is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectMode {
    #[default]
    Object,
    Edit,
    Sculpt,
    TexturePaint,
    VertexPaint,
}

/// Maximum display detail of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum DisplayType {
    Bounds,
    Wire,
    Solid,
    #[default]
    Textured,
}

/// Ready-to-draw geometry of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectBatches {
    /// Whole object in one batch.
    pub single: BatchHandle,
    /// One batch per material slot, same order as the material list.
    pub per_material: SmallVec<[BatchHandle; 4]>,
}

/// One visible object.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawableObject {
    pub name: String,
    /// Path of the linked library the object comes from.
    pub library_path: Option<String>,
    pub geometry: GeometryType,
    /// Object color property.
    pub color: Vec4,
    /// Material slots; `None` is an empty slot.
    pub materials: Vec<Option<MaterialData>>,
    pub batches: ObjectBatches,
    pub flags: ObjectFlags,
    pub mode: ObjectMode,
    pub display_type: DisplayType,
    pub has_uv: bool,
    pub has_color_attribute: bool,
    /// Drawn through the sculpt acceleration structure.
    pub sculpt_pbvh: bool,
}

impl DrawableObject {
    /// A single-material mesh with default settings.
    #[must_use]
    pub fn mesh(name: impl Into<String>, batch: BatchHandle) -> Self {
        Self {
            name: name.into(),
            library_path: None,
            geometry: GeometryType::Mesh,
            color: Vec4::ONE,
            materials: vec![Some(MaterialData::default())],
            batches: ObjectBatches {
                single: batch,
                per_material: SmallVec::from_elem(batch, 1),
            },
            flags: ObjectFlags::empty(),
            mode: ObjectMode::Object,
            display_type: DisplayType::Textured,
            has_uv: true,
            has_color_attribute: false,
            sculpt_pbvh: false,
        }
    }

    #[must_use]
    pub fn with_material(mut self, material: MaterialData) -> Self {
        self.materials = vec![Some(material)];
        self.batches.per_material = SmallVec::from_elem(self.batches.single, 1);
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ObjectFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Material of slot `index`, if the slot exists and is filled.
    #[must_use]
    pub fn material(&self, index: usize) -> Option<&MaterialData> {
        self.materials.get(index).and_then(Option::as_ref)
    }

    #[inline]
    #[must_use]
    pub fn material_slot_count(&self) -> usize {
        self.materials.len().max(1)
    }

    #[inline]
    #[must_use]
    pub fn is_in_front(&self) -> bool {
        self.flags.contains(ObjectFlags::IN_FRONT)
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.flags.contains(ObjectFlags::ACTIVE)
    }
}
