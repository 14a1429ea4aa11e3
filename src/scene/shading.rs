//! Viewport shading and display settings
//!
//! Plain host-side configuration, read once per frame by
//! [`SceneState::init`](crate::renderer::state::SceneState::init).
//!
//! ```rust,ignore
//! use workbench::scene::{ShadingSettings, ShadingColor, ShadingFlags};
//!
//! let shading = ShadingSettings {
//!     color: ShadingColor::Random,
//!     flags: ShadingFlags::CAVITY | ShadingFlags::OBJECT_OUTLINE,
//!     ..Default::default()
//! };
//! ```

use glam::{Vec3, Vec4};

use crate::renderer::pipeline::ShadingType;

/// Source of the surface base color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShadingColor {
    /// Per-slot material color.
    #[default]
    Material,
    /// Object color property.
    Object,
    /// Stable pseudo-random color per object.
    Random,
    /// One color for the whole scene.
    Single,
    /// Active image texture of the material.
    Texture,
    /// Active color attribute of the mesh.
    Vertex,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShadingFlags: u32 {
        const XRAY             = 1 << 0;
        const CAVITY           = 1 << 1;
        const OBJECT_OUTLINE   = 1 << 2;
        const BACKFACE_CULLING = 1 << 3;
    }
}

/// Which cavity variant is drawn when [`ShadingFlags::CAVITY`] is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CavityType {
    /// World-space ambient occlusion.
    #[default]
    World,
    /// Screen-space curvature.
    Screen,
    Both,
}

impl CavityType {
    #[inline]
    #[must_use]
    pub fn world(self) -> bool {
        matches!(self, Self::World | Self::Both)
    }

    #[inline]
    #[must_use]
    pub fn screen(self) -> bool {
        matches!(self, Self::Screen | Self::Both)
    }
}

/// Viewport shading configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadingSettings {
    pub lighting: ShadingType,
    pub color: ShadingColor,
    pub flags: ShadingFlags,
    /// Color used by [`ShadingColor::Single`].
    pub single_color: Vec3,
    pub cavity_type: CavityType,
    pub cavity_valley_factor: f32,
    pub cavity_ridge_factor: f32,
    pub curvature_ridge_factor: f32,
    pub curvature_valley_factor: f32,
    /// X-ray opacity; x-ray mode only kicks in below 1.
    pub xray_alpha: f32,
    pub outline_color: Vec4,
    /// Name of the selected matcap; a change triggers a rebind.
    pub matcap: String,
}

impl Default for ShadingSettings {
    fn default() -> Self {
        Self {
            lighting: ShadingType::Studio,
            color: ShadingColor::Material,
            flags: ShadingFlags::empty(),
            single_color: Vec3::splat(0.8),
            cavity_type: CavityType::World,
            cavity_valley_factor: 1.0,
            cavity_ridge_factor: 1.0,
            curvature_ridge_factor: 1.0,
            curvature_valley_factor: 1.0,
            xray_alpha: 0.5,
            outline_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            matcap: "basic_1".to_string(),
        }
    }
}

impl ShadingSettings {
    #[must_use]
    pub fn with_lighting(mut self, lighting: ShadingType) -> Self {
        self.lighting = lighting;
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: ShadingColor) -> Self {
        self.color = color;
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ShadingFlags) -> Self {
        self.flags = flags;
        self
    }
}

// ---------------------------------------------------------------------------
// Anti-aliasing budget
// ---------------------------------------------------------------------------

/// Anti-aliasing quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AntiAliasingMode {
    Off,
    /// Single sample, spatial AA only.
    Fxaa,
    Samples5,
    #[default]
    Samples8,
    Samples11,
    Samples16,
    Samples32,
}

impl AntiAliasingMode {
    /// Number of TAA samples accumulated before convergence.
    #[must_use]
    pub const fn sample_count(self) -> u32 {
        match self {
            Self::Off => 0,
            Self::Fxaa => 1,
            Self::Samples5 => 5,
            Self::Samples8 => 8,
            Self::Samples11 => 11,
            Self::Samples16 => 16,
            Self::Samples32 => 32,
        }
    }
}

/// Scene display options shared by viewport and final renders.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySettings {
    pub viewport_aa: AntiAliasingMode,
    pub render_aa: AntiAliasingMode,
    /// Cavity samples per TAA iteration.
    pub cavity_samples: u32,
    pub cavity_distance: f32,
    pub cavity_attenuation: f32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            viewport_aa: AntiAliasingMode::Samples8,
            render_aa: AntiAliasingMode::Samples8,
            cavity_samples: 16,
            cavity_distance: 0.2,
            cavity_attenuation: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Texture paint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaintMode {
    /// Paint into the active material image.
    #[default]
    Material,
    /// Paint into a fixed canvas image.
    Image,
}

/// Texture-paint tool settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImagePaintSettings {
    pub mode: PaintMode,
    /// Canvas image used in [`PaintMode::Image`].
    pub canvas: Option<super::object::ImageRef>,
    /// Use nearest filtering for the canvas.
    pub interpolation_closest: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_counts() {
        assert_eq!(AntiAliasingMode::Off.sample_count(), 0);
        assert_eq!(AntiAliasingMode::Fxaa.sample_count(), 1);
        assert_eq!(AntiAliasingMode::Samples32.sample_count(), 32);
    }

    #[test]
    fn test_cavity_type_split() {
        assert!(CavityType::Both.world() && CavityType::Both.screen());
        assert!(CavityType::World.world() && !CavityType::World.screen());
        assert!(!CavityType::Screen.world() && CavityType::Screen.screen());
    }
}
