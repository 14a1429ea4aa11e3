//! Strongly-typed shader variant keys.
//!
//! Every shader the pipeline binds is identified by a small `Copy` key.
//! Three key families share one cache:
//!
//! - [`PrepassKey`]: geometry prepass variants, a 5-D space of
//!   pipeline x geometry x color x shading x clip.
//! - [`ResolveKey`]: full-screen deferred resolve variants,
//!   pipeline x shading x cavity x curvature.
//! - [`UtilityShader`]: fixed full-screen programs without permutations
//!   (composite, depth merge, outline, DoF and AA stages).
//!
//! Keys are plain values; equality is tuple equality.

use std::fmt;

// ─── Variant Dimensions ───────────────────────────────────────────────────────

/// Opaque geometry writes the G-buffer; transparent geometry accumulates OIT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PipelineType {
    Opaque,
    Transparent,
}

impl PipelineType {
    pub const ALL: [Self; 2] = [Self::Opaque, Self::Transparent];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Opaque => "opaque",
            Self::Transparent => "transparent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum GeometryType {
    #[default]
    Mesh,
    Curves,
    PointCloud,
}

impl GeometryType {
    pub const ALL: [Self; 3] = [Self::Mesh, Self::Curves, Self::PointCloud];
    pub const COUNT: usize = Self::ALL.len();

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mesh => "mesh",
            Self::Curves => "curves",
            Self::PointCloud => "pointcloud",
        }
    }
}

/// How the prepass obtains the surface base color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ColorType {
    /// Color comes from the material buffer.
    #[default]
    Material,
    /// Color is sampled from an image texture.
    Texture,
}

impl ColorType {
    pub const ALL: [Self; 2] = [Self::Material, Self::Texture];
    pub const COUNT: usize = Self::ALL.len();

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Material => "material",
            Self::Texture => "texture",
        }
    }
}

/// Lighting model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ShadingType {
    Flat,
    #[default]
    Studio,
    Matcap,
}

impl ShadingType {
    pub const ALL: [Self; 3] = [Self::Flat, Self::Studio, Self::Matcap];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Studio => "studio",
            Self::Matcap => "matcap",
        }
    }
}

// ─── Key Families ─────────────────────────────────────────────────────────────

/// Key of a geometry prepass shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrepassKey {
    pub pipeline: PipelineType,
    pub geometry: GeometryType,
    pub color: ColorType,
    pub shading: ShadingType,
    /// Clip-plane variant.
    pub clip: bool,
}

/// Key of a deferred resolve shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolveKey {
    pub pipeline: PipelineType,
    pub shading: ShadingType,
    pub cavity: bool,
    pub curvature: bool,
}

/// Permutation-free full-screen programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UtilityShader {
    /// OIT accumulation/reveal composite into the color target.
    TransparentResolve,
    /// In-front depth merged into the main depth buffer.
    MergeDepth,
    Outline,
    DofPrepare,
    DofDownsample,
    DofBlur1,
    DofBlur2,
    DofResolve,
    TaaAccumulation,
    SmaaEdgeDetect,
    SmaaBlendWeights,
    SmaaResolve,
}

impl UtilityShader {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TransparentResolve => "workbench_transparent_resolve",
            Self::MergeDepth => "workbench_merge_depth",
            Self::Outline => "workbench_effect_outline",
            Self::DofPrepare => "workbench_effect_dof_prepare",
            Self::DofDownsample => "workbench_effect_dof_downsample",
            Self::DofBlur1 => "workbench_effect_dof_blur1",
            Self::DofBlur2 => "workbench_effect_dof_blur2",
            Self::DofResolve => "workbench_effect_dof_resolve",
            Self::TaaAccumulation => "workbench_taa",
            Self::SmaaEdgeDetect => "workbench_smaa_stage_0",
            Self::SmaaBlendWeights => "workbench_smaa_stage_1",
            Self::SmaaResolve => "workbench_smaa_stage_2",
        }
    }
}

/// Any key the [`ShaderCache`](super::cache::ShaderCache) accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderVariantKey {
    Prepass(PrepassKey),
    Resolve(ResolveKey),
    Utility(UtilityShader),
}

impl From<PrepassKey> for ShaderVariantKey {
    fn from(key: PrepassKey) -> Self {
        Self::Prepass(key)
    }
}

impl From<ResolveKey> for ShaderVariantKey {
    fn from(key: ResolveKey) -> Self {
        Self::Resolve(key)
    }
}

impl From<UtilityShader> for ShaderVariantKey {
    fn from(key: UtilityShader) -> Self {
        Self::Utility(key)
    }
}

impl fmt::Display for ShaderVariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepass(k) => write!(
                f,
                "workbench_prepass_{}_{}_{}_{}{}",
                k.pipeline.as_str(),
                k.geometry.as_str(),
                k.color.as_str(),
                k.shading.as_str(),
                if k.clip { "_clip" } else { "" }
            ),
            Self::Resolve(k) => write!(
                f,
                "workbench_resolve_{}_{}_{}_{}",
                k.pipeline.as_str(),
                k.shading.as_str(),
                if k.cavity { "cavity" } else { "no_cavity" },
                if k.curvature { "curvature" } else { "no_curvature" }
            ),
            Self::Utility(u) => f.write_str(u.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepass_names_are_distinct() {
        let mut names = rustc_hash::FxHashSet::default();
        for pipeline in PipelineType::ALL {
            for geometry in GeometryType::ALL {
                for color in ColorType::ALL {
                    for shading in ShadingType::ALL {
                        for clip in [false, true] {
                            let key = ShaderVariantKey::from(PrepassKey {
                                pipeline,
                                geometry,
                                color,
                                shading,
                                clip,
                            });
                            assert!(names.insert(key.to_string()));
                        }
                    }
                }
            }
        }
        assert_eq!(names.len(), 2 * 3 * 2 * 3 * 2);
    }

    #[test]
    fn test_resolve_name() {
        let key = ShaderVariantKey::from(ResolveKey {
            pipeline: PipelineType::Opaque,
            shading: ShadingType::Matcap,
            cavity: true,
            curvature: false,
        });
        assert_eq!(key.to_string(), "workbench_resolve_opaque_matcap_cavity_no_curvature");
    }
}
